use super::property::{self, Property};
use crate::{internals::binreader::BinReader, Error, Result};
use log::{debug, trace};
use std::io::{Read, Seek};

pub(crate) const XCF_SIGNATURE: &[u8; 9] = b"gimp xcf ";

/// Revision of the file format, as written right after the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    /// Files written before the format was versioned (`"file"`).
    File,
    V001,
    V002,
}

impl Version {
    fn from_bytes(buf: [u8; 4]) -> Result<Self> {
        Ok(match &buf {
            b"file" => Self::File,
            b"v001" => Self::V001,
            b"v002" => Self::V002,
            _ => return Err(Error::UnsupportedVersion(buf)),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Rgb,
    Grayscale,
    /// Palette based canvas. Never decoded.
    Indexed,
}

impl ColorMode {
    fn new(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Rgb,
            1 => Self::Grayscale,
            2 => Self::Indexed,
            _ => return None,
        })
    }
}

/// How tile data is stored for the whole image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    Rle,
}

impl Compression {
    pub(crate) fn new(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Rle),
            _ => Err(Error::UnsupportedCompression(value)),
        }
    }
}

/// The image header: everything that comes before the layer pointer table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub version: Version,
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
    pub compression: Compression,
}

impl Canvas {
    /// Reads the header and the image property chain.
    ///
    /// Leaves the reader at the start of the layer pointer table.
    pub(crate) fn from_reader<R>(reader: &mut BinReader<R>) -> Result<Self>
    where
        R: Read + Seek,
    {
        let magic = reader.read_array::<9>().map_err(|_| Error::BadMagic)?;
        if &magic != XCF_SIGNATURE {
            return Err(Error::BadMagic);
        }

        let version = Version::from_bytes(reader.read_array()?)?;
        // NUL terminator of the version tag.
        reader.skip(1)?;

        let width = reader.read_u32()?;
        let height = reader.read_u32()?;

        let mode = reader.read_u32()?;
        let color_mode = match ColorMode::new(mode) {
            Some(ColorMode::Indexed) | None => return Err(Error::UnsupportedColorMode(mode)),
            Some(color_mode) => color_mode,
        };

        let mut compression = Compression::default();
        property::scan(reader, |prop| {
            match prop {
                Property::Compression(value) => compression = value,
                prop => trace!("ignoring image property {prop:?}"),
            };
            Ok(())
        })?;

        debug!("{version:?} canvas {width}x{height} {color_mode:?}, {compression:?} tiles");

        Ok(Self {
            version,
            width,
            height,
            color_mode,
            compression,
        })
    }
}
