//! The `(tag, length, payload)` chains shared by the image, layer and channel
//! headers.

use super::canvas::Compression;
use crate::{compose::BlendingMode, internals::binreader::BinReader, Error, Result};
use log::trace;
use std::io::{Read, Seek};

const PROP_END: u32 = 0;
const PROP_COLORMAP: u32 = 1;
const PROP_FLOATING_SELECTION: u32 = 5;
const PROP_OPACITY: u32 = 6;
const PROP_MODE: u32 = 7;
const PROP_VISIBLE: u32 = 8;
const PROP_APPLY_MASK: u32 = 11;
const PROP_OFFSETS: u32 = 15;
const PROP_COMPRESSION: u32 = 17;

/// A property the decoder cares about.
///
/// Anything else is reported as [`Property::Unknown`] after its payload has
/// already been skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Property {
    Colormap { colors: u32 },
    /// The layer is a floating selection attached to the drawable at `target`.
    FloatingSelection { target: u32 },
    Opacity(u8),
    Mode(BlendingMode),
    Visible(bool),
    ApplyMask(bool),
    Offsets { x: i32, y: i32 },
    Compression(Compression),
    Unknown { tag: u32, len: u32 },
}

/// Walks a property chain until its `PROP_END` sentinel, handing every
/// property to `visit`.
///
/// Recognized payloads are parsed, everything else is skipped by its declared
/// length. On return the reader sits right after the sentinel.
pub(crate) fn scan<R, F>(reader: &mut BinReader<R>, mut visit: F) -> Result<()>
where
    R: Read + Seek,
    F: FnMut(Property) -> Result<()>,
{
    let mut last: Option<u64> = None;

    loop {
        let start = reader.tell();
        if last.is_some_and(|last| start <= last) {
            return Err(Error::CorruptProperty("property chain does not advance"));
        }
        last = Some(start);

        let tag = reader.read_u32()?;
        let len = reader.read_u32()?;

        if tag == PROP_END {
            return Ok(());
        }

        let end = reader.tell() + u64::from(len);
        if end > reader.stream_len() {
            return Err(Error::CorruptProperty("payload runs past the end of the file"));
        }

        trace!("property {tag} ({len} bytes) at {start}");

        let prop = read_payload(reader, tag, len)?;

        if reader.tell() > end {
            return Err(Error::CorruptProperty("payload is longer than declared"));
        }
        reader.seek(end)?;

        visit(prop)?;
    }
}

fn read_payload<R>(reader: &mut BinReader<R>, tag: u32, len: u32) -> Result<Property>
where
    R: Read + Seek,
{
    let need = |size: u32| {
        if len < size {
            Err(Error::CorruptProperty("payload is shorter than its type"))
        } else {
            Ok(())
        }
    };

    Ok(match tag {
        PROP_COLORMAP => {
            need(4)?;
            Property::Colormap {
                colors: reader.read_u32()?,
            }
        }
        PROP_FLOATING_SELECTION => {
            need(4)?;
            Property::FloatingSelection {
                target: reader.read_u32()?,
            }
        }
        PROP_OPACITY => {
            need(4)?;
            let opacity = reader.read_u32()?.min(u8::MAX.into());
            Property::Opacity(opacity as u8)
        }
        PROP_MODE => {
            need(4)?;
            Property::Mode(BlendingMode::new(reader.read_u32()?))
        }
        PROP_VISIBLE => {
            need(4)?;
            Property::Visible(reader.read_bool()?)
        }
        PROP_APPLY_MASK => {
            need(4)?;
            Property::ApplyMask(reader.read_bool()?)
        }
        PROP_OFFSETS => {
            need(8)?;
            Property::Offsets {
                x: reader.read_i32()?,
                y: reader.read_i32()?,
            }
        }
        PROP_COMPRESSION => {
            need(1)?;
            Property::Compression(Compression::new(reader.read_u8()?)?)
        }
        tag => Property::Unknown { tag, len },
    })
}
