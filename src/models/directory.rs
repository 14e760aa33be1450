//! Resolves the pointer graph of a xcf file into a bottom-up list of layers.
//!
//! ```text
//! header ─ properties ─ [layer ptr]* 0
//!                          │
//!                          └─ layer ─ properties ─ hierarchy ptr ─ mask ptr
//!                                                     │              │
//!                                                     │              └─ channel ─ ... ─ hierarchy ptr
//!                                                     └─ w h bpp ─ level ptr
//!                                                                     │
//!                                                                     └─ w h [tile ptr]* 0
//! ```
//!
//! Pixel data is not touched here; a layer only remembers where its level
//! record (the tile pointer list) starts.

use super::{
    canvas::Canvas,
    layer::{Layer, Mask, PixelKind},
    property::{self, Property},
};
use crate::{internals::binreader::BinReader, Error, Result};
use log::{debug, trace};
use std::{
    collections::VecDeque,
    io::{Read, Seek},
};

/// Everything needed to render an image, minus the pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    pub canvas: Canvas,
    /// Ordered from the bottom of the stack to the top.
    pub layers: Vec<Layer>,
}

impl Directory {
    pub(crate) fn from_reader<R>(reader: &mut BinReader<R>) -> Result<Self>
    where
        R: Read + Seek,
    {
        let canvas = Canvas::from_reader(reader)?;
        let mut layers = VecDeque::new();

        loop {
            let ptr = reader.read_u32()?;
            if ptr == 0 {
                break;
            }

            if let Some(layer) = reader.descend(ptr, read_layer)? {
                // Stored top to bottom, composited bottom to top.
                layers.push_front(layer);
            }
        }

        debug!("{} layer(s) to composite", layers.len());

        Ok(Self {
            canvas,
            layers: layers.into(),
        })
    }
}

/// Parses the layer record at the current position.
///
/// Returns [`None`] for layers that do not take part in the composition.
fn read_layer<R>(reader: &mut BinReader<R>) -> Result<Option<Layer>>
where
    R: Read + Seek,
{
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let kind = reader.read_u32()?;
    let kind = match PixelKind::new(kind) {
        Some(PixelKind::Indexed | PixelKind::IndexedAlpha) | None => {
            return Err(Error::UnsupportedColorMode(kind))
        }
        Some(kind) => kind,
    };

    let name = reader.read_string()?;
    let mut layer = Layer::new(name, width, height, kind);
    let mut floating = false;

    property::scan(reader, |prop| {
        match prop {
            Property::Opacity(opacity) => layer.opacity = opacity,
            Property::Mode(blending) => layer.blending = blending,
            Property::Visible(visible) => layer.visible = visible,
            Property::ApplyMask(apply) => layer.apply_mask = apply,
            Property::Offsets { x, y } => (layer.x, layer.y) = (x, y),
            Property::FloatingSelection { .. } => floating = true,
            prop => trace!("ignoring layer property {prop:?}"),
        };
        Ok(())
    })?;

    let hierarchy = reader.read_u32()?;
    layer.tiles = reader.descend(hierarchy, |reader| {
        read_hierarchy(reader, width, height, kind.channels())
    })?;

    let mask = reader.read_u32()?;

    debug!(
        "layer {:?}: {width}x{height} {kind:?} at {},{} {:?} opacity {}{}{}",
        layer.name,
        layer.x,
        layer.y,
        layer.blending,
        layer.opacity,
        if layer.visible { "" } else { ", hidden" },
        if floating { ", floating selection" } else { "" },
    );

    if !layer.visible || floating {
        return Ok(None);
    }

    if layer.apply_mask && mask != 0 {
        let mask = reader.descend(mask, read_mask)?;

        if (mask.width, mask.height) != (width, height) {
            return Err(Error::CorruptProperty("mask and layer sizes differ"));
        }

        if mask.visible {
            layer.mask = Some(mask);
        } else {
            trace!("dropping hidden mask of {:?}", layer.name);
        }
    }

    Ok(Some(layer))
}

/// Parses a channel record used as a layer mask.
fn read_mask<R>(reader: &mut BinReader<R>) -> Result<Mask>
where
    R: Read + Seek,
{
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    reader.skip_string()?;

    let mut mask = Mask {
        width,
        height,
        opacity: u8::MAX,
        visible: true,
        tiles: 0,
    };

    property::scan(reader, |prop| {
        match prop {
            Property::Opacity(opacity) => mask.opacity = opacity,
            Property::Visible(visible) => mask.visible = visible,
            prop => trace!("ignoring channel property {prop:?}"),
        };
        Ok(())
    })?;

    let hierarchy = reader.read_u32()?;
    mask.tiles = reader.descend(hierarchy, |reader| {
        read_hierarchy(reader, width, height, 1)
    })?;

    Ok(mask)
}

/// Validates a hierarchy record and returns the pointer to its first level.
///
/// Only the first (full resolution) level is ever used.
fn read_hierarchy<R>(reader: &mut BinReader<R>, width: u32, height: u32, bpp: usize) -> Result<u32>
where
    R: Read + Seek,
{
    let (w, h) = (reader.read_u32()?, reader.read_u32()?);
    if (w, h) != (width, height) {
        return Err(Error::CorruptProperty("hierarchy size does not match its drawable"));
    }

    if reader.read_u32()? as usize != bpp {
        return Err(Error::CorruptProperty("hierarchy bpp does not match its drawable"));
    }

    match reader.read_u32()? {
        0 => Err(Error::CorruptProperty("hierarchy without levels")),
        level => Ok(level),
    }
}
