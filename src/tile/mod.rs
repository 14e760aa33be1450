//! Tile addressing, decompression and placement.
//!
//! A drawable is cut into `64x64` tiles (smaller along the right and bottom
//! edges) stored row-major behind a zero terminated pointer list.

pub(crate) mod mask;
pub(crate) mod rle;

use crate::{
    internals::binreader::BinReader,
    models::{canvas::Compression, layer::PixelKind},
    Result,
};
use itertools::izip;
use std::io::{Read, Seek};

pub const TILE_SIZE: u32 = 64;

/// Largest amount of pixels a tile can hold.
pub(crate) const TILE_PIXELS: usize = (TILE_SIZE * TILE_SIZE) as usize;

/// An axis aligned rectangle on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How the tiles of a `width x height` drawable are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TileGrid {
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
}

impl TileGrid {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            columns: width.div_ceil(TILE_SIZE),
            rows: height.div_ceil(TILE_SIZE),
        }
    }

    /// Amount of tiles in the grid.
    pub(crate) fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Position and size of the `index`th tile relative to the drawable.
    pub(crate) fn tile(&self, index: usize) -> (u32, u32, u32, u32) {
        let column = index as u32 % self.columns;
        let row = index as u32 / self.columns;

        let x = column * TILE_SIZE;
        let y = row * TILE_SIZE;

        (
            x,
            y,
            TILE_SIZE.min(self.width - x),
            TILE_SIZE.min(self.height - y),
        )
    }
}

/// Where a tile ends up on the canvas after clipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placement {
    /// The visible part of the tile, in canvas coordinates.
    pub(crate) area: Rect,
    /// First visible column inside the tile.
    pub(crate) src_x: u32,
    /// First visible row inside the tile.
    pub(crate) src_y: u32,
}

/// Clips a `tw x th` tile whose top-left corner lands at `(ox, oy)` against a
/// `width x height` canvas.
///
/// Returns [`None`] when nothing of the tile is visible.
pub(crate) fn place(ox: i64, oy: i64, tw: u32, th: u32, width: u32, height: u32) -> Option<Placement> {
    let (mut ox, mut oy) = (ox, oy);
    let (mut tw, mut th) = (i64::from(tw), i64::from(th));
    let (width, height) = (i64::from(width), i64::from(height));

    if ox + tw <= 0 || oy + th <= 0 || ox >= width || oy >= height {
        return None;
    }

    let (mut src_x, mut src_y) = (0, 0);

    if ox < 0 {
        src_x = -ox;
        tw += ox;
        ox = 0;
    }
    if oy < 0 {
        src_y = -oy;
        th += oy;
        oy = 0;
    }

    if ox + tw > width {
        tw = width - ox;
    }
    if oy + th > height {
        th = height - oy;
    }

    // Everything was range checked against `u32` canvas sizes above.
    Some(Placement {
        area: Rect {
            x: ox as u32,
            y: oy as u32,
            width: tw as u32,
            height: th as u32,
        },
        src_x: src_x as u32,
        src_y: src_y as u32,
    })
}

/// Reads `pixels` pixels of `channels` bytes each, returning them interleaved.
pub(crate) fn read_channels<R>(
    reader: &mut BinReader<R>,
    channels: usize,
    pixels: usize,
    compression: Compression,
) -> Result<Vec<u8>>
where
    R: Read + Seek,
{
    debug_assert!((1..=4).contains(&channels));
    debug_assert!(pixels <= TILE_PIXELS);

    match compression {
        Compression::None => reader.read_bytes(pixels * channels),
        Compression::Rle => {
            let mut planes = vec![0; pixels * channels];
            for plane in planes.chunks_exact_mut(pixels) {
                rle::decode_channel(reader, plane)?;
            }

            if channels == 1 {
                return Ok(planes);
            }

            let mut interleaved = vec![0; pixels * channels];
            for (channel, plane) in planes.chunks_exact(pixels).enumerate() {
                for (dst, src) in interleaved[channel..]
                    .iter_mut()
                    .step_by(channels)
                    .zip(plane)
                {
                    *dst = *src;
                }
            }

            Ok(interleaved)
        }
    }
}

/// Reads a whole tile of `kind` pixels and expands it to RGBA.
pub(crate) fn read_tile<R>(
    reader: &mut BinReader<R>,
    kind: PixelKind,
    pixels: usize,
    compression: Compression,
) -> Result<Vec<u8>>
where
    R: Read + Seek,
{
    let raw = read_channels(reader, kind.channels(), pixels, compression)?;
    Ok(to_rgba(kind, &raw))
}

/// Expands interleaved `kind` pixels to RGBA, filling the missing channels.
pub(crate) fn to_rgba(kind: PixelKind, src: &[u8]) -> Vec<u8> {
    let pixels = src.len() / kind.channels();
    let mut rgba = vec![u8::MAX; pixels * 4];

    match kind {
        PixelKind::Rgba => rgba.copy_from_slice(src),
        PixelKind::Rgb => {
            for (dst, src) in izip!(rgba.chunks_exact_mut(4), src.chunks_exact(3)) {
                dst[..3].copy_from_slice(src);
            }
        }
        PixelKind::Gray => {
            for (dst, &gray) in izip!(rgba.chunks_exact_mut(4), src) {
                dst[..3].fill(gray);
            }
        }
        PixelKind::GrayAlpha => {
            for (dst, src) in izip!(rgba.chunks_exact_mut(4), src.chunks_exact(2)) {
                dst[..3].fill(src[0]);
                dst[3] = src[1];
            }
        }
        PixelKind::Indexed | PixelKind::IndexedAlpha => {
            unreachable!("indexed layers are rejected while walking the file")
        }
    }

    rgba
}
