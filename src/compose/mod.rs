//! Per-pixel blending of decoded tiles onto the canvas.
//!
//! All channel math is integer, on `0..=255` values, and every division by
//! `255` truncates.

mod blend;
mod color;

pub use blend::blend;

use crate::tile::Placement;
use nanorand::WyRand;
use std::fmt;

/// The layer modes a xcf file can ask for, numbered the way they are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlendingMode {
    Normal,
    Dissolve,
    Behind,
    Multiply,
    Screen,
    Overlay,
    Difference,
    Addition,
    Subtract,
    DarkenOnly,
    LightenOnly,
    Hue,
    Saturation,
    Color,
    Value,
    Divide,
    Dodge,
    Burn,
    Hardlight,
    Softlight,
    GrainExtract,
    GrainMerge,
    /// A mode this decoder doesn't know; the layer simply overwrites the
    /// pixels below it.
    Unknown(u32),
}

impl BlendingMode {
    pub fn new(value: u32) -> Self {
        match value {
            0 => Self::Normal,
            1 => Self::Dissolve,
            2 => Self::Behind,
            3 => Self::Multiply,
            4 => Self::Screen,
            5 => Self::Overlay,
            6 => Self::Difference,
            7 => Self::Addition,
            8 => Self::Subtract,
            9 => Self::DarkenOnly,
            10 => Self::LightenOnly,
            11 => Self::Hue,
            12 => Self::Saturation,
            13 => Self::Color,
            14 => Self::Value,
            15 => Self::Divide,
            16 => Self::Dodge,
            17 => Self::Burn,
            18 => Self::Hardlight,
            19 => Self::Softlight,
            20 => Self::GrainExtract,
            21 => Self::GrainMerge,
            value => Self::Unknown(value),
        }
    }
}

impl fmt::Display for BlendingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DarkenOnly => f.write_str("Darken only"),
            Self::LightenOnly => f.write_str("Lighten only"),
            Self::GrainExtract => f.write_str("Grain extract"),
            Self::GrainMerge => f.write_str("Grain merge"),
            Self::Hardlight => f.write_str("Hard light"),
            Self::Softlight => f.write_str("Soft light"),
            Self::Unknown(value) => write!(f, "Unknown ({value})"),
            mode => fmt::Debug::fmt(mode, f),
        }
    }
}

/// Blends the visible part of `tile` onto `dest`.
///
/// `dest` is a `dest_width` pixels wide RGBA raster and `tile` a `tile_width`
/// pixels wide RGBA block, both without padding. `placement` must come from
/// [`crate::tile::place`], which keeps every access in bounds.
pub(crate) fn composite(
    dest: &mut [u8],
    dest_width: u32,
    tile: &[u8],
    tile_width: u32,
    placement: &Placement,
    mode: BlendingMode,
    rng: &mut WyRand,
) {
    let area = placement.area;
    let row_len = area.width as usize * 4;

    for row in 0..area.height as usize {
        let dst_start = ((area.y as usize + row) * dest_width as usize + area.x as usize) * 4;
        let src_start =
            ((placement.src_y as usize + row) * tile_width as usize + placement.src_x as usize) * 4;

        let dst_row = &mut dest[dst_start..dst_start + row_len];
        let src_row = &tile[src_start..src_start + row_len];

        for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
            let below = [dst[0], dst[1], dst[2], dst[3]];
            let above = [src[0], src[1], src[2], src[3]];

            dst.copy_from_slice(&blend(mode, below, above, rng));
        }
    }
}
