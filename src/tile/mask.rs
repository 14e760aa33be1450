use super::read_channels;
use crate::{
    internals::binreader::BinReader,
    models::{canvas::Compression, layer::Mask},
    Error, Result,
};
use itertools::izip;
use std::io::{Read, Seek};

/// Reads the mask tile matching the `index`th tile of its layer.
///
/// Masks share the geometry of their layer, so the tile is looked up directly
/// in the mask level record, `8` bytes past its start.
pub(crate) fn read_mask_tile<R>(
    reader: &mut BinReader<R>,
    mask: &Mask,
    index: usize,
    pixels: usize,
    compression: Compression,
) -> Result<Vec<u8>>
where
    R: Read + Seek,
{
    let at = u32::try_from(index)
        .ok()
        .and_then(|index| index.checked_add(2))
        .and_then(|slot| slot.checked_mul(4))
        .and_then(|offset| mask.tiles.checked_add(offset))
        .ok_or(Error::CorruptTile("mask tile pointer out of range"))?;

    reader.descend(at, |reader| {
        let ptr = reader.read_u32()?;
        if ptr == 0 {
            return Err(Error::CorruptTile("mask has fewer tiles than its layer"));
        }

        reader.seek(ptr.into())?;
        read_channels(reader, 1, pixels, compression)
    })
}

#[inline]
fn scale(alpha: u8, by: u8) -> u8 {
    // Truncating, `255 * 255 / 255` still fits.
    (u32::from(alpha) * u32::from(by) / 255) as u8
}

/// Scales the alpha of every RGBA pixel in `tile` by the matching mask value.
pub(crate) fn apply_mask(tile: &mut [u8], mask: &[u8]) {
    debug_assert_eq!(tile.len(), mask.len() * 4);

    for (pixel, &value) in izip!(tile.chunks_exact_mut(4), mask) {
        pixel[3] = scale(pixel[3], value);
    }
}

/// Scales the alpha of every RGBA pixel in `tile` by the layer opacity.
pub(crate) fn apply_opacity(tile: &mut [u8], opacity: u8) {
    if opacity == u8::MAX {
        return;
    }

    for pixel in tile.chunks_exact_mut(4) {
        pixel[3] = scale(pixel[3], opacity);
    }
}
