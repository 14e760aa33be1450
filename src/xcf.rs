//! Turns a parsed [`Directory`] into a flattened [`Image`].

use crate::{
    compose::{composite, BlendingMode},
    internals::binreader::BinReader,
    models::{Canvas, Directory, Image, Layer},
    options::DecoderOptions,
    tile::{
        mask::{apply_mask, apply_opacity, read_mask_tile},
        place, read_tile, Rect, TileGrid,
    },
    Error, Result,
};
use log::{debug, trace, warn};
use nanorand::WyRand;
use std::io::{Read, Seek};

/// Hooks to follow a decode as it happens.
///
/// Layers are stored top to bottom but have to be blended bottom to top, so
/// [`DecodeObserver::updated`] areas are only final once the whole decode
/// returns.
pub trait DecodeObserver {
    /// The raster was allocated; it is `width x height` and fully transparent.
    fn prepared(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }

    /// A tile was blended onto `area` of the raster.
    fn updated(&mut self, area: Rect) {
        let _ = area;
    }
}

impl DecodeObserver for () {}

/// A xcf decoder.
///
/// ```no_run
/// use std::{fs::File, io::BufReader};
/// use xcfire::XcfDecoder;
///
/// let file = BufReader::new(File::open("art.xcf")?);
/// let mut decoder = XcfDecoder::new(file)?;
///
/// for layer in &decoder.decode_headers()?.layers {
///     println!("{} ({})", layer.name, layer.blending);
/// }
///
/// let image = decoder.decode()?;
/// assert_eq!(image.pixels.len(), image.stride() * image.height as usize);
/// # Ok::<(), xcfire::Error>(())
/// ```
pub struct XcfDecoder<R>
where
    R: Read + Seek,
{
    reader: BinReader<R>,
    options: DecoderOptions,
    directory: Option<Directory>,
}

impl<R> XcfDecoder<R>
where
    R: Read + Seek,
{
    pub fn new(source: R) -> Result<Self> {
        Self::new_with_options(source, DecoderOptions::default())
    }

    pub fn new_with_options(source: R, options: DecoderOptions) -> Result<Self> {
        Ok(Self {
            reader: BinReader::new(source)?,
            options,
            directory: None,
        })
    }

    /// Walks the file structure without touching any pixel data.
    ///
    /// The result is cached; calling this again is free.
    pub fn decode_headers(&mut self) -> Result<&Directory> {
        let directory = self.take_directory()?;
        Ok(self.directory.insert(directory))
    }

    /// Canvas size, if the headers were decoded already.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.directory
            .as_ref()
            .map(|dir| (dir.canvas.width, dir.canvas.height))
    }

    /// Decodes and flattens the whole image.
    ///
    /// Dissolve layers are seeded with [`DecoderOptions::dissolve_seed`].
    pub fn decode(&mut self) -> Result<Image> {
        let mut rng = self.options.rng();
        self.decode_with(&mut rng, &mut ())
    }

    /// Same as [`XcfDecoder::decode`], but with the caller's generator and
    /// progress hooks.
    pub fn decode_with<O>(&mut self, rng: &mut WyRand, observer: &mut O) -> Result<Image>
    where
        O: DecodeObserver + ?Sized,
    {
        let directory = self.take_directory()?;
        let image = self.render(&directory, rng, observer);
        self.directory = Some(directory);

        image
    }

    fn take_directory(&mut self) -> Result<Directory> {
        match self.directory.take() {
            Some(directory) => Ok(directory),
            None => {
                self.reader.seek(0)?;
                Directory::from_reader(&mut self.reader)
            }
        }
    }

    fn render<O>(&mut self, directory: &Directory, rng: &mut WyRand, observer: &mut O) -> Result<Image>
    where
        O: DecodeObserver + ?Sized,
    {
        let canvas = directory.canvas;
        let (width, height) = (canvas.width, canvas.height);

        if width > self.options.max_width() || height > self.options.max_height() {
            return Err(Error::LargeDimensions {
                width,
                height,
                max_width: self.options.max_width(),
                max_height: self.options.max_height(),
            });
        }

        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or(Error::AllocationFailure { width, height })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(size)
            .map_err(|_| Error::AllocationFailure { width, height })?;
        pixels.resize(size, 0);

        observer.prepared(width, height);

        for layer in &directory.layers {
            match layer.blending {
                BlendingMode::Behind => {
                    trace!("layer {:?} is in behind mode, nothing to draw", layer.name);
                    continue;
                }
                BlendingMode::Unknown(mode) => {
                    warn!("layer {:?} has unknown mode {mode}, overwriting instead", layer.name);
                }
                _ => {}
            }

            debug!("compositing layer {:?}", layer.name);

            self.reader.descend(layer.tiles, |reader| {
                draw_layer(reader, &canvas, layer, &mut pixels, rng, observer)
            })?;
        }

        Ok(Image {
            width,
            height,
            pixels,
        })
    }
}

/// Blends every on-canvas tile of `layer` onto `dest`.
///
/// The reader must sit at the start of the layer's level record.
fn draw_layer<R, O>(
    reader: &mut BinReader<R>,
    canvas: &Canvas,
    layer: &Layer,
    dest: &mut [u8],
    rng: &mut WyRand,
    observer: &mut O,
) -> Result<()>
where
    R: Read + Seek,
    O: DecodeObserver + ?Sized,
{
    let (width, height) = (reader.read_u32()?, reader.read_u32()?);
    if (width, height) != (layer.width, layer.height) {
        return Err(Error::CorruptTile("level size does not match its layer"));
    }

    let grid = TileGrid::new(width, height);

    for index in 0.. {
        let ptr = reader.read_u32()?;
        if ptr == 0 {
            break;
        }

        if index >= grid.len() {
            return Err(Error::CorruptTile("more tiles than the layer has room for"));
        }

        let (x, y, tw, th) = grid.tile(index);
        let Some(placement) = place(
            i64::from(layer.x) + i64::from(x),
            i64::from(layer.y) + i64::from(y),
            tw,
            th,
            canvas.width,
            canvas.height,
        ) else {
            trace!("tile {index} of {:?} is off canvas", layer.name);
            continue;
        };

        let count = (tw * th) as usize;
        let mut tile = reader.descend(ptr, |reader| {
            read_tile(reader, layer.kind, count, canvas.compression)
        })?;

        if let Some(mask) = &layer.mask {
            let values = read_mask_tile(reader, mask, index, count, canvas.compression)?;
            apply_mask(&mut tile, &values);
        }
        apply_opacity(&mut tile, layer.opacity);

        composite(dest, canvas.width, &tile, tw, &placement, layer.blending, rng);

        trace!("tile {index} of {:?} drawn at {:?}", layer.name, placement.area);
        observer.updated(placement.area);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::tests::{LayerBuilder, XcfBuilder};
    use lazy_static::lazy_static;
    use std::io::Cursor;

    lazy_static! {
        /// Half transparent blue over opaque red, 2x2.
        static ref RED_BLUE: Vec<u8> = XcfBuilder::new(2, 2)
            .layer(LayerBuilder::solid("blue", 2, 2, [0, 0, 255, 255]).opacity(128))
            .layer(LayerBuilder::solid("red", 2, 2, [255, 0, 0, 255]))
            .build();

        /// A gray layer spanning a few tiles, with runs for the rle encoder.
        static ref GRADIENT: LayerBuilder = {
            let pixels = (0..130 * 70u32).map(|i| (i / 5 % 9 * 25) as u8).collect();
            LayerBuilder::raw("gradient", 130, 70, 2, pixels)
        };
    }

    #[derive(Default)]
    struct Recorder {
        prepared: Option<(u32, u32)>,
        updated: Vec<Rect>,
    }

    impl DecodeObserver for Recorder {
        fn prepared(&mut self, width: u32, height: u32) {
            self.prepared = Some((width, height));
        }

        fn updated(&mut self, area: Rect) {
            self.updated.push(area);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Image> {
        XcfDecoder::new(Cursor::new(bytes))?.decode()
    }

    fn decode_recorded(bytes: &[u8]) -> (Result<Image>, Recorder) {
        let mut recorder = Recorder::default();
        let res = XcfDecoder::new(Cursor::new(bytes)).and_then(|mut decoder| {
            decoder.decode_with(&mut WyRand::new_seed(0), &mut recorder)
        });

        (res, recorder)
    }

    #[test]
    fn single_tile_is_identity() -> eyre::Result<()> {
        let pixels = (0..6u8)
            .flat_map(|i| [i * 40, 255 - i * 40, i, 1 + i * 50])
            .collect::<Vec<_>>();
        let bytes = XcfBuilder::new(3, 2)
            .layer(LayerBuilder::raw("only", 3, 2, 1, pixels.clone()))
            .build();

        let image = decode(&bytes)?;
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels, pixels);

        Ok(())
    }

    #[test]
    fn full_tile_is_identity() -> eyre::Result<()> {
        let pixels = (0..64 * 64u32)
            .flat_map(|i| [i as u8, (i / 64) as u8 * 4, (i * 7) as u8, (i % 255) as u8 + 1])
            .collect::<Vec<_>>();

        for rle in [false, true] {
            let builder = XcfBuilder::new(64, 64)
                .compression(u8::from(rle))
                .layer(LayerBuilder::raw("tile", 64, 64, 1, pixels.clone()));

            let (image, recorder) = decode_recorded(&builder.build());
            assert_eq!(image?.pixels, pixels);
            assert_eq!(
                recorder.updated,
                [Rect {
                    x: 0,
                    y: 0,
                    width: 64,
                    height: 64
                }]
            );
        }

        Ok(())
    }

    #[test]
    fn layers_are_blended_bottom_up() -> eyre::Result<()> {
        let image = decode(&RED_BLUE)?;

        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(image.pixel(x, y), Some([127, 0, 128, 255]));
            }
        }

        Ok(())
    }

    #[test]
    fn headers_are_cached() -> eyre::Result<()> {
        let mut decoder = XcfDecoder::new(Cursor::new(RED_BLUE.as_slice()))?;
        assert_eq!(decoder.dimensions(), None);

        let names = decoder
            .decode_headers()?
            .layers
            .iter()
            .map(|layer| layer.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, ["red", "blue"]);
        assert_eq!(decoder.dimensions(), Some((2, 2)));

        // decoding twice from the same decoder renders the same thing.
        assert_eq!(decoder.decode()?, decoder.decode()?);

        Ok(())
    }

    #[test]
    fn masks_scale_alpha() -> eyre::Result<()> {
        let bytes = XcfBuilder::new(2, 1)
            .layer(LayerBuilder::solid("masked", 2, 1, [255, 0, 0, 255]).mask(vec![128, 0], true))
            .build();

        let image = decode(&bytes)?;
        assert_eq!(image.pixel(0, 0), Some([255, 0, 0, 128]));
        assert_eq!(image.pixel(1, 0), Some([0, 0, 0, 0]));

        Ok(())
    }

    #[test]
    fn rle_masks_work() -> eyre::Result<()> {
        // spans four tiles, with partial ones on both edges.
        let (width, height) = (70, 66);
        let mask = (0..width * height).map(|i| (i * 3 % 256) as u8).collect::<Vec<_>>();
        let layer = LayerBuilder::solid("masked", width, height, [10, 20, 30, 255]).mask(mask.clone(), true);

        let rle = XcfBuilder::new(width, height).rle().layer(layer.clone()).build();
        let raw = XcfBuilder::new(width, height).layer(layer).build();

        let image = decode(&rle)?;
        assert_eq!(image, decode(&raw)?);

        for (px, &m) in image.pixels.chunks_exact(4).zip(&mask) {
            let expected = if m == 0 { [0; 4] } else { [10, 20, 30, m] };
            assert_eq!(px, expected);
        }

        Ok(())
    }

    #[test]
    fn rle_and_raw_files_agree() -> eyre::Result<()> {
        let raw = XcfBuilder::new(130, 70).layer(GRADIENT.clone()).build();
        let rle = XcfBuilder::new(130, 70).rle().layer(GRADIENT.clone()).build();
        assert!(rle.len() < raw.len());

        let image = decode(&rle)?;
        assert_eq!(image, decode(&raw)?);

        // gray 25 * 1 at x = 5, y = 0
        assert_eq!(image.pixel(5, 0), Some([25, 25, 25, 255]));
        // pixel index 69 * 130 + 129 = 9099, 9099 / 5 % 9 = 1
        assert_eq!(image.pixel(129, 69), Some([25, 25, 25, 255]));

        Ok(())
    }

    #[test]
    fn offsets_move_layers() -> eyre::Result<()> {
        let bytes = XcfBuilder::new(4, 4)
            .layer(LayerBuilder::solid("corner", 4, 4, [9, 9, 9, 255]).offset(2, 2))
            .build();

        let (image, recorder) = decode_recorded(&bytes);
        let image = image?;

        assert_eq!(image.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(image.pixel(2, 2), Some([9, 9, 9, 255]));
        assert_eq!(image.pixel(3, 3), Some([9, 9, 9, 255]));
        assert_eq!(recorder.prepared, Some((4, 4)));
        assert_eq!(
            recorder.updated,
            [Rect {
                x: 2,
                y: 2,
                width: 2,
                height: 2
            }]
        );

        Ok(())
    }

    #[test]
    fn off_canvas_tiles_are_skipped() -> eyre::Result<()> {
        // 130 wide: tiles 0 and 1 land left of the canvas, only tile 2 shows.
        let bytes = XcfBuilder::new(2, 70)
            .layer(GRADIENT.clone().offset(-128, 0))
            .build();

        let (image, recorder) = decode_recorded(&bytes);
        let image = image?;

        assert_eq!(recorder.updated.len(), 2);
        assert!(recorder.updated.iter().all(|area| area.width == 2));
        // pixel index 128 -> 128 / 5 % 9 = 7
        assert_eq!(image.pixel(0, 0), Some([175, 175, 175, 255]));

        Ok(())
    }

    #[test]
    fn indexed_is_rejected_before_allocation() {
        let bytes = XcfBuilder::new(2, 2).color_mode(2).build();
        let (image, recorder) = decode_recorded(&bytes);

        assert!(matches!(image, Err(Error::UnsupportedColorMode(2))));
        assert_eq!(recorder.prepared, None);
    }

    #[test]
    fn large_canvases_are_rejected() -> eyre::Result<()> {
        let bytes = XcfBuilder::new(64, 8).build();
        let options = DecoderOptions::default().set_max_width(32);

        let mut decoder = XcfDecoder::new_with_options(Cursor::new(bytes), options)?;
        assert!(matches!(
            decoder.decode(),
            Err(Error::LargeDimensions {
                width: 64,
                max_width: 32,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn extra_tiles_are_corrupt() {
        let bytes = XcfBuilder::new(4, 4)
            .layer(LayerBuilder::solid("A", 4, 4, [0; 4]).extra_tile())
            .build();

        assert!(matches!(decode(&bytes), Err(Error::CorruptTile(_))));
    }

    #[test]
    fn truncated_tiles_are_reported() {
        let mut bytes = XcfBuilder::new(4, 4)
            .layer(LayerBuilder::solid("A", 4, 4, [1; 4]))
            .build();
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(decode(&bytes), Err(Error::TruncatedInput)));
    }

    #[test]
    fn behind_and_unknown_modes_work() -> eyre::Result<()> {
        let bytes = XcfBuilder::new(1, 1)
            .layer(LayerBuilder::solid("behind", 1, 1, [0, 255, 0, 255]).mode(2))
            .layer(LayerBuilder::solid("unknown", 1, 1, [1, 2, 3, 4]).mode(77))
            .layer(LayerBuilder::solid("bottom", 1, 1, [255, 0, 0, 255]))
            .build();

        assert_eq!(decode(&bytes)?.pixel(0, 0), Some([1, 2, 3, 4]));

        Ok(())
    }

    #[test]
    fn dissolve_follows_the_seed() -> eyre::Result<()> {
        let bytes = XcfBuilder::new(16, 16)
            .layer(LayerBuilder::solid("dust", 16, 16, [0, 0, 255, 128]).mode(1))
            .build();

        let render = |seed| -> Result<Image> {
            let options = DecoderOptions::default().set_dissolve_seed(seed);
            XcfDecoder::new_with_options(Cursor::new(bytes.as_slice()), options)?.decode()
        };

        let first = render(1)?;
        assert_eq!(first, render(1)?);
        assert_ne!(first, render(2)?);

        Ok(())
    }
}
