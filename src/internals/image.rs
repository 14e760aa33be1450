use crate::Image;
use png::{BitDepth, ColorType, Encoder};
use std::{
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

/// New type to write 8bpc RGBA images.
pub struct PngImage<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

impl<'a> From<&'a Image> for PngImage<'a> {
    fn from(image: &'a Image) -> Self {
        Self {
            width: image.width,
            height: image.height,
            pixels: &image.pixels,
        }
    }
}

impl PngImage<'_> {
    /// Encodes the pixels into `writer`.
    pub fn write<W>(&self, writer: W) -> io::Result<()>
    where
        W: Write,
    {
        let mut encoder = Encoder::new(writer, self.width, self.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);

        Ok(encoder.write_header()?.write_image_data(self.pixels)?)
    }

    /// Saves the pixels to the provided path.
    pub fn save<P>(&self, path: P) -> io::Result<()>
    where
        P: AsRef<Path>,
    {
        let file = fs::File::create(path)?;
        self.write(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_signature_is_written() -> eyre::Result<()> {
        let image = Image {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 0, 255, 128],
        };

        let mut out = Vec::new();
        PngImage::from(&image).write(&mut out)?;

        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(out.as_slice());
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut buf)?;

        assert_eq!(buf, image.pixels);

        Ok(())
    }
}
