/// A flattened image.
///
/// Pixels are 8bpc RGBA with straight alpha, row-major from the top-left
/// corner, with no padding between rows.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// The RGBA value at `(x, y)`, or [`None`] if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let at = y as usize * self.stride() + x as usize * 4;
        self.pixels[at..at + 4].try_into().ok()
    }

    /// Saves the image as a png file.
    #[cfg(feature = "png")]
    pub fn save_png<P>(&self, path: P) -> std::io::Result<()>
    where
        P: AsRef<std::path::Path>,
    {
        crate::internals::image::PngImage::from(self).save(path)
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &format_args!("[{} bytes]", self.pixels.len()))
            .finish()
    }
}
