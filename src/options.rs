use nanorand::WyRand;

/// Largest canvas side accepted by default.
const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Knobs for a decode.
///
/// ```
/// use xcfire::DecoderOptions;
///
/// let options = DecoderOptions::default()
///     .set_max_width(4096)
///     .set_dissolve_seed(7);
///
/// assert_eq!(options.max_width(), 4096);
/// assert_eq!(options.max_height(), 16384);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Canvases wider than this are rejected before anything is allocated.
    ///
    /// - Default value: 16384
    max_width: u32,
    /// Canvases taller than this are rejected before anything is allocated.
    ///
    /// - Default value: 16384
    max_height: u32,
    /// Seed of the generator picking which pixels survive in
    /// [`crate::BlendingMode::Dissolve`] layers.
    ///
    /// The same file decoded with the same seed renders the same pixels.
    ///
    /// - Default value: 0
    dissolve_seed: u64,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            dissolve_seed: 0,
        }
    }
}

impl DecoderOptions {
    pub const fn max_width(&self) -> u32 {
        self.max_width
    }

    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    pub const fn dissolve_seed(&self) -> u64 {
        self.dissolve_seed
    }

    #[must_use]
    pub fn set_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    #[must_use]
    pub fn set_max_height(mut self, height: u32) -> Self {
        self.max_height = height;
        self
    }

    #[must_use]
    pub fn set_dissolve_seed(mut self, seed: u64) -> Self {
        self.dissolve_seed = seed;
        self
    }

    /// A fresh generator seeded with [`DecoderOptions::dissolve_seed`].
    pub(crate) fn rng(&self) -> WyRand {
        WyRand::new_seed(self.dissolve_seed)
    }
}
