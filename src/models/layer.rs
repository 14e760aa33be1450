use crate::compose::BlendingMode;

/// How the pixels of a layer are laid out on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelKind {
    Rgb,
    Rgba,
    Gray,
    GrayAlpha,
    Indexed,
    IndexedAlpha,
}

impl PixelKind {
    pub(crate) fn new(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Rgb,
            1 => Self::Rgba,
            2 => Self::Gray,
            3 => Self::GrayAlpha,
            4 => Self::Indexed,
            5 => Self::IndexedAlpha,
            _ => return None,
        })
    }

    /// Number of bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
            Self::Gray | Self::Indexed => 1,
            Self::GrayAlpha | Self::IndexedAlpha => 2,
        }
    }
}

/// A layer mask: an extra gray channel that scales the alpha of its layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    /// Ranges from `0..=255`.
    pub opacity: u8,
    pub visible: bool,
    /// Offset of the level record holding the tile pointer list.
    pub(crate) tiles: u32,
}

/// A layer that takes part in the final composition.
///
/// Invisible layers and floating selections are dropped while walking the
/// file, so they never show up here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub kind: PixelKind,
    /// Determines how the layer is blended with the layers below it.
    pub blending: BlendingMode,
    /// Uniform opacity, ranges from `0..=255`.
    pub opacity: u8,
    pub visible: bool,
    pub apply_mask: bool,
    /// Position of the top-left corner of the layer on the canvas. Can be
    /// negative, layers are allowed to hang off the canvas.
    pub x: i32,
    pub y: i32,
    /// Offset of the level record holding the tile pointer list.
    pub(crate) tiles: u32,
    pub mask: Option<Mask>,
}

impl Layer {
    pub(crate) fn new(name: String, width: u32, height: u32, kind: PixelKind) -> Self {
        Self {
            name,
            width,
            height,
            kind,
            blending: BlendingMode::Normal,
            opacity: u8::MAX,
            visible: true,
            apply_mask: false,
            x: 0,
            y: 0,
            tiles: 0,
            mask: None,
        }
    }
}
