pub mod canvas;
pub mod directory;
pub mod image;
pub mod layer;
pub(crate) mod property;

pub use canvas::{Canvas, ColorMode, Compression, Version};
pub use directory::Directory;
pub use image::Image;
pub use layer::{Layer, Mask, PixelKind};
