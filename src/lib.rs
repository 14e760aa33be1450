//! A decoder for GIMP's native `.xcf` files.
//!
//! Files are flattened into a single 8bpc RGBA [`Image`]: every visible layer
//! is blended onto the ones below it, honoring layer masks, opacity, offsets
//! and the classic GIMP layer modes.
//!
//! Use [`XcfDecoder`] when the whole file is at hand (anything [`Read`] +
//! [`Seek`]), and [`Loader`] when bytes trickle in. The loader also accepts
//! `bzip2` and `gzip` wrapped files (`.xcf.bz2`, `.xcf.gz`).
//!
//! [`Read`]: std::io::Read
//! [`Seek`]: std::io::Seek
#![warn(rust_2018_idioms, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions
)]

pub mod compose;
mod error;
pub(crate) mod internals;
pub mod loader;
pub mod models;
pub mod options;
pub mod tile;
pub mod xcf;

pub use compose::BlendingMode;
pub use error::{Error, Result};
pub use loader::Loader;
pub use models::{Canvas, ColorMode, Compression, Directory, Image, Layer, Mask, PixelKind, Version};
pub use options::DecoderOptions;
pub use tile::Rect;
pub use xcf::{DecodeObserver, XcfDecoder};

#[cfg(feature = "png")]
pub use internals::image::PngImage;
