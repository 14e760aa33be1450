pub mod binreader;
#[cfg(feature = "png")]
pub mod image;
