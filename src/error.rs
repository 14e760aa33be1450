use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a decode.
///
/// All of them are fatal: a decode either yields a complete [`Image`] or one of
/// these, never a partially composited raster.
///
/// [`Image`]: crate::Image
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a xcf file; expected the 'gimp xcf ' signature")]
    BadMagic,
    #[error("unsupported xcf version tag {:?}", String::from_utf8_lossy(.0))]
    UnsupportedVersion([u8; 4]),
    #[error("unsupported color mode '{0}'; only rgb and grayscale canvases are supported")]
    UnsupportedColorMode(u32),
    #[error("unsupported tile compression '{0}'")]
    UnsupportedCompression(u8),
    #[error("canvas of {width}x{height} is bigger than the configured limit of {max_width}x{max_height}")]
    LargeDimensions {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("unexpected end of input")]
    TruncatedInput,
    #[error("corrupted property chain: {0}")]
    CorruptProperty(&'static str),
    #[error("corrupted tile data: {0}")]
    CorruptTile(&'static str),
    #[error("could not allocate a {width}x{height} raster")]
    AllocationFailure { width: u32, height: u32 },
    #[error("could not buffer incoming bytes: {0}")]
    IngestionIo(#[source] io::Error),
    #[error("compressed stream is invalid: {0}")]
    DecompressionFailure(#[source] io::Error),
    #[error("the loader already reached a terminal state")]
    Terminated,
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::TruncatedInput,
            _ => Self::Io(err),
        }
    }
}
