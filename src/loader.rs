//! Push based ingestion: bytes arrive in arbitrary chunks, and the image is
//! decoded once, when the caller says the input is over.
//!
//! ```text
//! Sniffing ── magic ok ──> Streaming ── finish ──> Complete
//!     │                        │            │
//!     └──── bad magic ─────────┴── error ───┴──────> Failed
//! ```
//!
//! Plain files are buffered as they come. `bzip2` and `gzip` wrapped files are
//! inflated on the fly, so the buffer only ever holds the plain file.

use crate::{
    models::{canvas::XCF_SIGNATURE, Directory, Image},
    options::DecoderOptions,
    xcf::{DecodeObserver, XcfDecoder},
    Error, Result,
};
use bzip2::{Decompress, Status};
use flate2::write::GzDecoder;
use log::{debug, trace, warn};
use std::{
    io::{self, Cursor, Read, Seek, SeekFrom, Write},
    mem,
};

const BZIP2_MAGIC: &[u8] = b"BZh";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Output reserved per bzip2 decompression round.
const BZIP2_CHUNK: usize = 64 * 1024;

/// A bzip2 decompressor fed through the raw state machine.
///
/// Can be dropped anywhere in the stream; only [`Bunzip::finish`] insists on
/// seeing the end of it.
struct Bunzip {
    inner: Decompress,
    out: Vec<u8>,
    done: bool,
}

impl Bunzip {
    fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            out: Vec::new(),
            done: false,
        }
    }

    /// Returns how many bytes of `input` were consumed; fewer than given only
    /// once the stream ended.
    fn write(&mut self, input: &[u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }

        let start = self.inner.total_in();
        loop {
            let consumed = (self.inner.total_in() - start) as usize;
            let before = (self.inner.total_in(), self.out.len());

            self.out.reserve(BZIP2_CHUNK);
            let status = self
                .inner
                .decompress_vec(&input[consumed..], &mut self.out)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

            if matches!(status, Status::StreamEnd) {
                self.done = true;
                break;
            }

            let consumed = (self.inner.total_in() - start) as usize;
            if before == (self.inner.total_in(), self.out.len()) {
                if consumed < input.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "bzip2 stream stopped making progress",
                    ));
                }
                break;
            }

            // a full output buffer may leave inflated bytes behind.
            if consumed == input.len() && self.out.len() < self.out.capacity() {
                break;
            }
        }

        Ok((self.inner.total_in() - start) as usize)
    }

    fn finish(&self) -> io::Result<()> {
        if self.done {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "bzip2 stream ended before its trailer",
            ))
        }
    }
}

/// An inflating byte filter, writing into a growable buffer.
enum Filter {
    Bzip2(Bunzip),
    Gzip(GzDecoder<Vec<u8>>),
}

impl Filter {
    /// Feeds compressed bytes; `Ok(0)` means the stream already ended.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Bzip2(inner) => inner.write(buf),
            Self::Gzip(inner) => inner.write(buf),
        }
    }

    /// Makes every byte inflated so far visible in [`Filter::output`].
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Bzip2(_) => Ok(()),
            Self::Gzip(inner) => inner.flush(),
        }
    }

    /// No more input is coming; fails if the stream is incomplete.
    fn finish(&mut self) -> io::Result<()> {
        match self {
            Self::Bzip2(inner) => inner.finish(),
            Self::Gzip(inner) => inner.try_finish(),
        }
    }

    fn output(&mut self) -> &mut Vec<u8> {
        match self {
            Self::Bzip2(inner) => &mut inner.out,
            Self::Gzip(inner) => inner.get_mut(),
        }
    }
}

enum Stream {
    Plain,
    Filtered(Filter),
    /// The compressed stream ended, everything else is ignored.
    Drained,
}

impl Stream {
    /// Picks a stream from the first bytes of the input.
    fn sniff(head: &[u8]) -> Result<Self> {
        if head.starts_with(XCF_SIGNATURE) {
            debug!("plain xcf input");
            Ok(Self::Plain)
        } else if head.starts_with(BZIP2_MAGIC) {
            debug!("bzip2 compressed input");
            Ok(Self::Filtered(Filter::Bzip2(Bunzip::new())))
        } else if head.starts_with(GZIP_MAGIC) {
            debug!("gzip compressed input");
            Ok(Self::Filtered(Filter::Gzip(GzDecoder::new(Vec::new()))))
        } else if XCF_SIGNATURE.starts_with(head) {
            Err(Error::TruncatedInput)
        } else {
            Err(Error::BadMagic)
        }
    }

    fn feed<W>(&mut self, sink: &mut W, chunk: &[u8]) -> Result<()>
    where
        W: Write,
    {
        let filter = match self {
            Self::Plain => return sink.write_all(chunk).map_err(Error::IngestionIo),
            Self::Drained => {
                if !chunk.is_empty() {
                    warn!("ignoring {} bytes past the end of the compressed stream", chunk.len());
                }
                return Ok(());
            }
            Self::Filtered(filter) => filter,
        };

        let mut rest = chunk;
        while !rest.is_empty() {
            match filter.write(rest).map_err(Error::DecompressionFailure)? {
                0 => break,
                n => rest = &rest[n..],
            }
        }

        filter.flush().map_err(Error::DecompressionFailure)?;
        drain(filter, sink)?;

        if !rest.is_empty() {
            filter.finish().map_err(Error::DecompressionFailure)?;
            drain(filter, sink)?;

            warn!("ignoring {} bytes past the end of the compressed stream", rest.len());
            *self = Self::Drained;
        }

        Ok(())
    }

    fn finish<W>(self, sink: &mut W) -> Result<()>
    where
        W: Write,
    {
        if let Self::Filtered(mut filter) = self {
            filter.finish().map_err(Error::DecompressionFailure)?;
            drain(&mut filter, sink)?;
        }

        Ok(())
    }
}

/// Moves whatever the filter produced into `sink`.
fn drain<W>(filter: &mut Filter, sink: &mut W) -> Result<()>
where
    W: Write,
{
    let out = filter.output();
    if !out.is_empty() {
        trace!("inflated {} bytes", out.len());
        sink.write_all(out).map_err(Error::IngestionIo)?;
        out.clear();
    }

    Ok(())
}

enum State {
    /// Not enough bytes yet to tell what the input is.
    Sniffing(Vec<u8>),
    Streaming(Stream),
    Complete,
    Failed,
}

/// Decodes a xcf file handed over chunk by chunk.
///
/// ```
/// use xcfire::{Error, Loader};
///
/// let mut loader = Loader::new();
/// assert!(matches!(loader.push(b"definitely not xcf"), Err(Error::BadMagic)));
/// // failures are final.
/// assert!(matches!(loader.push(b"gimp xcf v001"), Err(Error::Terminated)));
/// ```
pub struct Loader<W = Cursor<Vec<u8>>>
where
    W: Read + Write + Seek,
{
    state: State,
    sink: Option<W>,
    options: DecoderOptions,
}

impl Loader {
    /// A loader buffering in memory.
    pub fn new() -> Self {
        Self::with_sink(Cursor::new(Vec::new()))
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Loader<W>
where
    W: Read + Write + Seek,
{
    /// A loader buffering into `sink`, e.g. a temporary file.
    pub fn with_sink(sink: W) -> Self {
        Self {
            state: State::Sniffing(Vec::with_capacity(XCF_SIGNATURE.len())),
            sink: Some(sink),
            options: DecoderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DecoderOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the loader finished, successfully or not.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Complete | State::Failed)
    }

    /// Hands over the next chunk of the file.
    ///
    /// # Errors
    ///
    /// - [`Error::BadMagic`] if the input is neither xcf nor a compressed xcf.
    /// - [`Error::DecompressionFailure`] if the compressed stream is invalid.
    /// - [`Error::IngestionIo`] if the sink can't be written.
    /// - [`Error::Terminated`] once the loader failed or finished.
    ///
    /// Any of them leaves the loader terminated.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.is_terminated() {
            return Err(Error::Terminated);
        }

        let res = self.push_inner(chunk);
        if res.is_err() {
            self.fail();
        }

        res
    }

    fn push_inner(&mut self, chunk: &[u8]) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::Terminated)?;

        match &mut self.state {
            State::Sniffing(head) => {
                head.extend_from_slice(chunk);
                if head.len() < XCF_SIGNATURE.len() {
                    return Ok(());
                }

                let head = mem::take(head);
                let mut stream = Stream::sniff(&head)?;
                stream.feed(sink, &head)?;

                self.state = State::Streaming(stream);
                Ok(())
            }
            State::Streaming(stream) => stream.feed(sink, chunk),
            State::Complete | State::Failed => Err(Error::Terminated),
        }
    }

    /// Signals the end of the input and decodes the image.
    ///
    /// The buffered file is dropped afterwards, whatever the outcome.
    pub fn finish(&mut self) -> Result<Image> {
        self.finish_with(&mut ())
    }

    /// Same as [`Loader::finish`], reporting progress to `observer`.
    pub fn finish_with<O>(&mut self, observer: &mut O) -> Result<Image>
    where
        O: DecodeObserver + ?Sized,
    {
        self.terminate(|decoder, options| decoder.decode_with(&mut options.rng(), observer))
    }

    /// Signals the end of the input, but only walks the file structure.
    pub fn finish_headers(&mut self) -> Result<Directory> {
        self.terminate(|decoder, _| decoder.decode_headers().cloned())
    }

    fn terminate<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut XcfDecoder<W>, DecoderOptions) -> Result<T>,
    {
        if self.is_terminated() {
            return Err(Error::Terminated);
        }

        let options = self.options;
        let res = self.decoder().and_then(|mut decoder| f(&mut decoder, options));
        match res {
            Ok(_) => {
                self.state = State::Complete;
                self.sink = None;
            }
            Err(_) => self.fail(),
        }

        res
    }

    /// Flushes the stream into the sink and rewinds it for decoding.
    fn decoder(&mut self) -> Result<XcfDecoder<W>> {
        let mut sink = self.sink.take().ok_or(Error::Terminated)?;

        let stream = match mem::replace(&mut self.state, State::Failed) {
            State::Sniffing(head) => {
                // a file shorter than the signature, either truncated or bogus.
                return Err(match Stream::sniff(&head) {
                    Err(err) => err,
                    Ok(_) => Error::TruncatedInput,
                });
            }
            State::Streaming(stream) => stream,
            State::Complete | State::Failed => return Err(Error::Terminated),
        };

        stream.finish(&mut sink)?;
        sink.flush().map_err(Error::IngestionIo)?;
        sink.seek(SeekFrom::Start(0)).map_err(Error::IngestionIo)?;

        XcfDecoder::new_with_options(sink, self.options)
    }

    fn fail(&mut self) {
        self.state = State::Failed;
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::tests::{LayerBuilder, XcfBuilder};
    use lazy_static::lazy_static;

    lazy_static! {
        static ref PLAIN: Vec<u8> = XcfBuilder::new(70, 3)
            .rle()
            .layer(LayerBuilder::solid("top", 70, 3, [0, 0, 255, 128]))
            .layer(LayerBuilder::solid("bottom", 70, 3, [255, 0, 0, 255]))
            .build();
        static ref BZIP2: Vec<u8> = {
            let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
            encoder.write_all(&PLAIN).unwrap();
            encoder.finish().unwrap()
        };
        static ref GZIP: Vec<u8> = {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::best());
            encoder.write_all(&PLAIN).unwrap();
            encoder.finish().unwrap()
        };
    }

    fn load(bytes: &[u8], chunk_size: usize) -> Result<Image> {
        let mut loader = Loader::new();
        for chunk in bytes.chunks(chunk_size) {
            loader.push(chunk)?;
        }
        loader.finish()
    }

    fn check(image: &Image) {
        assert_eq!((image.width, image.height), (70, 3));
        assert!(image
            .pixels
            .chunks_exact(4)
            .all(|px| px == [127, 0, 128, 255]));
    }

    #[test]
    fn plain_input_works() -> eyre::Result<()> {
        check(&load(&PLAIN, 4096)?);
        Ok(())
    }

    #[test]
    fn byte_by_byte_input_works() -> eyre::Result<()> {
        check(&load(&PLAIN, 1)?);
        check(&load(&BZIP2, 1)?);
        check(&load(&GZIP, 1)?);
        Ok(())
    }

    #[test]
    fn bzip2_input_works() -> eyre::Result<()> {
        check(&load(&BZIP2, 100)?);
        Ok(())
    }

    #[test]
    fn gzip_input_works() -> eyre::Result<()> {
        check(&load(&GZIP, 7)?);
        Ok(())
    }

    #[test]
    fn trailing_bytes_are_ignored() -> eyre::Result<()> {
        let mut bytes = BZIP2.clone();
        bytes.extend(b"some trailing garbage");

        check(&load(&bytes, 64)?);
        Ok(())
    }

    #[test]
    fn bad_magic_is_terminal() {
        let mut loader = Loader::new();

        assert!(matches!(loader.push(b"PK\x03\x04 not a xcf"), Err(Error::BadMagic)));
        assert!(loader.is_terminated());
        assert!(matches!(loader.push(&PLAIN), Err(Error::Terminated)));
        assert!(matches!(loader.finish(), Err(Error::Terminated)));
    }

    #[test]
    fn short_input_is_sniffed_at_finish() {
        let mut loader = Loader::new();
        loader.push(b"gimp").unwrap();
        assert!(matches!(loader.finish(), Err(Error::TruncatedInput)));

        let mut loader = Loader::new();
        loader.push(b"nope").unwrap();
        assert!(matches!(loader.finish(), Err(Error::BadMagic)));
    }

    #[test]
    fn corrupt_streams_fail() {
        let mut bytes = b"BZh9".to_vec();
        bytes.extend([0xFF; 64]);

        let mut loader = Loader::new();
        let res = loader.push(&bytes).and_then(|()| loader.finish().map(drop));
        assert!(matches!(res, Err(Error::DecompressionFailure(_))));
        assert!(loader.is_terminated());
    }

    #[test]
    fn truncated_bzip2_fails() {
        let bytes = &BZIP2[..BZIP2.len() / 2];
        assert!(matches!(load(bytes, 512), Err(Error::DecompressionFailure(_))));

        // missing only the end of stream marker.
        let bytes = &BZIP2[..BZIP2.len() - 4];
        assert!(matches!(load(bytes, 512), Err(Error::DecompressionFailure(_))));
    }

    #[test]
    fn abandoned_bzip2_loader_drops() -> eyre::Result<()> {
        let mut loader = Loader::new();
        loader.push(&BZIP2[..BZIP2.len() / 2])?;
        assert!(!loader.is_terminated());

        drop(loader);
        Ok(())
    }

    #[test]
    fn truncated_gzip_fails() {
        let bytes = &GZIP[..GZIP.len() / 2];
        assert!(matches!(load(bytes, 512), Err(Error::DecompressionFailure(_))));
    }

    #[test]
    fn finishing_twice_is_terminated() -> eyre::Result<()> {
        let mut loader = Loader::new();
        loader.push(&PLAIN)?;

        check(&loader.finish()?);
        assert!(matches!(loader.finish(), Err(Error::Terminated)));
        assert!(matches!(loader.push(&PLAIN), Err(Error::Terminated)));

        Ok(())
    }

    #[test]
    fn headers_can_be_read_alone() -> eyre::Result<()> {
        let mut loader = Loader::new();
        loader.push(&GZIP)?;

        let directory = loader.finish_headers()?;
        assert_eq!((directory.canvas.width, directory.canvas.height), (70, 3));
        assert_eq!(directory.layers.len(), 2);
        assert!(loader.is_terminated());

        Ok(())
    }

    #[test]
    fn decode_errors_are_terminal() {
        let mut bytes = PLAIN.clone();
        bytes.truncate(bytes.len() - 1);

        let mut loader = Loader::new();
        loader.push(&bytes).unwrap();

        assert!(matches!(loader.finish(), Err(Error::TruncatedInput)));
        assert!(matches!(loader.push(&[0]), Err(Error::Terminated)));
    }
}
