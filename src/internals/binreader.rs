use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

macro_rules! read_int {
    ($fn:ident, $Ty:ty) => {
        /// Reads a big-endian
        #[doc = concat!("`", stringify!($Ty), "`.")]
        #[inline]
        pub fn $fn(&mut self) -> Result<$Ty> {
            self.read_array().map(<$Ty>::from_be_bytes)
        }
    };
}

/// Sequential and random access over a seekable xcf byte source.
///
/// Every multi-byte integer in a xcf file is big-endian, the conversion happens
/// here and nowhere else.
///
/// Pointers inside the file are absolute offsets, so following one means
/// leaving the current record. [`BinReader::descend`] (or the lower level
/// [`push_mark`]/[`pop_mark`] pair) makes sure the position is put back right
/// after the pointer that was read, so sibling records can still be enumerated.
///
/// [`push_mark`]: BinReader::push_mark
/// [`pop_mark`]: BinReader::pop_mark
pub struct BinReader<R>
where
    R: Read + Seek,
{
    inner: R,
    pos: u64,
    len: u64,
    marks: Vec<u64>,
}

impl<R> BinReader<R>
where
    R: Read + Seek,
{
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        Ok(Self {
            inner,
            pos: 0,
            len,
            marks: Vec::new(),
        })
    }

    /// Current absolute position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Total length of the source.
    #[inline]
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    /// Bytes left between the current position and the end of the source.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Moves to the absolute position `pos`.
    ///
    /// Seeking *to* the end is fine, seeking past it is [`Error::TruncatedInput`].
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(Error::TruncatedInput);
        }

        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;

        Ok(())
    }

    pub fn skip(&mut self, amt: u64) -> Result<()> {
        let pos = self.pos.checked_add(amt).ok_or(Error::TruncatedInput)?;
        self.seek(pos)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if (buf.len() as u64) > self.remaining() {
            return Err(Error::TruncatedInput);
        }

        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;

        Ok(())
    }

    pub fn read_bytes(&mut self, amt: usize) -> Result<Vec<u8>> {
        if (amt as u64) > self.remaining() {
            return Err(Error::TruncatedInput);
        }

        let mut buf = vec![0; amt];
        self.read_exact(&mut buf)?;

        Ok(buf)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    read_int! {  read_u8,  u8 }
    read_int! { read_u16, u16 }
    read_int! { read_u32, u32 }
    read_int! { read_i32, i32 }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u32()? != 0)
    }

    /// Reads a length-prefixed string (the length includes the trailing NUL).
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        let bytes = bytes.split(|&c| c == 0).next().unwrap_or_default();

        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Skips a length-prefixed string without decoding it.
    pub fn skip_string(&mut self) -> Result<()> {
        let len = self.read_u32()?;
        self.skip(len.into())
    }

    /// Remembers the current position.
    #[inline]
    pub fn push_mark(&mut self) {
        self.marks.push(self.pos);
    }

    /// Goes back to the last remembered position.
    ///
    /// # Panics
    ///
    /// - If there is no matching [`BinReader::push_mark`] call.
    pub fn pop_mark(&mut self) -> Result<()> {
        let pos = self.marks.pop().expect("pop_mark without push_mark");
        self.seek(pos)
    }

    /// Follows the pointer `ptr`, runs `f` there, and comes back.
    ///
    /// The position is restored even when `f` fails, though the error from `f`
    /// is the one that gets returned.
    pub fn descend<T, F>(&mut self, ptr: u32, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.push_mark();

        let res = self.seek(ptr.into()).and_then(|()| f(self));
        let restored = self.pop_mark();

        let value = res?;
        restored.map(|()| value)
    }
}
