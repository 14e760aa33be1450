use crate::{internals::binreader::BinReader, Error, Result};
use std::{
    cmp::Ordering,
    io::{Read, Seek},
};

/// Decodes one run-length encoded channel, filling the whole of `dst`.
///
/// Every run starts with an opcode byte:
///
/// | opcode       | meaning                                               |
/// |--------------|-------------------------------------------------------|
/// | `0..=126`    | repeat the next byte `opcode + 1` times               |
/// | `127`        | read a `u16` count, repeat the next byte `count` times |
/// | `128`        | read a `u16` count, copy `count` literal bytes        |
/// | `129..=255`  | copy `256 - opcode` literal bytes                     |
///
/// A channel must produce exactly `dst.len()` bytes; overshooting, or a run
/// that produces nothing, is [`Error::CorruptTile`].
pub(crate) fn decode_channel<R>(reader: &mut BinReader<R>, dst: &mut [u8]) -> Result<()>
where
    R: Read + Seek,
{
    let mut written = 0;

    while written < dst.len() {
        let op = reader.read_u8()?;

        let (len, literal) = match op.cmp(&127) {
            Ordering::Less => (usize::from(op) + 1, false),
            Ordering::Equal => (usize::from(reader.read_u16()?), false),
            Ordering::Greater if op == 128 => (usize::from(reader.read_u16()?), true),
            Ordering::Greater => (256 - usize::from(op), true),
        };

        if len == 0 {
            return Err(Error::CorruptTile("empty run"));
        }

        let Some(run) = dst.get_mut(written..written + len) else {
            return Err(Error::CorruptTile("run overflows the tile"));
        };

        if literal {
            reader.read_exact(run)?;
        } else {
            run.fill(reader.read_u8()?);
        }

        written += len;
    }

    Ok(())
}
