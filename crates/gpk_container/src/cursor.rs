//! Cursor helpers for nested, offset-addressed reads and writes.

use std::io::{Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Runs `body` with `stream` positioned at `pos`, then restores the previous position
///
/// The position is restored on every exit path, including when `body` fails.
pub fn scoped_seek<S, T, F>(stream: &mut S, pos: u64, body: F) -> Result<T>
where
    S: Seek,
    F: FnOnce(&mut S) -> Result<T>,
{
    let saved = stream.stream_position()?;
    stream.seek(SeekFrom::Start(pos))?;

    let result = body(stream);
    let restored = stream.seek(SeekFrom::Start(saved));

    let value = result?;
    restored?;
    Ok(value)
}

/// Number of bytes between the current position and the end of `stream`
pub fn remaining<S: Seek>(stream: &mut S) -> Result<u64> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}

/// Checks a count read from a file against the bytes left in `stream`
///
/// Returns `count` when `count` items of `size` bytes can still be read.
pub fn bounded_count<S: Seek>(stream: &mut S, count: u32, size: u32) -> Result<usize> {
    let needed = u64::from(count) * u64::from(size);
    let available = remaining(stream)?;
    if needed > available {
        return Err(Error::InvalidRecord(format!(
            "{count} items of {size} bytes need {needed} bytes, only {available} remain"
        )));
    }
    Ok(count as usize)
}

/// Writes zeros until the stream position is a multiple of `alignment`
pub fn pad_to<W: Write + Seek>(writer: &mut W, alignment: u64) -> Result<u64> {
    let pos = writer.stream_position()?;
    let padding = (alignment - pos % alignment) % alignment;
    writer.write_all(&vec![0u8; padding as usize])?;
    Ok(pos + padding)
}
