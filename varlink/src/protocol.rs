//! Message framing: every varlink message is a JSON object terminated by a single NUL byte.

use std::io::{BufRead, Write};

use serde::Serialize;

use crate::error::*;

/// Serializes `value`, appends the NUL terminator, writes it and flushes `writer`.
pub fn write_message<W: Write + ?Sized, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
) -> Result<()> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(0);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Reads the next message from `reader`, without its NUL terminator.
///
/// Fails with [`Error::ConnectionClosed`] if the stream ends before a
/// terminator was seen.
pub fn read_message<R: BufRead + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_until(0, &mut buf)?;

    if buf.pop() != Some(0) {
        return Err(Error::ConnectionClosed);
    }

    Ok(buf)
}
