// Newline-delimited framing.
//
// Each message is one line terminated by `\n` (a preceding `\r` is
// tolerated on read). Reads are bounded by `MAX_LINE_LEN` so a peer that
// never sends a newline cannot make us buffer without limit. Invalid UTF-8
// is replaced rather than rejected; the decoder will simply not recognise
// such a line.

use std::io::{self, BufRead, Read, Write};

use crate::message::ProtocolMessage;

/// Longest accepted line, excluding the newline. Minigame snapshots are the
/// largest payloads and stay well under 1 KiB.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Read one line. Returns `Ok(None)` on a clean end of stream, and
/// `InvalidData` if the line exceeds `MAX_LINE_LEN`. A final line without a
/// newline is still returned.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let limit = MAX_LINE_LEN as u64 + 1;
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line too long (max {MAX_LINE_LEN} bytes)"),
        ));
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write `line` followed by a newline, then flush.
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    if line.contains(['\n', '\r']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "line contains a line break",
        ));
    }
    if line.len() > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("line too long: {} bytes (max {MAX_LINE_LEN})", line.len()),
        ));
    }
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

pub fn write_message<W: Write>(writer: &mut W, message: &ProtocolMessage) -> io::Result<()> {
    write_line(writer, &message.encode())
}
