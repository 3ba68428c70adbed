//! Length-prefixed message framing
//!
//! Each frame is a 4-byte big-endian payload length followed by the payload.

use crate::protocol;
use crate::{FdscopeError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Write};

/// Largest accepted payload; uploads and reports stay far below this
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Size of the length prefix
pub const HEADER_LEN: usize = 4;

/// Payload length announced by a header
pub fn payload_len(header: [u8; HEADER_LEN]) -> Result<usize> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FdscopeError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }
    Ok(len)
}

/// Header for a payload of `len` bytes
pub fn header_for(len: usize) -> Result<[u8; HEADER_LEN]> {
    if len > MAX_FRAME_LEN {
        return Err(FdscopeError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| FdscopeError::Protocol(format!("frame length {len} out of range")))
}

/// Encode `msg` and write it as one frame
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let payload = protocol::encode(msg)?;
    writer.write_all(&header_for(payload.len())?)?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and decode it. `None` means the peer closed the stream
/// cleanly between frames.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut payload = vec![0u8; payload_len(header)?];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FdscopeError::Protocol("stream ended inside a frame".into())
        } else {
            e.into()
        }
    })?;

    protocol::decode(&payload).map(Some)
}
