//! Length-prefixed, checksum-protected frame envelope
//!
//! Layout:
//! - Frame Length (u32 LE) — total frame length including this field
//!   and the trailing checksum
//! - Operation body (variable, see `RecordedOp::encode_body`)
//! - Checksum (u32 LE) — CRC32 over length field + body
//!
//! Decoding distinguishes "incomplete" (more log bytes needed, `Ok(None)`)
//! from "corrupt" (`Err`), because a tailing reader routinely sees the
//! former and must treat only the latter as fatal.

use super::checksum::compute_checksum;
use super::errors::{FrameError, FrameResult};
use super::op::RecordedOp;

/// Bytes of envelope surrounding an operation body.
pub const FRAME_OVERHEAD: usize = 8; // u32 length + u32 checksum

/// Upper bound on a single frame. Operation bodies are small (paths and
/// property strings); anything beyond this is corruption, not data.
pub const MAX_FRAME_LEN: u32 = 1 << 20;

const MIN_FRAME_LEN: u32 = (FRAME_OVERHEAD + 17) as u32; // envelope + fixed op header

/// Encodes an operation into a complete frame.
pub fn encode_frame(op: &RecordedOp) -> FrameResult<Vec<u8>> {
    let body = op.encode_body();
    let frame_len = FRAME_OVERHEAD + body.len();
    if frame_len > MAX_FRAME_LEN as usize {
        return Err(FrameError::LengthOverflow(frame_len));
    }

    let mut frame = Vec::with_capacity(frame_len);
    frame.extend_from_slice(&(frame_len as u32).to_le_bytes());
    frame.extend_from_slice(&body);

    let checksum = compute_checksum(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());

    Ok(frame)
}

/// Attempts to decode one frame from the head of `data`.
///
/// Returns `Ok(None)` if `data` holds only a prefix of a frame, or
/// `Ok(Some((op, frame_len)))` where `frame_len` bytes were consumed.
/// Checksum validation happens before the body is parsed.
pub fn decode_frame(data: &[u8]) -> FrameResult<Option<(RecordedOp, usize)>> {
    if data.len() < 4 {
        return Ok(None);
    }

    let frame_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if frame_len < MIN_FRAME_LEN || frame_len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(frame_len));
    }
    let frame_len = frame_len as usize;

    if data.len() < frame_len {
        return Ok(None);
    }

    let checksum_offset = frame_len - 4;
    let stored = u32::from_le_bytes([
        data[checksum_offset],
        data[checksum_offset + 1],
        data[checksum_offset + 2],
        data[checksum_offset + 3],
    ]);
    let computed = compute_checksum(&data[..checksum_offset]);
    if computed != stored {
        return Err(FrameError::ChecksumMismatch { computed, stored });
    }

    let op = RecordedOp::decode_body(&data[4..checksum_offset])?;
    Ok(Some((op, frame_len)))
}
