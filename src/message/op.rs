//! Recorded operation types
//!
//! A `RecordedOp` describes exactly one filesystem mutation observed from
//! a live storage engine, plus the sequencing metadata every replica needs
//! to replay it deterministically:
//!
//! - `seq_no`: global monotonic operation id (starts at 1, never repeats,
//!   shared across all authors of one log)
//! - `checksum`: the chain value the FSM expects when this op applies;
//!   chains this op to the previously applied one
//! - `author`: random token identifying the writer process that produced
//!   this op, used to resolve split-brain races after the fact
//!
//! A `Write` op carries only the byte-range description; the payload bytes
//! follow the op's frame verbatim in the log stream.

use std::io::{self, Cursor, Read};

use serde::{Deserialize, Serialize};

use super::errors::{FrameError, FrameResult};

/// A logical file identity, keyed by the sequence number of its `Create`.
///
/// Distinct from a filesystem path: paths are retargetable aliases, the
/// Fnode is the unit of content identity and survives renames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Fnode(pub u64);

impl std::fmt::Display for Fnode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Random per-process token identifying which writer produced an op.
///
/// Generated once per Recorder instance. Never zero, so hinted segments
/// can always distinguish "no author" from a real one in diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Author(pub u32);

impl Author {
    /// Generates a fresh random author token.
    pub fn random() -> Self {
        loop {
            let token: u32 = rand::random();
            if token != 0 {
                return Author(token);
            }
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Operation payload tags on the wire.
const TAG_CREATE: u8 = 0;
const TAG_LINK: u8 = 1;
const TAG_UNLINK: u8 = 2;
const TAG_WRITE: u8 = 3;
const TAG_PROPERTY: u8 = 4;

/// The filesystem mutation an op describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpPayload {
    /// A new file. The created Fnode's id is the op's own `seq_no`;
    /// `path` becomes its initial link.
    Create { path: String },
    /// An additional path alias for an existing Fnode.
    Link { fnode: Fnode, path: String },
    /// Removal of one path alias. Unlinking the last path releases the
    /// Fnode from the local filesystem; its history remains in the log.
    Unlink { fnode: Fnode, path: String },
    /// A byte range written at `offset`. The `length` payload bytes
    /// follow this op's frame directly in the log stream.
    Write { fnode: Fnode, offset: u64, length: u64 },
    /// Small engine-level metadata replicated verbatim (identity markers
    /// and the like). Last writer in log order wins.
    Property { key: String, value: String },
}

/// One recovery-log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOp {
    /// Global monotonic operation id.
    pub seq_no: u64,
    /// Chain value expected by the FSM when this op applies.
    pub checksum: u32,
    /// The writer that produced this op.
    pub author: Author,
    /// The mutation itself.
    pub payload: OpPayload,
}

impl RecordedOp {
    /// Serializes the operation body (everything inside the frame).
    ///
    /// Format, all little-endian:
    /// - seq_no (u64)
    /// - checksum (u32)
    /// - author (u32)
    /// - payload tag (u8)
    /// - payload fields (strings are u32-length-prefixed UTF-8)
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&self.seq_no.to_le_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.author.0.to_le_bytes());

        match &self.payload {
            OpPayload::Create { path } => {
                buf.push(TAG_CREATE);
                write_string(&mut buf, path);
            }
            OpPayload::Link { fnode, path } => {
                buf.push(TAG_LINK);
                buf.extend_from_slice(&fnode.0.to_le_bytes());
                write_string(&mut buf, path);
            }
            OpPayload::Unlink { fnode, path } => {
                buf.push(TAG_UNLINK);
                buf.extend_from_slice(&fnode.0.to_le_bytes());
                write_string(&mut buf, path);
            }
            OpPayload::Write { fnode, offset, length } => {
                buf.push(TAG_WRITE);
                buf.extend_from_slice(&fnode.0.to_le_bytes());
                buf.extend_from_slice(&offset.to_le_bytes());
                buf.extend_from_slice(&length.to_le_bytes());
            }
            OpPayload::Property { key, value } => {
                buf.push(TAG_PROPERTY);
                write_string(&mut buf, key);
                write_string(&mut buf, value);
            }
        }

        buf
    }

    /// Deserializes an operation body produced by [`encode_body`].
    ///
    /// [`encode_body`]: RecordedOp::encode_body
    pub fn decode_body(data: &[u8]) -> FrameResult<Self> {
        let mut cursor = Cursor::new(data);

        let seq_no = read_u64(&mut cursor, data.len())?;
        let checksum = read_u32(&mut cursor, data.len())?;
        let author = Author(read_u32(&mut cursor, data.len())?);
        let tag = read_u8(&mut cursor, data.len())?;

        let payload = match tag {
            TAG_CREATE => OpPayload::Create {
                path: read_string(&mut cursor, data.len(), "path")?,
            },
            TAG_LINK => OpPayload::Link {
                fnode: Fnode(read_u64(&mut cursor, data.len())?),
                path: read_string(&mut cursor, data.len(), "path")?,
            },
            TAG_UNLINK => OpPayload::Unlink {
                fnode: Fnode(read_u64(&mut cursor, data.len())?),
                path: read_string(&mut cursor, data.len(), "path")?,
            },
            TAG_WRITE => OpPayload::Write {
                fnode: Fnode(read_u64(&mut cursor, data.len())?),
                offset: read_u64(&mut cursor, data.len())?,
                length: read_u64(&mut cursor, data.len())?,
            },
            TAG_PROPERTY => OpPayload::Property {
                key: read_string(&mut cursor, data.len(), "key")?,
                value: read_string(&mut cursor, data.len(), "value")?,
            },
            other => return Err(FrameError::UnknownTag(other)),
        };

        Ok(RecordedOp {
            seq_no,
            checksum,
            author,
            payload,
        })
    }

    /// Length of the content bytes that follow this op's frame in the
    /// log stream. Zero for everything but `Write`.
    pub fn content_length(&self) -> u64 {
        match &self.payload {
            OpPayload::Write { length, .. } => *length,
            _ => 0,
        }
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn truncated(e: io::Error, have: usize) -> FrameError {
    let _ = e;
    FrameError::BodyTruncated { need: have + 1, have }
}

fn read_u8(cursor: &mut Cursor<&[u8]>, have: usize) -> FrameResult<u8> {
    let mut b = [0u8; 1];
    cursor.read_exact(&mut b).map_err(|e| truncated(e, have))?;
    Ok(b[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>, have: usize) -> FrameResult<u32> {
    let mut b = [0u8; 4];
    cursor.read_exact(&mut b).map_err(|e| truncated(e, have))?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(cursor: &mut Cursor<&[u8]>, have: usize) -> FrameResult<u64> {
    let mut b = [0u8; 8];
    cursor.read_exact(&mut b).map_err(|e| truncated(e, have))?;
    Ok(u64::from_le_bytes(b))
}

fn read_string(
    cursor: &mut Cursor<&[u8]>,
    have: usize,
    field: &'static str,
) -> FrameResult<String> {
    let len = read_u32(cursor, have)? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|e| truncated(e, have))?;
    String::from_utf8(buf).map_err(|_| FrameError::InvalidUtf8(field))
}
