//! Frame decode errors
//!
//! Any of these, surfaced while a Player is reading the log, is a
//! protocol error: fatal to the current play, never silently skipped.

use thiserror::Error;

/// Errors produced while encoding or decoding recovery-log frames.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    #[error("frame length {0} exceeds maximum")]
    LengthOverflow(usize),

    #[error("invalid frame length {0}")]
    InvalidLength(u32),

    #[error("frame checksum mismatch: computed {computed:08x}, stored {stored:08x}")]
    ChecksumMismatch { computed: u32, stored: u32 },

    #[error("unknown operation tag {0}")]
    UnknownTag(u8),

    #[error("operation body truncated: need {need} bytes, have {have}")]
    BodyTruncated { need: usize, have: usize },

    #[error("invalid UTF-8 in {0} field")]
    InvalidUtf8(&'static str),
}

/// Result type for frame operations.
pub type FrameResult<T> = Result<T, FrameError>;
