//! Log-service transport errors
//!
//! Transport failures are surfaced to the caller of `play` or of the
//! recording operation that hit them; retry policy belongs to the caller,
//! never to this crate.

use thiserror::Error;

/// Errors surfaced by a log-service client.
///
/// `Clone` because an append's failure is observed both by the submitting
/// call and by anyone waiting on its [`AppendHandle`].
///
/// [`AppendHandle`]: super::AppendHandle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("no such log: {0}")]
    NoSuchLog(String),

    #[error("append to {log} failed: {reason}")]
    AppendFailed { log: String, reason: String },

    #[error("read from {log} at offset {offset} failed: {reason}")]
    ReadFailed { log: String, offset: u64, reason: String },

    #[error("offset {offset} is beyond the log head {head}")]
    OffsetOutOfRange { offset: u64, head: u64 },
}

/// Result type for log-service operations.
pub type LogResult<T> = Result<T, LogError>;
