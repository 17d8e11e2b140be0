//! FSM protocol errors
//!
//! These are the fatal outcomes of `Fsm::apply`. Skips (stale operations,
//! losing authors, sequence gaps from divergent branches) are not errors;
//! they are reported through `ApplyOutcome::Skipped` and replay continues.

use thiserror::Error;

use crate::message::{Author, Fnode};

/// Fatal inconsistencies detected while applying an operation that
/// passed the sequence gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsmError {
    /// The expected next operation from the current author carries a
    /// broken checksum chain: the log is truncated or corrupted.
    #[error(
        "checksum chain break at seq {seq_no} (author {author}): expected {expected:08x}, found {actual:08x}"
    )]
    ChecksumMismatch {
        seq_no: u64,
        author: Author,
        expected: u32,
        actual: u32,
    },

    #[error("operation at seq {seq_no} targets untracked fnode {fnode}")]
    FnodeUnknown { fnode: Fnode, seq_no: u64 },

    #[error("operation at seq {seq_no} links already-linked path {path:?}")]
    LinkExists { path: String, seq_no: u64 },

    #[error("operation at seq {seq_no} unlinks unknown path {path:?}")]
    NoSuchLink { path: String, seq_no: u64 },
}

/// Result type for FSM operations.
pub type FsmResult<T> = Result<T, FsmError>;
