//! Recorder error types

use thiserror::Error;

use crate::fsm::FsmError;
use crate::log::LogError;

/// Failures surfaced to the storage engine through the hook surface.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The engine referenced a path the FSM does not track.
    #[error("untracked path: {0}")]
    UntrackedPath(String),

    /// The engine passed a path outside the recorded directory, or one
    /// that is not valid UTF-8.
    #[error("path not under recorded root: {0}")]
    PathOutsideRoot(String),

    /// The Recorder's own op failed its FSM gate; the local optimistic
    /// state no longer matches the chain this Recorder believed it owned.
    #[error("recorder desequenced at seq {seq_no}: {detail}")]
    Desequenced { seq_no: u64, detail: String },

    #[error(transparent)]
    Fsm(#[from] FsmError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Result type for Recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;
