//! Player error types

use std::path::PathBuf;

use thiserror::Error;

use crate::fsm::FsmError;
use crate::log::LogError;
use crate::message::FrameError;

/// Failures of replay, materialization, and promotion.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Playback was cancelled. Deliberately distinct from every failure
    /// kind: callers branch on it to tear down quietly.
    #[error("playback cancelled")]
    Cancelled,

    /// A frame read from the log failed to decode or verify.
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Log(#[from] LogError),

    /// The sequence/checksum gate failed fatally while applying.
    #[error(transparent)]
    Fsm(#[from] FsmError),

    /// The log stream contradicts the hints it was resumed from.
    #[error("hints violation: {detail}")]
    HintsViolation { detail: String },

    /// An op carried a path that would escape the local directory.
    #[error("unsafe path in op: {0}")]
    UnsafePath(String),

    /// Local filesystem failure while materializing.
    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle method was called in a state that does not admit it.
    #[error("invalid player state: {detail}")]
    InvalidState { detail: String },

    /// Playback already failed; carried by `make_live` when the failure
    /// itself was returned from `play`.
    #[error("playback failed: {detail}")]
    Failed { detail: String },
}

impl PlayerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlayerError::Io {
            path: path.into(),
            source,
        }
    }

    /// True exactly for the cancellation sentinel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlayerError::Cancelled)
    }
}

/// Result type for Player operations.
pub type PlayerResult<T> = Result<T, PlayerError>;
