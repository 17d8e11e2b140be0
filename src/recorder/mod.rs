//! Recorder: the write path of the recovery log
//!
//! A Recorder observes the filesystem operations of one live storage
//! engine instance and serializes them into the log, assigning sequence
//! numbers and chaining checksums. It owns exactly one author identity
//! for its process lifetime and exclusively produces new ops for it.
//!
//! # Invariants Enforced
//!
//! - W1: every mutating hook call produces exactly one RecordedOp,
//!   appended in call order
//! - W2: append failures surface to the engine as operation failures;
//!   the Recorder never retries silently (retries could desequence or
//!   duplicate content)
//! - W3: resolution of the commit barrier proves every prior append from
//!   this Recorder is durably sequenced

mod errors;
mod hook;
mod recorder;

pub use errors::{RecorderError, RecorderResult};
pub use hook::RecordedFs;
pub use recorder::Recorder;
