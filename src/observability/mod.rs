//! Structured event logging
//!
//! - Structured logs (JSON)
//! - Deterministic key ordering
//! - One log line = one event
//! - Synchronous, no buffering
//!
//! Logging is read-only with respect to replay and recording: a failed
//! write to stdout never affects the log stream or the FSM.

mod logger;

pub use logger::{Logger, Severity};
