//! Finite State Model for recovery-log replay
//!
//! The FSM is a pure reducer: fold an ordered stream of recorded
//! operations into the current set of live files, their byte-range
//! provenance, and the engine property set. It owns conflict resolution
//! between competing authors.
//!
//! # Invariants Enforced
//!
//! - S1: sequence numbers strictly increase across applied operations,
//!   regardless of author
//! - S2: an operation is applied only when both its sequence number and
//!   its chained checksum match the FSM's expectation
//! - A1: a racing author's divergent branch is skipped, never applied;
//!   every reader of the same log converges to the same lineage
//! - G1: unlinking the last path of an Fnode releases it locally while
//!   its history remains in the log

mod errors;
mod fnode;
mod hints;
mod state;

pub use errors::{FsmError, FsmResult};
pub use fnode::{FnodeState, Segment};
pub use hints::{FsmHints, HintedFnode};
pub use state::{ApplyOutcome, Fsm, FsmConfig, SkipReason};
