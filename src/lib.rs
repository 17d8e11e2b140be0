//! aerolog - recovery-log replication for file-based storage engines
//!
//! Records every filesystem mutation of an embedded storage engine into
//! an ordered, append-only log stream, and replays that stream elsewhere
//! to reconstruct an identical filesystem image.

pub mod fsm;
pub mod log;
pub mod message;
pub mod observability;
pub mod player;
pub mod recorder;
