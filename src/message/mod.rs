//! Recorded-operation model and wire framing
//!
//! Every mutation a Recorder observes is serialized as one `RecordedOp`
//! inside a length-prefixed, checksum-protected frame. Frames from all
//! authors share a single total order in the log; the chained checksum
//! binds each operation to the one applied before it, which is how a
//! reader detects truncation, corruption, and divergent author branches.
//!
//! # Invariants Enforced
//!
//! - K1: every frame carries a CRC32 over its full contents
//! - K2: a frame that fails its CRC is never surfaced as an operation
//! - S1: sequence numbers are monotonic per log, not per author

mod checksum;
mod errors;
mod frame;
mod op;

pub use checksum::{chain_checksum, compute_checksum};
pub use errors::{FrameError, FrameResult};
pub use frame::{decode_frame, encode_frame, FRAME_OVERHEAD, MAX_FRAME_LEN};
pub use op::{Author, Fnode, OpPayload, RecordedOp};
