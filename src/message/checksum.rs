//! CRC32 checksums for recovery-log frames and operation chains
//!
//! Two distinct uses share the same CRC32 (IEEE) implementation:
//!
//! - Frame integrity: every encoded frame ends with a CRC over the frame
//!   bytes, detecting torn or corrupted log reads.
//! - Operation chaining: each applied operation advances a running
//!   checksum seeded by the previous one, so a reader following the log
//!   can distinguish the authoritative author chain from the divergent
//!   branch a losing writer left behind.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
///
/// Deterministic: the same input always produces the same output.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Advances an operation chain: folds `body` into the running checksum.
///
/// The chain value an operation carries is the value expected *before*
/// it applies; the value after applying it is `chain_checksum(op.checksum,
/// body)`. Both Recorder and FSM compute this over the identical encoded
/// operation body, so every reader of the same log derives the same chain.
pub fn chain_checksum(prev: u32, body: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(prev);
    hasher.update(body);
    hasher.finalize()
}
