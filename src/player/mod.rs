//! Player: the read path of the recovery log
//!
//! A Player turns a recovery-log stream back into a local directory.
//! It restores hinted content, tails the live log while validating every
//! frame through the FSM gate, and on request promotes the directory to
//! live use by handing its final FSM to the caller.
//!
//! # Invariants Enforced
//!
//! - R1: `make_live` never succeeds over a partially materialized tree;
//!   every live Fnode's extent is verified before sealing
//! - R2: cancellation is observed at every suspension point; a blocked
//!   `play` or `make_live` unblocks within one read interval
//! - R3: the cancellation sentinel takes precedence over any error in
//!   flight when both occur

mod errors;
mod materializer;
mod player;

pub use errors::{PlayerError, PlayerResult};
pub use player::{PlayStats, Player, PlayerConfig};
