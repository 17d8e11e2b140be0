//! Compact, serializable FSM snapshots
//!
//! Hints let a new Player begin near the log head instead of at genesis:
//! they carry the log identity, the resume position and chain
//! expectation, the property set, and for every live Fnode its links and
//! the segment bounds needed to re-read only that node's content.
//!
//! Hints are an optimization, not a trust boundary: a Player seeded from
//! hints still validates every frame it reads and re-checks sequence
//! continuity within each hinted segment.

use serde::{Deserialize, Serialize};

use crate::log::LogName;
use crate::message::Fnode;

use super::errors::{FsmError, FsmResult};
use super::fnode::{FnodeState, Segment};
use super::state::{Fsm, FsmConfig};

/// One live Fnode's snapshot within hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintedFnode {
    pub fnode: Fnode,
    /// Paths currently aliasing the node.
    pub links: Vec<String>,
    /// Byte extent of the materialized file.
    pub size: u64,
    /// Authored log ranges sufficient to reconstruct content.
    pub segments: Vec<Segment>,
}

/// Serializable snapshot of a live FSM.
///
/// Stable under repeated encode/decode round-trips; encoded with
/// serde_json wherever a byte form is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmHints {
    pub log: LogName,
    /// Log offset from which a consuming Player resumes tailing.
    pub resume_offset: u64,
    /// Sequence expectation at the resume point.
    pub next_seq_no: u64,
    /// Chain expectation at the resume point.
    pub next_checksum: u32,
    pub properties: std::collections::BTreeMap<String, String>,
    pub live_nodes: Vec<HintedFnode>,
}

impl FsmHints {
    /// Hints for a log with no consumed history: read from genesis.
    pub fn empty(log: LogName) -> Self {
        Self {
            log,
            resume_offset: 0,
            next_seq_no: 1,
            next_checksum: 0,
            properties: std::collections::BTreeMap::new(),
            live_nodes: Vec::new(),
        }
    }
}

impl Fsm {
    /// Emits a snapshot of the current live state, sufficient for a new
    /// Player to resume without rescanning from log genesis.
    pub fn build_hints(&self) -> FsmHints {
        FsmHints {
            log: self.log.clone(),
            resume_offset: self.mark_offset,
            next_seq_no: self.next_seq_no,
            next_checksum: self.next_checksum,
            properties: self.properties.clone(),
            live_nodes: self
                .live_nodes
                .iter()
                .map(|(fnode, state)| HintedFnode {
                    fnode: *fnode,
                    links: state.links.iter().cloned().collect(),
                    size: state.size,
                    segments: state.segments.clone(),
                })
                .collect(),
        }
    }

    /// Reconstructs an FSM from hints.
    ///
    /// The returned FSM reflects state as of the snapshot's resume
    /// point; content materialization from the hinted segments is the
    /// Player's job.
    pub fn from_hints(hints: FsmHints, config: FsmConfig) -> FsmResult<Self> {
        let mut fsm = Fsm::new(hints.log, config);
        fsm.next_seq_no = hints.next_seq_no;
        fsm.next_checksum = hints.next_checksum;
        fsm.mark_offset = hints.resume_offset;
        fsm.properties = hints.properties;

        for node in hints.live_nodes {
            let mut state = FnodeState {
                segments: node.segments,
                size: node.size,
                ..FnodeState::default()
            };
            for path in node.links {
                if fsm.links.insert(path.clone(), node.fnode).is_some() {
                    return Err(FsmError::LinkExists { path, seq_no: 0 });
                }
                state.links.insert(path);
            }
            fsm.live_nodes.insert(node.fnode, state);
        }

        Ok(fsm)
    }
}
