//! The FSM reducer and its sequence/checksum gate
//!
//! `Fsm::apply` is a pure function over (current state, next op): it
//! either applies the operation, skips it with a reason, or fails fatally.
//! No log service is involved; the caller feeds operations in the order
//! the log delivered them, and every replica that reads the same log
//! arrives at the same state.
//!
//! Conflict resolution is first-writer-wins at the log level: the first
//! author to durably sequence an op with the expected sequence number and
//! chain value owns the lineage from that point. A racing author's op is
//! recognized as a divergent branch (stale seq, gapped seq, or broken
//! chain from a different author) and skipped.

use std::collections::BTreeMap;

use crate::log::LogName;
use crate::message::{chain_checksum, Author, Fnode, OpPayload, RecordedOp};

use super::errors::{FsmError, FsmResult};
use super::fnode::FnodeState;

/// FSM tunables.
#[derive(Debug, Clone, Copy)]
pub struct FsmConfig {
    /// When a write at offset 0 covers an Fnode's entire current extent,
    /// drop the segments the rewrite superseded. Keeps hints at the
    /// minimum needed to reconstruct live content.
    pub reset_segments_on_full_rewrite: bool,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            reset_segments_on_full_rewrite: true,
        }
    }
}

/// Why an operation was passed over rather than applied. All of these
/// are normal replay flow, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sequence number already consumed: duplicate delivery, or a losing
    /// author whose op arrived after the winner took its slot.
    Stale,
    /// Sequence number ahead of the expected next: an op from a
    /// divergent branch that raced ahead of the authoritative chain.
    SeqNoGap,
    /// Expected sequence number, broken chain, different author: the
    /// divergent branch of a writer that lost the race.
    LostRace,
}

/// Outcome of applying one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The operation mutated the FSM. `released` names an Fnode whose
    /// last link was removed; the caller garbage-collects its local file.
    Applied { released: Option<Fnode> },
    /// The operation was passed over; state is unchanged.
    Skipped(SkipReason),
}

/// In-memory view of "which files exist, with what bytes, written by
/// whom", folded from a recovery-log stream.
#[derive(Debug, Clone)]
pub struct Fsm {
    pub(crate) log: LogName,
    pub(crate) config: FsmConfig,
    /// Expected sequence number of the next applied op.
    pub(crate) next_seq_no: u64,
    /// Expected chain value of the next applied op.
    pub(crate) next_checksum: u32,
    /// Author of the most recently applied op.
    pub(crate) last_author: Option<Author>,
    /// Log offset one past the last applied op's frame and content.
    pub(crate) mark_offset: u64,
    pub(crate) links: BTreeMap<String, Fnode>,
    pub(crate) live_nodes: BTreeMap<Fnode, FnodeState>,
    pub(crate) properties: BTreeMap<String, String>,
}

impl Fsm {
    /// An FSM at the genesis of `log`: no files, sequence starts at 1.
    pub fn new(log: LogName, config: FsmConfig) -> Self {
        Self {
            log,
            config,
            next_seq_no: 1,
            next_checksum: 0,
            last_author: None,
            mark_offset: 0,
            links: BTreeMap::new(),
            live_nodes: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn log(&self) -> &LogName {
        &self.log
    }

    pub fn next_seq_no(&self) -> u64 {
        self.next_seq_no
    }

    pub fn next_checksum(&self) -> u32 {
        self.next_checksum
    }

    /// Log offset from which a reader resumes after this FSM's state.
    pub fn mark_offset(&self) -> u64 {
        self.mark_offset
    }

    pub fn live_nodes(&self) -> &BTreeMap<Fnode, FnodeState> {
        &self.live_nodes
    }

    pub fn links(&self) -> &BTreeMap<String, Fnode> {
        &self.links
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Resolves a path alias to its current Fnode.
    pub fn resolve_path(&self, path: &str) -> Option<Fnode> {
        self.links.get(path).copied()
    }

    /// Applies the next operation read from the log.
    ///
    /// `offset` is the log offset of the op's frame; `span` covers the
    /// frame plus any trailing content bytes.
    pub fn apply(&mut self, op: &RecordedOp, offset: u64, span: u64) -> FsmResult<ApplyOutcome> {
        if op.seq_no < self.next_seq_no {
            return Ok(ApplyOutcome::Skipped(SkipReason::Stale));
        }
        if op.seq_no > self.next_seq_no {
            return Ok(ApplyOutcome::Skipped(SkipReason::SeqNoGap));
        }
        if op.checksum != self.next_checksum {
            // A broken chain from the author we were following is
            // corruption. From anyone else it is a losing branch.
            if self.last_author == Some(op.author) {
                return Err(FsmError::ChecksumMismatch {
                    seq_no: op.seq_no,
                    author: op.author,
                    expected: self.next_checksum,
                    actual: op.checksum,
                });
            }
            return Ok(ApplyOutcome::Skipped(SkipReason::LostRace));
        }

        let released = self.apply_payload(op, offset, span)?;

        self.next_checksum = chain_checksum(op.checksum, &op.encode_body());
        self.next_seq_no = op.seq_no + 1;
        self.last_author = Some(op.author);
        self.mark_offset = self.mark_offset.max(offset + span);

        Ok(ApplyOutcome::Applied { released })
    }

    fn apply_payload(
        &mut self,
        op: &RecordedOp,
        offset: u64,
        span: u64,
    ) -> FsmResult<Option<Fnode>> {
        match &op.payload {
            OpPayload::Create { path } => {
                if self.links.contains_key(path) {
                    return Err(FsmError::LinkExists {
                        path: path.clone(),
                        seq_no: op.seq_no,
                    });
                }
                let fnode = Fnode(op.seq_no);
                let mut state = FnodeState::default();
                state.links.insert(path.clone());
                self.live_nodes.insert(fnode, state);
                self.links.insert(path.clone(), fnode);
                Ok(None)
            }
            OpPayload::Link { fnode, path } => {
                if self.links.contains_key(path) {
                    return Err(FsmError::LinkExists {
                        path: path.clone(),
                        seq_no: op.seq_no,
                    });
                }
                let state = self.live_nodes.get_mut(fnode).ok_or(FsmError::FnodeUnknown {
                    fnode: *fnode,
                    seq_no: op.seq_no,
                })?;
                state.links.insert(path.clone());
                self.links.insert(path.clone(), *fnode);
                Ok(None)
            }
            OpPayload::Unlink { fnode, path } => {
                if self.links.get(path) != Some(fnode) {
                    return Err(FsmError::NoSuchLink {
                        path: path.clone(),
                        seq_no: op.seq_no,
                    });
                }
                self.links.remove(path);
                let state = self.live_nodes.get_mut(fnode).ok_or(FsmError::FnodeUnknown {
                    fnode: *fnode,
                    seq_no: op.seq_no,
                })?;
                state.links.remove(path);
                if state.links.is_empty() {
                    // Last alias gone: release the node locally. Its
                    // historical segments remain in the log.
                    self.live_nodes.remove(fnode);
                    return Ok(Some(*fnode));
                }
                Ok(None)
            }
            OpPayload::Write {
                fnode,
                offset: file_offset,
                length,
            } => {
                let reset = self.config.reset_segments_on_full_rewrite;
                let state = self.live_nodes.get_mut(fnode).ok_or(FsmError::FnodeUnknown {
                    fnode: *fnode,
                    seq_no: op.seq_no,
                })?;
                if reset && *file_offset == 0 && *length >= state.size {
                    state.segments.clear();
                }
                state.extend_segments(op.author, op.seq_no, offset, offset + span);
                state.size = state.size.max(file_offset + length);
                Ok(None)
            }
            OpPayload::Property { key, value } => {
                self.properties.insert(key.clone(), value.clone());
                Ok(None)
            }
        }
    }
}
