//! Recorder implementation

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::fsm::{ApplyOutcome, Fsm, FsmHints};
use crate::log::{AppendHandle, LogWriter};
use crate::message::{encode_frame, Author, Fnode, OpPayload, RecordedOp};

use super::errors::{RecorderError, RecorderResult};
use super::hook::RecordedFs;

struct RecorderInner {
    fsm: Fsm,
    writer: Arc<dyn LogWriter>,
}

/// Translates live filesystem operations into recorded log appends.
///
/// Constructed from a prior Player's final FSM; generates a fresh random
/// author token. Each mutating call builds the next op in the chain,
/// submits it, and applies it optimistically to the in-process FSM. The
/// log's total order remains the source of truth: if another author wins
/// the race for a sequence slot, this Recorder's lineage simply loses
/// downstream readers, and its next barrier or append surfaces failure
/// to the engine.
pub struct Recorder {
    author: Author,
    /// Recorded directory root; engine paths are recorded relative to it.
    root: PathBuf,
    inner: Mutex<RecorderInner>,
}

impl Recorder {
    /// Creates a Recorder over `root`, seeded with the FSM a Player
    /// produced at promotion.
    pub fn new(fsm: Fsm, root: impl Into<PathBuf>, writer: Arc<dyn LogWriter>) -> Self {
        Self {
            author: Author::random(),
            root: root.into(),
            inner: Mutex::new(RecorderInner { fsm, writer }),
        }
    }

    /// This Recorder's author token.
    pub fn author(&self) -> Author {
        self.author
    }

    /// Snapshot of the current FSM state, for seeding standby replicas.
    pub fn build_hints(&self) -> FsmHints {
        self.inner.lock().unwrap().fsm.build_hints()
    }

    /// Strips the recorded root, yielding the relative path recorded in
    /// ops. Rejects paths outside the root.
    fn rel_path(&self, path: &Path) -> RecorderResult<String> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| RecorderError::PathOutsideRoot(path.display().to_string()))?;
        match rel.to_str() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(RecorderError::PathOutsideRoot(path.display().to_string())),
        }
    }

    /// Builds the next chained op, appends frame (and content) to the
    /// log, and folds it into the local FSM.
    fn record(
        &self,
        inner: &mut RecorderInner,
        payload: OpPayload,
        content: &[u8],
    ) -> RecorderResult<RecordedOp> {
        let op = RecordedOp {
            seq_no: inner.fsm.next_seq_no(),
            checksum: inner.fsm.next_checksum(),
            author: self.author,
            payload,
        };

        let frame = encode_frame(&op).map_err(|e| RecorderError::Desequenced {
            seq_no: op.seq_no,
            detail: e.to_string(),
        })?;
        let mut buf = frame;
        buf.extend_from_slice(content);
        let span = buf.len() as u64;

        // Append before applying: a failed append leaves the local FSM
        // untouched, so the engine can abort its transaction cleanly.
        let log = inner.fsm.log().clone();
        let receipt = inner.writer.append(&log, &buf)?;

        match inner.fsm.apply(&op, receipt.offset, span)? {
            ApplyOutcome::Applied { .. } => Ok(op),
            ApplyOutcome::Skipped(reason) => Err(RecorderError::Desequenced {
                seq_no: op.seq_no,
                detail: format!("own op skipped: {:?}", reason),
            }),
        }
    }

    fn resolve(&self, inner: &RecorderInner, rel: &str) -> RecorderResult<Fnode> {
        inner
            .fsm
            .resolve_path(rel)
            .ok_or_else(|| RecorderError::UntrackedPath(rel.to_string()))
    }
}

impl RecordedFs for Recorder {
    fn create(&self, path: &Path) -> RecorderResult<Fnode> {
        let rel = self.rel_path(path)?;
        let mut inner = self.inner.lock().unwrap();
        let op = self.record(&mut inner, OpPayload::Create { path: rel }, &[])?;
        Ok(Fnode(op.seq_no))
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> RecorderResult<()> {
        let rel = self.rel_path(path)?;
        let mut inner = self.inner.lock().unwrap();
        let fnode = self.resolve(&inner, &rel)?;
        self.record(
            &mut inner,
            OpPayload::Write {
                fnode,
                offset,
                length: data.len() as u64,
            },
            data,
        )?;
        Ok(())
    }

    fn link(&self, existing: &Path, new: &Path) -> RecorderResult<()> {
        let existing_rel = self.rel_path(existing)?;
        let new_rel = self.rel_path(new)?;
        let mut inner = self.inner.lock().unwrap();
        let fnode = self.resolve(&inner, &existing_rel)?;
        self.record(&mut inner, OpPayload::Link { fnode, path: new_rel }, &[])?;
        Ok(())
    }

    fn unlink(&self, path: &Path) -> RecorderResult<()> {
        let rel = self.rel_path(path)?;
        let mut inner = self.inner.lock().unwrap();
        let fnode = self.resolve(&inner, &rel)?;
        self.record(&mut inner, OpPayload::Unlink { fnode, path: rel }, &[])?;
        Ok(())
    }

    fn set_property(&self, key: &str, value: &str) -> RecorderResult<()> {
        let mut inner = self.inner.lock().unwrap();
        self.record(
            &mut inner,
            OpPayload::Property {
                key: key.to_string(),
                value: value.to_string(),
            },
            &[],
        )?;
        Ok(())
    }

    fn get_property(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().fsm.properties().get(key).cloned()
    }

    fn barrier(&self) -> RecorderResult<AppendHandle> {
        let inner = self.inner.lock().unwrap();
        let log = inner.fsm.log().clone();
        let receipt = inner.writer.append(&log, &[])?;
        Ok(receipt.handle)
    }
}

impl Recorder {
    /// Blocks until every op recorded so far is durably sequenced.
    ///
    /// The engine's fsync equivalent: called at its transaction boundary
    /// instead of syncing the local disk.
    pub fn commit(&self) -> RecorderResult<()> {
        let handle = self.barrier()?;
        handle.wait()?;
        Ok(())
    }
}
