//! Log playback, local materialization, and promotion to live

use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::fsm::{ApplyOutcome, Fsm, FsmConfig, FsmHints, HintedFnode, SkipReason};
use crate::log::{LogError, LogName, LogReader, ReadOutcome};
use crate::message::{decode_frame, Fnode, OpPayload, RecordedOp};
use crate::observability::Logger;

use super::errors::{PlayerError, PlayerResult};
use super::materializer::{remove_dir_if_present, Materializer};

/// Player tunables.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Upper bound on one blocking log read. Cancellation and promotion
    /// requests are observed at least this often while tailing.
    pub block_interval: Duration,
    /// Maximum bytes fetched per log read.
    pub read_chunk: usize,
    pub fsm: FsmConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            block_interval: Duration::from_millis(250),
            read_chunk: 1 << 17,
            fsm: FsmConfig::default(),
        }
    }
}

/// Counters accumulated over one `play` call.
#[derive(Debug, Clone, Default)]
pub struct PlayStats {
    /// Number of operations applied to the FSM.
    pub ops_applied: u64,
    /// Operations skipped as already-consumed duplicates.
    pub skipped_stale: u64,
    /// Operations skipped for running ahead of the expected sequence.
    pub skipped_gap: u64,
    /// Operations skipped as a losing author's divergent branch.
    pub skipped_lost_race: u64,
    /// Fnodes re-materialized from hinted segments.
    pub hinted_fnodes: u64,
    /// Total log bytes fetched.
    pub bytes_read: u64,
    /// Log offset one past the last consumed byte.
    pub final_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Reading,
    Live,
    Cancelled,
    Failed,
}

struct PlayState {
    phase: Phase,
    cancelled: bool,
    live_requested: bool,
    at_head: bool,
    fsm: Option<Fsm>,
    failure: Option<String>,
}

/// Replays one recovery log into a local directory.
///
/// `play` is the blocking read loop; callers run it on its own thread.
/// `make_live`, `cancel`, and `is_at_log_head` are safe to call from any
/// other thread at any point in the Player's life.
pub struct Player {
    hints: FsmHints,
    dir: PathBuf,
    config: PlayerConfig,
    shared: Arc<(Mutex<PlayState>, Condvar)>,
}

impl Player {
    /// A Player that will materialize `hints.log` into `dir`. Empty
    /// hints mean playback from log genesis.
    pub fn new(hints: FsmHints, dir: impl Into<PathBuf>, config: PlayerConfig) -> Self {
        Self {
            hints,
            dir: dir.into(),
            config,
            shared: Arc::new((
                Mutex::new(PlayState {
                    phase: Phase::Init,
                    cancelled: false,
                    live_requested: false,
                    at_head: false,
                    fsm: None,
                    failure: None,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Local directory this Player materializes into.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// True once the read position has reached the log's observed head
    /// at least once.
    pub fn is_at_log_head(&self) -> bool {
        self.shared.0.lock().unwrap().at_head
    }

    /// Requests cancellation. Idempotent, callable before, during, or
    /// after `play`; promptly unblocks `play` and `make_live` callers
    /// and removes the local directory.
    pub fn cancel(&self) -> PlayerResult<()> {
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.cancelled = true;
        if state.phase == Phase::Init {
            // No play loop owns the directory yet; clean up here.
            remove_dir_if_present(&self.dir)?;
            state.phase = Phase::Cancelled;
        }
        cond.notify_all();
        drop(state);
        Logger::info("PLAY_CANCELLED", &[("log", self.hints.log.as_str())]);
        Ok(())
    }

    /// Requests promotion and blocks until playback reaches the log
    /// head, returning the final FSM. The local directory is sealed and
    /// ready for a live storage engine; a Recorder is typically
    /// constructed from the returned FSM.
    pub fn make_live(&self) -> PlayerResult<Fsm> {
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.live_requested = true;
        cond.notify_all();
        loop {
            match state.phase {
                Phase::Live => {
                    return state.fsm.take().ok_or(PlayerError::InvalidState {
                        detail: "final state already taken".to_string(),
                    });
                }
                Phase::Cancelled => return Err(PlayerError::Cancelled),
                Phase::Failed => {
                    return Err(PlayerError::Failed {
                        detail: state.failure.clone().unwrap_or_default(),
                    });
                }
                Phase::Init | Phase::Reading => {
                    state = cond.wait(state).unwrap();
                }
            }
        }
    }

    /// Runs playback to completion: restores hinted content, tails the
    /// log, and materializes every applied operation. Returns when
    /// promotion completes, cancellation is requested, or replay fails.
    pub fn play(&self, reader: &dyn LogReader) -> PlayerResult<PlayStats> {
        {
            let (lock, _) = &*self.shared;
            let mut state = lock.lock().unwrap();
            match state.phase {
                Phase::Init if state.cancelled => return Err(PlayerError::Cancelled),
                Phase::Cancelled => return Err(PlayerError::Cancelled),
                Phase::Init => state.phase = Phase::Reading,
                _ => {
                    return Err(PlayerError::InvalidState {
                        detail: "play already ran".to_string(),
                    });
                }
            }
        }

        let result = self.run(reader);
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock().unwrap();
        match result {
            Ok((fsm, stats)) => {
                state.fsm = Some(fsm);
                state.phase = Phase::Live;
                cond.notify_all();
                Ok(stats)
            }
            Err(e) => {
                // Cancellation takes precedence over any in-flight error.
                if state.cancelled || e.is_cancelled() {
                    state.phase = Phase::Cancelled;
                    cond.notify_all();
                    drop(state);
                    remove_dir_if_present(&self.dir)?;
                    return Err(PlayerError::Cancelled);
                }
                state.failure = Some(e.to_string());
                state.phase = Phase::Failed;
                cond.notify_all();
                drop(state);
                Logger::error(
                    "PLAY_FAILED",
                    &[("error", &e.to_string()), ("log", self.hints.log.as_str())],
                );
                Err(e)
            }
        }
    }

    /// Records that the read position has reached the log's observed
    /// head. Sticky for the Player's lifetime.
    fn latch_at_head(&self, log: &LogName, offset: u64) {
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock().unwrap();
        if !state.at_head {
            state.at_head = true;
            cond.notify_all();
            drop(state);
            Logger::info(
                "PLAY_AT_HEAD",
                &[("log", log.as_str()), ("offset", &offset.to_string())],
            );
        }
    }

    fn check_cancelled(&self) -> PlayerResult<()> {
        if self.shared.0.lock().unwrap().cancelled {
            return Err(PlayerError::Cancelled);
        }
        Ok(())
    }

    fn run(&self, reader: &dyn LogReader) -> PlayerResult<(Fsm, PlayStats)> {
        let mat = Materializer::new(&self.dir)?;
        let fsm = Fsm::from_hints(self.hints.clone(), self.config.fsm)?;
        let mut stats = PlayStats::default();

        Logger::info(
            "PLAY_START",
            &[
                ("hinted_fnodes", &self.hints.live_nodes.len().to_string()),
                ("log", self.hints.log.as_str()),
                ("resume_offset", &self.hints.resume_offset.to_string()),
            ],
        );

        for node in &self.hints.live_nodes {
            self.restore_hinted_fnode(reader, &mat, node, &mut stats)?;
            stats.hinted_fnodes += 1;
        }

        self.tail(reader, mat, fsm, stats)
    }

    /// Re-materializes one Fnode's content from its hinted segments.
    ///
    /// Segment byte ranges may interleave frames from other authors and
    /// nodes; every frame is decoded to stay aligned, and only this
    /// node's writes by the hinted author are applied. Hints are not a
    /// trust boundary: sequence bounds and monotonicity are re-checked.
    fn restore_hinted_fnode(
        &self,
        reader: &dyn LogReader,
        mat: &Materializer,
        node: &HintedFnode,
        stats: &mut PlayStats,
    ) -> PlayerResult<()> {
        mat.create(node.fnode)?;

        for segment in &node.segments {
            let range = self.read_range(reader, segment.first_offset, segment.last_offset)?;
            stats.bytes_read += range.len() as u64;

            let mut pos = 0usize;
            let mut last_seq = None;
            while pos < range.len() {
                let (op, frame_len) = match decode_frame(&range[pos..])? {
                    Some(decoded) => decoded,
                    None => {
                        return Err(PlayerError::HintsViolation {
                            detail: format!(
                                "segment [{}, {}) ends mid-frame",
                                segment.first_offset, segment.last_offset
                            ),
                        });
                    }
                };
                let total = frame_len + op.content_length() as usize;
                if range.len() < pos + total {
                    return Err(PlayerError::HintsViolation {
                        detail: format!(
                            "segment [{}, {}) truncates write content",
                            segment.first_offset, segment.last_offset
                        ),
                    });
                }

                if let OpPayload::Write {
                    fnode,
                    offset,
                    length,
                } = op.payload
                {
                    let matches = fnode == node.fnode
                        && op.author == segment.author
                        && segment.contains_seq(op.seq_no);
                    if matches {
                        if last_seq.is_some_and(|prev| op.seq_no <= prev) {
                            return Err(PlayerError::HintsViolation {
                                detail: format!(
                                    "non-monotonic seq {} within hinted segment",
                                    op.seq_no
                                ),
                            });
                        }
                        last_seq = Some(op.seq_no);
                        let content = &range[pos + frame_len..pos + total];
                        debug_assert_eq!(content.len() as u64, length);
                        mat.write_at(node.fnode, offset, content)?;
                    }
                }
                pos += total;
            }
        }

        for path in &node.links {
            mat.link(node.fnode, path)?;
        }
        Ok(())
    }

    /// Fetches exactly the log bytes in `[start, end)`. A hinted range
    /// the log cannot serve is a hints violation, not a wait.
    fn read_range(
        &self,
        reader: &dyn LogReader,
        start: u64,
        end: u64,
    ) -> PlayerResult<Vec<u8>> {
        let mut buf = Vec::with_capacity((end - start) as usize);
        let mut pos = start;
        while pos < end {
            self.check_cancelled()?;
            let want = ((end - pos) as usize).min(self.config.read_chunk);
            match reader.read_from(
                &self.hints.log,
                pos,
                want,
                Some(self.config.block_interval),
            ) {
                Ok(ReadOutcome::Bytes(bytes)) => {
                    pos += bytes.len() as u64;
                    buf.extend_from_slice(&bytes);
                }
                Ok(ReadOutcome::NotYetAvailable { head })
                | Err(LogError::OffsetOutOfRange { head, .. }) => {
                    return Err(PlayerError::HintsViolation {
                        detail: format!("hinted range [{}, {}) beyond log head {}", start, end, head),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf)
    }

    /// The tailing loop: decode, gate through the FSM, materialize.
    fn tail(
        &self,
        reader: &dyn LogReader,
        mat: Materializer,
        mut fsm: Fsm,
        mut stats: PlayStats,
    ) -> PlayerResult<(Fsm, PlayStats)> {
        let log = self.hints.log.clone();
        let mut buffer: Vec<u8> = Vec::new();
        let mut buf_offset = self.hints.resume_offset;

        loop {
            let (cancelled, live_requested) = {
                let state = self.shared.0.lock().unwrap();
                (state.cancelled, state.live_requested)
            };
            if cancelled {
                return Err(PlayerError::Cancelled);
            }

            // Consume one complete frame (and its content) if buffered.
            if let Some((op, frame_len)) = decode_frame(&buffer)? {
                let total = frame_len + op.content_length() as usize;
                if buffer.len() >= total {
                    self.consume_op(&mat, &mut fsm, &op, buf_offset, frame_len, total, &buffer, &mut stats)?;
                    buffer.drain(..total);
                    buf_offset += total as u64;
                    continue;
                }
            }

            // Buffer holds no complete op. Promotion finalizes only
            // against the log's current head, never a stale observation:
            // bytes appended after we first reached the head must still
            // be consumed.
            if live_requested && buffer.is_empty() && buf_offset >= reader.head_offset(&log)? {
                // Promotion reaches the head too; latch it even when no
                // read ever came back empty.
                self.latch_at_head(&log, buf_offset);
                mat.seal(&fsm)?;
                stats.final_offset = buf_offset;
                Logger::info(
                    "MAKE_LIVE",
                    &[
                        ("final_offset", &buf_offset.to_string()),
                        ("log", log.as_str()),
                        ("ops_applied", &stats.ops_applied.to_string()),
                    ],
                );
                return Ok((fsm, stats));
            }

            let read_offset = buf_offset + buffer.len() as u64;
            match reader.read_from(
                &log,
                read_offset,
                self.config.read_chunk,
                Some(self.config.block_interval),
            )? {
                ReadOutcome::Bytes(bytes) => {
                    stats.bytes_read += bytes.len() as u64;
                    buffer.extend_from_slice(&bytes);
                }
                ReadOutcome::NotYetAvailable { .. } => {
                    self.latch_at_head(&log, read_offset);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn consume_op(
        &self,
        mat: &Materializer,
        fsm: &mut Fsm,
        op: &RecordedOp,
        offset: u64,
        frame_len: usize,
        total: usize,
        buffer: &[u8],
        stats: &mut PlayStats,
    ) -> PlayerResult<()> {
        match fsm.apply(op, offset, total as u64)? {
            ApplyOutcome::Applied { released } => {
                stats.ops_applied += 1;
                match &op.payload {
                    OpPayload::Create { path } => {
                        let fnode = Fnode(op.seq_no);
                        mat.create(fnode)?;
                        mat.link(fnode, path)?;
                    }
                    OpPayload::Write {
                        fnode,
                        offset: file_offset,
                        ..
                    } => {
                        let content = &buffer[frame_len..total];
                        mat.write_at(*fnode, *file_offset, content)?;
                    }
                    OpPayload::Link { fnode, path } => mat.link(*fnode, path)?,
                    OpPayload::Unlink { fnode, path } => {
                        mat.unlink(*fnode, path, released == Some(*fnode))?;
                    }
                    // Properties live in the FSM, not on disk.
                    OpPayload::Property { .. } => {}
                }
            }
            ApplyOutcome::Skipped(reason) => {
                match reason {
                    SkipReason::Stale => stats.skipped_stale += 1,
                    SkipReason::SeqNoGap => stats.skipped_gap += 1,
                    SkipReason::LostRace => stats.skipped_lost_race += 1,
                }
                Logger::warn(
                    "OP_SKIPPED",
                    &[
                        ("author", &op.author.0.to_string()),
                        ("reason", &format!("{:?}", reason)),
                        ("seq_no", &op.seq_no.to_string()),
                    ],
                );
            }
        }
        Ok(())
    }
}
