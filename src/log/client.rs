//! Writer and reader traits for the consumed log service

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{LogError, LogResult};

/// Identity of one recovery-log stream within the log service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogName(pub String);

impl LogName {
    pub fn new(name: impl Into<String>) -> Self {
        LogName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution handle for one submitted append.
///
/// Resolves with the end offset of the appended range once the log
/// service reports it durably sequenced. Because the service preserves
/// per-writer submission order, waiting on the handle of an empty append
/// proves every prior append from the same writer is durable: the commit
/// barrier.
#[derive(Debug, Clone)]
pub struct AppendHandle {
    shared: Arc<(Mutex<Option<LogResult<u64>>>, Condvar)>,
}

impl AppendHandle {
    /// A handle not yet resolved.
    pub fn pending() -> Self {
        Self {
            shared: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// A handle already resolved at construction, for services that
    /// sequence durably within `append` itself.
    pub fn resolved(end_offset: u64) -> Self {
        let handle = Self::pending();
        handle.resolve(Ok(end_offset));
        handle
    }

    /// Resolves the handle; called by the log-service client.
    pub fn resolve(&self, result: LogResult<u64>) {
        let (lock, cond) = &*self.shared;
        let mut slot = lock.lock().unwrap();
        if slot.is_none() {
            *slot = Some(result);
            cond.notify_all();
        }
    }

    /// Blocks until the append is durably sequenced, returning the end
    /// offset of the appended range.
    pub fn wait(&self) -> LogResult<u64> {
        let (lock, cond) = &*self.shared;
        let mut slot = lock.lock().unwrap();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = cond.wait(slot).unwrap();
        }
    }

    /// Non-blocking probe of the append's resolution.
    pub fn poll(&self) -> Option<LogResult<u64>> {
        let (lock, _) = &*self.shared;
        lock.lock().unwrap().clone()
    }
}

/// Acceptance receipt for one append.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    /// Start offset assigned to this append. The service arbitrates
    /// acceptance order across concurrent writers; the assigned offset is
    /// final even before durability resolves.
    pub offset: u64,
    /// Resolves when the appended bytes are durably sequenced.
    pub handle: AppendHandle,
}

/// Outcome of a bounded tailing read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes beginning at the requested offset.
    Bytes(Vec<u8>),
    /// The requested offset is the log head; nothing arrived within the
    /// blocking interval. A caught-up reader sees this, not an error.
    NotYetAvailable { head: u64 },
}

/// Append path of the log service.
pub trait LogWriter: Send + Sync {
    /// Submits `content` for append. Non-blocking: durability is
    /// confirmed separately through the receipt's handle. An empty
    /// `content` is a valid append and serves as a commit barrier.
    fn append(&self, log: &LogName, content: &[u8]) -> LogResult<AppendReceipt>;
}

/// Read path of the log service.
pub trait LogReader: Send + Sync {
    /// Reads up to `max_len` bytes starting at `offset`, blocking up to
    /// `block_for` when the offset is at the head. `block_for: None`
    /// returns immediately.
    fn read_from(
        &self,
        log: &LogName,
        offset: u64,
        max_len: usize,
        block_for: Option<Duration>,
    ) -> LogResult<ReadOutcome>;

    /// Current head (exclusive end offset) of the log.
    fn head_offset(&self, log: &LogName) -> LogResult<u64>;
}
