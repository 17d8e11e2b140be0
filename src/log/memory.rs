//! In-process reference log service
//!
//! A mutex-and-condvar log: appends take the lock, extend the stream,
//! and wake blocked tailing readers. Appends are atomic (a frame and its
//! content land contiguously) and durable at acceptance, so receipts
//! carry already-resolved handles.
//!
//! This is the arbitration model the crate's conflict resolution relies
//! on: the lock serializes concurrent writers, and the offsets it assigns
//! are the single source of truth for first-writer-wins.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::client::{AppendHandle, AppendReceipt, LogName, LogReader, LogWriter, ReadOutcome};
use super::errors::{LogError, LogResult};

/// In-memory, multi-stream log service.
pub struct MemoryLog {
    streams: Mutex<HashMap<LogName, Vec<u8>>>,
    arrived: Condvar,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriter for MemoryLog {
    fn append(&self, log: &LogName, content: &[u8]) -> LogResult<AppendReceipt> {
        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(log.clone()).or_default();

        let offset = stream.len() as u64;
        stream.extend_from_slice(content);
        self.arrived.notify_all();

        Ok(AppendReceipt {
            offset,
            handle: AppendHandle::resolved(offset + content.len() as u64),
        })
    }
}

impl LogReader for MemoryLog {
    fn read_from(
        &self,
        log: &LogName,
        offset: u64,
        max_len: usize,
        block_for: Option<Duration>,
    ) -> LogResult<ReadOutcome> {
        let deadline = block_for.map(|d| Instant::now() + d);
        let mut streams = self.streams.lock().unwrap();

        loop {
            // A log that has never been appended to reads as empty; the
            // first reader of a fresh stream is simply at its head.
            let head = streams.get(log).map(|s| s.len() as u64).unwrap_or(0);

            if offset > head {
                return Err(LogError::OffsetOutOfRange { offset, head });
            }
            if offset < head {
                let stream = streams.get(log).unwrap_or(&EMPTY);
                let end = head.min(offset + max_len as u64) as usize;
                return Ok(ReadOutcome::Bytes(stream[offset as usize..end].to_vec()));
            }

            // offset == head: block for arrival, or report the head.
            let now = Instant::now();
            let remaining = match deadline {
                Some(d) if d > now => d - now,
                _ => return Ok(ReadOutcome::NotYetAvailable { head }),
            };
            let (guard, _timeout) = self.arrived.wait_timeout(streams, remaining).unwrap();
            streams = guard;
        }
    }

    fn head_offset(&self, log: &LogName) -> LogResult<u64> {
        let streams = self.streams.lock().unwrap();
        Ok(streams.get(log).map(|s| s.len() as u64).unwrap_or(0))
    }
}

static EMPTY: Vec<u8> = Vec::new();

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn test_log() -> LogName {
        LogName::new("tests/memory-log")
    }

    #[test]
    fn test_append_assigns_sequential_offsets() {
        let log = MemoryLog::new();
        let name = test_log();

        let first = log.append(&name, b"hello ").unwrap();
        let second = log.append(&name, b"world").unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 6);
        assert_eq!(first.handle.wait(), Ok(6));
        assert_eq!(second.handle.wait(), Ok(11));
        assert_eq!(log.head_offset(&name), Ok(11));
    }

    #[test]
    fn test_read_returns_available_bytes() {
        let log = MemoryLog::new();
        let name = test_log();
        log.append(&name, b"abcdef").unwrap();

        match log.read_from(&name, 2, 3, None).unwrap() {
            ReadOutcome::Bytes(data) => assert_eq!(data, b"cde"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_read_at_head_reports_not_yet_available() {
        let log = MemoryLog::new();
        let name = test_log();
        log.append(&name, b"abc").unwrap();

        match log.read_from(&name, 3, 64, None).unwrap() {
            ReadOutcome::NotYetAvailable { head } => assert_eq!(head, 3),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_fresh_log_reads_as_empty() {
        let log = MemoryLog::new();
        let name = test_log();
        match log.read_from(&name, 0, 64, None).unwrap() {
            ReadOutcome::NotYetAvailable { head } => assert_eq!(head, 0),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_offset_beyond_head_is_an_error() {
        let log = MemoryLog::new();
        let name = test_log();
        log.append(&name, b"abc").unwrap();
        assert_eq!(
            log.read_from(&name, 10, 64, None),
            Err(LogError::OffsetOutOfRange { offset: 10, head: 3 })
        );
    }

    #[test]
    fn test_blocked_read_wakes_on_append() {
        let log = Arc::new(MemoryLog::new());
        let name = test_log();

        let reader = Arc::clone(&log);
        let read_name = name.clone();
        let joiner = thread::spawn(move || {
            reader.read_from(&read_name, 0, 64, Some(Duration::from_secs(5)))
        });

        thread::sleep(Duration::from_millis(20));
        log.append(&name, b"arrival").unwrap();

        match joiner.join().unwrap().unwrap() {
            ReadOutcome::Bytes(data) => assert_eq!(data, b"arrival"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_append_is_a_valid_barrier() {
        let log = MemoryLog::new();
        let name = test_log();
        log.append(&name, b"data").unwrap();

        let barrier = log.append(&name, &[]).unwrap();
        assert_eq!(barrier.offset, 4);
        assert_eq!(barrier.handle.wait(), Ok(4));
        assert_eq!(log.head_offset(&name), Ok(4));
    }
}
