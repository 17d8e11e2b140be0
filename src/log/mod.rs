//! Log-service client contract
//!
//! The recovery log consumes, and never reimplements, a distributed
//! append-only log service: offset-addressed, totally ordered per stream,
//! multi-reader, at-least-once delivery. This module pins down the
//! interface the Recorder and Player depend on:
//!
//! - `LogWriter::append` preserves per-writer submission order and
//!   assigns the start offset at acceptance; the returned handle resolves
//!   once the bytes are durably sequenced. Waiting on the handle of an
//!   empty append is the commit barrier.
//! - `LogReader::read_from` supports open-ended tailing reads: a reader
//!   caught up to the tail sees `NotYetAvailable`, not an error.
//!
//! `MemoryLog` is an in-process reference implementation backing the test
//! suite; production deployments plug in a real log-service client.

mod client;
mod errors;
mod memory;

pub use client::{
    AppendHandle, AppendReceipt, LogName, LogReader, LogWriter, ReadOutcome,
};
pub use errors::{LogError, LogResult};
pub use memory::MemoryLog;
