//! Filesystem-hook surface consumed by the storage engine
//!
//! The engine performs its own local file I/O and invokes this hook for
//! every mutation, synchronously. The hook is an explicit capability set
//! injected into the engine; the Recorder is its sole implementation and
//! there is no process-wide singleton.

use std::path::Path;

use crate::log::AppendHandle;
use crate::message::Fnode;

use super::errors::RecorderResult;

/// Capability set a recorded storage engine writes through.
///
/// Paths are absolute paths under the recorded directory, exactly as the
/// engine sees them.
pub trait RecordedFs: Send + Sync {
    /// Records creation of a new file. Returns the Fnode identity
    /// assigned to it.
    fn create(&self, path: &Path) -> RecorderResult<Fnode>;

    /// Records `data` written at byte `offset` of the file at `path`.
    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> RecorderResult<()>;

    /// Records an additional link (alias) to the file at `existing`.
    fn link(&self, existing: &Path, new: &Path) -> RecorderResult<()>;

    /// Records removal of the link at `path`.
    fn unlink(&self, path: &Path) -> RecorderResult<()>;

    /// Records a rename: link the new path, unlink the old.
    fn rename(&self, from: &Path, to: &Path) -> RecorderResult<()> {
        self.link(from, to)?;
        self.unlink(from)
    }

    /// Records replacement of a small engine property.
    fn set_property(&self, key: &str, value: &str) -> RecorderResult<()>;

    /// Reads back a previously recorded property.
    fn get_property(&self, key: &str) -> Option<String>;

    /// Issues an empty append through the recording channel. Waiting on
    /// the returned handle proves all prior recorded ops are durably
    /// sequenced: the engine's transaction-boundary commit barrier.
    fn barrier(&self) -> RecorderResult<AppendHandle>;
}
