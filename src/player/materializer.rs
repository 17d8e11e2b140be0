//! Local filesystem materialization of replayed operations
//!
//! Replayed files live under a staging directory, named by Fnode, while
//! replay runs; path links are realized as hard links into the target
//! tree as their ops apply. Sealing verifies extents against the FSM and
//! drops the staging directory, leaving only the real tree.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use crate::fsm::Fsm;
use crate::message::Fnode;

use super::errors::{PlayerError, PlayerResult};

const STAGING_DIR: &str = ".fnodes";

pub(crate) struct Materializer {
    root: PathBuf,
    staging: PathBuf,
}

impl Materializer {
    /// Prepares `root` (and its staging area) for replay. The directory
    /// is created empty; a previous replay's remnants are removed first.
    pub fn new(root: impl Into<PathBuf>) -> PlayerResult<Self> {
        let root = root.into();
        if root.exists() {
            fs::remove_dir_all(&root).map_err(|e| PlayerError::io(&root, e))?;
        }
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging).map_err(|e| PlayerError::io(&staging, e))?;
        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_path(&self, fnode: Fnode) -> PathBuf {
        self.staging.join(fnode.0.to_string())
    }

    /// Resolves a recorded relative path under the root, rejecting
    /// anything that would escape it. Ops come off the wire; the path is
    /// untrusted.
    fn target_path(&self, rel: &str) -> PlayerResult<PathBuf> {
        let rel_path = Path::new(rel);
        for component in rel_path.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(PlayerError::UnsafePath(rel.to_string())),
            }
        }
        Ok(self.root.join(rel_path))
    }

    /// Creates the staging file backing a new Fnode.
    pub fn create(&self, fnode: Fnode) -> PlayerResult<()> {
        let path = self.staging_path(fnode);
        File::create(&path).map_err(|e| PlayerError::io(&path, e))?;
        Ok(())
    }

    /// Writes `data` at byte `offset` of the Fnode's staging file.
    pub fn write_at(&self, fnode: Fnode, offset: u64, data: &[u8]) -> PlayerResult<()> {
        let path = self.staging_path(fnode);
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| PlayerError::io(&path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| PlayerError::io(&path, e))?;
        file.write_all(data).map_err(|e| PlayerError::io(&path, e))?;
        Ok(())
    }

    /// Realizes a path link as a hard link to the Fnode's staging file.
    pub fn link(&self, fnode: Fnode, rel: &str) -> PlayerResult<()> {
        let target = self.target_path(rel)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| PlayerError::io(parent, e))?;
        }
        let source = self.staging_path(fnode);
        fs::hard_link(&source, &target).map_err(|e| PlayerError::io(&target, e))?;
        Ok(())
    }

    /// Removes a path link. When the op released the Fnode, its staging
    /// file goes too; the log still holds its history.
    pub fn unlink(&self, fnode: Fnode, rel: &str, released: bool) -> PlayerResult<()> {
        let target = self.target_path(rel)?;
        fs::remove_file(&target).map_err(|e| PlayerError::io(&target, e))?;
        if released {
            let staged = self.staging_path(fnode);
            fs::remove_file(&staged).map_err(|e| PlayerError::io(&staged, e))?;
        }
        Ok(())
    }

    /// Verifies the materialized tree against the FSM and removes the
    /// staging directory. After sealing, only real paths remain; their
    /// shared inodes keep every Fnode's content alive.
    pub fn seal(&self, fsm: &Fsm) -> PlayerResult<()> {
        for (fnode, state) in fsm.live_nodes() {
            let path = self.staging_path(*fnode);
            let meta = fs::metadata(&path).map_err(|e| PlayerError::io(&path, e))?;
            if meta.len() != state.size {
                return Err(PlayerError::HintsViolation {
                    detail: format!(
                        "fnode {} materialized {} bytes, expected {}",
                        fnode.0,
                        meta.len(),
                        state.size
                    ),
                });
            }
        }
        fs::remove_dir_all(&self.staging).map_err(|e| PlayerError::io(&self.staging, e))?;
        Ok(())
    }
}

/// Removes a directory tree, tolerating its absence.
pub(crate) fn remove_dir_if_present(dir: &Path) -> PlayerResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PlayerError::io(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_materializer() -> (TempDir, Materializer) {
        let tmp = TempDir::new().unwrap();
        let mat = Materializer::new(tmp.path().join("replica")).unwrap();
        (tmp, mat)
    }

    #[test]
    fn test_create_write_link_produces_target_file() {
        let (_tmp, mat) = test_materializer();
        let fnode = Fnode(1);

        mat.create(fnode).unwrap();
        mat.write_at(fnode, 0, b"hello world").unwrap();
        mat.link(fnode, "data/store.dat").unwrap();

        let content = fs::read(mat.root().join("data/store.dat")).unwrap();
        assert_eq!(content, b"hello world");
    }

    #[test]
    fn test_write_at_offset_extends_file() {
        let (_tmp, mat) = test_materializer();
        let fnode = Fnode(1);

        mat.create(fnode).unwrap();
        mat.write_at(fnode, 0, b"aaaa").unwrap();
        mat.write_at(fnode, 4, b"bbbb").unwrap();
        mat.link(fnode, "f").unwrap();

        assert_eq!(fs::read(mat.root().join("f")).unwrap(), b"aaaabbbb");
    }

    #[test]
    fn test_links_share_content() {
        let (_tmp, mat) = test_materializer();
        let fnode = Fnode(3);

        mat.create(fnode).unwrap();
        mat.link(fnode, "a").unwrap();
        mat.link(fnode, "b").unwrap();
        mat.write_at(fnode, 0, b"shared").unwrap();

        assert_eq!(fs::read(mat.root().join("a")).unwrap(), b"shared");
        assert_eq!(fs::read(mat.root().join("b")).unwrap(), b"shared");
    }

    #[test]
    fn test_unlink_released_removes_staging() {
        let (_tmp, mat) = test_materializer();
        let fnode = Fnode(1);

        mat.create(fnode).unwrap();
        mat.link(fnode, "f").unwrap();
        mat.unlink(fnode, "f", true).unwrap();

        assert!(!mat.root().join("f").exists());
        assert!(!mat.root().join(STAGING_DIR).join("1").exists());
    }

    #[test]
    fn test_escaping_path_rejected() {
        let (_tmp, mat) = test_materializer();
        let fnode = Fnode(1);
        mat.create(fnode).unwrap();

        assert!(matches!(
            mat.link(fnode, "../escape"),
            Err(PlayerError::UnsafePath(_))
        ));
        assert!(matches!(
            mat.link(fnode, "/abs/path"),
            Err(PlayerError::UnsafePath(_))
        ));
    }

    #[test]
    fn test_teardown_is_tolerant_of_absence() {
        let (_tmp, mat) = test_materializer();
        remove_dir_if_present(mat.root()).unwrap();
        remove_dir_if_present(mat.root()).unwrap();
        assert!(!mat.root().exists());
    }

    #[test]
    fn test_new_clears_previous_remnants() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("replica");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("stale"), b"old").unwrap();

        let mat = Materializer::new(&root).unwrap();
        assert!(!mat.root().join("stale").exists());
    }
}
