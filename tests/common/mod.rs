//! Shared harness for the recovery scenario suites
//!
//! `TestStore` is a deliberately small key/value engine that keeps its
//! whole state in one file and writes through the `RecordedFs` hook;
//! `TestReplica` wraps a Player (and its playback thread) over a shared
//! in-memory log service, so tests exercise the full triad end to end.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tempfile::TempDir;

use aerolog::fsm::FsmHints;
use aerolog::log::{LogName, LogWriter, MemoryLog};
use aerolog::player::{PlayStats, Player, PlayerConfig, PlayerResult};
use aerolog::recorder::{RecordedFs, Recorder};

pub const STORE_FILE: &str = "store.dat";

/// A config with a short read interval so cancellation tests run fast.
pub fn player_config() -> PlayerConfig {
    PlayerConfig {
        block_interval: Duration::from_millis(20),
        ..PlayerConfig::default()
    }
}

/// One-file key/value engine recorded through the filesystem hook.
///
/// Every `put` rewrites the whole store file, locally and through the
/// hook, then commits. The full rewrite keeps recorded segments at the
/// minimum needed to reconstruct the file.
pub struct TestStore {
    root: PathBuf,
    file: PathBuf,
    recorder: Arc<Recorder>,
    values: BTreeMap<String, String>,
}

impl TestStore {
    /// Opens the store under `root`, creating its backing file (and
    /// recording the creation) on first open, or parsing the recovered
    /// file otherwise.
    pub fn open(root: &Path, recorder: Arc<Recorder>) -> Self {
        let file = root.join(STORE_FILE);
        let values = if file.exists() {
            parse_store(&fs::read_to_string(&file).unwrap())
        } else {
            recorder.create(&file).unwrap();
            fs::write(&file, b"").unwrap();
            BTreeMap::new()
        };
        Self {
            root: root.to_path_buf(),
            file,
            recorder,
            values,
        }
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Inserts or replaces a key, rewrites the store file, and commits.
    pub fn put(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        let serialized = serialize_store(&self.values);
        fs::write(&self.file, &serialized).unwrap();
        self.recorder.write_at(&self.file, 0, &serialized).unwrap();
        self.recorder.commit().unwrap();
    }

    pub fn expect_values(&self, expected: &[(&str, &str)]) {
        for (key, value) in expected {
            assert_eq!(self.get(key), Some(*value), "key {:?}", key);
        }
    }
}

fn serialize_store(values: &BTreeMap<String, String>) -> Vec<u8> {
    let mut out = String::new();
    for (k, v) in values {
        out.push_str(k);
        out.push('\t');
        out.push_str(v);
        out.push('\n');
    }
    out.into_bytes()
}

fn parse_store(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A replica in mid-recovery: a Player and its playback thread.
pub struct TestReplica {
    tmp: TempDir,
    dir: PathBuf,
    log: Arc<MemoryLog>,
    pub player: Arc<Player>,
    play: Option<JoinHandle<PlayerResult<PlayStats>>>,
}

impl TestReplica {
    /// Starts playback of `hints` into a fresh temporary directory.
    pub fn start_reading(log: Arc<MemoryLog>, hints: FsmHints) -> Self {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("replica");
        let player = Arc::new(Player::new(hints, &dir, player_config()));

        let play_player = Arc::clone(&player);
        let play_log = Arc::clone(&log);
        let play = thread::spawn(move || play_player.play(play_log.as_ref()));

        Self {
            tmp,
            dir,
            log,
            player,
            play: Some(play),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Promotes the replica: waits for playback to reach the log head,
    /// joins the playback thread, and opens the recovered store with a
    /// fresh Recorder continuing the recovered chain.
    pub fn make_live(&mut self) -> TestStore {
        let fsm = self.player.make_live().unwrap();
        let stats = self
            .play
            .take()
            .expect("play thread already joined")
            .join()
            .unwrap()
            .unwrap();
        assert!(self.player.is_at_log_head());
        // Skipped spans are consumed but never advance the FSM's mark.
        assert!(stats.final_offset >= fsm.mark_offset());

        let recorder = Arc::new(Recorder::new(
            fsm,
            &self.dir,
            Arc::clone(&self.log) as Arc<dyn LogWriter>,
        ));
        TestStore::open(&self.dir, recorder)
    }

    /// Cancels playback and returns the playback thread's result.
    pub fn cancel(&mut self) -> PlayerResult<PlayStats> {
        self.player.cancel().unwrap();
        self.play
            .take()
            .expect("play thread already joined")
            .join()
            .unwrap()
    }
}

/// Convenience for the common "fresh replica from genesis" case.
pub fn genesis_replica(log: Arc<MemoryLog>, name: &LogName) -> TestReplica {
    TestReplica::start_reading(log, FsmHints::empty(name.clone()))
}
