//! End-to-end recovery scenarios
//!
//! Each test drives the full triad over a shared in-memory log service:
//! a Recorder capturing a small key/value engine's file mutations, and
//! Players reconstructing the engine's directory elsewhere.

mod common;

use std::fs;
use std::sync::Arc;

use aerolog::fsm::FsmHints;
use aerolog::log::{LogName, MemoryLog};
use aerolog::recorder::RecordedFs;

use common::{genesis_replica, TestReplica, STORE_FILE};

/// Scenario A: stop a live replica, hand its hints to a successor, and
/// keep going. Values and properties survive each handoff.
#[test]
fn test_recovery_across_handoffs() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/handoffs");

    let mut first = genesis_replica(Arc::clone(&log), &name);
    let mut store = first.make_live();
    store.put("key1", "value one");
    store.put("key2", "value two");
    store.recorder().set_property("identity", "replica-1").unwrap();
    store.recorder().commit().unwrap();
    let hints = store.recorder().build_hints();
    drop(store);
    drop(first);

    let mut second = TestReplica::start_reading(Arc::clone(&log), hints);
    let mut store = second.make_live();
    store.expect_values(&[("key1", "value one"), ("key2", "value two")]);
    assert_eq!(
        store.recorder().get_property("identity"),
        Some("replica-1".to_string())
    );
    store.put("key3", "value three");
    let hints = store.recorder().build_hints();
    drop(store);
    drop(second);

    let mut third = TestReplica::start_reading(log, hints);
    let store = third.make_live();
    store.expect_values(&[
        ("key1", "value one"),
        ("key2", "value two"),
        ("key3", "value three"),
    ]);
}

/// Scenario B: a warm standby tails the log while the primary serves
/// writes; promotion finds everything the primary committed.
#[test]
fn test_warm_standby_promotion() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/standby");

    let mut primary = genesis_replica(Arc::clone(&log), &name);
    let mut store = primary.make_live();

    let mut standby = TestReplica::start_reading(Arc::clone(&log), FsmHints::empty(name));

    for i in 1..=20 {
        store.put(&format!("key{}", i), &format!("value{}", i));
    }

    let recovered = standby.make_live();
    recovered.expect_values(&[("key1", "value1"), ("key20", "value20")]);
    assert_eq!(
        fs::read(recovered.root().join(STORE_FILE)).unwrap(),
        fs::read(store.root().join(STORE_FILE)).unwrap()
    );
}

/// Scenario C: two successors seeded from the same snapshot race to
/// extend the chain. Log order decides the winner; a genesis reader
/// converges to the winner's lineage, while the loser's own hints still
/// recover the loser's view.
#[test]
fn test_conflicting_writers_converge_by_log_order() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/conflict");

    let mut base = genesis_replica(Arc::clone(&log), &name);
    let mut store = base.make_live();
    store.put("key", "base");
    let hints = store.recorder().build_hints();
    drop(store);
    drop(base);

    let mut replica_a = TestReplica::start_reading(Arc::clone(&log), hints.clone());
    let mut replica_b = TestReplica::start_reading(Arc::clone(&log), hints);
    let mut store_a = replica_a.make_live();
    let mut store_b = replica_b.make_live();

    // Same sequence slot; append order makes A the winner.
    store_a.put("winner", "a");
    store_b.put("winner", "b");

    let mut fresh = genesis_replica(Arc::clone(&log), &name);
    let converged = fresh.make_live();
    converged.expect_values(&[("key", "base"), ("winner", "a")]);
    assert_eq!(converged.get("winner"), Some("a"));

    // The losing lineage's hints describe real log ranges; a Player
    // seeded from them reconstructs that lineage's view.
    let loser_hints = store_b.recorder().build_hints();
    let mut from_loser = TestReplica::start_reading(log, loser_hints);
    let loser_view = from_loser.make_live();
    loser_view.expect_values(&[("key", "base"), ("winner", "b")]);
}

/// Replaying the same log from genesis is idempotent: two independent
/// Players materialize byte-identical trees.
#[test]
fn test_genesis_replay_is_idempotent() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/idempotent");

    let mut writer = genesis_replica(Arc::clone(&log), &name);
    let mut store = writer.make_live();
    for i in 1..=10 {
        store.put(&format!("key{}", i), &format!("value{}", i));
    }

    let mut replay1 = genesis_replica(Arc::clone(&log), &name);
    let mut replay2 = genesis_replica(Arc::clone(&log), &name);
    let recovered1 = replay1.make_live();
    let recovered2 = replay2.make_live();

    let bytes1 = fs::read(recovered1.root().join(STORE_FILE)).unwrap();
    let bytes2 = fs::read(recovered2.root().join(STORE_FILE)).unwrap();
    assert_eq!(bytes1, bytes2);
    assert_eq!(bytes1, fs::read(store.root().join(STORE_FILE)).unwrap());
}

/// Properties replicate last-writer-in-log-order, independent of files.
#[test]
fn test_property_replication() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/properties");

    let mut primary = genesis_replica(Arc::clone(&log), &name);
    let store = primary.make_live();
    store.recorder().set_property("epoch", "1").unwrap();
    store.recorder().set_property("epoch", "2").unwrap();
    store.recorder().set_property("region", "east").unwrap();
    store.recorder().commit().unwrap();

    let mut reader = genesis_replica(log, &name);
    let recovered = reader.make_live();
    assert_eq!(recovered.recorder().get_property("epoch"), Some("2".to_string()));
    assert_eq!(
        recovered.recorder().get_property("region"),
        Some("east".to_string())
    );
}

/// Renames replicate: the Fnode keeps its content while its path moves.
#[test]
fn test_rename_replicates() {
    let log = Arc::new(MemoryLog::new());
    let name = LogName::new("recovery/rename");

    let mut primary = genesis_replica(Arc::clone(&log), &name);
    let mut store = primary.make_live();
    store.put("key", "kept across rename");
    store
        .recorder()
        .rename(
            &store.root().join(STORE_FILE),
            &store.root().join("store.renamed"),
        )
        .unwrap();
    store.recorder().commit().unwrap();

    let mut reader = genesis_replica(log, &name);
    let recovered = reader.make_live();
    assert!(!recovered.root().join(STORE_FILE).exists());
    assert_eq!(
        fs::read_to_string(recovered.root().join("store.renamed")).unwrap(),
        "key\tkept across rename\n"
    );
}
