//! Black-box coverage of the directory/itbl layer (spec §4.5/§8) driven
//! entirely through `clydefscore::TreeInterface` + `clydefs::Directory`,
//! mirroring how a VFS adapter (out of scope here) would actually call in.

use clydefs::{ChunkConfig, Directory, Entry, Error};
use clydefscore::{BlinkEngine, EngineConfig, TreeInterface};

/// `chunk_count` must cover every chunk the test's directory can reach,
/// including a chunk appended-but-never-filled when an insert exactly
/// drains the prior tail (spec §4.5 step 2 appends before the caller's
/// last write lands).
fn harness(entries_per_chunk: u16, chunk_count: usize) -> (BlinkEngine, ChunkConfig) {
    let config = ChunkConfig::new(entries_per_chunk).unwrap();
    let engine = BlinkEngine::new(EngineConfig {
        node_pool_capacity: 128,
        payload_pool_capacity: 128,
        payload_slot_capacity: config.payload_capacity_for(chunk_count),
    });
    (engine, config)
}

fn entry(ino: u64, name: &str) -> Entry {
    Entry::new(ino, 0o644, 0, 0, name.as_bytes()).unwrap()
}

#[test]
fn insert_then_find_everything_back() {
    let (engine, config) = harness(8, 1);
    let tid = engine.tree_create(2).unwrap();
    let node_id = engine.node_insert(tid).unwrap();
    let dir = Directory::new(&engine, tid, node_id, config);

    let names = ["zeta", "alpha", "mu", "beta", "gamma"];
    for (i, name) in names.iter().enumerate() {
        dir.insert(entry(i as u64, name)).unwrap();
    }
    for name in names {
        assert!(dir.find(name.as_bytes()).is_ok());
    }
    assert!(matches!(dir.find(b"missing"), Err(Error::NotFound)));
}

#[test]
fn overflow_spans_multiple_chunks_and_both_remain_searchable() {
    let (engine, config) = harness(4, 3);
    let tid = engine.tree_create(2).unwrap();
    let node_id = engine.node_insert(tid).unwrap();
    let dir = Directory::new(&engine, tid, node_id, config);

    for i in 0..10u64 {
        dir.insert(entry(i, &format!("n{i}"))).unwrap();
    }

    // first chunk (4 entries) is full and no longer the tail
    let first = dir.find(b"n0").unwrap();
    assert_eq!(first.0, 0);
    // second chunk (4 more) also fills and stops being the tail
    let mid = dir.find(b"n4").unwrap();
    assert_eq!(mid.0, 1);
    // third chunk holds the remainder and is still the tail
    let last = dir.find(b"n9").unwrap();
    assert_eq!(last.0, 2);
}

#[test]
fn delete_then_insert_reuses_freed_slot_across_a_chunk() {
    // the 4th insert drains chunk 0's last slot, which appends an (empty)
    // chunk 1 before the replacement entry ever gets inserted.
    let (engine, config) = harness(4, 2);
    let tid = engine.tree_create(2).unwrap();
    let node_id = engine.node_insert(tid).unwrap();
    let dir = Directory::new(&engine, tid, node_id, config);

    for i in 0..4u64 {
        dir.insert(entry(i, &format!("n{i}"))).unwrap();
    }
    let loc = dir.find(b"n2").unwrap();
    dir.delete(loc).unwrap();
    assert!(matches!(dir.find(b"n2"), Err(Error::NotFound)));

    dir.insert(entry(99, "replacement")).unwrap();
    assert!(dir.find(b"replacement").is_ok());
}

#[test]
fn update_patches_fields_without_losing_the_entry() {
    let (engine, config) = harness(8, 1);
    let tid = engine.tree_create(2).unwrap();
    let node_id = engine.node_insert(tid).unwrap();
    let dir = Directory::new(&engine, tid, node_id, config);

    dir.insert(entry(5, "file.bin")).unwrap();
    let loc = dir.find(b"file.bin").unwrap();
    dir.update(loc, false, |e| e.size_bytes = 1024).unwrap();

    // still findable under the same name after a non-renaming update
    let loc_again = dir.find(b"file.bin").unwrap();
    assert_eq!(loc_again, loc);
}
