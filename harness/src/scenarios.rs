//! The six concrete scenarios from spec §8, reproduced exactly as CLI-driven
//! checks independent of `cargo test` — for manual/exploratory verification
//! of the engine and chunk module (C8), matching the teacher's
//! `sky-bench`-style "drive the real thing, print pass/fail" harness shape
//! rather than a unit-test shape.

use std::sync::Arc;

use clydefs::config::ChunkConfig;
use clydefs::{Directory, Entry};
use clydefscore::{BlinkEngine, EngineConfig, TreeId, TreeInterface};

use crate::error::{ensure, ensure_eq, Result};

pub struct Scenario {
    pub id: u32,
    pub name: &'static str,
    pub run: fn() -> Result<()>,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: 1,
        name: "insert-in-order-to-split",
        run: insert_in_order_to_split,
    },
    Scenario {
        id: 2,
        name: "insert-out-of-order",
        run: insert_out_of_order,
    },
    Scenario {
        id: 3,
        name: "concurrent-insert-split",
        run: concurrent_insert_split,
    },
    Scenario {
        id: 4,
        name: "remove-shift",
        run: remove_shift,
    },
    Scenario {
        id: 5,
        name: "chunk-insert-delete-reinsert",
        run: chunk_insert_delete_reinsert,
    },
    Scenario {
        id: 6,
        name: "directory-overflow",
        run: directory_overflow,
    },
];

fn small_engine() -> BlinkEngine {
    BlinkEngine::new(EngineConfig {
        node_pool_capacity: 4096,
        payload_pool_capacity: 8,
        payload_slot_capacity: 8,
    })
}

/// spec §8 scenario 1: k=2, insert keys 1..5 in order, expect exactly one
/// root split, leaves {1,2} and {3,4,5}.
fn insert_in_order_to_split() -> Result<()> {
    let engine = small_engine();
    let tid: TreeId = engine.tree_create(2)?;
    let tree = engine.debug_tree(tid)?;
    for key in 1..=5u64 {
        tree.insert(key, key)?;
    }
    let leaves = tree.leaves();
    ensure_eq(leaves.clone(), vec![vec![1, 2], vec![3, 4, 5]], "leaves after 1..=5")?;
    log::info!("scenario 1: leaves = {leaves:?}");
    Ok(())
}

/// spec §8 scenario 2: k=2, insert 3,1,4,2,5, in-order traversal yields
/// 1,2,3,4,5.
fn insert_out_of_order() -> Result<()> {
    let engine = small_engine();
    let tid = engine.tree_create(2)?;
    let tree = engine.debug_tree(tid)?;
    for key in [3, 1, 4, 2, 5] {
        tree.insert(key, key)?;
    }
    ensure_eq(tree.inorder_keys(), vec![1, 2, 3, 4, 5], "inorder after 3,1,4,2,5")?;
    Ok(())
}

/// spec §8 scenario 3: two threads inserting odds/evens 1..=1000
/// concurrently; after join, in-order traversal yields 1..=1000.
fn concurrent_insert_split() -> Result<()> {
    let engine = Arc::new(BlinkEngine::new(EngineConfig {
        node_pool_capacity: 65536,
        payload_pool_capacity: 8,
        payload_slot_capacity: 8,
    }));
    let tid = engine.tree_create(2)?;

    let a = {
        let engine = engine.clone();
        std::thread::spawn(move || -> Result<()> {
            let tree = engine.debug_tree(tid)?;
            for key in (1..=999).step_by(2) {
                tree.insert(key, key)?;
            }
            Ok(())
        })
    };
    let b = {
        let engine = engine.clone();
        std::thread::spawn(move || -> Result<()> {
            let tree = engine.debug_tree(tid)?;
            for key in (2..=1000).step_by(2) {
                tree.insert(key, key)?;
            }
            Ok(())
        })
    };
    a.join().expect("thread a panicked")?;
    b.join().expect("thread b panicked")?;

    let tree = engine.debug_tree(tid)?;
    ensure_eq(tree.inorder_keys(), (1..=1000).collect::<Vec<_>>(), "inorder after concurrent insert")?;
    Ok(())
}

/// spec §8 scenario 4: k=2, insert 3,1,2,7,5,6,8,4; remove 8,4,2;
/// in-order traversal yields 1,3,5,6,7.
fn remove_shift() -> Result<()> {
    let engine = small_engine();
    let tid = engine.tree_create(2)?;
    let tree = engine.debug_tree(tid)?;
    for key in [3, 1, 2, 7, 5, 6, 8, 4] {
        tree.insert(key, key)?;
    }
    for key in [8, 4, 2] {
        tree.remove(key)?;
    }
    ensure_eq(tree.inorder_keys(), vec![1, 3, 5, 6, 7], "inorder after remove 8,4,2")?;
    Ok(())
}

/// spec §8 scenario 5: N=32; insert "a","b","c"; delete "b"; insert "d";
/// after `chunk_sort`, off_list yields "a","c","d"; exactly one freelist
/// bit still clear (the two never-used slots beyond those three stay
/// free, plus the reused one).
fn chunk_insert_delete_reinsert() -> Result<()> {
    let config = ChunkConfig::default();
    let mut chunk = clydefs::Chunk::init(config);
    let entry = |ino: u64, name: &str| Entry::new(ino, 0o644, 0, 0, name.as_bytes()).unwrap();

    chunk.entry_insert(entry(1, "a"))?;
    let slot_b = chunk.entry_insert(entry(2, "b"))?;
    chunk.entry_insert(entry(3, "c"))?;
    chunk.chunk_sort();

    chunk.entry_delete(slot_b)?;
    let slot_d = chunk.entry_insert(entry(4, "d"))?;
    ensure_eq(slot_d, slot_b, "freed slot must be reused by the next insert")?;
    chunk.chunk_sort();

    let names = chunk.ordered_names();
    ensure_eq(
        names.clone(),
        vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()],
        "ordered names after reinsert",
    )?;
    ensure_eq(chunk.entries_free(), config.entries_per_chunk() as u8 - 3, "entries_free after 3 live entries")?;
    log::info!("scenario 5: ordered names = {:?}", names);
    Ok(())
}

/// spec §8 scenario 6: N=32; insert 33 entries into an empty directory;
/// directory now has 2 chunks; first chunk full and non-terminal, second
/// chunk has 31 free slots and is the tail.
fn directory_overflow() -> Result<()> {
    let config = ChunkConfig::new(32).unwrap();
    let engine = BlinkEngine::new(EngineConfig {
        node_pool_capacity: 64,
        payload_pool_capacity: 64,
        // 33 entries over 32-entry chunks spans exactly 2 chunks.
        payload_slot_capacity: config.payload_capacity_for(2),
    });
    let tid = engine.tree_create(2)?;
    let node_id = engine.node_insert(tid)?;
    let dir = Directory::new(&engine, tid, node_id, config);

    for i in 0..33u64 {
        dir.insert(Entry::new(i, 0o644, 0, 0, format!("f{i:02}").as_bytes()).unwrap())?;
    }

    let first = dir.find(b"f00")?;
    ensure_eq(first.0, 0, "f00 lives in chunk 0")?;
    let last = dir.find(b"f32")?;
    ensure_eq(last.0, 1, "34th entry (f32) lives in chunk 1")?;

    ensure(dir.find(b"f99").is_err(), "f99 was never inserted")?;
    log::info!("scenario 6: 33 entries split across 2 chunks, f00 at chunk {}, f32 at chunk {}", first.0, last.0);
    Ok(())
}
