//! Directory / itbl layer (spec §4.5): walks a directory's chunk
//! sequence through the tree interface, appending chunks on overflow.

use clydefscore::{NodeId, TreeId, TreeInterface};
use log::trace;
use parking_lot::Mutex;

use crate::chunk::Chunk;
use crate::config::ChunkConfig;
use crate::entry::Entry;
use crate::error::{Error, Result};

/// A single directory's chunk sequence, addressed by `(tid, node_id)`
/// (spec §3). Chunks live at byte offsets `0, stride, 2*stride, …` inside
/// that one tree node.
///
/// `lock` serializes find/insert/update/delete the way spec §5 describes:
/// one write lock per directory, held across a whole logical operation,
/// never nested.
pub struct Directory<'e, E: TreeInterface> {
    engine: &'e E,
    tid: TreeId,
    node_id: NodeId,
    config: ChunkConfig,
    lock: Mutex<()>,
}

/// `(chunk index, slot)`: where an entry lives within its directory.
pub type EntryLocation = (u64, u8);

impl<'e, E: TreeInterface> Directory<'e, E> {
    pub fn new(engine: &'e E, tid: TreeId, node_id: NodeId, config: ChunkConfig) -> Self {
        Self {
            engine,
            tid,
            node_id,
            config,
            lock: Mutex::new(()),
        }
    }

    fn chunk_offset(&self, chunk_idx: u64) -> u64 {
        chunk_idx * self.config.chunk_stride() as u64
    }

    fn read_chunk(&self, chunk_idx: u64) -> Result<Chunk> {
        let mut buf = vec![0u8; self.config.chunk_size()];
        self.engine
            .node_read(self.tid, self.node_id, self.chunk_offset(chunk_idx), &mut buf)?;
        Ok(Chunk::decode(&buf, self.config))
    }

    fn write_chunk(&self, chunk_idx: u64, chunk: &Chunk) -> Result<()> {
        let mut buf = vec![0u8; self.config.chunk_size()];
        chunk.encode(&mut buf);
        self.engine
            .node_write(self.tid, self.node_id, self.chunk_offset(chunk_idx), &buf)?;
        Ok(())
    }

    /// Writes a fresh empty tail chunk at `chunk_idx` (append-on-overflow,
    /// spec §4.5/§9 — `cfs_mk_chunk`'s intended replacement behavior).
    fn append_chunk(&self, chunk_idx: u64) -> Result<()> {
        self.write_chunk(chunk_idx, &Chunk::init(self.config))
    }

    /// `find(name)` (spec §4.5).
    pub fn find(&self, name: &[u8]) -> Result<EntryLocation> {
        let _held = self.lock.lock();
        let mut chunk_idx = 0u64;
        loop {
            let chunk = self.read_chunk(chunk_idx)?;
            match chunk.lookup(name) {
                Ok(slot) => return Ok((chunk_idx, slot)),
                Err(Error::NotFound) => {
                    if chunk.last_chunk() {
                        return Err(Error::NotFound);
                    }
                    chunk_idx += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// `insert(entry)` (spec §4.5): finds the first chunk with room,
    /// appending a fresh tail chunk when the current tail fills up.
    pub fn insert(&self, entry: Entry) -> Result<EntryLocation> {
        let _held = self.lock.lock();
        let mut chunk_idx = 0u64;
        loop {
            let mut chunk = self.read_chunk(chunk_idx)?;

            if chunk.entries_free() > 0 {
                let slot = chunk.entry_insert(entry)?;
                chunk.chunk_sort();
                if chunk.entries_free() == 0 && chunk.last_chunk() {
                    self.append_chunk(chunk_idx + 1)?;
                    chunk.set_last_chunk(false);
                }
                self.write_chunk(chunk_idx, &chunk)?;
                trace!("directory insert: chunk={chunk_idx} slot={slot}");
                return Ok((chunk_idx, slot));
            }

            if !chunk.last_chunk() {
                chunk_idx += 1;
                continue;
            }

            // Full tail without having been appended yet — an invariant
            // violation (spec §4.4 asserts the tail is never full without
            // an immediate append), but recover by appending and retrying
            // rather than propagating a confusing error.
            debug_assert!(false, "tail chunk {chunk_idx} is full but was never appended");
            self.append_chunk(chunk_idx + 1)?;
            chunk.set_last_chunk(false);
            self.write_chunk(chunk_idx, &chunk)?;
            chunk_idx += 1;
        }
    }

    /// `update(slot, new_fields)` (spec §4.5). `mutate` patches the entry
    /// in place; `rename` signals whether the chunk's order vector needs
    /// re-sorting afterward.
    pub fn update(
        &self,
        location: EntryLocation,
        rename: bool,
        mutate: impl FnOnce(&mut Entry),
    ) -> Result<()> {
        let _held = self.lock.lock();
        let (chunk_idx, slot) = location;
        let mut chunk = self.read_chunk(chunk_idx)?;
        {
            let entry = chunk.entry_mut(slot);
            mutate(entry);
        }
        if rename {
            chunk.chunk_sort();
        }
        self.write_chunk(chunk_idx, &chunk)
    }

    /// `delete(slot)` (spec §4.5).
    pub fn delete(&self, location: EntryLocation) -> Result<()> {
        let _held = self.lock.lock();
        let (chunk_idx, slot) = location;
        let mut chunk = self.read_chunk(chunk_idx)?;
        chunk.entry_delete(slot)?;
        chunk.chunk_sort();
        self.write_chunk(chunk_idx, &chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clydefscore::{BlinkEngine, EngineConfig};

    fn entry(ino: u64, name: &str) -> Entry {
        Entry::new(ino, 0o644, 0, 0, name.as_bytes()).unwrap()
    }

    #[test]
    fn directory_overflow_matches_scenario_6() {
        let config = ChunkConfig::new(32).unwrap();
        let engine = BlinkEngine::new(EngineConfig {
            node_pool_capacity: 64,
            payload_pool_capacity: 64,
            // 33 entries over 32-entry chunks spans exactly 2 chunks.
            payload_slot_capacity: config.payload_capacity_for(2),
        });
        let tid = engine.tree_create(2).unwrap();
        let node_id = engine.node_insert(tid).unwrap();
        let dir = Directory::new(&engine, tid, node_id, config);

        for i in 0..33u64 {
            dir.insert(entry(i, &format!("f{i:02}"))).unwrap();
        }

        let first = dir.find(b"f00").unwrap();
        assert_eq!(first.0, 0);
        let last = dir.find(b"f32").unwrap();
        assert_eq!(last.0, 1);

        let first_chunk = dir.read_chunk(0).unwrap();
        assert_eq!(first_chunk.entries_free(), 0);
        assert!(!first_chunk.last_chunk());
        let second_chunk = dir.read_chunk(1).unwrap();
        assert_eq!(second_chunk.entries_free(), 31);
        assert!(second_chunk.last_chunk());
    }

    #[test]
    fn find_update_delete_round_trip() {
        let config = ChunkConfig::new(4).unwrap();
        let engine = BlinkEngine::new(EngineConfig {
            node_pool_capacity: 64,
            payload_pool_capacity: 64,
            // a single entry never outgrows chunk 0.
            payload_slot_capacity: config.payload_capacity_for(1),
        });
        let tid = engine.tree_create(2).unwrap();
        let node_id = engine.node_insert(tid).unwrap();
        let dir = Directory::new(&engine, tid, node_id, config);

        dir.insert(entry(1, "alpha")).unwrap();
        let loc = dir.find(b"alpha").unwrap();

        dir.update(loc, false, |entry| entry.size_bytes = 42).unwrap();
        let chunk = dir.read_chunk(loc.0).unwrap();
        assert_eq!(chunk.entry(loc.1).size_bytes, 42);

        dir.delete(loc).unwrap();
        assert!(matches!(dir.find(b"alpha"), Err(Error::NotFound)));
    }

    #[test]
    fn find_missing_name_is_not_found() {
        let config = ChunkConfig::new(4).unwrap();
        let engine = BlinkEngine::new(EngineConfig {
            node_pool_capacity: 64,
            payload_pool_capacity: 64,
            payload_slot_capacity: config.payload_capacity_for(1),
        });
        let tid = engine.tree_create(2).unwrap();
        let node_id = engine.node_insert(tid).unwrap();
        let dir = Directory::new(&engine, tid, node_id, config);
        assert!(matches!(dir.find(b"nope"), Err(Error::NotFound)));
    }
}
