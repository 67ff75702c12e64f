//! On-node chunk format (spec §4.4): a fixed-size array of entries plus a
//! trailing freelist/order-vector header, stored inside a single B-link
//! tree node's payload.
//!
//! The freelist scan is byte-wise, lowest-set-bit-first, the same
//! discipline as the teacher's `skymap::bitmask` module and
//! `clydefscore::alloc`'s node/payload pools — three independent
//! allocators sharing one small idea rather than one shared type, since
//! this crate and `clydefscore` don't otherwise depend on each other's
//! internals.

use crate::config::{ChunkConfig, OFFSET_UNUSED};
use crate::entry::Entry;
use crate::error::{Error, Result};

pub struct Chunk {
    config: ChunkConfig,
    entries: Vec<Entry>,
    freelist: Vec<u8>,
    off_list: Vec<u8>,
    entries_free: u8,
    last_chunk: bool,
}

impl Chunk {
    /// `chunk_init(c)` (spec §4.4): all slots free, empty order vector,
    /// tail of its directory until told otherwise.
    pub fn init(config: ChunkConfig) -> Self {
        let n = config.entries_per_chunk() as usize;
        Self {
            entries: vec![Entry::default(); n],
            freelist: vec![0xFF; config.freelist_bytes()],
            off_list: vec![OFFSET_UNUSED; n],
            entries_free: config.entries_per_chunk() as u8,
            last_chunk: true,
            config,
        }
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    pub fn entries_free(&self) -> u8 {
        self.entries_free
    }

    pub fn last_chunk(&self) -> bool {
        self.last_chunk
    }

    pub fn set_last_chunk(&mut self, last_chunk: bool) {
        self.last_chunk = last_chunk;
    }

    pub fn used(&self) -> usize {
        self.config.entries_per_chunk() as usize - self.entries_free as usize
    }

    pub fn entry(&self, slot: u8) -> &Entry {
        &self.entries[slot as usize]
    }

    pub fn entry_mut(&mut self, slot: u8) -> &mut Entry {
        &mut self.entries[slot as usize]
    }

    /// Names referenced by `off_list[0..used]`, in their current order —
    /// used by tests to assert scenario §8.5/§8.6's exact orderings.
    pub fn ordered_names(&self) -> Vec<Vec<u8>> {
        self.off_list[..self.used()]
            .iter()
            .map(|&slot| self.entries[slot as usize].name().to_vec())
            .collect()
    }

    /// `entry_alloc(c) -> slot` (spec §4.4): linear byte-wise scan of the
    /// freelist, lowest free index first, deterministic. Does not touch
    /// `entries_free` — that's `entry_insert`'s job, per spec.
    fn alloc_slot(&mut self) -> Result<u8> {
        if self.entries_free == 0 {
            debug_assert!(!self.last_chunk, "a full tail chunk violates the chunk invariant");
            return Err(Error::ChunkFull);
        }
        for (byte_idx, byte) in self.freelist.iter_mut().enumerate() {
            if *byte == 0 {
                continue;
            }
            let bit = byte.trailing_zeros() as usize;
            let idx = byte_idx * 8 + bit;
            if idx >= self.entries.len() {
                break;
            }
            *byte &= !(1 << bit);
            return Ok(idx as u8);
        }
        Err(Error::ChunkFull)
    }

    /// `entry_insert(c, e) -> slot` (spec §4.4). Names are unique by
    /// directory contract (spec §9); a duplicate reaching this point is the
    /// caller's invariant violation, not a recoverable condition, so it's
    /// only checked in debug builds.
    pub fn entry_insert(&mut self, entry: Entry) -> Result<u8> {
        debug_assert!(
            self.lookup(entry.name()).is_err(),
            "duplicate name {:?} inserted into a chunk",
            entry.name()
        );
        let used_before = self.used();
        let slot = self.alloc_slot()?;
        self.entries[slot as usize] = entry;
        self.off_list[used_before] = slot;
        self.entries_free -= 1;
        Ok(slot)
    }

    /// `chunk_sort(c)` (spec §4.4): restores `off_list[0..used]` to
    /// ascending name order. The original specifies heapsort; any
    /// comparison sort satisfying the ordering invariant is equivalent, so
    /// this uses the standard library's pattern-defeating quicksort.
    pub fn chunk_sort(&mut self) {
        let used = self.used();
        let entries = &self.entries;
        self.off_list[..used].sort_by(|&a, &b| entries[a as usize].name().cmp(entries[b as usize].name()));
    }

    /// `entry_delete(c, slot)` (spec §4.4). The chunk invariant
    /// `entries_free + |off_list live entries| = N` (spec §8) requires
    /// `entries_free` to be incremented here, even though spec §4.4's
    /// prose only states the freelist-bit and `off_list` updates
    /// explicitly — see `DESIGN.md`.
    ///
    /// `off_list[0..used]` must stay hole-free: `entry_insert` always
    /// appends at the current tail, so the freed position is closed by
    /// shifting everything after it left by one rather than left as a
    /// punched-out `OFFSET_UNUSED` in the middle.
    pub fn entry_delete(&mut self, slot: u8) -> Result<()> {
        let idx = slot as usize;
        let used = self.used();
        let pos = self.off_list[..used]
            .iter()
            .position(|&s| s == slot)
            .ok_or(Error::NotFound)?;
        self.freelist[idx / 8] |= 1 << (idx % 8);
        self.off_list.copy_within(pos + 1..used, pos);
        self.off_list[used - 1] = OFFSET_UNUSED;
        self.entries_free += 1;
        Ok(())
    }

    /// `lookup(c, name) -> slot | NotFound` (spec §4.4): binary search over
    /// the sorted order vector.
    pub fn lookup(&self, name: &[u8]) -> Result<u8> {
        let used = self.used();
        let slots = &self.off_list[..used];
        slots
            .binary_search_by(|&slot| self.entries[slot as usize].name().cmp(name))
            .map(|pos| slots[pos])
            .map_err(|_| Error::NotFound)
    }

    /// Serializes the chunk to its exact on-disk layout (spec §6): `N`
    /// entry records followed by the trailing header.
    pub fn encode(&self, dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), self.config.chunk_size());
        let entry_size = ChunkConfig::entry_size();
        let mut rest = dst;
        for entry in &self.entries {
            let (entry_buf, tail) = rest.split_at_mut(entry_size);
            entry.encode(entry_buf);
            rest = tail;
        }
        let freelist_bytes = self.config.freelist_bytes();
        rest[0] = self.entries_free;
        rest[1] = self.last_chunk as u8;
        rest[2..2 + freelist_bytes].copy_from_slice(&self.freelist);
        rest[2 + freelist_bytes..].copy_from_slice(&self.off_list);
    }

    /// Inverse of [`Chunk::encode`].
    pub fn decode(src: &[u8], config: ChunkConfig) -> Self {
        debug_assert_eq!(src.len(), config.chunk_size());
        let entry_size = ChunkConfig::entry_size();
        let n = config.entries_per_chunk() as usize;
        let mut rest = src;
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let (entry_buf, tail) = rest.split_at(entry_size);
            entries.push(Entry::decode(entry_buf));
            rest = tail;
        }
        let freelist_bytes = config.freelist_bytes();
        let entries_free = rest[0];
        let last_chunk = rest[1] != 0;
        let freelist = rest[2..2 + freelist_bytes].to_vec();
        let off_list = rest[2 + freelist_bytes..].to_vec();
        Self {
            config,
            entries,
            freelist,
            off_list,
            entries_free,
            last_chunk,
        }
    }
}
