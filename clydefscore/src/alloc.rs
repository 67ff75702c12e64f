use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::node::BNode;

/// Byte-wise freelist bitmap: 1 = free, scanned lowest-set-bit-first so
/// allocation is deterministic (lowest free index always wins), matching
/// the teacher's `skymap::bitmask` scan discipline. Shared by both pools
/// below rather than duplicated per pool.
struct Bitmask {
    bytes: Vec<u8>,
    len: usize,
}

impl Bitmask {
    fn all_free(len: usize) -> Self {
        let nbytes = len.div_ceil(8);
        let mut bytes = vec![0xFFu8; nbytes];
        let tail_bits = len % 8;
        if tail_bits != 0 {
            let last = bytes.len() - 1;
            bytes[last] = (1u8 << tail_bits) - 1;
        }
        Self { bytes, len }
    }

    fn alloc(&mut self) -> Option<usize> {
        for (byte_idx, byte) in self.bytes.iter_mut().enumerate() {
            if *byte == 0 {
                continue;
            }
            let bit = byte.trailing_zeros() as usize;
            let idx = byte_idx * 8 + bit;
            if idx >= self.len {
                return None;
            }
            *byte &= !(1 << bit);
            return Some(idx);
        }
        None
    }

    fn free(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "freeing out-of-range slot {idx}");
        let byte_idx = idx / 8;
        let bit = idx % 8;
        debug_assert!(
            self.bytes[byte_idx] & (1 << bit) == 0,
            "double free of slot {idx}"
        );
        self.bytes[byte_idx] |= 1 << bit;
    }
}

/// Fixed-size, non-growable pool of [`BNode`]s owned by a single tree.
///
/// Non-growable by design: slots hold `Mutex`es and atomics whose addresses
/// readers and the node's own writer hold onto across a descent; a `Vec`
/// that reallocates on growth would invalidate every live reference. The
/// pool is sized once, at `tree_create`, from the tree's expected node
/// count.
pub(crate) struct NodePool {
    width: usize,
    slots: Box<[BNode]>,
    free: Mutex<Bitmask>,
}

impl NodePool {
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            width,
            slots: (0..capacity).map(|_| BNode::empty(width)).collect(),
            free: Mutex::new(Bitmask::all_free(capacity)),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn alloc(&self) -> Result<usize> {
        self.free.lock().alloc().ok_or(Error::AllocFailed)
    }

    pub fn release(&self, idx: usize) {
        let node = &self.slots[idx];
        node.is_leaf.store(true, Ordering::Relaxed);
        node.numkeys.store(0, Ordering::Relaxed);
        node.sibling.store(crate::node::NIL, Ordering::Relaxed);
        for k in node.keys.iter() {
            k.store(0, Ordering::Relaxed);
        }
        for c in node.children.iter() {
            c.store(0, Ordering::Relaxed);
        }
        self.free.lock().free(idx);
    }

    pub fn get(&self, idx: usize) -> &BNode {
        &self.slots[idx]
    }
}

/// A fixed-capacity payload buffer. `num_bytes` is this payload's usable
/// length (spec §3) — for the uniform-slot allocator below it is always
/// the pool's slot capacity, set once at allocation time; `data` is the
/// backing storage, locked only for the duration of a single `memcpy` in
/// or out.
pub(crate) struct Payload {
    pub num_bytes: AtomicU32,
    pub data: Mutex<Box<[u8]>>,
}

/// Fixed-size pool of uniform payload buffers (spec §4.6). The original
/// reserves 4 MiB × 1,500 slots at startup; this workspace defaults to a
/// much smaller footprint (see [`crate::interface::EngineConfig`]) so tests
/// and the harness don't pay for gigabytes of address space up front, while
/// keeping the same fixed-slot-size, no-growth contract.
pub(crate) struct PayloadPool {
    slot_capacity: usize,
    slots: Box<[Payload]>,
    free: Mutex<Bitmask>,
}

impl PayloadPool {
    pub fn new(capacity: usize, slot_capacity: usize) -> Self {
        Self {
            slot_capacity,
            slots: (0..capacity)
                .map(|_| Payload {
                    num_bytes: AtomicU32::new(0),
                    data: Mutex::new(vec![0u8; slot_capacity].into_boxed_slice()),
                })
                .collect(),
            free: Mutex::new(Bitmask::all_free(capacity)),
        }
    }

    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    pub fn alloc(&self) -> Result<usize> {
        let idx = self.free.lock().alloc().ok_or(Error::AllocFailed)?;
        self.slots[idx]
            .num_bytes
            .store(self.slot_capacity as u32, Ordering::Relaxed);
        Ok(idx)
    }

    pub fn release(&self, idx: usize) {
        self.slots[idx].num_bytes.store(0, Ordering::Relaxed);
        self.free.lock().free(idx);
    }

    pub fn get(&self, idx: usize) -> &Payload {
        &self.slots[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_pool_allocates_lowest_free_first() {
        let pool = NodePool::new(4, 5);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        pool.release(a);
        let c = pool.alloc().unwrap();
        assert_eq!(c, 0);
    }

    #[test]
    fn node_pool_exhausts() {
        let pool = NodePool::new(2, 5);
        pool.alloc().unwrap();
        pool.alloc().unwrap();
        assert!(matches!(pool.alloc(), Err(Error::AllocFailed)));
    }

    #[test]
    fn payload_pool_roundtrips_bytes() {
        let pool = PayloadPool::new(2, 16);
        let idx = pool.alloc().unwrap();
        let payload = pool.get(idx);
        assert_eq!(payload.num_bytes.load(Ordering::Acquire), 16);
        payload.data.lock()[0..5].copy_from_slice(b"hello");
        assert_eq!(&payload.data.lock()[0..5], b"hello");
        pool.release(idx);
        assert_eq!(payload.num_bytes.load(Ordering::Acquire), 0);
    }
}
