use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

/// Sentinel used in `sibling`/`children` slots for "no node here" — distinct
/// from [`crate::KEY_IN_FLIGHT`] and [`crate::TREE_MAX_NID`], which live in
/// key space, not pool-index space.
pub(crate) const NIL: u64 = u64::MAX;

/// A B-link tree structural node: an index node of the in-memory B-link
/// tree itself, not to be confused with the caller-visible "node"
/// (`tid`/`nid` pair) that the tree indexes.
///
/// `keys`/`children` are sized `2k+1` for the owning tree's `k` (spec §3):
/// a node is safe at `<= 2k` keys and is split when a write pushes it to
/// `2k+1`. For leaves, `children[i]` is a payload-pool index; for internal
/// nodes it is another `BNode`'s pool index.
///
/// Every field a concurrent, lock-free reader touches is either an atomic
/// (`numkeys`, `sibling`, `keys[i]`, `children[i]`) or immutable after
/// construction (`is_leaf` is only ever set once, before the node is
/// reachable, but is still an atomic so Miri/TSan see it as a plain shared
/// read rather than a data race). `lock` exists purely for serializing
/// writers against each other; readers never take it.
pub(crate) struct BNode {
    pub lock: Mutex<()>,
    pub is_leaf: AtomicBool,
    pub numkeys: AtomicU8,
    pub sibling: AtomicU64,
    pub keys: Box<[AtomicU64]>,
    pub children: Box<[AtomicU64]>,
}

impl BNode {
    /// Builds a node with `width` key/child slots, all zeroed and detached
    /// (`sibling = NIL`). Used both for pool pre-allocation and for
    /// resetting a reclaimed slot before it's handed back out.
    pub fn empty(width: usize) -> Self {
        Self {
            lock: Mutex::new(()),
            is_leaf: AtomicBool::new(true),
            numkeys: AtomicU8::new(0),
            sibling: AtomicU64::new(NIL),
            keys: (0..width).map(|_| AtomicU64::new(0)).collect(),
            children: (0..width).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.keys.len()
    }
}
