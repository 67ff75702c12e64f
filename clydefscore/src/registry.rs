use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::Atomic;
use crossbeam_epoch::Owned;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::tree::Tree;
use crate::TreeId;

/// Maps `tid -> Arc<Tree>` (spec §4.2). Lookups never take a lock: they
/// read a `crossbeam_epoch`-guarded snapshot of a copy-on-write `Vec`.
/// Mutations (`insert`/`remove`) take the list lock, clone the current
/// snapshot, mutate the clone, and swap it in, deferring destruction of the
/// old snapshot until no reader can still be holding it — the same
/// publish-a-new-version-under-epoch-protection pattern the teacher's
/// `engine::idx::mtchm` index uses for its bucket array.
pub(crate) struct Registry {
    trees: Atomic<Vec<Option<Arc<Tree>>>>,
    list_lock: Mutex<()>,
    next_tid: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            trees: Atomic::new(Vec::new()),
            list_lock: Mutex::new(()),
            next_tid: AtomicU64::new(1),
        }
    }

    /// Lock-free lookup: pins the current epoch, takes a snapshot
    /// reference, and clones the `Arc` out if present. No registry lock is
    /// ever taken here.
    pub fn lookup(&self, tid: TreeId) -> Result<Arc<Tree>> {
        let guard = crossbeam_epoch::pin();
        let snapshot = self.trees.load(Ordering::Acquire, &guard);
        let vec = unsafe { snapshot.as_ref() }.expect("registry snapshot always initialized");
        let idx = (tid.0 as usize).checked_sub(1).ok_or(Error::NoSuchTree)?;
        vec.get(idx)
            .and_then(|slot| slot.clone())
            .ok_or(Error::NoSuchTree)
    }

    /// Registers a freshly built tree under a new `tid` and returns it.
    pub fn insert(&self, tree: Arc<Tree>) -> TreeId {
        let _held = self.list_lock.lock();
        let tid = TreeId(self.next_tid.fetch_add(1, Ordering::Relaxed));
        let idx = tid.0 as usize - 1;

        let guard = crossbeam_epoch::pin();
        let old = self.trees.load(Ordering::Acquire, &guard);
        let mut new_vec = unsafe { old.as_ref() }.cloned().unwrap_or_default();
        if new_vec.len() <= idx {
            new_vec.resize(idx + 1, None);
        }
        new_vec[idx] = Some(tree);

        let old = self.trees.swap(Owned::new(new_vec), Ordering::Release, &guard);
        unsafe { guard.defer_destroy(old) };
        tid
    }

    /// Unlinks `tid` from the registry. The tree's `Arc` is simply dropped
    /// from the snapshot; if readers still hold clones from a prior
    /// `lookup`, the tree and its pools stay alive until those clones drop
    /// (spec §9's deferred-reclamation resolution — see `DESIGN.md`).
    pub fn remove(&self, tid: TreeId) -> Result<()> {
        let _held = self.list_lock.lock();
        let guard = crossbeam_epoch::pin();
        let old = self.trees.load(Ordering::Acquire, &guard);
        let old_vec = unsafe { old.as_ref() }.ok_or(Error::NoSuchTree)?;
        let idx = (tid.0 as usize).checked_sub(1).ok_or(Error::NoSuchTree)?;
        if old_vec.get(idx).and_then(|s| s.as_ref()).is_none() {
            return Err(Error::NoSuchTree);
        }

        let mut new_vec = old_vec.clone();
        new_vec[idx] = None;
        let old = self.trees.swap(Owned::new(new_vec), Ordering::Release, &guard);
        unsafe { guard.defer_destroy(old) };
        Ok(())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let guard = crossbeam_epoch::pin();
        let old = self.trees.swap(Owned::new(Vec::new()), Ordering::AcqRel, &guard);
        unsafe { guard.defer_destroy(old) };
    }
}
