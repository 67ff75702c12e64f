//! The tree interface (spec §4.3/§6): a uniform operation table over the
//! B-link tree engine, synthesizing `nid`s and payload slots on
//! `node_insert` so callers never see pool indices directly.

use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::tree::Tree;
use crate::{NodeId, TreeId};

/// Fixed pool sizes handed to every [`Tree`] a [`BlinkEngine`] creates.
///
/// The original reserves one 4 MiB × 1,500-slot payload pool per engine at
/// startup (spec §4.6); this workspace defaults to a far smaller footprint
/// so tests and the harness don't reserve gigabytes of address space just
/// to exercise the engine (see `DESIGN.md`). The *shape* of the contract —
/// fixed slot size, pre-reserved, non-growable — is unchanged.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Tree-node slots reserved per tree at `tree_create`.
    pub node_pool_capacity: usize,
    /// Payload slots reserved per tree at `tree_create`.
    pub payload_pool_capacity: usize,
    /// Byte capacity of each payload slot.
    pub payload_slot_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_pool_capacity: 4096,
            payload_pool_capacity: 4096,
            payload_slot_capacity: 64 * 1024,
        }
    }
}

/// The tree-interface ABI of spec §6, realized as a trait instead of a
/// function-pointer table (spec §9) so a persistent engine could someday
/// sit behind the same surface without touching `clydefs`.
pub trait TreeInterface {
    fn tree_create(&self, k: u8) -> Result<TreeId>;
    fn tree_remove(&self, tid: TreeId) -> Result<()>;
    fn node_insert(&self, tid: TreeId) -> Result<NodeId>;
    fn node_remove(&self, tid: TreeId, nid: NodeId) -> Result<()>;
    fn node_read(&self, tid: TreeId, nid: NodeId, off: u64, dst: &mut [u8]) -> Result<()>;
    fn node_write(&self, tid: TreeId, nid: NodeId, off: u64, src: &[u8]) -> Result<()>;
}

/// The single registered `TreeInterface` implementation (spec §4.3): an
/// in-memory B-link tree engine backed by a lock-free [`Registry`].
pub struct BlinkEngine {
    registry: Registry,
    config: EngineConfig,
}

impl BlinkEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
        }
    }

    fn tree(&self, tid: TreeId) -> Result<Arc<Tree>> {
        self.registry.lookup(tid)
    }
}

impl Default for BlinkEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Exposes a registered tree's raw introspection helpers (spec §9's
/// `dbg_blinktree_*`) to callers outside this crate. Only compiled with
/// the `debug-tools` feature, and only meant for the harness binary and
/// manual inspection — never used by `clydefs` or by the engine itself.
#[cfg(any(test, feature = "debug-tools"))]
impl BlinkEngine {
    pub fn debug_tree(&self, tid: TreeId) -> Result<Arc<Tree>> {
        self.registry.lookup(tid)
    }
}

impl TreeInterface for BlinkEngine {
    fn tree_create(&self, k: u8) -> Result<TreeId> {
        let tree = Tree::new(
            k,
            self.config.node_pool_capacity,
            self.config.payload_pool_capacity,
            self.config.payload_slot_capacity,
        )?;
        let tid = self.registry.insert(Arc::new(tree));
        debug!("tree_create: k={k} -> tid={}", tid.0);
        Ok(tid)
    }

    fn tree_remove(&self, tid: TreeId) -> Result<()> {
        self.registry.remove(tid)?;
        debug!("tree_remove: tid={}", tid.0);
        Ok(())
    }

    fn node_insert(&self, tid: TreeId) -> Result<NodeId> {
        let tree = self.tree(tid)?;
        let nid = tree.alloc_nid();
        let payload_idx = match tree.alloc_payload() {
            Ok(idx) => idx,
            Err(err) => {
                debug!("node_insert: tid={} payload pool exhausted", tid.0);
                return Err(err);
            }
        };
        tree.insert(nid, payload_idx as u64)?;
        Ok(NodeId(nid))
    }

    fn node_remove(&self, tid: TreeId, nid: NodeId) -> Result<()> {
        let tree = self.tree(tid)?;
        tree.remove(nid.0).map_err(|err| match err {
            Error::NoSuchEntry => Error::NoSuchNode,
            other => other,
        })
    }

    fn node_read(&self, tid: TreeId, nid: NodeId, off: u64, dst: &mut [u8]) -> Result<()> {
        let tree = self.tree(tid)?;
        tree.read(nid.0, off, dst)
    }

    fn node_write(&self, tid: TreeId, nid: NodeId, off: u64, src: &[u8]) -> Result<()> {
        let tree = self.tree(tid)?;
        tree.write(nid.0, off, src)
    }
}
