//! `clydefscore` — the concurrent B-link tree engine and tree-object
//! namespace that backs `clydefs`.
//!
//! A *tree* is an independent ordered index keyed by `u64` (the key space
//! doubles as the "nid" — node identifier — of whatever the caller is
//! storing). A *node*, from the caller's point of view, is a variable-length
//! byte payload addressed by `(tid, nid)`. Internally the index itself is
//! built out of B-link structural nodes (see [`tree`]); those are a
//! different thing from the caller-visible "node" and are never named `nid`
//! anywhere in this crate's public surface, to keep the two concepts
//! separate.
//!
//! Reads (`lookup`, `node_read`) never take a lock: they use acquire loads
//! on a hand-over-hand, link-right descent. Writes (`node_insert`,
//! `node_remove`, `node_write`) serialize per B-link node with a
//! [`parking_lot::Mutex`] and publish new state to readers with release
//! stores, exactly as described in the module docs of [`tree`].

mod alloc;
mod error;
mod interface;
mod node;
mod registry;
mod stack;
mod tree;

pub use error::{Error, Result};
pub use interface::{BlinkEngine, EngineConfig, TreeInterface};
pub use stack::Stack;
pub use tree::Tree;

/// Identifies an independent tree (index) within an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(pub u64);

/// Identifies a caller-visible node (payload) within a tree.
///
/// This is the same value space as the keys stored in the underlying
/// B-link tree: inserting a node assigns it a fresh, monotonically
/// increasing `nid` and uses that value as the tree key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Reserved sentinel: a key slot that a writer is in the middle of
/// publishing. Never a valid key (valid keys, i.e. nids, start at 1).
/// Readers that see this value in a key slot skip that index and continue
/// scanning, rather than treating it as a match.
pub const KEY_IN_FLIGHT: u64 = 0;

/// Reserved sentinel: the conceptual "infinite" high key carried by the
/// rightmost node of every level in the tree.
pub const TREE_MAX_NID: u64 = u64::MAX;
