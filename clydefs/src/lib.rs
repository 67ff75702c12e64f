//! `clydefs` — the chunked inode-table directory storage layer (C6–C7),
//! built on top of `clydefscore`'s tree interface.
//!
//! A *directory* owns a sequence of fixed-size *chunks* inside a single
//! tree node; each chunk holds up to `N` entries plus a trailing
//! freelist/order-vector header. [`directory::Directory`] walks that
//! sequence through any [`clydefscore::TreeInterface`] implementation.

mod chunk;
pub mod config;
mod directory;
mod entry;
mod error;

pub use chunk::Chunk;
pub use config::ChunkConfig;
pub use directory::{Directory, EntryLocation};
pub use entry::Entry;
pub use error::{Error, Result};
