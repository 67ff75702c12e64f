use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Error taxonomy for the chunk and directory layers (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A chunk had no free slot left for `entry_insert` (spec §4.4). The
    /// directory layer handles this internally by appending a chunk; it
    /// only escapes `Directory::insert` if chunk allocation itself fails.
    ChunkFull,
    /// `find`/`update`/`delete` targeted a name or slot that isn't present.
    NotFound,
    /// A name exceeded `NAME_MAX` bytes.
    NameTooLong(usize),
    /// Any tree-interface error surfaces as `Io` (spec §4.5's failure
    /// semantics), keeping the underlying engine error taxonomy out of
    /// this crate's public surface.
    Io(clydefscore::Error),
    /// Invariant violation surfaced in release builds; debug builds
    /// `debug_assert!` instead (spec §7).
    Generic,
}

impl From<clydefscore::Error> for Error {
    fn from(err: clydefscore::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkFull => write!(f, "chunk is full"),
            Self::NotFound => write!(f, "entry not found"),
            Self::NameTooLong(len) => write!(f, "name of {len} bytes exceeds NAME_MAX"),
            Self::Io(err) => write!(f, "tree interface I/O error: {err}"),
            Self::Generic => write!(f, "generic directory-layer error"),
        }
    }
}

impl std::error::Error for Error {}
