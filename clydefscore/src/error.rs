use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Engine error taxonomy (spec §4.1, §7).
///
/// `bits()` reproduces the wire-level bitmask encoding of the original
/// `treeinterface` ABI (spec §6): every variant's encoding has bit 0 set,
/// so a caller checking only the `GENERIC` bit always gets a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Last-resort error for invariant violations surfaced in release
    /// builds (debug builds `debug_assert!` instead, per spec §7).
    Generic,
    /// A tree/payload pool has no free slots left.
    AllocFailed,
    /// No tree is registered under the given `tid`.
    NoSuchTree,
    /// No node is registered under the given `(tid, nid)`.
    NoSuchNode,
    /// `node_remove`/directory delete targeted an entry that isn't present.
    NoSuchEntry,
    /// `off + len` falls outside `payload.num_bytes`.
    OutOfRange,
    /// The requested resource is locked by another operation and the
    /// caller should retry (reserved for future non-blocking callers).
    Busy,
    /// Propagated from a persistent tree-interface implementation's
    /// underlying I/O. The in-memory engine never returns this itself.
    IoFail,
}

impl Error {
    /// The original ABI's bitmask encoding (spec §6).
    pub const fn bits(self) -> u8 {
        match self {
            Self::Generic | Self::NoSuchEntry | Self::OutOfRange => 0b0000_0001,
            Self::AllocFailed => 0b0000_0101,
            Self::NoSuchTree => 0b0000_1001,
            Self::NoSuchNode => 0b0001_0001,
            Self::Busy => 0b0010_0001,
            Self::IoFail => 0b0100_0001,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Generic => "generic engine error",
            Self::AllocFailed => "pool allocation failed",
            Self::NoSuchTree => "no such tree",
            Self::NoSuchNode => "no such node",
            Self::NoSuchEntry => "no such entry",
            Self::OutOfRange => "offset/length out of range for payload",
            Self::Busy => "resource busy",
            Self::IoFail => "I/O error",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Asserts `bits()` against spec §6's literal bitmask encoding
    /// (`GENERIC(1)`, `ALLOC_FAILED(5)`, `NO_SUCH_TREE(9)`,
    /// `NO_SUCH_NODE(17)`, `BUSY(33)`, `IO(65)`), not just the
    /// every-variant-has-bit-0-set property.
    #[test]
    fn bits_match_the_documented_wire_encoding() {
        assert_eq!(Error::Generic.bits(), 1);
        assert_eq!(Error::NoSuchEntry.bits(), 1);
        assert_eq!(Error::OutOfRange.bits(), 1);
        assert_eq!(Error::AllocFailed.bits(), 5);
        assert_eq!(Error::NoSuchTree.bits(), 9);
        assert_eq!(Error::NoSuchNode.bits(), 17);
        assert_eq!(Error::Busy.bits(), 33);
        assert_eq!(Error::IoFail.bits(), 65);
    }

    #[test]
    fn every_variant_carries_the_generic_bit() {
        let all = [
            Error::Generic,
            Error::AllocFailed,
            Error::NoSuchTree,
            Error::NoSuchNode,
            Error::NoSuchEntry,
            Error::OutOfRange,
            Error::Busy,
            Error::IoFail,
        ];
        for err in all {
            assert_eq!(err.bits() & 0b1, 0b1, "{err:?} must carry the GENERIC bit");
        }
    }
}
