//! On-disk directory entry record (spec §6), exact and little-endian.

use bytes::Buf;
use bytes::BufMut;

use crate::config::{ChunkConfig, NAME_MAX};
use crate::error::{Error, Result};

/// One inode entry inside a chunk. Mirrors `struct cfsd_ientry` from the
/// original (`original_source/fs/clydefs/clydefs_disk.h`), minus the
/// kernel-only `__inode_unused` padding field (folded here into an
/// explicit reserved `u16`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub ino: u64,
    pub uid: u32,
    pub gid: u32,
    pub mtime: u64,
    pub ctime: u64,
    pub size_bytes: u64,
    pub mode: u16,
    pub nlen: u32,
    pub child_itbl_tid: u64,
    pub child_itbl_nid: u64,
    pub name: [u8; NAME_MAX],
}

impl Entry {
    /// Builds an entry for `name`; fails if `name` exceeds [`NAME_MAX`]
    /// bytes.
    pub fn new(ino: u64, mode: u16, uid: u32, gid: u32, name: &[u8]) -> Result<Self> {
        if name.len() > NAME_MAX {
            return Err(Error::NameTooLong(name.len()));
        }
        let mut buf = [0u8; NAME_MAX];
        buf[..name.len()].copy_from_slice(name);
        Ok(Self {
            ino,
            uid,
            gid,
            mtime: 0,
            ctime: 0,
            size_bytes: 0,
            mode,
            nlen: name.len() as u32,
            child_itbl_tid: 0,
            child_itbl_nid: 0,
            name: buf,
        })
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.nlen as usize]
    }

    pub fn set_name(&mut self, name: &[u8]) -> Result<()> {
        if name.len() > NAME_MAX {
            return Err(Error::NameTooLong(name.len()));
        }
        self.name = [0u8; NAME_MAX];
        self.name[..name.len()].copy_from_slice(name);
        self.nlen = name.len() as u32;
        Ok(())
    }

    pub fn encode(&self, mut dst: impl BufMut) {
        dst.put_u64_le(self.ino);
        dst.put_u32_le(self.uid);
        dst.put_u32_le(self.gid);
        dst.put_u64_le(self.mtime);
        dst.put_u64_le(self.ctime);
        dst.put_u64_le(self.size_bytes);
        dst.put_u16_le(self.mode);
        dst.put_u16_le(0); // reserved
        dst.put_u32_le(self.nlen);
        dst.put_u64_le(self.child_itbl_tid);
        dst.put_u64_le(self.child_itbl_nid);
        dst.put_slice(&self.name);
    }

    pub fn decode(mut src: impl Buf) -> Self {
        let ino = src.get_u64_le();
        let uid = src.get_u32_le();
        let gid = src.get_u32_le();
        let mtime = src.get_u64_le();
        let ctime = src.get_u64_le();
        let size_bytes = src.get_u64_le();
        let mode = src.get_u16_le();
        let _reserved = src.get_u16_le();
        let nlen = src.get_u32_le();
        let child_itbl_tid = src.get_u64_le();
        let child_itbl_nid = src.get_u64_le();
        let mut name = [0u8; NAME_MAX];
        src.copy_to_slice(&mut name);
        Self {
            ino,
            uid,
            gid,
            mtime,
            ctime,
            size_bytes,
            mode,
            nlen,
            child_itbl_tid,
            child_itbl_nid,
            name,
        }
    }
}

const _: () = assert!(ChunkConfig::entry_size() == 319);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let entry = Entry::new(42, 0o755, 1000, 1000, b"a.txt").unwrap();
        let mut buf = Vec::with_capacity(ChunkConfig::entry_size());
        entry.encode(&mut buf);
        assert_eq!(buf.len(), ChunkConfig::entry_size());
        let decoded = Entry::decode(&buf[..]);
        assert_eq!(decoded.ino, 42);
        assert_eq!(decoded.mode, 0o755);
        assert_eq!(decoded.name(), b"a.txt");
    }

    #[test]
    fn rejects_overlong_names() {
        let name = vec![b'x'; NAME_MAX + 1];
        assert!(matches!(
            Entry::new(1, 0, 0, 0, &name),
            Err(Error::NameTooLong(_))
        ));
    }
}
