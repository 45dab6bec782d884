//! Fixed-size on-disk records and their byte encoding.
//!
//! Every record is stored little-endian so an image written on one host
//! is readable on any other, regardless of native byte order.

use crate::layout::{DIRENT_BYTES, INODE_BYTES, MAX_NAME, MAX_SECTORS_PER_FILE, SECTOR_SIZE};
use byteorder::{ByteOrder, LittleEndian};

/// A record with a fixed on-disk representation.
pub trait DiskRecord {
    type Bytes;

    /// Encodes the record into its on-disk byte array.
    fn to_bytes(&self) -> Self::Bytes;

    /// Decodes a record. Returns `None` if the bytes are too short or
    /// do not describe a valid record.
    fn from_bytes(bytes: &[u8]) -> Option<Self>
    where
        Self: core::marker::Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum InodeKind {
    File = 0,
    Directory = 1,
}

impl InodeKind {
    fn from_u32(n: u32) -> Option<Self> {
        return match n {
            0 => Some(InodeKind::File),
            1 => Some(InodeKind::Directory),
            _ => None,
        };
    }
}

/// Metadata record for one file or directory.
///
/// `size` is the byte length for a file and the number of live directory
/// entries for a directory. `data` holds data sector indices filled
/// densely from slot 0; unused slots are 0, which is never a valid data
/// sector (it is the superblock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub size: u32,
    pub kind: InodeKind,
    pub data: [u32; MAX_SECTORS_PER_FILE],
}

impl Inode {
    /// An all-zero record: an empty regular file with no data sectors.
    /// Also the representation of a freed inode-table slot.
    pub const ZERO: Self = Self {
        size: 0,
        kind: InodeKind::File,
        data: [0; MAX_SECTORS_PER_FILE],
    };

    pub fn empty(kind: InodeKind) -> Self {
        return Self { kind, ..Self::ZERO };
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        return self.kind == InodeKind::Directory;
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        return self.kind == InodeKind::File;
    }
}

impl DiskRecord for Inode {
    type Bytes = [u8; INODE_BYTES];

    fn to_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; INODE_BYTES];

        LittleEndian::write_u32(&mut bytes[0..], self.size);
        LittleEndian::write_u32(&mut bytes[4..], self.kind as u32);

        let mut offset = 8;
        for sector in self.data.iter() {
            LittleEndian::write_u32(&mut bytes[offset..], *sector);
            offset += 4;
        }

        return bytes;
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < INODE_BYTES {
            return None;
        }

        let size = LittleEndian::read_u32(&bytes[0..]);
        let kind = InodeKind::from_u32(LittleEndian::read_u32(&bytes[4..]))?;

        let mut data = [0u32; MAX_SECTORS_PER_FILE];
        let mut offset = 8;
        for slot in data.iter_mut() {
            *slot = LittleEndian::read_u32(&bytes[offset..]);
            offset += 4;
        }

        return Some(Self { size, kind, data });
    }
}

/// One (name, inode) pair inside a directory's data sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Null-terminated name, padded with zero bytes.
    pub name: [u8; MAX_NAME],
    pub inode: u32,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: [0; MAX_NAME],
        inode: 0,
    };

    /// Builds an entry from an already validated legal name.
    pub fn new(name: &str, inode: u32) -> Self {
        let mut buf = [0u8; MAX_NAME];
        buf[..name.len()].copy_from_slice(name.as_bytes());

        return Self { name: buf, inode };
    }

    /// The name up to its null terminator.
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.name.len());

        return core::str::from_utf8(&self.name[..end]).unwrap_or("");
    }

    /// Decodes the entry stored at `slot` of a directory data sector.
    pub fn read_slot(sector: &[u8; SECTOR_SIZE], slot: usize) -> Self {
        let offset = slot * DIRENT_BYTES;

        let mut name = [0u8; MAX_NAME];
        name.copy_from_slice(&sector[offset..offset + MAX_NAME]);
        let inode = LittleEndian::read_u32(&sector[offset + MAX_NAME..]);

        return Self { name, inode };
    }

    /// Encodes the entry into `slot` of a directory data sector.
    pub fn write_slot(&self, sector: &mut [u8; SECTOR_SIZE], slot: usize) {
        let offset = slot * DIRENT_BYTES;

        sector[offset..offset + MAX_NAME].copy_from_slice(&self.name);
        LittleEndian::write_u32(&mut sector[offset + MAX_NAME..], self.inode);
    }

    /// Zeroes `slot` of a directory data sector.
    pub fn clear_slot(sector: &mut [u8; SECTOR_SIZE], slot: usize) {
        let offset = slot * DIRENT_BYTES;
        sector[offset..offset + DIRENT_BYTES].fill(0);
    }
}

impl DiskRecord for DirEntry {
    type Bytes = [u8; DIRENT_BYTES];

    fn to_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; DIRENT_BYTES];

        bytes[..MAX_NAME].copy_from_slice(&self.name);
        LittleEndian::write_u32(&mut bytes[MAX_NAME..], self.inode);

        return bytes;
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DIRENT_BYTES {
            return None;
        }

        let mut name = [0u8; MAX_NAME];
        name.copy_from_slice(&bytes[..MAX_NAME]);
        let inode = LittleEndian::read_u32(&bytes[MAX_NAME..]);

        return Some(Self { name, inode });
    }
}
