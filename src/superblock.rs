//! The superblock: one reserved sector identifying a formatted image.

use crate::layout::{MAGIC, SECTOR_SIZE};
use crate::record::DiskRecord;
use byteorder::{ByteOrder, LittleEndian};

/// Sector 0 of a formatted image. Only the magic tag is stored; the rest
/// of the sector is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    magic: u32,
}

impl SuperBlock {
    pub fn new() -> Self {
        return Self { magic: MAGIC };
    }
}

impl Default for SuperBlock {
    fn default() -> Self {
        return Self::new();
    }
}

impl DiskRecord for SuperBlock {
    type Bytes = [u8; SECTOR_SIZE];

    fn to_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; SECTOR_SIZE];
        LittleEndian::write_u32(&mut bytes, self.magic);

        return bytes;
    }

    /// Returns `None` when the magic tag does not match, i.e. the sector
    /// does not belong to a formatted image.
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        let magic = LittleEndian::read_u32(bytes);
        if magic != MAGIC {
            return None;
        }

        return Some(Self { magic });
    }
}
