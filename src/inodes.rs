//! Inode table addressing and record access.
//!
//! Inode `i` lives in inode-table sector `INODE_TABLE_START +
//! i / INODES_PER_SECTOR` at byte offset `(i % INODES_PER_SECTOR) *
//! INODE_BYTES`. Reads during path resolution go through a one-sector
//! cache; writes always go straight to the device.

use crate::device::SectorDevice;
use crate::error::{FsError, Result};
use crate::layout::{INODES_PER_SECTOR, INODE_BYTES, INODE_TABLE_START, SECTOR_SIZE};
use crate::record::{DiskRecord, Inode};

#[inline]
pub fn inode_sector(inode: u32) -> usize {
    return INODE_TABLE_START + inode as usize / INODES_PER_SECTOR;
}

#[inline]
pub fn inode_offset(inode: u32) -> usize {
    return (inode as usize % INODES_PER_SECTOR) * INODE_BYTES;
}

/// Reads one inode record from the table.
pub fn read_inode(device: &impl SectorDevice, inode: u32) -> Result<Inode> {
    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(inode_sector(inode), &mut buf)?;

    let offset = inode_offset(inode);
    return Inode::from_bytes(&buf[offset..offset + INODE_BYTES]).ok_or(FsError::General);
}

/// Writes one inode record, read-modify-writing its table sector.
pub fn write_inode(device: &mut impl SectorDevice, inode: u32, record: &Inode) -> Result<()> {
    let sector = inode_sector(inode);

    let mut buf = [0u8; SECTOR_SIZE];
    device.read_sector(sector, &mut buf)?;

    let offset = inode_offset(inode);
    buf[offset..offset + INODE_BYTES].copy_from_slice(&record.to_bytes());
    device.write_sector(sector, &buf)?;

    return Ok(());
}

/// One-sector read cache over the inode table, scoped to a single path
/// resolution. Consecutive lookups that land in the same table sector
/// reuse the buffered copy instead of re-reading the device.
pub struct InodeCache {
    sector: Option<usize>,
    buf: [u8; SECTOR_SIZE],
}

impl InodeCache {
    pub fn new() -> Self {
        return Self {
            sector: None,
            buf: [0u8; SECTOR_SIZE],
        };
    }

    pub fn read(&mut self, device: &impl SectorDevice, inode: u32) -> Result<Inode> {
        let sector = inode_sector(inode);

        if self.sector != Some(sector) {
            device.read_sector(sector, &mut self.buf)?;
            self.sector = Some(sector);
        }

        let offset = inode_offset(inode);
        return Inode::from_bytes(&self.buf[offset..offset + INODE_BYTES]).ok_or(FsError::General);
    }
}

impl Default for InodeCache {
    fn default() -> Self {
        return Self::new();
    }
}
