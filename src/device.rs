//! The disk layer contract and the simulated disk that backs it.
//!
//! The file system only ever talks to a [`SectorDevice`]: whole-sector
//! reads and writes, nothing else. [`SimDisk`] is the reference device, a
//! fixed array of sectors held in memory and persisted to a host image
//! file on demand.

use crate::layout::{DISK_BYTES, SECTOR_SIZE, TOTAL_SECTORS};
use core::fmt;
use log::warn;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Failure kind of a disk layer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// The backing image file does not exist.
    CannotOpen,
    /// The backing image file exists but is not exactly one disk long.
    BadImageSize,
    /// Sector index outside the disk.
    OutOfRange,
    /// Host I/O failure.
    Io,
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiskError::CannotOpen => "cannot open the backing image",
            DiskError::BadImageSize => "backing image has the wrong size",
            DiskError::OutOfRange => "sector index out of range",
            DiskError::Io => "disk I/O failure",
        };

        return write!(f, "{}", text);
    }
}

impl std::error::Error for DiskError {}

/// Fixed-size sector storage. Transfers are whole sectors only; there are
/// no partial reads or writes.
pub trait SectorDevice {
    fn read_sector(&self, sector: usize, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError>;

    fn write_sector(&mut self, sector: usize, buf: &[u8; SECTOR_SIZE]) -> Result<(), DiskError>;
}

/// The simulated disk: `TOTAL_SECTORS` sectors of `SECTOR_SIZE` bytes,
/// all in memory. Durability is explicit via [`SimDisk::save`].
#[derive(Debug)]
pub struct SimDisk {
    image: Vec<u8>,
}

impl SimDisk {
    /// A blank, all-zero disk.
    pub fn new() -> Self {
        return Self {
            image: vec![0u8; DISK_BYTES],
        };
    }

    /// Populates a disk from a host image file.
    ///
    /// Fails with [`DiskError::CannotOpen`] when the file is absent, so
    /// the caller can tell "format a fresh image" apart from real I/O
    /// trouble, and with [`DiskError::BadImageSize`] when the file is not
    /// exactly `DISK_BYTES` long.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DiskError> {
        let path = path.as_ref();

        let image = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(DiskError::CannotOpen),
            Err(e) => {
                warn!("failed to read image {}: {}", path.display(), e);
                return Err(DiskError::Io);
            }
        };

        if image.len() != DISK_BYTES {
            warn!(
                "image {} is {} bytes, expected {}",
                path.display(),
                image.len(),
                DISK_BYTES
            );
            return Err(DiskError::BadImageSize);
        }

        return Ok(Self { image });
    }

    /// Persists the in-memory disk to a host image file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DiskError> {
        let path = path.as_ref();

        if let Err(e) = fs::write(path, &self.image) {
            warn!("failed to write image {}: {}", path.display(), e);
            return Err(DiskError::Io);
        }

        return Ok(());
    }
}

impl Default for SimDisk {
    fn default() -> Self {
        return Self::new();
    }
}

impl SectorDevice for SimDisk {
    fn read_sector(&self, sector: usize, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        if sector >= TOTAL_SECTORS {
            return Err(DiskError::OutOfRange);
        }

        let offset = sector * SECTOR_SIZE;
        buf.copy_from_slice(&self.image[offset..offset + SECTOR_SIZE]);

        return Ok(());
    }

    fn write_sector(&mut self, sector: usize, buf: &[u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        if sector >= TOTAL_SECTORS {
            return Err(DiskError::OutOfRange);
        }

        let offset = sector * SECTOR_SIZE;
        self.image[offset..offset + SECTOR_SIZE].copy_from_slice(buf);

        return Ok(());
    }
}
