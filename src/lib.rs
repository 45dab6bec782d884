//! siltfs is a tiny user-space file system that stores a hierarchical
//! namespace of files and directories on a fixed-size simulated disk.
//! The whole disk lives in a single backing image file; every structure
//! is addressed by 512-byte sector, and all metadata mutations are
//! written through to the disk image before any later operation can
//! observe them.
//!
//! On-disk layout, in order from sector 0:
//! - Superblock (magic tag)
//! - Inode bitmap
//! - Sector bitmap
//! - Inode table
//! - Data blocks
//!
//! The layers, from bottom to top:
//! 1. Sector device: whole-sector reads and writes. [`SimDisk`] is the
//!    provided implementation, an in-memory image with host-file
//!    load/save; anything else can slot in through [`SectorDevice`].
//! 2. Bitmaps: on-disk allocation state for inodes and data sectors.
//! 3. Inode table: densely packed fixed-size records, one per file or
//!    directory.
//! 4. Directories and path resolution: dirent arrays inside directory
//!    data sectors, walked component by component.
//! 5. [`FileSystem`]: boot/format/sync, the open file table, and the
//!    public namespace, file, and directory operations.
//!
//! Records are stored little-endian, so images are portable across
//! hosts. The crate is single-threaded by design: every operation is a
//! synchronous, run-to-completion transaction, and durability is
//! explicit via [`FileSystem::sync`].

mod bitmap;
mod device;
mod error;
mod fs;
mod inodes;
pub mod layout;
mod path;
mod record;
mod superblock;

pub use device::{DiskError, SectorDevice, SimDisk};
pub use error::{FsError, Result};
pub use fs::FileSystem;
pub use record::{DirEntry, DiskRecord, Inode, InodeKind};
pub use superblock::SuperBlock;
