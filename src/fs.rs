//! The file system facade: boot/format/sync, the open file table, and
//! every public namespace, file, and directory operation.
//!
//! Public operations resolve a path to inodes, load the affected inode
//! sector, mutate inode/dirent/data sectors in place, and allocate or
//! free bitmap bits as needed. Execution is strictly sequential; each
//! call runs to completion against the in-memory disk image, and the
//! backing file only changes on [`FileSystem::sync`].

use crate::bitmap::Bitmap;
use crate::device::{DiskError, SectorDevice, SimDisk};
use crate::error::{FsError, Result};
use crate::inodes::{read_inode, write_inode};
use crate::layout::{
    sectors_for_bytes, DATA_START, DIRENTS_PER_SECTOR, DIRENT_BYTES, INODE_BITMAP_SECTORS,
    INODE_BITMAP_START, INODE_TABLE_SECTORS, INODE_TABLE_START, MAX_FILES, MAX_FILE_BYTES,
    MAX_OPEN_FILES, MAX_SECTORS_PER_FILE, ROOT_INODE, SECTOR_BITMAP_SECTORS,
    SECTOR_BITMAP_START, SECTOR_SIZE, SUPERBLOCK_SECTOR, TOTAL_SECTORS,
};
use crate::path::{resolve, ResolveError};
use crate::record::{DirEntry, DiskRecord, Inode, InodeKind};
use crate::superblock::SuperBlock;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const INODE_BITMAP: Bitmap = Bitmap::new(INODE_BITMAP_START, INODE_BITMAP_SECTORS, MAX_FILES);
const SECTOR_BITMAP: Bitmap = Bitmap::new(SECTOR_BITMAP_START, SECTOR_BITMAP_SECTORS, TOTAL_SECTORS);

/// One open file handle: the inode it refers to, the cached file size,
/// and the current read/write position.
#[derive(Debug, Clone, Copy)]
struct OpenFile {
    inode: u32,
    size: u32,
    pos: u32,
}

/// A mounted file system over some sector device.
#[derive(Debug)]
pub struct FileSystem<D: SectorDevice> {
    device: D,
    backing: Option<PathBuf>,
    open_files: [Option<OpenFile>; MAX_OPEN_FILES],
    last_error: Option<FsError>,
}

impl<D: SectorDevice> FileSystem<D> {
    /// Formats a blank device with a fresh, empty file system: magic
    /// superblock, bitmaps with the root inode and all metadata sectors
    /// pre-reserved, and a zeroed inode table holding only the root
    /// directory.
    pub fn format(mut device: D) -> Result<Self> {
        device.write_sector(SUPERBLOCK_SECTOR, &SuperBlock::new().to_bytes())?;

        INODE_BITMAP.initialize(&mut device, 1)?;
        SECTOR_BITMAP.initialize(&mut device, DATA_START)?;

        let zero = [0u8; SECTOR_SIZE];
        for s in 0..INODE_TABLE_SECTORS {
            device.write_sector(INODE_TABLE_START + s, &zero)?;
        }
        write_inode(&mut device, ROOT_INODE, &Inode::empty(InodeKind::Directory))?;

        info!(
            "formatted file system: {} sectors, {} reserved for metadata",
            TOTAL_SECTORS, DATA_START
        );

        return Ok(Self::mounted(device));
    }

    /// Mounts an already formatted device, verifying the magic tag.
    pub fn open_device(device: D) -> Result<Self> {
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_sector(SUPERBLOCK_SECTOR, &mut buf)?;

        if SuperBlock::from_bytes(&buf).is_none() {
            warn!("superblock magic mismatch, not a formatted image");
            return Err(FsError::General);
        }

        return Ok(Self::mounted(device));
    }

    fn mounted(device: D) -> Self {
        return Self {
            device,
            backing: None,
            open_files: [None; MAX_OPEN_FILES],
            last_error: None,
        };
    }

    /// The failure code of the most recent unsuccessful operation.
    #[inline]
    pub fn last_error(&self) -> Option<FsError> {
        return self.last_error;
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(code) = &result {
            self.last_error = Some(*code);
        }

        return result;
    }

    // ----- namespace operations -----

    /// Creates an empty regular file. The path must name a non-existent
    /// entry inside an existing directory.
    pub fn create_file(&mut self, path: &str) -> Result<()> {
        debug!("create_file '{}'", path);
        let result = self.do_create(InodeKind::File, path);
        return self.track(result);
    }

    /// Creates an empty directory.
    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        debug!("create_dir '{}'", path);
        let result = self.do_create(InodeKind::Directory, path);
        return self.track(result);
    }

    /// Removes a regular file, freeing its data sectors and its inode.
    /// Fails with `FileInUse` while any descriptor references it.
    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        debug!("remove_file '{}'", path);
        let result = self.do_remove_file(path);
        return self.track(result);
    }

    /// Removes an empty directory. The root cannot be removed.
    pub fn remove_dir(&mut self, path: &str) -> Result<()> {
        debug!("remove_dir '{}'", path);
        let result = self.do_remove_dir(path);
        return self.track(result);
    }

    // ----- file operations -----

    /// Opens a regular file and returns its descriptor, the index of the
    /// claimed open-file slot.
    pub fn open(&mut self, path: &str) -> Result<usize> {
        debug!("open '{}'", path);
        let result = self.do_open(path);
        return self.track(result);
    }

    /// Releases an open descriptor.
    pub fn close(&mut self, fd: usize) -> Result<()> {
        debug!("close fd {}", fd);
        let result = self.do_close(fd);
        return self.track(result);
    }

    /// Reads up to `out.len()` bytes from the current position, returning
    /// the number of bytes delivered (0 at end of file).
    pub fn read(&mut self, fd: usize, out: &mut [u8]) -> Result<usize> {
        let result = self.do_read(fd, out);
        return self.track(result);
    }

    /// Writes `data` at the current position, extending the file as
    /// needed, and returns the number of bytes written.
    pub fn write(&mut self, fd: usize, data: &[u8]) -> Result<usize> {
        let result = self.do_write(fd, data);
        return self.track(result);
    }

    /// Moves the read/write position. `offset` must lie within
    /// `[0, size]`; returns the new position.
    pub fn seek(&mut self, fd: usize, offset: usize) -> Result<usize> {
        let result = self.do_seek(fd, offset);
        return self.track(result);
    }

    // ----- directory operations -----

    /// Byte size of a directory: its entry count times the on-disk size
    /// of one entry.
    pub fn dir_size(&mut self, path: &str) -> Result<usize> {
        let result = self.do_dir_size(path);
        return self.track(result);
    }

    /// Copies every live entry of a directory into `out`, in storage
    /// order, and returns the entry count. `out` must hold all of them.
    pub fn read_dir(&mut self, path: &str, out: &mut [DirEntry]) -> Result<usize> {
        let result = self.do_read_dir(path, out);
        return self.track(result);
    }

    // ----- create internals -----

    fn do_create(&mut self, kind: InodeKind, path: &str) -> Result<()> {
        let resolved = match resolve(&self.device, path) {
            Ok(r) => r,
            Err(ResolveError::Device) => return Err(FsError::General),
            Err(ResolveError::BadPath) => return Err(FsError::Create),
        };

        if resolved.child.is_some() {
            debug!("create '{}': already exists", path);
            return Err(FsError::Create);
        }

        return self.add_entry(kind, resolved.parent, &resolved.name);
    }

    /// Allocates an inode for a new child and links it into the parent.
    /// The inode bit is released again if any later step fails.
    fn add_entry(&mut self, kind: InodeKind, parent_inode: u32, name: &str) -> Result<()> {
        let child_inode = match INODE_BITMAP.allocate(&mut self.device)? {
            Some(bit) => bit as u32,
            None => {
                debug!("add_entry '{}': inode table is full", name);
                return Err(FsError::Create);
            }
        };

        if let Err(code) = self.install_entry(kind, parent_inode, child_inode, name) {
            let _ = INODE_BITMAP.free(&mut self.device, child_inode as usize);
            return Err(code);
        }

        debug!("created '{}' as inode {}", name, child_inode);
        return Ok(());
    }

    fn install_entry(
        &mut self,
        kind: InodeKind,
        parent_inode: u32,
        child_inode: u32,
        name: &str,
    ) -> Result<()> {
        write_inode(&mut self.device, child_inode, &Inode::empty(kind))?;

        let mut parent = read_inode(&self.device, parent_inode)?;
        if !parent.is_directory() {
            return Err(FsError::Create);
        }

        // The parent's size picks the dirent group and the slot within
        // it; a size on a group boundary means the group needs a sector.
        let group = parent.size as usize / DIRENTS_PER_SECTOR;
        let slot = parent.size as usize % DIRENTS_PER_SECTOR;

        // A directory can address no more dirent sectors than any other
        // inode can address data sectors.
        if group >= MAX_SECTORS_PER_FILE {
            debug!("add_entry '{}': directory is full", name);
            return Err(FsError::Create);
        }

        let mut buf = [0u8; SECTOR_SIZE];
        let mut fresh_sector = None;
        let sector;

        if slot == 0 {
            let allocated = match SECTOR_BITMAP.allocate(&mut self.device)? {
                Some(bit) => bit,
                None => {
                    debug!("add_entry '{}': no free sector for dirents", name);
                    return Err(FsError::Create);
                }
            };

            parent.data[group] = allocated as u32;
            fresh_sector = Some(allocated);
            sector = allocated;
        } else {
            sector = parent.data[group] as usize;
            self.device.read_sector(sector, &mut buf)?;
        }

        DirEntry::new(name, child_inode).write_slot(&mut buf, slot);

        if let Err(e) = self.device.write_sector(sector, &buf) {
            if let Some(bit) = fresh_sector {
                let _ = SECTOR_BITMAP.free(&mut self.device, bit);
            }
            return Err(e.into());
        }

        parent.size += 1;
        if let Err(code) = write_inode(&mut self.device, parent_inode, &parent) {
            if let Some(bit) = fresh_sector {
                let _ = SECTOR_BITMAP.free(&mut self.device, bit);
            }
            return Err(code);
        }

        return Ok(());
    }

    // ----- remove internals -----

    fn do_remove_file(&mut self, path: &str) -> Result<()> {
        let resolved = match resolve(&self.device, path) {
            Ok(r) => r,
            Err(ResolveError::Device) => return Err(FsError::General),
            Err(ResolveError::BadPath) => return Err(FsError::NoSuchFile),
        };

        let child = match resolved.child {
            Some(inode) => inode,
            None => return Err(FsError::NoSuchFile),
        };

        if self.is_open(child) {
            debug!("remove_file '{}': descriptor still open", path);
            return Err(FsError::FileInUse);
        }

        return self.remove_entry(InodeKind::File, resolved.parent, child);
    }

    fn do_remove_dir(&mut self, path: &str) -> Result<()> {
        let resolved = match resolve(&self.device, path) {
            Ok(r) => r,
            Err(ResolveError::Device) => return Err(FsError::General),
            Err(ResolveError::BadPath) => return Err(FsError::NoSuchDir),
        };

        let child = match resolved.child {
            Some(inode) => inode,
            None => return Err(FsError::NoSuchDir),
        };

        if child == ROOT_INODE {
            return Err(FsError::RootDir);
        }

        return self.remove_entry(InodeKind::Directory, resolved.parent, child);
    }

    /// Unlinks `child_inode` from its parent: frees a file's data
    /// sectors, zeroes and frees the inode, and compacts the parent's
    /// dirent array.
    fn remove_entry(
        &mut self,
        kind: InodeKind,
        parent_inode: u32,
        child_inode: u32,
    ) -> Result<()> {
        let child = read_inode(&self.device, child_inode)?;

        if child.kind != kind {
            debug!("remove inode {}: wrong type", child_inode);
            return Err(FsError::General);
        }

        if child.is_directory() && child.size > 0 {
            return Err(FsError::DirNotEmpty);
        }

        // An empty directory owns no data sectors, so only files have
        // sectors to reclaim here.
        if child.is_file() {
            for sector in child.data.iter() {
                if *sector != 0 {
                    SECTOR_BITMAP.free(&mut self.device, *sector as usize)?;
                }
            }
        }

        write_inode(&mut self.device, child_inode, &Inode::ZERO)?;
        INODE_BITMAP.free(&mut self.device, child_inode as usize)?;

        self.detach_dirent(parent_inode, child_inode)?;

        debug!("removed inode {}", child_inode);
        return Ok(());
    }

    /// Removes the parent's dirent for `child_inode` by swapping the last
    /// live entry into its place and zeroing the vacated slot. When that
    /// empties the final dirent group, the group's sector is released so
    /// a directory of n entries always owns exactly the sectors those
    /// entries need.
    fn detach_dirent(&mut self, parent_inode: u32, child_inode: u32) -> Result<()> {
        let mut parent = read_inode(&self.device, parent_inode)?;

        let live = parent.size as usize;
        if live == 0 {
            return Err(FsError::General);
        }

        let last = live - 1;
        let last_group = last / DIRENTS_PER_SECTOR;
        let last_slot = last % DIRENTS_PER_SECTOR;
        let last_sector = parent.data[last_group] as usize;

        let mut last_buf = [0u8; SECTOR_SIZE];
        self.device.read_sector(last_sector, &mut last_buf)?;
        let last_entry = DirEntry::read_slot(&last_buf, last_slot);

        // Locate the victim among the live slots only.
        let mut victim = None;
        'groups: for group in 0..=last_group {
            let sector = parent.data[group] as usize;

            let mut buf = [0u8; SECTOR_SIZE];
            if group == last_group {
                buf = last_buf;
            } else {
                self.device.read_sector(sector, &mut buf)?;
            }

            let slots = if group == last_group {
                last_slot + 1
            } else {
                DIRENTS_PER_SECTOR
            };

            for slot in 0..slots {
                if DirEntry::read_slot(&buf, slot).inode == child_inode {
                    victim = Some((group, slot, sector, buf));
                    break 'groups;
                }
            }
        }

        let (group, slot, sector, mut buf) = match victim {
            Some(found) => found,
            None => return Err(FsError::General),
        };

        if group == last_group {
            // Victim and last entry share a sector; one write covers both.
            if slot != last_slot {
                last_entry.write_slot(&mut buf, slot);
            }
            DirEntry::clear_slot(&mut buf, last_slot);
            self.device.write_sector(sector, &buf)?;
        } else {
            last_entry.write_slot(&mut buf, slot);
            self.device.write_sector(sector, &buf)?;

            DirEntry::clear_slot(&mut last_buf, last_slot);
            self.device.write_sector(last_sector, &last_buf)?;
        }

        // The departure emptied the final group; release its sector.
        if last_slot == 0 {
            SECTOR_BITMAP.free(&mut self.device, last_sector)?;
            parent.data[last_group] = 0;
        }

        parent.size -= 1;
        write_inode(&mut self.device, parent_inode, &parent)?;

        return Ok(());
    }

    // ----- file internals -----

    fn do_open(&mut self, path: &str) -> Result<usize> {
        let resolved = match resolve(&self.device, path) {
            Ok(r) => r,
            Err(ResolveError::Device) => return Err(FsError::General),
            Err(ResolveError::BadPath) => return Err(FsError::NoSuchFile),
        };

        let child = match resolved.child {
            Some(inode) => inode,
            None => return Err(FsError::NoSuchFile),
        };

        let inode = read_inode(&self.device, child)?;
        if inode.is_directory() {
            debug!("open '{}': not a regular file", path);
            return Err(FsError::General);
        }

        let fd = match self.open_files.iter().position(|slot| slot.is_none()) {
            Some(index) => index,
            None => return Err(FsError::TooManyOpenFiles),
        };

        self.open_files[fd] = Some(OpenFile {
            inode: child,
            size: inode.size,
            pos: 0,
        });

        debug!("open '{}': fd {} (inode {})", path, fd, child);
        return Ok(fd);
    }

    fn do_close(&mut self, fd: usize) -> Result<()> {
        if fd >= MAX_OPEN_FILES || self.open_files[fd].is_none() {
            return Err(FsError::BadFd);
        }

        self.open_files[fd] = None;
        return Ok(());
    }

    fn do_seek(&mut self, fd: usize, offset: usize) -> Result<usize> {
        let file = self.handle(fd)?;

        if offset > file.size as usize {
            return Err(FsError::SeekOutOfBounds);
        }

        if let Some(slot) = self.open_files[fd].as_mut() {
            slot.pos = offset as u32;
        }

        return Ok(offset);
    }

    fn do_read(&mut self, fd: usize, out: &mut [u8]) -> Result<usize> {
        let file = self.handle(fd)?;
        let inode = read_inode(&self.device, file.inode)?;

        let size = file.size as usize;
        let mut pos = file.pos as usize;
        let want = out.len().min(size - pos);

        let mut done = 0;
        while done < want {
            let index = pos / SECTOR_SIZE;
            let offset = pos % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - offset).min(want - done);

            let mut sector = [0u8; SECTOR_SIZE];
            self.device
                .read_sector(inode.data[index] as usize, &mut sector)?;
            out[done..done + chunk].copy_from_slice(&sector[offset..offset + chunk]);

            done += chunk;
            pos += chunk;
        }

        if let Some(slot) = self.open_files[fd].as_mut() {
            slot.pos = pos as u32;
        }

        return Ok(done);
    }

    fn do_write(&mut self, fd: usize, data: &[u8]) -> Result<usize> {
        let file = self.handle(fd)?;

        let pos = file.pos as usize;
        let end = pos + data.len();
        if end > MAX_FILE_BYTES {
            debug!("write fd {}: {} bytes exceeds the file cap", fd, end);
            return Err(FsError::FileTooBig);
        }

        let mut inode = read_inode(&self.device, file.inode)?;

        // Grow the sector run to cover the write range. Newly claimed
        // bits are handed back if the bitmap runs dry partway through.
        let allocated = sectors_for_bytes(file.size as usize);
        let needed = sectors_for_bytes(end);
        let mut fresh = Vec::new();

        for index in allocated..needed {
            match SECTOR_BITMAP.allocate(&mut self.device) {
                Ok(Some(bit)) => {
                    inode.data[index] = bit as u32;
                    fresh.push(bit);
                }
                Ok(None) => {
                    debug!("write fd {}: sector bitmap exhausted", fd);
                    self.release_sectors(&fresh);
                    return Err(FsError::NoSpace);
                }
                Err(e) => {
                    self.release_sectors(&fresh);
                    return Err(e.into());
                }
            }
        }

        // A write never shrinks the file: overwriting in the middle
        // leaves the size alone, writing past the end extends it.
        let new_size = (file.size as usize).max(end) as u32;
        inode.size = new_size;
        if let Err(code) = write_inode(&mut self.device, file.inode, &inode) {
            self.release_sectors(&fresh);
            return Err(code);
        }

        let mut done = 0;
        let mut cursor = pos;
        while done < data.len() {
            let index = cursor / SECTOR_SIZE;
            let offset = cursor % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - offset).min(data.len() - done);
            let sector = inode.data[index] as usize;

            let mut buf = [0u8; SECTOR_SIZE];
            self.device.read_sector(sector, &mut buf)?;
            buf[offset..offset + chunk].copy_from_slice(&data[done..done + chunk]);
            self.device.write_sector(sector, &buf)?;

            done += chunk;
            cursor += chunk;
        }

        if let Some(slot) = self.open_files[fd].as_mut() {
            slot.pos = cursor as u32;
            slot.size = new_size;
        }

        return Ok(data.len());
    }

    fn release_sectors(&mut self, bits: &[usize]) {
        for bit in bits {
            let _ = SECTOR_BITMAP.free(&mut self.device, *bit);
        }
    }

    fn handle(&self, fd: usize) -> Result<OpenFile> {
        return self
            .open_files
            .get(fd)
            .copied()
            .flatten()
            .ok_or(FsError::BadFd);
    }

    fn is_open(&self, inode: u32) -> bool {
        return self
            .open_files
            .iter()
            .flatten()
            .any(|file| file.inode == inode);
    }

    // ----- directory internals -----

    fn resolve_dir(&mut self, path: &str) -> Result<Inode> {
        let resolved = match resolve(&self.device, path) {
            Ok(r) => r,
            Err(ResolveError::Device) => return Err(FsError::General),
            Err(ResolveError::BadPath) => return Err(FsError::NoSuchDir),
        };

        let child = match resolved.child {
            Some(inode) => inode,
            None => return Err(FsError::NoSuchDir),
        };

        let inode = read_inode(&self.device, child)?;
        if !inode.is_directory() {
            return Err(FsError::NoSuchDir);
        }

        return Ok(inode);
    }

    fn do_dir_size(&mut self, path: &str) -> Result<usize> {
        let dir = self.resolve_dir(path)?;
        return Ok(dir.size as usize * DIRENT_BYTES);
    }

    fn do_read_dir(&mut self, path: &str, out: &mut [DirEntry]) -> Result<usize> {
        let dir = self.resolve_dir(path)?;

        let count = dir.size as usize;
        if out.len() < count {
            return Err(FsError::BufferTooSmall);
        }

        let mut copied = 0;
        let mut group = 0;
        while copied < count {
            let mut buf = [0u8; SECTOR_SIZE];
            self.device
                .read_sector(dir.data[group] as usize, &mut buf)?;

            let live = (count - copied).min(DIRENTS_PER_SECTOR);
            for slot in 0..live {
                out[copied] = DirEntry::read_slot(&buf, slot);
                copied += 1;
            }

            group += 1;
        }

        return Ok(count);
    }
}

impl FileSystem<SimDisk> {
    /// Boots from a backing image file. A missing file means a fresh
    /// image is formatted and saved; an existing file must be exactly one
    /// disk long and carry the magic tag. Either way the open file table
    /// starts out empty.
    pub fn boot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match SimDisk::load(path) {
            Ok(disk) => {
                let mut fs = Self::open_device(disk)?;
                fs.backing = Some(path.to_path_buf());
                info!("booted from existing image {}", path.display());
                return Ok(fs);
            }
            Err(DiskError::CannotOpen) => {
                info!("no image at {}, formatting a fresh one", path.display());
                let mut fs = Self::format(SimDisk::new())?;
                fs.backing = Some(path.to_path_buf());
                fs.sync()?;
                return Ok(fs);
            }
            Err(e) => {
                warn!("boot from {} failed: {}", path.display(), e);
                return Err(FsError::General);
            }
        }
    }

    /// Persists the in-memory disk image to the backing file.
    pub fn sync(&mut self) -> Result<()> {
        let result = self.do_sync();
        return self.track(result);
    }

    fn do_sync(&mut self) -> Result<()> {
        let path = match &self.backing {
            Some(path) => path,
            None => return Err(FsError::General),
        };

        self.device.save(path)?;
        debug!("synced image to {}", path.display());

        return Ok(());
    }
}
