//! Absolute path handling: the legal-name predicate and the resolver.

use crate::device::SectorDevice;
use crate::inodes::InodeCache;
use crate::layout::{DIRENTS_PER_SECTOR, MAX_NAME, MAX_PATH, ROOT_INODE, SECTOR_SIZE};
use crate::record::{DirEntry, Inode};
use log::trace;

/// Why a resolution failed. Device trouble is kept apart from path
/// trouble so callers can report `General` for the former and their own
/// operation-specific code for the latter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Malformed path, illegal component name, missing intermediate
    /// component, or a non-directory used as one.
    BadPath,
    /// The disk layer failed, or an inode record was unreadable.
    Device,
}

/// Outcome of resolving an absolute path: the inode of the directory
/// containing the last component, the component's own inode when it
/// exists, and the component name itself (empty only for `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub parent: u32,
    pub child: Option<u32>,
    pub name: String,
}

/// A legal name is non-empty, shorter than `MAX_NAME`, and drawn from
/// letters, digits, dots, dashes, and underscores.
pub fn legal_name(name: &str) -> bool {
    if name.is_empty() || name.len() >= MAX_NAME {
        return false;
    }

    return name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-');
}

/// Walks an absolute path from the root, one component at a time.
///
/// Every component but the last must name an existing directory; the
/// last may be absent, in which case `child` is `None` and the caller
/// decides whether that is an error. Consecutive separators are ignored.
pub fn resolve(device: &impl SectorDevice, path: &str) -> Result<Resolved, ResolveError> {
    if path.len() >= MAX_PATH || !path.starts_with('/') {
        return Err(ResolveError::BadPath);
    }

    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    trace!("resolve '{}': {} components", path, components.len());

    if components.is_empty() {
        return Ok(Resolved {
            parent: ROOT_INODE,
            child: Some(ROOT_INODE),
            name: String::new(),
        });
    }

    let mut cache = InodeCache::new();
    let mut parent = ROOT_INODE;
    let mut current = Some(ROOT_INODE);

    for (i, component) in components.iter().enumerate() {
        if !legal_name(component) {
            trace!("resolve '{}': illegal name '{}'", path, component);
            return Err(ResolveError::BadPath);
        }

        // The previous component must have resolved to a directory for
        // the walk to continue.
        let dir_inode = match current {
            Some(inode) => inode,
            None => return Err(ResolveError::BadPath),
        };

        let dir = cache
            .read(device, dir_inode)
            .map_err(|_| ResolveError::Device)?;
        if !dir.is_directory() {
            return Err(ResolveError::BadPath);
        }

        parent = dir_inode;
        current = lookup_child(device, &dir, component)?;

        if i == components.len() - 1 {
            return Ok(Resolved {
                parent,
                child: current,
                name: (*component).to_string(),
            });
        }
    }

    // Unreachable: the loop always returns on the last component.
    return Err(ResolveError::BadPath);
}

/// Linear scan of a directory for one name. Only the first `dir.size`
/// dirent slots are valid; anything beyond them is never examined.
fn lookup_child(
    device: &impl SectorDevice,
    dir: &Inode,
    name: &str,
) -> Result<Option<u32>, ResolveError> {
    let mut remaining = dir.size as usize;
    let mut group = 0;

    while remaining > 0 {
        let mut buf = [0u8; SECTOR_SIZE];
        device
            .read_sector(dir.data[group] as usize, &mut buf)
            .map_err(|_| ResolveError::Device)?;

        let live = remaining.min(DIRENTS_PER_SECTOR);
        for slot in 0..live {
            let entry = DirEntry::read_slot(&buf, slot);
            if entry.name() == name {
                return Ok(Some(entry.inode));
            }
        }

        remaining -= live;
        group += 1;
    }

    return Ok(None);
}
