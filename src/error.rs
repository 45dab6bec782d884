use core::fmt;

/// Failure code of a file system operation. Exactly one code is produced
/// per failed operation; the most recent one is also kept in the
/// [`FileSystem`](crate::FileSystem) last-error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Disk layer failure, corrupted metadata, or any otherwise
    /// unclassified error.
    General,
    /// Creation failed: the name already exists, the parent chain is
    /// broken, the path is malformed, or allocation was exhausted.
    Create,
    NoSuchFile,
    NoSuchDir,
    TooManyOpenFiles,
    BadFd,
    /// The file still has an open descriptor referencing it.
    FileInUse,
    /// The write would exceed the per-file sector cap.
    FileTooBig,
    /// The sector bitmap is exhausted.
    NoSpace,
    SeekOutOfBounds,
    DirNotEmpty,
    /// The root directory cannot be unlinked.
    RootDir,
    /// The caller's buffer cannot hold every directory entry.
    BufferTooSmall,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FsError::General => "general failure",
            FsError::Create => "cannot create file or directory",
            FsError::NoSuchFile => "no such file",
            FsError::NoSuchDir => "no such directory",
            FsError::TooManyOpenFiles => "too many open files",
            FsError::BadFd => "bad file descriptor",
            FsError::FileInUse => "file is in use",
            FsError::FileTooBig => "file too big",
            FsError::NoSpace => "no space left on disk",
            FsError::SeekOutOfBounds => "seek out of bounds",
            FsError::DirNotEmpty => "directory not empty",
            FsError::RootDir => "cannot unlink the root directory",
            FsError::BufferTooSmall => "buffer too small",
        };

        return write!(f, "{}", text);
    }
}

impl std::error::Error for FsError {}

/// Any disk layer failure surfaces through the public API as `General`.
impl From<crate::device::DiskError> for FsError {
    fn from(_: crate::device::DiskError) -> Self {
        return FsError::General;
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
