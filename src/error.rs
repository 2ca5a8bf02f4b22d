//! Error taxonomy for the file system library.
//!
//! The library does not depend on an error-handling crate: every public
//! operation returns `Result<_, Error>`, and `Error` wraps `std::io::Error`
//! for device failures the same way `fdisk::disk`/`mkfs::ext2` propagate
//! `io::Result` with `?`.

use std::fmt;
use std::io;

/// The kinds of failure a file system operation can report.
#[derive(Debug)]
pub enum Error {
    /// The block device signalled failure on open/read/write.
    Io(io::Error),
    /// The superblock's signature does not match `ECS150FS`.
    InvalidSignature,
    /// The superblock's `total_blocks` disagrees with the device's block
    /// count.
    BlockCountMismatch,
    /// A file name is empty, too long, or otherwise malformed.
    InvalidName,
    /// `create` was called with a name that already exists.
    NameExists,
    /// `open`/`delete` was called with a name that does not exist.
    NameNotFound,
    /// The root directory has no free slot.
    DirectoryFull,
    /// A handle is out of range or not currently open.
    InvalidHandle,
    /// The open-file table has no free slot.
    OpenTableFull,
    /// `umount`/`delete` was attempted on a file that is still open.
    FileOpen,
    /// A FAT chain failed to terminate within `data_block_count` hops;
    /// defensive detection of the cycle called for in the design notes.
    Corrupt(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "device I/O error: {e}"),
            Self::InvalidSignature => write!(f, "invalid superblock signature"),
            Self::BlockCountMismatch => {
                write!(f, "superblock total_blocks does not match the device")
            }
            Self::InvalidName => write!(f, "invalid file name"),
            Self::NameExists => write!(f, "file already exists"),
            Self::NameNotFound => write!(f, "no such file"),
            Self::DirectoryFull => write!(f, "root directory is full"),
            Self::InvalidHandle => write!(f, "invalid or closed file handle"),
            Self::OpenTableFull => write!(f, "too many open files"),
            Self::FileOpen => write!(f, "file is currently open"),
            Self::Corrupt(what) => write!(f, "corrupt file system: {what}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
