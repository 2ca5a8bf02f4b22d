//! The block device contract (`spec.md` §6.1), and a `File`-backed
//! implementation of it.
//!
//! Mirrors the teacher's disk-access code (`fdisk::disk::get_disk_size`,
//! `mkfs::ext2`'s direct `File` + `Seek` + `Read`/`Write` usage): block
//! devices and plain disk-image files are both supported, with the real
//! block-device size queried through the same `BLKGETSIZE64` ioctl.

use libc::ioctl;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use crate::BLOCK_SIZE;

/// ioctl macro: command.
macro_rules! ioc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        (($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
    };
}

/// ioctl macro: read command.
macro_rules! ior {
    ($a:expr, $b:expr, $c:ty) => {
        ioc!(2, $a, $b, std::mem::size_of::<$c>() as u64)
    };
}

/// ioctl command: get the size of a block device in bytes.
const BLKGETSIZE64: u64 = ior!(0x12, 114, u64);

/// An opaque, byte-addressable store of fixed-size [`BLOCK_SIZE`] blocks.
///
/// This is the out-of-scope "external collaborator" from `spec.md` §1 made
/// concrete: the file system core only ever talks to its device through
/// this trait.
pub trait BlockDevice: Sized {
    /// Opens the device at `path` for exclusive use.
    fn open(path: &Path) -> io::Result<Self>;

    /// Returns the number of addressable blocks.
    fn block_count(&self) -> usize;

    /// Reads exactly one block into `buf`.
    ///
    /// `block_idx` must be in `[0, block_count())`; `buf` must be exactly
    /// [`BLOCK_SIZE`] bytes.
    fn read_block(&mut self, block_idx: usize, buf: &mut [u8]) -> io::Result<()>;

    /// Writes exactly one block from `buf`.
    ///
    /// `block_idx` must be in `[0, block_count())`; `buf` must be exactly
    /// [`BLOCK_SIZE`] bytes.
    fn write_block(&mut self, block_idx: usize, buf: &[u8]) -> io::Result<()>;
}

/// A [`BlockDevice`] backed by a regular file or a real block device node.
pub struct FileBlockDevice {
    file: File,
    block_count: usize,
}

impl BlockDevice for FileBlockDevice {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let block_count = (device_size(path, &file)? / BLOCK_SIZE as u64) as usize;
        Ok(Self { file, block_count })
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&mut self, block_idx: usize, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        self.file
            .seek(SeekFrom::Start((block_idx * BLOCK_SIZE) as u64))?;
        self.file.read_exact(buf)
    }

    fn write_block(&mut self, block_idx: usize, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        self.file
            .seek(SeekFrom::Start((block_idx * BLOCK_SIZE) as u64))?;
        self.file.write_all(buf)
    }
}

/// Returns the size in bytes of the device at `path`.
///
/// For a block/char device, queries the kernel via `BLKGETSIZE64`; for a
/// regular file (the common case: a disk image), uses its length.
fn device_size(path: &Path, file: &File) -> io::Result<u64> {
    let file_type = fs::metadata(path)?.file_type();

    if file_type.is_block_device() || file_type.is_char_device() {
        let mut size: u64 = 0;
        let ret = unsafe { ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size)
    } else {
        Ok(file.metadata()?.len())
    }
}
