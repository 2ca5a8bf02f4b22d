//! The explicit mount context: an owned value tying together the device,
//! superblock, FAT, root directory, and open-file table for one mounted
//! disk image (`spec.md` §9 "Global mutable state").
//!
//! The original treats all of this as process-wide singletons; here it is
//! a value the caller owns, so two images can be mounted side by side and
//! nothing is hidden behind statics. [`crate::facade`] layers a
//! process-global convenience API with the original's singleton feel back
//! on top of this for callers that want it.

use std::path::Path;

use crate::device::{BlockDevice, FileBlockDevice};
use crate::directory::{self, Directory};
use crate::error::Error;
use crate::fat::Fat;
use crate::handle::OpenFileTable;
use crate::io_engine;
use crate::superblock::Superblock;

/// One mounted FAT file system, generic over its backing [`BlockDevice`] so
/// tests can mount an in-memory device instead of a real file.
pub struct FileSystem<D: BlockDevice = FileBlockDevice> {
    device: D,
    superblock: Superblock,
    fat: Fat,
    root: Directory,
    handles: OpenFileTable,
}

/// A snapshot of one occupied root-directory entry, as returned by [`FileSystem::ls`].
pub struct FileInfo {
    pub name: String,
    pub size: u32,
    pub first_block: u16,
}

/// Disk geometry and free-space ratios, as returned by [`FileSystem::info`].
pub struct Info {
    pub total_block_count: u16,
    pub fat_block_count: u8,
    pub root_directory_block: u16,
    pub data_block_start: u16,
    pub data_block_count: u16,
    pub fat_free_count: usize,
    pub root_free_count: usize,
}

impl FileSystem<FileBlockDevice> {
    /// Opens `path` as a [`FileBlockDevice`] and mounts it.
    pub fn mount(path: &Path) -> Result<Self, Error> {
        Self::mount_device(FileBlockDevice::open(path)?)
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// Validates `device`'s superblock and loads the FAT and root directory
    /// (`spec.md` §4.7: open device, validate superblock, load FAT, load
    /// root, clear open-file table, set `FAT[0] = FAT_EOC`).
    pub fn mount_device(mut device: D) -> Result<Self, Error> {
        let superblock = Superblock::load(&mut device)?;
        let mut fat = Fat::load(
            &mut device,
            superblock.fat_block_count as usize,
            superblock.data_block_count as usize,
        )?;
        fat.reserve_entry_zero();
        let root = Directory::load(&mut device, superblock.root_directory_index)?;

        Ok(Self {
            device,
            superblock,
            fat,
            root,
            handles: OpenFileTable::new(),
        })
    }

    /// Flushes the FAT and root directory.
    ///
    /// Fails, leaving the context untouched and still usable, if any handle
    /// is still open (`spec.md` §4.7).
    pub fn umount(&mut self) -> Result<(), Error> {
        if self.handles.any_open() {
            return Err(Error::FileOpen);
        }
        self.fat.flush(&mut self.device)?;
        self.root.flush(&mut self.device)?;
        Ok(())
    }

    /// Geometry and free-space ratios (`spec.md` §6.4).
    pub fn info(&self) -> Info {
        let fat_free_count = (1..self.fat.data_block_count())
            .filter(|&i| self.fat.next(i as u16) == crate::FAT_FREE)
            .count();
        Info {
            total_block_count: self.superblock.total_blocks,
            fat_block_count: self.superblock.fat_block_count,
            root_directory_block: self.superblock.root_directory_index,
            data_block_start: self.superblock.data_block_start_index,
            data_block_count: self.superblock.data_block_count,
            fat_free_count,
            root_free_count: crate::FS_FILE_MAX_COUNT - self.root.occupied_count(),
        }
    }

    /// Creates a new, empty file named `name` (`spec.md` §6.2 `create`).
    pub fn create(&mut self, name: &str) -> Result<(), Error> {
        let encoded = directory::encode_filename(name)?;
        self.root.insert(&encoded)?;
        self.root.flush(&mut self.device)?;
        Ok(())
    }

    /// Deletes `name`, freeing its FAT chain. Fails if the file is currently
    /// open (`spec.md` invariant 3).
    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        let encoded = directory::encode_filename(name)?;
        let slot = self.root.find(&encoded).ok_or(Error::NameNotFound)?;
        if self.handles.is_slot_open(slot) {
            return Err(Error::FileOpen);
        }
        let entry = self.root.get(slot);
        self.fat.free_chain(entry.first_block)?;
        self.root.remove(slot);
        self.fat.flush(&mut self.device)?;
        self.root.flush(&mut self.device)?;
        Ok(())
    }

    /// Lists occupied root entries in slot order (`spec.md` §6.5).
    pub fn ls(&self) -> Vec<FileInfo> {
        self.root
            .iter_occupied()
            .map(|(_, filename, entry)| FileInfo {
                name: decode_filename(filename),
                size: entry.size,
                first_block: entry.first_block,
            })
            .collect()
    }

    /// Opens `name`, returning a fresh handle bound at offset 0.
    pub fn open(&mut self, name: &str) -> Result<usize, Error> {
        let encoded = directory::encode_filename(name)?;
        let slot = self.root.find(&encoded).ok_or(Error::NameNotFound)?;
        self.handles.open(slot)
    }

    /// Closes `fd`.
    pub fn close(&mut self, fd: usize) -> Result<(), Error> {
        self.handles.close(fd)
    }

    /// The current size in bytes of the file bound to `fd`.
    pub fn stat(&self, fd: usize) -> Result<u32, Error> {
        let slot = self.handles.dir_slot(fd)?;
        Ok(self.root.get(slot).size)
    }

    /// Moves `fd`'s byte offset to `offset`.
    pub fn lseek(&mut self, fd: usize, offset: u64) -> Result<(), Error> {
        self.handles.seek(fd, offset)
    }

    /// Reads into `buf` from `fd`'s current offset, advancing it by the
    /// number of bytes actually read (`spec.md` §4.5).
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let slot = self.handles.dir_slot(fd)?;
        let offset = self.handles.offset(fd)?;
        let entry = self.root.get(slot);

        let n = io_engine::read(
            &mut self.device,
            &self.fat,
            self.superblock.data_block_start_index,
            entry.first_block,
            entry.size,
            offset,
            buf,
        )?;
        self.handles.advance(fd, n as u64)?;
        Ok(n)
    }

    /// Writes `buf` at `fd`'s current offset, extending the file and
    /// advancing the offset by the number of bytes actually written
    /// (`spec.md` §4.6).
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, Error> {
        let slot = self.handles.dir_slot(fd)?;
        let offset = self.handles.offset(fd)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut entry = self.root.get(slot);

        let n = io_engine::write(
            &mut self.device,
            &mut self.fat,
            self.superblock.data_block_start_index,
            &mut entry.first_block,
            offset,
            buf,
        )?;

        let new_size = entry.size.max((offset + n as u64) as u32);
        self.root.set(slot, new_size, entry.first_block);
        self.fat.flush(&mut self.device)?;
        self.root.flush(&mut self.device)?;
        self.handles.advance(fd, n as u64)?;
        Ok(n)
    }
}

/// Renders a raw, NUL-padded filename back to a `String` (inverse of
/// [`directory::encode_filename`]).
fn decode_filename(raw: &[u8; crate::FS_FILENAME_LEN]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..len]).into_owned()
}


#[cfg(test)]
mod test {
    use super::test_support::format;
    use super::*;

    fn mounted(total_blocks: u16) -> FileSystem<test_support::MemDevice> {
        FileSystem::mount_device(format(total_blocks)).unwrap()
    }

    #[test]
    fn create_ls_delete_round_trip() {
        let mut fs = mounted(32);
        fs.create("a").unwrap();
        let listing = fs.ls();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "a");
        assert_eq!(listing[0].size, 0);
        assert_eq!(listing[0].first_block, crate::FAT_EOC);

        fs.delete("a").unwrap();
        assert!(fs.ls().is_empty());
    }

    #[test]
    fn create_duplicate_name_fails() {
        let mut fs = mounted(32);
        fs.create("a").unwrap();
        assert!(matches!(fs.create("a"), Err(Error::NameExists)));
        assert_eq!(fs.ls().len(), 1);
    }

    #[test]
    fn write_seek_read_round_trip() {
        let mut fs = mounted(32);
        fs.create("x").unwrap();
        let fd = fs.open("x").unwrap();
        assert_eq!(fd, 0);

        assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
        fs.lseek(fd, 0).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(fs.stat(fd).unwrap(), 5);
    }

    #[test]
    fn zero_byte_write_is_a_no_op() {
        let mut fs = mounted(32);
        fs.create("x").unwrap();
        let fd = fs.open("x").unwrap();

        fs.lseek(fd, 1000).unwrap();
        assert_eq!(fs.write(fd, &[]).unwrap(), 0);
        assert_eq!(fs.stat(fd).unwrap(), 0);
    }

    #[test]
    fn thousand_byte_write_spans_two_blocks() {
        let mut fs = mounted(64);
        fs.create("big").unwrap();
        let fd = fs.open("big").unwrap();

        let data = vec![b'A'; 1000];
        assert_eq!(fs.write(fd, &data).unwrap(), 1000);
        assert_eq!(fs.stat(fd).unwrap(), 1000);

        fs.lseek(fd, 0).unwrap();
        let mut buf = vec![0u8; 1000];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 1000);
        assert!(buf.iter().all(|&b| b == b'A'));

        fs.lseek(fd, 1000).unwrap();
        let mut tail = [0u8; 1];
        assert_eq!(fs.read(fd, &mut tail).unwrap(), 0);
    }

    #[test]
    fn split_write_matches_single_write() {
        let data: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();

        let mut whole = mounted(64);
        whole.create("w").unwrap();
        let wfd = whole.open("w").unwrap();
        whole.write(wfd, &data).unwrap();

        let mut split = mounted(64);
        split.create("s").unwrap();
        let sfd = split.open("s").unwrap();
        split.write(sfd, &data[..300]).unwrap();
        split.write(sfd, &data[300..]).unwrap();

        whole.lseek(wfd, 0).unwrap();
        split.lseek(sfd, 0).unwrap();
        let mut wbuf = vec![0u8; data.len()];
        let mut sbuf = vec![0u8; data.len()];
        whole.read(wfd, &mut wbuf).unwrap();
        split.read(sfd, &mut sbuf).unwrap();
        assert_eq!(wbuf, sbuf);
    }

    #[test]
    fn write_past_end_of_file_zero_fills_the_gap() {
        let mut fs = mounted(32);
        fs.create("h").unwrap();
        let fd = fs.open("h").unwrap();

        fs.lseek(fd, 512).unwrap();
        fs.write(fd, b"tail").unwrap();
        assert_eq!(fs.stat(fd).unwrap(), 516);

        fs.lseek(fd, 0).unwrap();
        let mut buf = [0u8; 516];
        fs.read(fd, &mut buf).unwrap();
        assert!(buf[..512].iter().all(|&b| b == 0));
        assert_eq!(&buf[512..], b"tail");
    }

    #[test]
    fn write_short_counts_when_fat_is_exhausted() {
        // total_blocks small enough that only a handful of data blocks exist.
        let mut fs = mounted(20);
        fs.create("f").unwrap();
        let fd = fs.open("f").unwrap();

        let free_data_blocks = fs.info().fat_free_count;
        let capacity = free_data_blocks * crate::BLOCK_SIZE;
        let data = vec![b'z'; capacity + 4096];

        let written = fs.write(fd, &data).unwrap();
        assert_eq!(written, capacity);
        assert_eq!(fs.stat(fd).unwrap() as usize, capacity);
    }

    #[test]
    fn opening_one_more_than_max_fails() {
        let mut fs = mounted(32);
        fs.create("x").unwrap();
        for i in 0..crate::FS_OPEN_MAX_COUNT {
            assert_eq!(fs.open("x").unwrap(), i);
        }
        assert!(matches!(fs.open("x"), Err(Error::OpenTableFull)));
    }

    #[test]
    fn delete_of_open_file_is_rejected() {
        let mut fs = mounted(32);
        fs.create("x").unwrap();
        let _fd = fs.open("x").unwrap();
        assert!(matches!(fs.delete("x"), Err(Error::FileOpen)));
    }

    #[test]
    fn umount_with_open_files_is_rejected() {
        let mut fs = mounted(32);
        fs.create("x").unwrap();
        let _fd = fs.open("x").unwrap();
        assert!(matches!(fs.umount(), Err(Error::FileOpen)));
    }
}
