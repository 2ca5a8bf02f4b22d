//! A process-global convenience layer matching the original C API's calling
//! convention: free functions, `i32` returns, `-1` on failure, short counts
//! on partial reads/writes (`spec.md` §6.2).
//!
//! [`context::FileSystem`] is the real library surface; this module is an
//! optional facade binding one process-wide instance on top of it, for
//! callers that want the original singleton feel (`spec.md` §9 "Global
//! mutable state").

use std::path::Path;
use std::sync::Mutex;

use crate::context::FileSystem;
use crate::device::FileBlockDevice;

static MOUNTED: Mutex<Option<FileSystem<FileBlockDevice>>> = Mutex::new(None);

/// Mounts `diskname`, returning `0` on success or `-1` on failure.
pub fn mount(diskname: &str) -> i32 {
    let mut guard = MOUNTED.lock().unwrap();
    match FileSystem::mount(Path::new(diskname)) {
        Ok(fs) => {
            *guard = Some(fs);
            0
        }
        Err(_) => -1,
    }
}

/// Unmounts the currently mounted disk, returning `0` on success or `-1`
/// on failure (not mounted, or a file still open).
pub fn umount() -> i32 {
    let mut guard = MOUNTED.lock().unwrap();
    match guard.as_mut() {
        Some(fs) => match fs.umount() {
            Ok(()) => {
                *guard = None;
                0
            }
            Err(_) => -1,
        },
        None => -1,
    }
}

/// Prints geometry and free-space ratios to stdout (`spec.md` §6.4).
pub fn info() -> i32 {
    let guard = MOUNTED.lock().unwrap();
    let Some(fs) = guard.as_ref() else {
        return -1;
    };
    let info = fs.info();
    println!("total_blk_count={}", info.total_block_count);
    println!("fat_blk_count={}", info.fat_block_count);
    println!("rdir_blk={}", info.root_directory_block);
    println!("data_blk={}", info.data_block_start);
    println!("data_blk_count={}", info.data_block_count);
    println!(
        "fat_free_ratio={}/{}",
        info.fat_free_count, info.data_block_count
    );
    println!(
        "rdir_free_ratio={}/{}",
        info.root_free_count,
        crate::FS_FILE_MAX_COUNT
    );
    0
}

/// Creates a new empty file, returning `0` on success or `-1` on failure.
pub fn create(name: &str) -> i32 {
    with_mounted_mut(|fs| fs.create(name).map(|()| 0))
}

/// Deletes `name`, returning `0` on success or `-1` on failure.
pub fn delete(name: &str) -> i32 {
    with_mounted_mut(|fs| fs.delete(name).map(|()| 0))
}

/// Prints the occupied root entries to stdout (`spec.md` §6.5).
pub fn ls() -> i32 {
    let guard = MOUNTED.lock().unwrap();
    let Some(fs) = guard.as_ref() else {
        return -1;
    };
    println!("FS Ls:");
    for f in fs.ls() {
        println!(
            "file: {}, size: {}, data_blk: {}",
            f.name, f.size, f.first_block
        );
    }
    0
}

/// Opens `name`, returning a handle in `[0, FS_OPEN_MAX_COUNT)` or `-1`.
pub fn open(name: &str) -> i32 {
    with_mounted_mut(|fs| fs.open(name).map(|fd| fd as i32))
}

/// Closes `fd`, returning `0` on success or `-1` on failure.
pub fn close(fd: i32) -> i32 {
    with_mounted_mut(|fs| fs.close(fd as usize).map(|()| 0))
}

/// Returns the size of the file bound to `fd`, or `-1` on failure.
pub fn stat(fd: i32) -> i32 {
    with_mounted_mut(|fs| fs.stat(fd as usize).map(|size| size as i32))
}

/// Moves `fd`'s offset to `offset`, returning `0` on success or `-1`.
pub fn lseek(fd: i32, offset: u64) -> i32 {
    with_mounted_mut(|fs| fs.lseek(fd as usize, offset).map(|()| 0))
}

/// Reads up to `buf.len()` bytes into `buf`, returning the count read or
/// `-1` on failure. An empty `buf` with a nonzero intended count is the
/// caller's responsibility to avoid; this binding simply reads `buf.len()`.
pub fn read(fd: i32, buf: &mut [u8]) -> i32 {
    with_mounted_mut(|fs| fs.read(fd as usize, buf).map(|n| n as i32))
}

/// Writes `buf`, returning the count actually written or `-1` on failure.
pub fn write(fd: i32, buf: &[u8]) -> i32 {
    with_mounted_mut(|fs| fs.write(fd as usize, buf).map(|n| n as i32))
}

fn with_mounted_mut(
    f: impl FnOnce(&mut FileSystem<FileBlockDevice>) -> Result<i32, crate::Error>,
) -> i32 {
    let mut guard = MOUNTED.lock().unwrap();
    match guard.as_mut() {
        Some(fs) => f(fs).unwrap_or(-1),
        None => -1,
    }
}
