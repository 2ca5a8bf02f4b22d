//! The superblock: disk geometry constants, loaded once at mount and never
//! written by this library (`spec.md` §4.1).
//!
//! Laid out and read the same way `mkfs::ext2::Superblock`/
//! `BlockGroupDescriptor` are: a `#[repr(C, packed)]` struct read straight
//! off the device through a raw byte slice.

use std::mem::size_of;
use std::slice;

use crate::BLOCK_SIZE;
use crate::device::BlockDevice;
use crate::error::Error;

/// The ASCII signature every valid disk image starts with.
pub const SIGNATURE: &[u8; 8] = b"ECS150FS";

/// Geometry and metadata stored in block 0.
///
/// `spec.md` §3 describes this record as 4096 bytes with 4079 bytes of
/// padding; that only holds together if a block is 4096 bytes, which
/// contradicts the block size fixed at 512 bytes everywhere else in the
/// spec (§2, §6.2, the glossary, and the exact 512/513-byte boundary
/// scenarios in §8's testable properties). The struct below keeps the
/// fields and their order but pads to fill one real (512-byte) block
/// instead, see `DESIGN.md` for the full resolution.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Superblock {
    pub signature: [u8; 8],
    pub total_blocks: u16,
    pub root_directory_index: u16,
    pub data_block_start_index: u16,
    pub data_block_count: u16,
    pub fat_block_count: u8,
    _padding: [u8; BLOCK_SIZE - 17],
}

const _: () = assert!(size_of::<Superblock>() == BLOCK_SIZE);

impl Superblock {
    /// Reads and validates the superblock from block 0 of `device`.
    ///
    /// Fails if the signature doesn't match, if `total_blocks` disagrees
    /// with the device's real block count, or if the layout invariants from
    /// `spec.md` §3 don't hold.
    pub fn load<D: BlockDevice>(device: &mut D) -> Result<Self, Error> {
        let mut sb: Self = unsafe { std::mem::zeroed() };
        let buf = unsafe {
            slice::from_raw_parts_mut(&mut sb as *mut Self as *mut u8, size_of::<Self>())
        };
        device.read_block(0, buf)?;

        if &sb.signature != SIGNATURE {
            return Err(Error::InvalidSignature);
        }
        if sb.total_blocks as usize != device.block_count() {
            return Err(Error::BlockCountMismatch);
        }
        if sb.root_directory_index != 1 + sb.fat_block_count as u16
            || sb.data_block_start_index
                != sb.root_directory_index + crate::directory::ROOT_DIR_BLOCKS as u16
            || sb.data_block_start_index as u32 + sb.data_block_count as u32
                != sb.total_blocks as u32
        {
            return Err(Error::Corrupt("superblock layout invariants violated"));
        }

        Ok(sb)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn size_is_one_block() {
        assert_eq!(size_of::<Superblock>(), BLOCK_SIZE);
    }
}
