//! Translates `(handle, offset, length, buffer)` into a sequence of
//! partial/whole block copies through a block-sized scratch buffer,
//! allocating new blocks on write as needed (`spec.md` §4.5, §4.6).

use crate::device::BlockDevice;
use crate::error::Error;
use crate::fat::Fat;
use crate::{BLOCK_SIZE, FAT_EOC};

/// Allocates one FAT entry and zero-fills the data block behind it.
///
/// Every block the FAT hands out is either about to be spliced with real
/// data, or is a "hole" block skipped over by a write past end-of-file; in
/// both cases it must read back as zero until something overwrites it
/// (`spec.md` §4.6 edge policy), so blocks are zeroed at the moment they're
/// allocated rather than left with whatever was on disk before.
fn alloc_zeroed<D: BlockDevice>(
    device: &mut D,
    fat: &mut Fat,
    data_block_start: u16,
) -> Result<Option<u16>, Error> {
    let Some(block) = fat.allocate() else {
        return Ok(None);
    };
    device.write_block(
        data_block_start as usize + block as usize,
        &[0u8; BLOCK_SIZE],
    )?;
    Ok(Some(block))
}

/// Reads up to `buf.len()` bytes starting at `offset` bytes into the chain
/// rooted at `first_block`, whose file size is `size`. Never allocates.
pub fn read<D: BlockDevice>(
    device: &mut D,
    fat: &Fat,
    data_block_start: u16,
    first_block: u16,
    size: u32,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize, Error> {
    let remaining_in_file = (size as u64).saturating_sub(offset);
    let want = (buf.len() as u64).min(remaining_in_file) as usize;
    if want == 0 {
        return Ok(0);
    }

    let mut block = first_block;
    let mut in_block_offset = offset;
    while in_block_offset >= BLOCK_SIZE as u64 {
        let next = fat.next(block);
        if next == FAT_EOC {
            return Ok(0);
        }
        block = next;
        in_block_offset -= BLOCK_SIZE as u64;
    }
    let mut in_block_offset = in_block_offset as usize;

    let mut scratch = [0u8; BLOCK_SIZE];
    let mut done = 0;
    loop {
        device.read_block(data_block_start as usize + block as usize, &mut scratch)?;
        let take = (want - done).min(BLOCK_SIZE - in_block_offset);
        buf[done..done + take].copy_from_slice(&scratch[in_block_offset..in_block_offset + take]);
        done += take;
        if done == want {
            break;
        }
        in_block_offset = 0;
        block = fat.next(block);
        if block == FAT_EOC {
            break;
        }
    }
    Ok(done)
}

/// Writes `buf` starting at `offset` bytes into the chain rooted at
/// `*first_block` (updated in place if the file was empty), extending it
/// with freshly zeroed blocks as needed. Returns the number of bytes
/// actually written, which is short of `buf.len()` only if the FAT fills up.
pub fn write<D: BlockDevice>(
    device: &mut D,
    fat: &mut Fat,
    data_block_start: u16,
    first_block: &mut u16,
    offset: u64,
    buf: &[u8],
) -> Result<usize, Error> {
    if buf.is_empty() {
        return Ok(0);
    }

    if *first_block == FAT_EOC {
        match alloc_zeroed(device, fat, data_block_start)? {
            Some(b) => *first_block = b,
            None => return Ok(0),
        }
    }

    // Walk (and, past the current end of the chain, extend) to the block
    // covering `offset`.
    let mut block = *first_block;
    let mut remaining_offset = offset;
    while remaining_offset >= BLOCK_SIZE as u64 {
        let next = fat.next(block);
        block = if next == FAT_EOC {
            match alloc_zeroed(device, fat, data_block_start)? {
                Some(nb) => {
                    fat.set(block, nb);
                    nb
                }
                None => return Ok(0),
            }
        } else {
            next
        };
        remaining_offset -= BLOCK_SIZE as u64;
    }
    let mut in_block_offset = remaining_offset as usize;

    let mut scratch = [0u8; BLOCK_SIZE];
    let mut done = 0;
    loop {
        device.read_block(data_block_start as usize + block as usize, &mut scratch)?;
        let take = (buf.len() - done).min(BLOCK_SIZE - in_block_offset);
        scratch[in_block_offset..in_block_offset + take].copy_from_slice(&buf[done..done + take]);
        device.write_block(data_block_start as usize + block as usize, &scratch)?;
        done += take;
        if done == buf.len() {
            break;
        }
        in_block_offset = 0;
        let next = fat.next(block);
        block = if next == FAT_EOC {
            match alloc_zeroed(device, fat, data_block_start)? {
                Some(nb) => {
                    fat.set(block, nb);
                    nb
                }
                None => break,
            }
        } else {
            next
        };
    }
    Ok(done)
}
