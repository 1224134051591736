use std::ops::Range;

/// Bytes per block. Every read, write and image offset is a multiple of this.
pub const BLOCK_SIZE_BYTES: usize = 256;

/// Number of blocks in the device, 2^16.
pub const BLOCK_STORE_NUM_BLOCKS: usize = 65536;

/// Number of block ids the allocator hands out, `0..BLOCK_STORE_AVAIL_BLOCKS`.
///
/// The last block of the array is a sentinel: it can be read and written like
/// any other block but it is never allocated.
pub const BLOCK_STORE_AVAIL_BLOCKS: usize = BLOCK_STORE_NUM_BLOCKS - 1;

/// Known locations. The map sits at the front of the array so the lowest free
/// id on a fresh device is the first block past it.
pub const FBM_START_INDEX: usize = 0;

/// One bit per block, rounded up to a whole byte.
pub const FBM_SIZE_BYTES: usize = (BLOCK_STORE_NUM_BLOCKS + 7) / 8;

/// Blocks the free block map occupies starting at [`FBM_START_INDEX`].
pub const FBM_NUM_BLOCKS: usize = (FBM_SIZE_BYTES + BLOCK_SIZE_BYTES - 1) / BLOCK_SIZE_BYTES;

/// Block ids permanently owned by the free block map.
pub const FBM_BLOCKS: Range<usize> = FBM_START_INDEX..FBM_START_INDEX + FBM_NUM_BLOCKS;

/// Byte offsets of the free block map within the block array.
pub const FBM_BYTE_RANGE: Range<usize> =
    FBM_START_INDEX * BLOCK_SIZE_BYTES..FBM_START_INDEX * BLOCK_SIZE_BYTES + FBM_SIZE_BYTES;

/// Size of a serialized device: every block, no header.
pub const IMAGE_SIZE_BYTES: usize = BLOCK_STORE_NUM_BLOCKS * BLOCK_SIZE_BYTES;

// The map has to live in blocks the allocator itself can mark as used.
const _: () = assert!(FBM_START_INDEX + FBM_NUM_BLOCKS <= BLOCK_STORE_AVAIL_BLOCKS);
const _: () = assert!(FBM_SIZE_BYTES * 8 >= BLOCK_STORE_NUM_BLOCKS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_fits_in_its_reserved_run() {
        assert_eq!(FBM_SIZE_BYTES, 8192);
        assert_eq!(FBM_NUM_BLOCKS, 32);
        assert!(FBM_BYTE_RANGE.end <= FBM_BLOCKS.end * BLOCK_SIZE_BYTES);
        assert_eq!(FBM_BYTE_RANGE.start, FBM_BLOCKS.start * BLOCK_SIZE_BYTES);
    }

    #[test]
    fn sentinel_block_is_outside_allocation_range() {
        assert_eq!(BLOCK_STORE_AVAIL_BLOCKS + 1, BLOCK_STORE_NUM_BLOCKS);
        assert_eq!(IMAGE_SIZE_BYTES, 16 * 1024 * 1024);
    }
}
