use crate::alloc::{Bitmap, State};
use crate::io::{Block, BlockNumber, BlockStorage};
use crate::layout::{
    BLOCK_SIZE_BYTES, BLOCK_STORE_AVAIL_BLOCKS, BLOCK_STORE_NUM_BLOCKS, FBM_BLOCKS,
    FBM_BYTE_RANGE,
};

use log::{debug, trace};
use thiserror::Error;
use zerocopy::{AsBytes, FromZeroes};

#[derive(Error, Debug)]
pub enum BlockStoreError {
    #[error("block {block_id} is out of range, must be below {limit}")]
    OutOfRange { block_id: BlockNumber, limit: usize },
    #[error("block {0} is already allocated")]
    AlreadyAllocated(BlockNumber),
    #[error("block {0} holds the free block map and cannot be released")]
    Reserved(BlockNumber),
    #[error("no free blocks left on device")]
    NoSpace,
    #[error("buffer of {len} bytes is smaller than a {need} byte block")]
    BufferTooSmall { len: usize, need: usize },
    #[error("image holds {actual} bytes, expected {expected}")]
    ShortImage { expected: usize, actual: usize },
    #[error("block store image I/O failed")]
    Io(#[from] std::io::Error),
}

impl From<BlockStoreError> for std::io::Error {
    fn from(err: BlockStoreError) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            BlockStoreError::Io(inner) => inner.kind(),
            BlockStoreError::ShortImage { .. } => ErrorKind::UnexpectedEof,
            BlockStoreError::NoSpace => ErrorKind::Other,
            _ => ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, BlockStoreError>;

/// A fixed-capacity in-memory block device.
///
/// # Layout
/// ==================================================================
/// | Free Block Map (FBM_BLOCKS) | Data ... | Sentinel (I/O only) |
/// ==================================================================
///
/// The free block map is not stored beside the blocks, it is a bitmap view over
/// the bytes of its reserved run. Allocation state therefore travels with the
/// block array when it is written out and read back.
pub struct BlockStore {
    blocks: Box<[Block]>,
}

impl BlockStore {
    /// Creates a zeroed device and marks the blocks holding the free block map
    /// as used.
    pub fn create() -> Result<Self> {
        let mut store = BlockStore {
            blocks: Block::new_box_slice_zeroed(BLOCK_STORE_NUM_BLOCKS),
        };
        // The map describes its own storage, going through request() also
        // checks the request path on a blank device.
        for blocknr in FBM_BLOCKS {
            store.request(blocknr)?;
        }
        debug!(
            "Created block store with {} blocks of {} bytes, free block map at blocks {:?}.",
            BLOCK_STORE_NUM_BLOCKS, BLOCK_SIZE_BYTES, FBM_BLOCKS
        );
        Ok(store)
    }

    /// Releases the device's memory. Dropping the store has the same effect.
    pub fn destroy(self) {
        debug!("Destroying block store with {} used blocks.", self.used_blocks());
    }

    /// Allocates the lowest numbered free block.
    ///
    /// # Errors
    ///
    /// Returns `NoSpace` when every block below [`BLOCK_STORE_AVAIL_BLOCKS`] is
    /// in use.
    pub fn allocate(&mut self) -> Result<BlockNumber> {
        let blocknr = self
            .fbm()
            .first_free(BLOCK_STORE_AVAIL_BLOCKS)
            .ok_or(BlockStoreError::NoSpace)?;
        self.request(blocknr)?;
        Ok(blocknr)
    }

    /// Allocates a specific block. Every allocation goes through here.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for ids at or past [`BLOCK_STORE_AVAIL_BLOCKS`] and
    /// `AlreadyAllocated` if the block is in use. Nothing changes on error.
    pub fn request(&mut self, blocknr: BlockNumber) -> Result<()> {
        check_allocatable(blocknr)?;
        if let State::Used = self.fbm().get(blocknr) {
            return Err(BlockStoreError::AlreadyAllocated(blocknr));
        }
        self.fbm_mut().set_reserved(blocknr);
        trace!("Allocated block {}.", blocknr);
        Ok(())
    }

    /// Returns a block to the free pool. Releasing a block that is already free
    /// succeeds without changes, use [`BlockStore::is_allocated`] to tell the
    /// two apart.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for ids at or past [`BLOCK_STORE_AVAIL_BLOCKS`] and
    /// `Reserved` for blocks holding the free block map.
    pub fn release(&mut self, blocknr: BlockNumber) -> Result<()> {
        check_allocatable(blocknr)?;
        if FBM_BLOCKS.contains(&blocknr) {
            return Err(BlockStoreError::Reserved(blocknr));
        }
        if let State::Free = self.fbm().get(blocknr) {
            debug!("Released block {} which was not allocated.", blocknr);
            return Ok(());
        }
        self.fbm_mut().set_free(blocknr);
        trace!("Released block {}.", blocknr);
        Ok(())
    }

    /// Whether the block is marked used in the free block map.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for ids at or past [`BLOCK_STORE_AVAIL_BLOCKS`].
    pub fn is_allocated(&self, blocknr: BlockNumber) -> Result<bool> {
        check_allocatable(blocknr)?;
        Ok(self.fbm().get(blocknr) == State::Used)
    }

    /// Blocks marked used, the free block map's own blocks included. Never fails.
    pub fn used_blocks(&self) -> usize {
        self.fbm().count_used(BLOCK_STORE_AVAIL_BLOCKS)
    }

    /// Blocks still available to [`BlockStore::allocate`]. Never fails.
    pub fn free_blocks(&self) -> usize {
        BLOCK_STORE_AVAIL_BLOCKS - self.used_blocks()
    }

    /// Allocatable capacity of any device. Does not count the sentinel block.
    pub const fn total_blocks() -> usize {
        BLOCK_STORE_AVAIL_BLOCKS
    }

    /// Copies a whole block into the front of `buf`, returning the bytes copied.
    ///
    /// Raw I/O is bounded by the full block array and ignores allocation state.
    pub fn read(&self, blocknr: BlockNumber, buf: &mut [u8]) -> Result<usize> {
        let block = self.block(blocknr)?;
        let len = buf.len();
        let dst = buf
            .get_mut(..BLOCK_SIZE_BYTES)
            .ok_or(BlockStoreError::BufferTooSmall {
                len,
                need: BLOCK_SIZE_BYTES,
            })?;
        dst.copy_from_slice(block.as_slice());
        Ok(BLOCK_SIZE_BYTES)
    }

    /// Overwrites a whole block from the front of `buf`, returning the bytes copied.
    pub fn write(&mut self, blocknr: BlockNumber, buf: &[u8]) -> Result<usize> {
        let src = buf
            .get(..BLOCK_SIZE_BYTES)
            .ok_or(BlockStoreError::BufferTooSmall {
                len: buf.len(),
                need: BLOCK_SIZE_BYTES,
            })?;
        let block = self.block_mut(blocknr)?;
        block.as_mut_slice().copy_from_slice(src);
        Ok(BLOCK_SIZE_BYTES)
    }

    fn block(&self, blocknr: BlockNumber) -> Result<&Block> {
        self.blocks.get(blocknr).ok_or(BlockStoreError::OutOfRange {
            block_id: blocknr,
            limit: BLOCK_STORE_NUM_BLOCKS,
        })
    }

    fn block_mut(&mut self, blocknr: BlockNumber) -> Result<&mut Block> {
        self.blocks.get_mut(blocknr).ok_or(BlockStoreError::OutOfRange {
            block_id: blocknr,
            limit: BLOCK_STORE_NUM_BLOCKS,
        })
    }

    /// The whole block array as contiguous bytes.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.blocks.as_bytes()
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.blocks.as_bytes_mut()
    }

    fn fbm(&self) -> Bitmap<&[u8]> {
        Bitmap::overlay(&self.as_bytes()[FBM_BYTE_RANGE], BLOCK_STORE_NUM_BLOCKS)
    }

    fn fbm_mut(&mut self) -> Bitmap<&mut [u8]> {
        Bitmap::overlay(&mut self.as_bytes_mut()[FBM_BYTE_RANGE], BLOCK_STORE_NUM_BLOCKS)
    }
}

/// The last block is I/O only, the allocator never hands it out.
fn check_allocatable(blocknr: BlockNumber) -> Result<()> {
    if blocknr >= BLOCK_STORE_AVAIL_BLOCKS {
        return Err(BlockStoreError::OutOfRange {
            block_id: blocknr,
            limit: BLOCK_STORE_AVAIL_BLOCKS,
        });
    }
    Ok(())
}

impl BlockStorage for BlockStore {
    fn block_count(&self) -> usize {
        BLOCK_STORE_NUM_BLOCKS
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.read(blocknr, buf)?;
        Ok(())
    }

    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.write(blocknr, buf)?;
        Ok(())
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        // Nothing is buffered outside the block array.
        Ok(())
    }
}
