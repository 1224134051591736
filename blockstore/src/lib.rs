//! A fixed-capacity block device with an in-band free block map.
//!
//! The device is a flat array of [`BLOCK_STORE_NUM_BLOCKS`] blocks of
//! [`BLOCK_SIZE_BYTES`] bytes. Which blocks are in use is tracked by a bitmap that
//! lives inside the array itself, in a reserved run of blocks starting at
//! [`FBM_START_INDEX`], so writing the array out persists allocation state too.
//!
//! ```no_run
//! use blockstore::{BlockStore, BLOCK_SIZE_BYTES};
//!
//! let mut store = BlockStore::create()?;
//! let blocknr = store.allocate()?;
//! store.write(blocknr, &[0xAB; BLOCK_SIZE_BYTES])?;
//! store.serialize("device.img")?;
//! # Ok::<(), blockstore::BlockStoreError>(())
//! ```
mod alloc;
mod image;
pub mod io;
pub mod layout;
mod store;

pub use crate::io::{BlockNumber, BlockStorage};
pub use crate::layout::{
    BLOCK_SIZE_BYTES, BLOCK_STORE_AVAIL_BLOCKS, BLOCK_STORE_NUM_BLOCKS, FBM_NUM_BLOCKS,
    FBM_START_INDEX,
};
pub use crate::store::{BlockStore, BlockStoreError, Result};
