mod block;

pub use block::{Block, BlockNumber, BlockStorage};
