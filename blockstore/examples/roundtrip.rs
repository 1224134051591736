use blockstore::{BlockStore, BLOCK_SIZE_BYTES};
use std::env;

/// Allocates a few blocks, writes a payload, saves the device and loads it back.
pub fn main() -> Result<(), blockstore::BlockStoreError> {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "blockstore.img".to_string());

    let mut store = BlockStore::create()?;
    let blocks: Vec<usize> = (0..3)
        .map(|_| store.allocate())
        .collect::<Result<_, _>>()?;
    for (i, &blocknr) in blocks.iter().enumerate() {
        store.write(blocknr, &[i as u8 + 1; BLOCK_SIZE_BYTES])?;
    }
    let written = store.serialize(&path)?;
    println!("wrote {} bytes to {}", written, path);

    let restored = BlockStore::deserialize(&path)?;
    println!(
        "restored device: {} used, {} free, {} total",
        restored.used_blocks(),
        restored.free_blocks(),
        BlockStore::total_blocks()
    );
    Ok(())
}
