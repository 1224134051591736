use crate::layout::IMAGE_SIZE_BYTES;
use crate::store::{BlockStore, BlockStoreError, Result};

use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::Path;

/// Persistence for whole devices. An image is the raw block array, block after
/// block with no header, so the free block map is restored along with the data.
impl BlockStore {
    /// Writes the device to `path`, truncating any existing file. Returns the
    /// number of bytes written.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        let written = self.write_image(&mut writer)?;
        writer.flush()?;
        info!("Serialized {} bytes to {}.", written, path.as_ref().display());
        Ok(written)
    }

    /// Loads a device previously written by [`BlockStore::serialize`].
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or holds fewer bytes than a device.
    pub fn deserialize<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let store = Self::read_image(BufReader::new(file))?;
        info!("Deserialized block store from {}.", path.as_ref().display());
        Ok(store)
    }

    /// Writes every block, the free block map included, to `writer`.
    pub fn write_image<W: Write>(&self, mut writer: W) -> Result<usize> {
        let bytes = self.as_bytes();
        writer.write_all(bytes)?;
        Ok(bytes.len())
    }

    /// Builds a fresh device and overwrites its block array from `reader`.
    pub fn read_image<R: Read>(mut reader: R) -> Result<Self> {
        let mut store = Self::create()?;
        let buf = store.as_bytes_mut();

        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < IMAGE_SIZE_BYTES {
            warn!(
                "Block store image truncated: read {} of {} bytes.",
                filled, IMAGE_SIZE_BYTES
            );
            return Err(BlockStoreError::ShortImage {
                expected: IMAGE_SIZE_BYTES,
                actual: filled,
            });
        }

        let mut probe = [0; 1];
        if reader.read(&mut probe)? > 0 {
            warn!(
                "Block store image is longer than {} bytes, ignoring the rest.",
                IMAGE_SIZE_BYTES
            );
        }
        Ok(store)
    }
}
