#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// A bitmap laid over a borrowed byte region rather than owning its own storage.
/// Bit `n` lives in byte `n / 8` at position `n % 8`, least significant bit first,
/// so the bytes can be written to disk and read back without any translation.
///
/// The region is typically a sub-slice of the block array the bitmap describes.
/// Read-only views use `Bitmap<&[u8]>`, mutating views `Bitmap<&mut [u8]>`.
pub struct Bitmap<T> {
    bits: T,
    /// Number of tracked bits. The backing region may be longer, trailing bytes
    /// are never touched.
    len: usize,
}

/// Bytes needed to track `nbits` bits.
pub const fn byte_size(nbits: usize) -> usize {
    (nbits + 7) / 8
}

impl<T: AsRef<[u8]>> Bitmap<T> {
    /// Overlays a bitmap of `nbits` bits on `bits`. Panics if the region is too
    /// small to hold them.
    pub fn overlay(bits: T, nbits: usize) -> Self {
        assert!(
            bits.as_ref().len() >= byte_size(nbits),
            "Bitmap region too small for {} bits.",
            nbits
        );
        Self { bits, len: nbits }
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < self.len);
        let byte = self.bits.as_ref()[blocknr / 8];
        match (byte >> (blocknr % 8)) & 0b1 {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("Block state returned a non 0 or 1 value. This likely indicates an error with bitmasking"),
        }
    }

    /// Finds the lowest clear bit below `limit`.
    pub fn first_free(&self, limit: usize) -> Option<usize> {
        let limit = limit.min(self.len);
        let bytes = &self.bits.as_ref()[..byte_size(limit)];
        bytes
            .iter()
            .enumerate()
            .find(|(_, byte)| **byte != u8::MAX)
            .map(|(pos, byte)| pos * 8 + byte.trailing_ones() as usize)
            .filter(|&blocknr| blocknr < limit)
    }

    /// Counts set bits below `limit`.
    pub fn count_used(&self, limit: usize) -> usize {
        let limit = limit.min(self.len);
        let bytes = self.bits.as_ref();
        let whole = limit / 8;
        let mut used: usize = bytes[..whole].iter().map(|b| b.count_ones() as usize).sum();
        let rem = limit % 8;
        if rem > 0 {
            let mask = (1u8 << rem) - 1;
            used += (bytes[whole] & mask).count_ones() as usize;
        }
        used
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Bitmap<T> {
    pub fn set_reserved(&mut self, blocknr: usize) {
        assert!(blocknr < self.len);
        self.bits.as_mut()[blocknr / 8] |= 1u8 << (blocknr % 8);
    }

    pub fn set_free(&mut self, blocknr: usize) {
        assert!(blocknr < self.len);
        self.bits.as_mut()[blocknr / 8] &= !(1u8 << (blocknr % 8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut region = [0u8; 8];
        let mut bmp = Bitmap::overlay(&mut region[..], 64);

        bmp.set_reserved(2);

        assert_eq!(bmp.get(0), State::Free);
        assert_eq!(bmp.get(2), State::Used);
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut region = [0u8; 512];
        let mut bmp = Bitmap::overlay(&mut region[..], 4096);

        bmp.set_reserved(0);
        bmp.set_reserved(4095);

        assert_eq!(bmp.get(0), State::Used);
        assert_eq!(bmp.get(4095), State::Used);
        assert_eq!(bmp.count_used(4096), 2);
    }

    #[test]
    fn can_toggle_block_between_free_and_used() {
        let mut region = [0u8; 4];
        let mut bmp = Bitmap::overlay(&mut region[..], 32);

        bmp.set_reserved(10);
        bmp.set_reserved(11);
        assert_eq!(bmp.get(10), State::Used);

        bmp.set_free(10);
        assert_eq!(bmp.get(10), State::Free);
        // Neighbouring bits are left alone.
        assert_eq!(bmp.get(11), State::Used);
    }

    #[test]
    fn bits_are_stored_lsb_first_in_the_backing_bytes() {
        let mut region = [0u8; 2];
        {
            let mut bmp = Bitmap::overlay(&mut region[..], 16);
            bmp.set_reserved(0);
            bmp.set_reserved(9);
        }
        assert_eq!(region, [0b0000_0001, 0b0000_0010]);

        let bmp = Bitmap::overlay(&region[..], 16);
        assert_eq!(bmp.get(9), State::Used);
    }

    #[test]
    fn first_free_skips_full_bytes() {
        let mut region = [0xFFu8, 0xFF, 0b0000_0111, 0];
        let bmp = Bitmap::overlay(&mut region[..], 32);
        assert_eq!(bmp.first_free(32), Some(19));
    }

    #[test]
    fn first_free_respects_limit() {
        let region = [0xFFu8, 0b0000_1111];
        let bmp = Bitmap::overlay(&region[..], 16);
        assert_eq!(bmp.first_free(12), None);
        assert_eq!(bmp.first_free(13), Some(12));
        assert_eq!(Bitmap::overlay(&[0xFFu8; 2][..], 16).first_free(16), None);
    }

    #[test]
    fn count_used_ignores_bits_past_limit() {
        let region = [0xFFu8, 0xFF];
        let bmp = Bitmap::overlay(&region[..], 16);
        assert_eq!(bmp.count_used(16), 16);
        assert_eq!(bmp.count_used(11), 11);
        assert_eq!(bmp.count_used(0), 0);
    }

    #[test]
    #[should_panic(expected = "Bitmap region too small")]
    fn overlaying_short_region_panics() {
        Bitmap::overlay(&[0u8; 1][..], 9);
    }

    #[test]
    #[should_panic]
    fn reading_past_tracked_bits_panics() {
        let region = [0u8; 2];
        Bitmap::overlay(&region[..], 10).get(10);
    }
}
