//! Packed fingerprint storage
//!
//! A bucket holds `slots` fingerprints of `bits` bits each, packed back to back into the fewest bytes that can hold them. With the default 12 bit tags and 4 slots a bucket is 6 bytes, a 33% saving over rounding every tag up to 16 bits.
//!
//! Slot `j` starts at bit `j * bits` of the bucket, least significant bit first. A tag value of 0 means the slot is empty, which is why the addressing layer never hands out a zero fingerprint.

/// A stored fingerprint. Only the low `bits` bits of the layout are meaningful.
pub type Fingerprint = u16;

/// The widest tag we can pack. A 16 bit field at an odd bit offset still fits in a 3 byte window.
pub const MAX_TAG_BITS: u32 = 16;

/// Describes how tags are packed inside one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLayout {
    bits: u32,
    slots: usize,
    bucket_bytes: usize,
}

impl TagLayout {
    pub fn new(bits: u32, slots: usize) -> TagLayout {
        debug_assert!(bits > 0 && bits <= MAX_TAG_BITS);
        debug_assert!(slots > 0);
        TagLayout {
            bits,
            slots,
            bucket_bytes: (bits as usize * slots + 7) / 8,
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of fingerprint slots in each bucket
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Bytes occupied by one packed bucket
    pub fn bucket_bytes(&self) -> usize {
        self.bucket_bytes
    }

    pub fn tag_mask(&self) -> Fingerprint {
        ((1u32 << self.bits) - 1) as Fingerprint
    }

    /// Read the tag stored at `slot` of a packed bucket
    pub fn read(&self, bucket: &[u8], slot: usize) -> Fingerprint {
        debug_assert!(slot < self.slots);
        let bit_offset = slot * self.bits as usize;
        let shift = bit_offset % 8;
        let mut window: u32 = 0;
        for (i, &byte) in bucket[bit_offset / 8..].iter().take(3).enumerate() {
            window |= (byte as u32) << (8 * i);
        }
        ((window >> shift) & self.tag_mask() as u32) as Fingerprint
    }

    /// Overwrite the tag at `slot` of a packed bucket, leaving neighbouring slots untouched
    pub fn write(&self, bucket: &mut [u8], slot: usize, tag: Fingerprint) {
        debug_assert!(slot < self.slots);
        let bit_offset = slot * self.bits as usize;
        let shift = bit_offset % 8;
        let mask = (self.tag_mask() as u32) << shift;
        let value = ((tag & self.tag_mask()) as u32) << shift;
        for (i, byte) in bucket[bit_offset / 8..].iter_mut().take(3).enumerate() {
            let byte_mask = (mask >> (8 * i)) as u8;
            let byte_value = (value >> (8 * i)) as u8;
            *byte = (*byte & !byte_mask) | byte_value;
        }
    }

    /// First empty slot of the bucket, if any
    pub fn free_slot(&self, bucket: &[u8]) -> Option<usize> {
        self.find(bucket, 0)
    }

    /// First slot holding `tag`. Searching for 0 finds a free slot.
    pub fn find(&self, bucket: &[u8], tag: Fingerprint) -> Option<usize> {
        (0..self.slots).find(|&slot| self.read(bucket, slot) == tag)
    }

    pub fn contains(&self, bucket: &[u8], tag: Fingerprint) -> bool {
        tag != 0 && self.find(bucket, tag).is_some()
    }

    /// Number of occupied slots in the bucket
    #[cfg(test)]
    pub fn occupied(&self, bucket: &[u8]) -> usize {
        (0..self.slots)
            .filter(|&slot| self.read(bucket, slot) != 0)
            .count()
    }
}

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_six_bytes() {
        let layout = TagLayout::new(12, 4);
        assert_eq!(layout.bucket_bytes(), 6);
        assert_eq!(layout.tag_mask(), 0xFFF);
    }

    #[test]
    fn odd_layouts_round_up() {
        assert_eq!(TagLayout::new(7, 3).bucket_bytes(), 3);
        assert_eq!(TagLayout::new(16, 4).bucket_bytes(), 8);
        assert_eq!(TagLayout::new(13, 1).bucket_bytes(), 2);
    }

    #[test]
    fn write_then_read_every_slot() {
        let layout = TagLayout::new(12, 4);
        let mut bucket = [0u8; 6];
        let tags = [0xABC, 0x123, 0xFFF, 0x001];
        for (slot, &tag) in tags.iter().enumerate() {
            layout.write(&mut bucket, slot, tag);
        }
        for (slot, &tag) in tags.iter().enumerate() {
            assert_eq!(layout.read(&bucket, slot), tag);
        }
        // Little-endian packing: slot 0 occupies the low 12 bits
        assert_eq!(bucket[0], 0xBC);
        assert_eq!(bucket[1] & 0x0F, 0x0A);
    }

    #[test]
    fn write_leaves_neighbours_alone() {
        let layout = TagLayout::new(12, 4);
        let mut bucket = [0xFFu8; 6];
        layout.write(&mut bucket, 1, 0);
        assert_eq!(layout.read(&bucket, 0), 0xFFF);
        assert_eq!(layout.read(&bucket, 1), 0);
        assert_eq!(layout.read(&bucket, 2), 0xFFF);
        assert_eq!(layout.read(&bucket, 3), 0xFFF);
    }

    #[test]
    fn wide_tags_at_odd_offsets() {
        let layout = TagLayout::new(15, 3);
        let mut bucket = vec![0u8; layout.bucket_bytes()];
        layout.write(&mut bucket, 0, 0x7FFF);
        layout.write(&mut bucket, 1, 0x5555);
        layout.write(&mut bucket, 2, 0x2AAA);
        assert_eq!(layout.read(&bucket, 0), 0x7FFF);
        assert_eq!(layout.read(&bucket, 1), 0x5555);
        assert_eq!(layout.read(&bucket, 2), 0x2AAA);
    }

    #[test]
    fn tags_are_masked_on_write() {
        let layout = TagLayout::new(12, 4);
        let mut bucket = [0u8; 6];
        layout.write(&mut bucket, 2, 0xF123);
        assert_eq!(layout.read(&bucket, 2), 0x123);
        assert_eq!(layout.read(&bucket, 3), 0);
    }

    #[test]
    fn scans() {
        let layout = TagLayout::new(12, 4);
        let mut bucket = [0u8; 6];
        assert_eq!(layout.free_slot(&bucket), Some(0));
        assert!(!layout.contains(&bucket, 0));
        layout.write(&mut bucket, 0, 0x42);
        layout.write(&mut bucket, 1, 0x43);
        assert_eq!(layout.free_slot(&bucket), Some(2));
        assert_eq!(layout.find(&bucket, 0x43), Some(1));
        assert!(layout.contains(&bucket, 0x42));
        assert!(!layout.contains(&bucket, 0x44));
        assert_eq!(layout.occupied(&bucket), 2);
    }
}
