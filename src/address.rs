//! Key addressing
//!
//! One 32 bit hash is carved into three fields:
//!
//! ```text
//!  31                     initial_depth      bucket_bits        0
//!  +----------------------+-----------------+------------------+
//!  |   fingerprint (B)    |  segment index  |   bucket index   |
//!  +----------------------+-----------------+------------------+
//!                         ^ table_depth grows into the fingerprint
//! ```
//!
//! The fingerprint always starts at `initial_depth`, while the segment index widens as the table grows. Once the table is deeper than it started, the low bits of the fingerprint double as the high bits of the segment index. This is what lets a segment split without rehashing: bit `k` of a stored tag is exactly the segment index bit that the `k`-th generation of splits adds.

use crate::bucket::Fingerprint;

/// Where a key lives: a segment, a primary bucket inside it, and the tag stored there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub bucket: u32,
    pub segment: usize,
    pub tag: Fingerprint,
}

/// The fixed part of the addressing scheme. The variable part (table depth, segment count) is passed per call.
#[derive(Debug, Clone, Copy)]
pub struct Addressing {
    bucket_bits: u32,
    tag_bits: u32,
    initial_depth: u32,
}

#[inline]
fn low_mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// The alternate bucket of a tag, within a segment of `2^bucket_bits` buckets
///
/// Since XOR is its own inverse, the alternate of the alternate is the original bucket. Only the bucket index and the tag go in, so a tag's pair of buckets is the same in whichever segment it lives.
#[inline]
pub fn alt_index(index: u32, tag: Fingerprint, bucket_bits: u32) -> u32 {
    (index ^ tag as u32) & low_mask(bucket_bits)
}

/// `ceil(log2(n))`, with `ceil_log2(0) == ceil_log2(1) == 0`
#[inline]
pub fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

impl Addressing {
    pub fn new(bucket_bits: u32, tag_bits: u32, initial_depth: u32) -> Addressing {
        debug_assert!(initial_depth >= bucket_bits);
        Addressing {
            bucket_bits,
            tag_bits,
            initial_depth,
        }
    }

    /// Derive the address of a hashed key for a table of the given depth and segment count
    pub fn locate(&self, hash: u32, table_depth: u32, segment_count: usize) -> Address {
        debug_assert!(table_depth >= self.initial_depth);
        let bucket = hash & low_mask(self.bucket_bits);
        let segment_bits = table_depth - self.bucket_bits;
        let mut segment = (hash >> self.bucket_bits) & low_mask(segment_bits);
        let mut tag = (hash.checked_shr(self.initial_depth).unwrap_or(0) & low_mask(self.tag_bits))
            as Fingerprint;

        if tag == 0 {
            // A remapped tag reads as 1, so its lowest split bit is set. Route it the way that bit says.
            if table_depth > self.initial_depth {
                segment |= 1 << (self.initial_depth - self.bucket_bits);
            }
            tag = 1;
        }

        let mut segment = segment as usize;
        if segment >= segment_count {
            // The sibling this key will split into does not exist yet
            segment -= 1 << (segment_bits - 1);
        }
        debug_assert!(
            segment < segment_count,
            "segment {segment} out of range for {segment_count} segments at depth {table_depth}"
        );

        Address {
            bucket,
            segment,
            tag,
        }
    }
}

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    // 4 buckets per segment, 8 bit tags, 2 initial segments
    fn addressing() -> Addressing {
        Addressing::new(2, 8, 3)
    }

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
    }

    #[test]
    fn alt_index_is_an_involution() {
        for index in 0..32u32 {
            for tag in 1..300u16 {
                let alt = alt_index(index, tag, 5);
                assert!(alt < 32);
                assert_eq!(alt_index(alt, tag, 5), index);
            }
        }
    }

    #[test]
    fn fields_at_initial_depth() {
        // tag 0xA5 | segment 1 | bucket 2
        let hash = (0xA5 << 3) | (1 << 2) | 2;
        let address = addressing().locate(hash, 3, 2);
        assert_eq!(
            address,
            Address {
                bucket: 2,
                segment: 1,
                tag: 0xA5
            }
        );
    }

    #[test]
    fn segment_index_widens_into_tag() {
        // tag 0xA5 has bit 0 set, so one level deeper the key lives in segment 1 | 2
        let hash = (0xA5 << 3) | (1 << 2) | 2;
        let address = addressing().locate(hash, 4, 4);
        assert_eq!(address.segment, 3);
        assert_eq!(address.tag, 0xA5);
        assert_eq!(address.bucket, 2);
    }

    #[test]
    fn unsplit_segments_fold_back() {
        // Only segment 0 has been split (3 segments): segment 3 folds to its sibling 1
        let hash = (0xA5 << 3) | (1 << 2) | 2;
        let address = addressing().locate(hash, 4, 3);
        assert_eq!(address.segment, 1);
        let hash = (0xA5 << 3) | 2;
        let address = addressing().locate(hash, 4, 3);
        assert_eq!(address.segment, 2);
    }

    #[test]
    fn zero_tag_is_remapped() {
        let hash = (1 << 2) | 3;
        let address = addressing().locate(hash, 3, 2);
        assert_eq!(address.tag, 1);
        assert_eq!(address.segment, 1);
    }

    #[test]
    fn zero_tag_routes_by_its_remapped_bit() {
        let hash = 3;
        // At depth 4 the remapped tag 1 behaves as if split bit 0 were set
        let address = addressing().locate(hash, 4, 4);
        assert_eq!(address.tag, 1);
        assert_eq!(address.segment, 2);
        // Segment 0 splits first, so segment 2 already exists with 3 segments
        let address = addressing().locate(hash, 4, 3);
        assert_eq!(address.segment, 2);
        // At the initial depth there is no split bit to set
        let address = addressing().locate(hash, 3, 2);
        assert_eq!(address.segment, 0);
    }

    #[test]
    fn single_initial_segment() {
        let addressing = Addressing::new(5, 12, 5);
        for hash in [0u32, 1, 0xFFFF_FFFF, 0x1234_5678] {
            let address = addressing.locate(hash, 5, 1);
            assert_eq!(address.segment, 0);
            assert_ne!(address.tag, 0);
        }
    }

    #[test]
    fn deep_initial_depth_leaves_short_tags() {
        // With an initial depth of 28 only 4 hash bits remain for the tag
        let addressing = Addressing::new(5, 12, 28);
        let address = addressing.locate(0xF000_0000, 28, 1 << 23);
        assert_eq!(address.tag, 0xF);
    }
}
