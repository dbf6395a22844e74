//! Implementations of hash functions
//!
//! The filter only needs a deterministic, seedable 32 bit hash of a byte string. Everything else (bucket index, segment index, fingerprint) is carved out of that one value, so the hash is computed exactly once per operation.

use crate::murmur3::murmur3_32;

/// Which hash function a filter uses to address keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashKind {
    /// Bob Jenkins' lookup2 hash
    #[default]
    Bob,
    /// MurmurHash3, x86 32 bit variant
    Murmur3,
}

impl HashKind {
    pub fn hash(self, input: &[u8], seed: u32) -> u32 {
        match self {
            HashKind::Bob => hash_bob(input, seed),
            HashKind::Murmur3 => murmur3_32(input, seed),
        }
    }
}

/// The golden ratio; an arbitrary starting value for lookup2
const GOLDEN_RATIO: u32 = 0x9e37_79b9;

/// Bob Jenkins' lookup2 hash
///
/// Source: <http://burtleburtle.net/bob/hash/doobs.html>
///
/// Unlike the reference code, the length mixed into `c` is that of the tail left after the 12 byte rounds, not of the whole input.
pub fn hash_bob(input: &[u8], seed: u32) -> u32 {
    let mut a = GOLDEN_RATIO;
    let mut b = GOLDEN_RATIO;
    let mut c = seed;

    let mut chunks = input.chunks_exact(12);
    for chunk in &mut chunks {
        a = a.wrapping_add(le_word(&chunk[0..4]));
        b = b.wrapping_add(le_word(&chunk[4..8]));
        c = c.wrapping_add(le_word(&chunk[8..12]));
        (a, b, c) = mix(a, b, c);
    }

    // The first byte of `c` is reserved for the length
    let tail = chunks.remainder();
    c = c.wrapping_add(tail.len() as u32);
    a = a.wrapping_add(le_word(&tail[..tail.len().min(4)]));
    if tail.len() > 4 {
        b = b.wrapping_add(le_word(&tail[4..tail.len().min(8)]));
    }
    if tail.len() > 8 {
        c = c.wrapping_add(le_word(&tail[8..]) << 8);
    }
    let (_, _, c) = mix(a, b, c);
    c
}

/// Assemble up to 4 bytes into a little-endian word
fn le_word(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .enumerate()
        .fold(0u32, |word, (i, &byte)| word | (byte as u32) << (8 * i))
}

fn mix(mut a: u32, mut b: u32, mut c: u32) -> (u32, u32, u32) {
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 13);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 8);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 13);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 12);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 16);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 5);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 3);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 10);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 15);
    (a, b, c)
}

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn basic_hash_test_bob() {
        let a = hash_bob("cat".as_bytes(), 0);
        let b = hash_bob("dog".as_bytes(), 0);
        assert_ne!(a, b);
    }

    #[test]
    fn bob_is_deterministic() {
        let key = b"the same key, hashed twice";
        assert_eq!(hash_bob(key, 7), hash_bob(key, 7));
        assert_eq!(HashKind::Bob.hash(key, 7), hash_bob(key, 7));
    }

    #[test]
    fn bob_depends_on_seed() {
        let key = b"seeded";
        assert_ne!(hash_bob(key, 0), hash_bob(key, 1));
    }

    #[test]
    fn bob_handles_every_tail_length() {
        let data: Vec<u8> = (0u8..40).collect();
        let mut outputs = HashSet::new();
        for len in 0..=data.len() {
            outputs.insert(hash_bob(&data[..len], 0));
        }
        assert_eq!(outputs.len(), data.len() + 1);
    }

    #[test]
    fn bob_collision_rate() {
        const NUM_SAMPLES: usize = 10_000;
        let mut output_set: HashSet<u32> = HashSet::with_capacity(NUM_SAMPLES);
        for i in 0..NUM_SAMPLES {
            output_set.insert(hash_bob(i.to_string().as_bytes(), 0));
        }
        // Birthday bound for 10k samples in 32 bits is ~0.01 expected collisions
        assert!(NUM_SAMPLES - output_set.len() <= 2);
    }

    #[test]
    fn bob_mixes_in_tail_length() {
        let (a, b, c) = mix(GOLDEN_RATIO, GOLDEN_RATIO, 5);
        // A whole number of rounds leaves an empty tail
        assert_eq!(hash_bob(&[0u8; 12], 5), mix(a, b, c).2);
        assert_eq!(hash_bob(&[0u8; 13], 5), mix(a, b, c.wrapping_add(1)).2);
        assert_eq!(
            hash_bob(&[], 5),
            mix(GOLDEN_RATIO, GOLDEN_RATIO, 5).2
        );
    }

    #[test]
    fn le_word_packs_little_endian() {
        assert_eq!(le_word(&[]), 0);
        assert_eq!(le_word(&[0x01]), 0x01);
        assert_eq!(le_word(&[0x01, 0x02, 0x03, 0x04]), 0x0403_0201);
    }
}
