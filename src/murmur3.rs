//! Murmur3 Hash Rust Implementation
//!
//! The x86 32 bit variant of MurmurHash3, following the reference algorithm by Austin Appleby. Only the 32 bit digest is needed because the filter addresses keys with a single `u32`.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Internal mixing operation applied to the final state
fn fmix32(k: u32) -> u32 {
    const F1: u32 = 0x85eb_ca6b;
    const F2: u32 = 0xc2b2_ae35;
    let mut tmp = k;
    tmp ^= tmp >> 16;
    tmp = tmp.wrapping_mul(F1);
    tmp ^= tmp >> 13;
    tmp = tmp.wrapping_mul(F2);
    tmp ^= tmp >> 16;
    tmp
}

fn scramble(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// MurmurHash3 x86_32 of `input` with the given seed
pub fn murmur3_32(input: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut blocks = input.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k = tail
            .iter()
            .enumerate()
            .fold(0u32, |k, (i, &byte)| k | (byte as u32) << (8 * i));
        h ^= scramble(k);
    }

    h ^= input.len() as u32;
    fmix32(h)
}

/* -------------------- Unit Tests -------------------- */
