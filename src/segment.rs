//! # Segments
//!
//! A segment is a small cuckoo hash table of `2^bucket_bits` buckets. It never rehashes: when cuckoo relocation runs out of kicks it appends another *block* (a full copy of the bucket array) and keeps inserting there, so every bucket index is backed by one bucket per block. Lookups and deletes scan the same two bucket indices in every block.
//!
//! Splitting a segment in two is a pure bit test on each stored tag, and merging two segments is a concatenation of their blocks. Neither touches a hash function.

use rand::Rng;
use tracing::{trace, warn};

use crate::address::alt_index;
use crate::bucket::{Fingerprint, TagLayout};
use crate::filter::FilterError;

/// Everything a segment needs to know about the table it belongs to
#[derive(Debug, Clone, Copy)]
pub struct SegmentShape {
    pub layout: TagLayout,
    pub bucket_bits: u32,
    pub max_kicks: usize,
    pub max_blocks: Option<usize>,
}

impl SegmentShape {
    pub fn buckets(&self) -> usize {
        1 << self.bucket_bits
    }

    fn block_bytes(&self) -> usize {
        self.buckets() * self.layout.bucket_bytes()
    }
}

/// A tag that could not be placed, together with one of its two candidate buckets
///
/// An item being here means that the segment hit its block limit. Keeping the tag around means lookups stay correct even when the segment is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StashedTag {
    index: u32,
    tag: Fingerprint,
}

#[derive(Debug)]
pub struct Segment {
    shape: SegmentShape,
    blocks: Vec<Vec<u8>>,
    insert_cursor: usize,
    stash: Vec<StashedTag>,
}

impl Segment {
    pub fn new(shape: SegmentShape) -> Segment {
        Segment {
            shape,
            blocks: vec![vec![0u8; shape.block_bytes()]],
            insert_cursor: 0,
            stash: Vec::new(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes of fingerprint storage held by this segment
    pub fn byte_size(&self) -> usize {
        self.blocks.len() * self.shape.block_bytes()
    }

    /// Number of tags stored, stash included
    #[cfg(test)]
    pub fn occupied(&self) -> usize {
        let layout = self.shape.layout;
        let bucket_bytes = layout.bucket_bytes();
        let stored: usize = self
            .blocks
            .iter()
            .flat_map(|block| block.chunks_exact(bucket_bytes))
            .map(|bucket| layout.occupied(bucket))
            .sum();
        stored + self.stash.len()
    }

    #[cfg(test)]
    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    fn alt_index(&self, index: u32, tag: Fingerprint) -> u32 {
        alt_index(index, tag, self.shape.bucket_bits)
    }

    fn bucket(&self, block: usize, index: u32) -> &[u8] {
        let bytes = self.shape.layout.bucket_bytes();
        let start = index as usize * bytes;
        &self.blocks[block][start..start + bytes]
    }

    fn bucket_mut(&mut self, block: usize, index: u32) -> &mut [u8] {
        let bytes = self.shape.layout.bucket_bytes();
        let start = index as usize * bytes;
        &mut self.blocks[block][start..start + bytes]
    }

    /// Is this segment unable to take any more tags?
    ///
    /// Criteria is that the block limit is reached and something is already waiting in the stash
    fn is_full(&self) -> bool {
        !self.stash.is_empty()
            && self
                .shape
                .max_blocks
                .is_some_and(|max| self.blocks.len() >= max)
    }

    /// Insert a tag whose primary bucket is `index`
    ///
    /// Only fails when the segment has a block limit, the limit is reached and an earlier insert already parked a tag in the stash. The segment is left untouched in that case.
    pub fn insert<R: Rng>(
        &mut self,
        index: u32,
        tag: Fingerprint,
        rng: &mut R,
    ) -> Result<(), FilterError> {
        debug_assert!(tag != 0);
        if self.is_full() {
            warn!(blocks = self.blocks.len(), "segment is full, refusing insert");
            return Err(FilterError::CapacityExceeded);
        }

        let (mut index, mut tag) = (index, tag);
        loop {
            match self.insert_at_block(self.insert_cursor, index, tag, rng) {
                None => return Ok(()),
                Some(homeless) => {
                    (index, tag) = (homeless.index, homeless.tag);
                    if !self.advance_cursor() {
                        warn!(
                            blocks = self.blocks.len(),
                            stash = self.stash.len() + 1,
                            "segment reached its block limit, stashing tag"
                        );
                        self.stash.push(homeless);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Bounded cuckoo insertion into one block. Returns the tag left over when the kicks run out.
    ///
    /// The first round only probes, so both candidate buckets are checked for a free slot before anything is evicted.
    fn insert_at_block<R: Rng>(
        &mut self,
        block: usize,
        mut index: u32,
        mut tag: Fingerprint,
        rng: &mut R,
    ) -> Option<StashedTag> {
        let layout = self.shape.layout;
        for kick in 0..self.shape.max_kicks {
            let bucket = self.bucket_mut(block, index);
            if let Some(slot) = layout.free_slot(bucket) {
                layout.write(bucket, slot, tag);
                return None;
            }
            if kick > 0 {
                // Randomly choose a slot to evict from and swap
                let slot = rng.gen_range(0..layout.slots());
                let evicted = layout.read(bucket, slot);
                layout.write(bucket, slot, tag);
                tag = evicted;
            }
            index = self.alt_index(index, tag);
        }
        Some(StashedTag { index, tag })
    }

    /// Move the insert cursor to the next block, appending one if needed. False when the block limit forbids it.
    fn advance_cursor(&mut self) -> bool {
        let next = self.insert_cursor + 1;
        if next == self.blocks.len() {
            if self
                .shape
                .max_blocks
                .is_some_and(|max| self.blocks.len() >= max)
            {
                return false;
            }
            self.blocks.push(vec![0u8; self.shape.block_bytes()]);
            trace!(blocks = self.blocks.len(), "segment appended a block");
        }
        self.insert_cursor = next;
        true
    }

    /// Check both candidate buckets in every block, then the stash
    pub fn contains(&self, first: u32, second: u32, tag: Fingerprint) -> bool {
        let layout = self.shape.layout;
        let in_blocks = (0..self.blocks.len()).any(|block| {
            layout.contains(self.bucket(block, first), tag)
                || layout.contains(self.bucket(block, second), tag)
        });
        in_blocks
            || self
                .stash
                .iter()
                .any(|s| s.tag == tag && (s.index == first || s.index == second))
    }

    /// Remove one copy of `tag`: the first bucket in every block, then the second bucket, then the stash
    pub fn remove(&mut self, first: u32, second: u32, tag: Fingerprint) -> bool {
        let layout = self.shape.layout;
        for index in [first, second] {
            for block in 0..self.blocks.len() {
                let bucket = self.bucket_mut(block, index);
                if let Some(slot) = layout.find(bucket, tag) {
                    layout.write(bucket, slot, 0);
                    self.rehome_stash();
                    return true;
                }
            }
        }
        let stashed = self
            .stash
            .iter()
            .position(|s| s.tag == tag && (s.index == first || s.index == second));
        match stashed {
            Some(position) => {
                self.stash.swap_remove(position);
                true
            }
            None => false,
        }
    }

    /// Move every tag whose `active_bit` is set into `partner`
    ///
    /// Tags keep their block and slot, so the bucket pair of every tag is unchanged on both sides. `partner` is expected to be a fresh segment of the same shape.
    pub fn split_into(&mut self, partner: &mut Segment, active_bit: u32) {
        debug_assert!(active_bit < self.shape.layout.bits());
        let layout = self.shape.layout;
        let bucket_bytes = layout.bucket_bytes();
        let block_bytes = self.shape.block_bytes();
        let moves = |tag: Fingerprint| tag != 0 && (tag >> active_bit) & 1 == 1;

        partner
            .blocks
            .resize_with(self.blocks.len(), || vec![0u8; block_bytes]);
        for (mine, theirs) in self.blocks.iter_mut().zip(partner.blocks.iter_mut()) {
            let buckets = mine
                .chunks_exact_mut(bucket_bytes)
                .zip(theirs.chunks_exact_mut(bucket_bytes));
            for (here, there) in buckets {
                for slot in 0..layout.slots() {
                    let tag = layout.read(here, slot);
                    if moves(tag) {
                        layout.write(there, slot, tag);
                        layout.write(here, slot, 0);
                    }
                }
            }
        }

        let (moving, staying): (Vec<StashedTag>, Vec<StashedTag>) =
            self.stash.drain(..).partition(|s| moves(s.tag));
        self.stash = staying;
        partner.stash.extend(moving);

        self.trim();
        partner.trim();
    }

    /// Absorb all of `other`'s blocks after our own. Bucket indices are unaffected.
    ///
    /// With a block limit, tags in blocks past the limit are moved into free slots of the kept blocks, and whatever does not fit is stashed.
    pub fn merge(&mut self, other: Segment) {
        self.blocks.extend(other.blocks);
        self.stash.extend(other.stash);
        self.trim();
        self.fold_surplus_blocks();
    }

    /// Drop every empty block, keeping at least one, and restart inserts from the first block
    ///
    /// All blocks cover the same bucket indices, so which blocks remain and in what order does not matter.
    fn trim(&mut self) {
        self.blocks.retain(|block| block.iter().any(|&byte| byte != 0));
        if self.blocks.is_empty() {
            self.blocks.push(vec![0u8; self.shape.block_bytes()]);
        }
        self.insert_cursor = 0;
        self.rehome_stash();
    }

    /// Bring the block count back under `max_blocks` after a merge
    fn fold_surplus_blocks(&mut self) {
        let Some(max) = self.shape.max_blocks else {
            return;
        };
        if self.blocks.len() <= max {
            return;
        }
        let layout = self.shape.layout;
        let surplus = self.blocks.split_off(max);
        for block in &surplus {
            for (index, bucket) in block.chunks_exact(layout.bucket_bytes()).enumerate() {
                let index = index as u32;
                for slot in 0..layout.slots() {
                    let tag = layout.read(bucket, slot);
                    if tag != 0 && !self.place_free(index, tag) {
                        self.stash.push(StashedTag { index, tag });
                    }
                }
            }
        }
        if !self.stash.is_empty() {
            warn!(
                blocks = self.blocks.len(),
                stash = self.stash.len(),
                "merged segment over its block limit, stashing tags"
            );
        }
    }

    /// Put stashed tags back into free slots of their buckets, where possible
    fn rehome_stash(&mut self) {
        if self.stash.is_empty() {
            return;
        }
        let stash = std::mem::take(&mut self.stash);
        for stashed in stash {
            if !self.place_free(stashed.index, stashed.tag) {
                self.stash.push(stashed);
            }
        }
    }

    fn place_free(&mut self, index: u32, tag: Fingerprint) -> bool {
        let layout = self.shape.layout;
        let alt = self.alt_index(index, tag);
        for block in 0..self.blocks.len() {
            for candidate in [index, alt] {
                let bucket = self.bucket_mut(block, candidate);
                if let Some(slot) = layout.free_slot(bucket) {
                    layout.write(bucket, slot, tag);
                    return true;
                }
            }
        }
        false
    }
}

/* -------------------- Unit Tests -------------------- */
