//! # Bamboo Filter
//!
//! A cuckoo filter that grows and shrinks one segment at a time, in the style of linear hashing.
//!
//! The table is a list of segments plus a split pointer. Every `trigger_mask + 1` inserts the segment under the split pointer is split in two and a new segment is appended; every time the item count falls back onto such a boundary the last segment is merged back into its sibling. Neither step rehashes: which half of a split an entry belongs to is read straight from a bit of its stored fingerprint (see [`crate::address`]).
//!
//! Each step moves one segment's worth of tags, so the cost of resizing is spread evenly over inserts and deletes instead of stalling one insert to double the whole table.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::address::{alt_index, ceil_log2, Address, Addressing};
use crate::bucket::TagLayout;
use crate::config::{ConfigError, FilterConfig};
use crate::segment::{Segment, SegmentShape};

type Input = [u8];

/// The initial table may span at most `2^24` segments
const MAX_INITIAL_SEGMENT_BITS: u32 = 24;

/// Possible errors for the Bamboo Filter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid filter configuration: {0}")]
    Config(#[from] ConfigError),
    /// Requested capacity at initialization exceeds item limit
    #[error("expected item count is too large to address with a 32 bit hash")]
    CapacityExceedsItemLimit,
    /// A segment reached its block limit with a tag already stashed
    #[error("segment is at its block limit and cannot take more items")]
    CapacityExceeded,
}

/// A dynamically resizable cuckoo filter
///
/// ### Notes
///
/// - Lookups never give false negatives. False positives happen at a rate of roughly `2 * slots * blocks / 2^tag_bits`, where `blocks` is the average number of blocks per segment (about `load_factor`).
/// - A false positive also means `delete` of a key that was never inserted can remove some other key's fingerprint. Only delete keys you inserted.
/// - Not synchronized. Concurrent lookups are fine while nothing mutates the filter; anything else needs an external lock.
#[derive(Debug)]
pub struct BambooFilter<R = StdRng> {
    config: FilterConfig,
    addressing: Addressing,
    shape: SegmentShape,
    segments: Vec<Segment>,
    split_pointer: usize,
    table_depth: u32,
    initial_table_depth: u32,
    max_table_depth: u32,
    initial_segments: usize,
    num_items: usize,
    trigger_mask: usize,
    rng: R,
}

impl BambooFilter<StdRng> {
    /// Create a filter with default parameters sized for `expected_items`
    ///
    /// `load_factor` is the average number of items per segment slot at which the table extends by one segment.
    pub fn new(expected_items: usize, load_factor: f64) -> Result<Self, FilterError> {
        Self::with_config(expected_items, FilterConfig::default().load_factor(load_factor))
    }

    pub fn with_config(expected_items: usize, config: FilterConfig) -> Result<Self, FilterError> {
        Self::with_rng(expected_items, config, StdRng::from_entropy())
    }
}

impl<R: Rng> BambooFilter<R> {
    /// Create a filter that picks cuckoo victims with the given random source
    ///
    /// Pass a seeded generator to make the layout of the filter reproducible.
    pub fn with_rng(
        expected_items: usize,
        config: FilterConfig,
        rng: R,
    ) -> Result<Self, FilterError> {
        config.validate()?;
        let bucket_bits = config.bucket_bits;
        let expected_buckets = (expected_items / config.slots_per_bucket).max(1);
        let initial_table_depth = ceil_log2(expected_buckets).max(bucket_bits);
        if initial_table_depth - bucket_bits > MAX_INITIAL_SEGMENT_BITS {
            return Err(FilterError::CapacityExceedsItemLimit);
        }
        // Past this depth the fingerprint has no bit left to split on
        let max_table_depth = (initial_table_depth + config.tag_bits).min(u32::BITS);

        let shape = SegmentShape {
            layout: TagLayout::new(config.tag_bits, config.slots_per_bucket),
            bucket_bits,
            max_kicks: config.max_kicks,
            max_blocks: config.max_blocks_per_segment,
        };
        let initial_segments = 1usize << (initial_table_depth - bucket_bits);
        let segments = (0..initial_segments).map(|_| Segment::new(shape)).collect();

        Ok(BambooFilter {
            config,
            addressing: Addressing::new(bucket_bits, config.tag_bits, initial_table_depth),
            shape,
            segments,
            split_pointer: 0,
            table_depth: initial_table_depth,
            initial_table_depth,
            max_table_depth,
            initial_segments,
            num_items: 0,
            trigger_mask: config.trigger_mask(),
            rng,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Number of items currently in the filter
    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// log2 of the number of buckets the table currently addresses
    pub fn table_depth(&self) -> u32 {
        self.table_depth
    }

    pub fn initial_table_depth(&self) -> u32 {
        self.initial_table_depth
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the next segment to be split
    pub fn split_pointer(&self) -> usize {
        self.split_pointer
    }

    /// Total capacity blocks across all segments
    pub fn block_count(&self) -> usize {
        self.segments.iter().map(Segment::block_count).sum()
    }

    /// Approximately how many bytes of fingerprint storage is this filter using?
    pub fn estimate_size(&self) -> usize {
        self.segments.iter().map(Segment::byte_size).sum()
    }

    fn address(&self, item: &Input) -> Address {
        let hash = self.config.hash.hash(item, self.config.seed);
        self.addressing
            .locate(hash, self.table_depth, self.segments.len())
    }

    /// Add item to filter
    ///
    /// Only returns Err when segments have a block limit and the addressed segment is full. With the default configuration segments grow instead and this never fails.
    pub fn insert(&mut self, item: &Input) -> Result<(), FilterError> {
        let address = self.address(item);
        self.segments[address.segment].insert(address.bucket, address.tag, &mut self.rng)?;
        self.num_items += 1;
        if self.num_items & self.trigger_mask == 0 {
            self.extend();
        }
        Ok(())
    }

    /// Check if item is in filter
    pub fn lookup(&self, item: &Input) -> bool {
        let address = self.address(item);
        let alt = alt_index(address.bucket, address.tag, self.shape.bucket_bits);
        self.segments[address.segment].contains(address.bucket, alt, address.tag)
    }

    /// Delete an item from the filter. Returns false if it was not found.
    pub fn delete(&mut self, item: &Input) -> bool {
        let address = self.address(item);
        let alt = alt_index(address.bucket, address.tag, self.shape.bucket_bits);
        if !self.segments[address.segment].remove(address.bucket, alt, address.tag) {
            return false;
        }
        self.num_items -= 1;
        if self.num_items & self.trigger_mask == 0 {
            self.compress();
        }
        true
    }

    /// Append a segment and split the segment under the split pointer into it
    fn extend(&mut self) {
        let new_index = self.segments.len();
        let segment_bits = ceil_log2(new_index + 1);
        let table_depth = segment_bits + self.shape.bucket_bits;
        if table_depth > self.max_table_depth {
            debug!(
                table_depth = self.table_depth,
                segments = self.segments.len(),
                "table at maximum depth, segments keep growing in place"
            );
            return;
        }

        let generation = 1usize << (segment_bits - 1);
        debug_assert_eq!(self.split_pointer + generation, new_index);
        let active_bit = table_depth - self.initial_table_depth - 1;

        let mut partner = Segment::new(self.shape);
        self.segments[self.split_pointer].split_into(&mut partner, active_bit);
        self.segments.push(partner);
        self.table_depth = table_depth;
        debug!(
            split = self.split_pointer,
            into = new_index,
            active_bit,
            table_depth,
            items = self.num_items,
            "extended"
        );

        self.split_pointer += 1;
        if self.split_pointer == generation {
            self.split_pointer = 0;
        }
        debug_assert!(self.split_pointer < generation);
    }

    /// Merge the last segment back into the sibling it was split from
    fn compress(&mut self) {
        if self.segments.len() <= self.initial_segments {
            return;
        }
        let last = self.segments.len() - 1;
        let sibling = last - (1usize << (ceil_log2(self.segments.len()) - 1));
        let Some(absorbed) = self.segments.pop() else {
            return;
        };
        self.segments[sibling].merge(absorbed);
        self.split_pointer = sibling;
        self.table_depth = ceil_log2(self.segments.len()) + self.shape.bucket_bits;
        debug!(
            merged = last,
            into = sibling,
            table_depth = self.table_depth,
            items = self.num_items,
            "compressed"
        );
    }
}

/* -------------------- Unit Tests -------------------- */
