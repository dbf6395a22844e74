//! Filter configuration
//!
//! Every tunable has a default that matches the classic (2, 4) cuckoo layout: 4 slots per bucket, 12 bit fingerprints, 32 buckets per segment and 8 kicks before a segment grows. Setters follow the builder style so a config can be written as one expression.

use crate::bucket::MAX_TAG_BITS;
use crate::hash::HashKind;

pub const DEFAULT_TAG_BITS: u32 = 12;
pub const DEFAULT_SLOTS_PER_BUCKET: usize = 4;
pub const DEFAULT_BUCKET_BITS: u32 = 5;
pub const DEFAULT_MAX_KICKS: usize = 8;
pub const DEFAULT_LOAD_FACTOR: f64 = 2.0;

const MIN_TAG_BITS: u32 = 4;
const MAX_SLOTS_PER_BUCKET: usize = 8;
const MAX_BUCKET_BITS: u32 = 16;

/// Errors returned when validating a [`FilterConfig`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("tag bits must be in 4..=16, got {0}")]
    InvalidTagBits(u32),
    #[error("slots per bucket must be in 1..=8, got {0}")]
    InvalidSlotsPerBucket(usize),
    #[error("bucket bits must be in 1..=16, got {0}")]
    InvalidBucketBits(u32),
    #[error("max kicks must be at least 1")]
    InvalidMaxKicks,
    #[error("load factor must be finite, positive and small enough for the segment item count to fit a usize, got {0}")]
    InvalidLoadFactor(f64),
    #[error("max blocks per segment must be at least 1")]
    InvalidMaxBlocks,
}

/// Tunables for a [`BambooFilter`](crate::BambooFilter)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub(crate) tag_bits: u32,
    pub(crate) slots_per_bucket: usize,
    pub(crate) bucket_bits: u32,
    pub(crate) max_kicks: usize,
    pub(crate) load_factor: f64,
    pub(crate) seed: u32,
    pub(crate) hash: HashKind,
    pub(crate) max_blocks_per_segment: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            tag_bits: DEFAULT_TAG_BITS,
            slots_per_bucket: DEFAULT_SLOTS_PER_BUCKET,
            bucket_bits: DEFAULT_BUCKET_BITS,
            max_kicks: DEFAULT_MAX_KICKS,
            load_factor: DEFAULT_LOAD_FACTOR,
            seed: 0,
            hash: HashKind::default(),
            max_blocks_per_segment: None,
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of a fingerprint in bits. Wider tags lower the false positive rate and allow more splits.
    #[must_use]
    pub fn tag_bits(mut self, bits: u32) -> Self {
        self.tag_bits = bits;
        self
    }

    #[must_use]
    pub fn slots_per_bucket(mut self, slots: usize) -> Self {
        self.slots_per_bucket = slots;
        self
    }

    /// log2 of the number of buckets in one segment
    #[must_use]
    pub fn bucket_bits(mut self, bits: u32) -> Self {
        self.bucket_bits = bits;
        self
    }

    /// Cuckoo relocations attempted before a segment appends another block
    #[must_use]
    pub fn max_kicks(mut self, kicks: usize) -> Self {
        self.max_kicks = kicks;
        self
    }

    /// Average items per segment slot before the table extends by one segment
    #[must_use]
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn hash(mut self, hash: HashKind) -> Self {
        self.hash = hash;
        self
    }

    /// Cap on capacity blocks per segment. `None` (the default) lets segments grow without bound.
    #[must_use]
    pub fn max_blocks_per_segment(mut self, max_blocks: Option<usize>) -> Self {
        self.max_blocks_per_segment = max_blocks;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TAG_BITS..=MAX_TAG_BITS).contains(&self.tag_bits) {
            return Err(ConfigError::InvalidTagBits(self.tag_bits));
        }
        if !(1..=MAX_SLOTS_PER_BUCKET).contains(&self.slots_per_bucket) {
            return Err(ConfigError::InvalidSlotsPerBucket(self.slots_per_bucket));
        }
        if !(1..=MAX_BUCKET_BITS).contains(&self.bucket_bits) {
            return Err(ConfigError::InvalidBucketBits(self.bucket_bits));
        }
        if self.max_kicks == 0 {
            return Err(ConfigError::InvalidMaxKicks);
        }
        if !self.load_factor.is_finite()
            || self.load_factor <= 0.0
            || self.trigger_period().is_none()
        {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if self.max_blocks_per_segment == Some(0) {
            return Err(ConfigError::InvalidMaxBlocks);
        }
        Ok(())
    }

    /// Bit pattern checked against the item counter after every insert and delete
    ///
    /// A segment is worth `load_factor * slots * 2^bucket_bits` items. We round that up to a power of two so that `count & mask == 0` recurs at a fixed period.
    ///
    /// Only meaningful for a validated config.
    pub fn trigger_mask(&self) -> usize {
        self.trigger_period().map_or(usize::MAX, |period| period - 1)
    }

    /// Items per extend step, or `None` when it does not fit a `usize` power of two
    fn trigger_period(&self) -> Option<usize> {
        let per_segment = self.load_factor
            * self.slots_per_bucket as f64
            * (1usize << self.bucket_bits) as f64;
        if per_segment > (1usize << (usize::BITS - 1)) as f64 {
            return None;
        }
        (per_segment.ceil() as usize).max(1).checked_next_power_of_two()
    }
}

/* -------------------- Unit Tests -------------------- */
