//! # Bamboo Filter implementation
//!
//! A Cuckoo Filter is an efficient data structure for determining "set membership" (i.e. 'have I seen this thing before?'). It is similar to a Bloom Filter, but unlike a Bloom Filter, Cuckoo Filters support item deletion.
//!
//! A classic Cuckoo Filter has a fixed size: when it fills up, the only way out is to allocate a table twice as large and rehash every item. This crate splits the table into small independently growing *segments* and resizes it one segment at a time. Segments split and merge by looking at a bit of each stored fingerprint, so nothing is ever rehashed and there is no need to keep the original keys around.
//!
//! ```
//! use bamboo_filter::BambooFilter;
//!
//! let mut filter = BambooFilter::new(1 << 12, 2.0).unwrap();
//! filter.insert(b"cat").unwrap();
//! assert!(filter.lookup(b"cat"));
//! assert!(filter.delete(b"cat"));
//! assert!(!filter.lookup(b"cat"));
//! ```

mod address;
mod bucket;
mod config;
mod filter;
mod hash;
mod murmur3;
mod segment;

pub use bucket::Fingerprint;
pub use config::{ConfigError, FilterConfig};
pub use filter::BambooFilter;
pub use filter::FilterError;
pub use hash::{hash_bob, HashKind};
pub use murmur3::murmur3_32;
