//! This library implements Bloom filters -- data structures for fast approximation of set
//! membership using a fixed amount of memory. Probabilistic filters like Bloom filters are useful
//! for quickly estimating the existence of an entity to avoid using an expensive resource, for
//! example to [skip lookups] in a slower store for keys it has never seen.
//!
//! A [`BloomFilter`] is sized from the number of keys it is expected to hold and a target
//! false-positive rate. Keys are arbitrary byte sequences. Each key is hashed once per probe round
//! with a keyed 64-bit mixing hash ([`HashKey`]) and the resulting bits are set on insertion and
//! tested on lookup. There are never false negatives. False positives approach the configured rate
//! at capacity and grow beyond it if more keys are inserted.
//!
//! The hash key is drawn from the operating system's random source once per process, so bit
//! positions are stable within a run and differ between runs. Filters can also be built with an
//! explicit key, e.g. [`HashKey::from_seed`] for reproducible tests.
//!
//! ```
//! use mixbloom::BloomFilter;
//!
//! let mut filter = BloomFilter::new(10_000, 0.01).unwrap();
//! filter.insert("apple");
//! filter.insert(b"banana");
//!
//! assert!(filter.contains("apple"));
//! assert!(filter.contains("banana"));
//! ```
//!
//! Filters cannot remove keys, be resized, or be merged. [`BloomFilter`] requires external
//! synchronization for concurrent inserts; [`AtomicBloomFilter`] accepts inserts through a shared
//! reference.
//!
//! [skip lookups]: https://en.wikipedia.org/wiki/Bloom_filter#Cache_filtering

// Configuration attributes
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![forbid(clippy::all, clippy::cargo, clippy::nursery)]

mod atomic;
mod bloom;
mod error;
mod memhash;
mod params;
mod prelude;
mod splitmix64;

pub use atomic::AtomicBloomFilter;
pub use bloom::BloomFilter;
pub use error::{Error, Result};
pub use memhash::HashKey;
pub use params::FilterParams;

/// Methods common to Bloom filters.
pub trait Filter<Type: ?Sized> {
    /// Returns `true` if the filter probably contains the specified key.
    ///
    /// There can never be a false negative, but there is a small possibility of false positives.
    /// The rate depends on how full the filter is relative to its capacity.
    fn contains(&self, key: &Type) -> bool;

    /// Returns the number of 64-bit words backing the filter.
    fn len(&self) -> usize;
}
