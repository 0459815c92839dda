//! Implements a Bloom filter whose words can be updated concurrently.

use crate::{
    bloom::BloomFilter,
    error::Result,
    memhash::HashKey,
    params::FilterParams,
    prelude::{locate, probes},
    Filter,
};
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Bloom filter that supports insertion through a shared reference.
///
/// Same sizing, hashing and addressing as [`BloomFilter`], but every word is an [`AtomicU64`] and
/// bits are set with an atomic OR. Concurrent inserts never lose each other's bits. A `contains`
/// racing an `insert` of the same key may observe any subset of its bits; once the insert has
/// returned and is visible to the reader, `contains` is guaranteed to see all of them.
///
/// ```
/// use mixbloom::AtomicBloomFilter;
///
/// let filter = AtomicBloomFilter::new(10_000, 0.01).unwrap();
/// std::thread::scope(|s| {
///     for t in 0..4u32 {
///         let filter = &filter;
///         s.spawn(move || {
///             for n in 0..1_000u32 {
///                 filter.insert(&(t * 1_000 + n).to_le_bytes());
///             }
///         });
///     }
/// });
///
/// assert!((0..4_000u32).all(|n| filter.contains(&n.to_le_bytes())));
/// ```
pub struct AtomicBloomFilter {
    params: FilterParams,
    key: HashKey,
    words: Box<[AtomicU64]>,
}

impl AtomicBloomFilter {
    /// Creates an empty filter sized for `capacity` keys at `false_positive_rate`, hashing with the
    /// process-wide [`HashKey`].
    pub fn new(capacity: u64, false_positive_rate: f64) -> Result<Self> {
        BloomFilter::new(capacity, false_positive_rate).map(Self::from)
    }

    /// Like [`new`](Self::new), hashing with `key` instead of the process-wide key.
    pub fn with_key(capacity: u64, false_positive_rate: f64, key: HashKey) -> Result<Self> {
        BloomFilter::with_key(capacity, false_positive_rate, key).map(Self::from)
    }

    /// Adds `key` to the filter.
    pub fn insert<K: AsRef<[u8]> + ?Sized>(&self, key: &K) {
        let num_words = self.words.len();
        for index in probes(&self.key, &self.params, key.as_ref()) {
            let (bucket, mask) = locate(index, num_words);
            self.words[bucket].fetch_or(mask, Ordering::Relaxed);
        }
    }

    /// Returns `true` if `key` was possibly added, `false` if it definitely was not.
    pub fn contains<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        let num_words = self.words.len();
        probes(&self.key, &self.params, key.as_ref()).all(|index| {
            let (bucket, mask) = locate(index, num_words);
            self.words[bucket].load(Ordering::Relaxed) & mask != 0
        })
    }

    /// Parameters the filter was built with.
    pub const fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Number of bits currently set.
    pub fn bits_set(&self) -> u64 {
        self.words
            .iter()
            .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
            .sum()
    }
}

impl From<BloomFilter> for AtomicBloomFilter {
    fn from(filter: BloomFilter) -> Self {
        let (params, key, words) = filter.into_parts();
        Self {
            params,
            key,
            words: words.iter().map(|&w| AtomicU64::new(w)).collect(),
        }
    }
}

impl From<AtomicBloomFilter> for BloomFilter {
    fn from(filter: AtomicBloomFilter) -> Self {
        let words = filter
            .words
            .into_vec()
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect();
        BloomFilter::from_parts(filter.params, filter.key, words)
    }
}

impl fmt::Debug for AtomicBloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicBloomFilter")
            .field("params", &self.params)
            .field("bits_set", &self.bits_set())
            .finish_non_exhaustive()
    }
}

impl Filter<[u8]> for AtomicBloomFilter {
    fn contains(&self, key: &[u8]) -> bool {
        AtomicBloomFilter::contains(self, key)
    }

    fn len(&self) -> usize {
        self.words.len()
    }
}
