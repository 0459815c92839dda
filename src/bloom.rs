//! Implements a classic Bloom filter over a flat array of 64-bit words.

use crate::{
    error::{Error, Result},
    memhash::HashKey,
    params::FilterParams,
    prelude::{locate, probes},
    Filter,
};
use core::fmt;

/// Bloom filter over arbitrary byte keys.
///
/// Each key is hashed `num_hashes` times with the filter's [`HashKey`], once per probe round, and
/// every resulting position is set on [`insert`](Self::insert) and tested on
/// [`contains`](Self::contains). There are no false negatives. The false-positive rate approaches
/// the configured rate once `capacity` distinct keys have been inserted and keeps growing past
/// that, since nothing stops a caller from over-filling the filter.
///
/// Memory is fixed at construction: `ceil(bit_size / 64)` words. Bits are never cleared.
///
/// ```
/// # use rand::Rng;
/// use mixbloom::BloomFilter;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 100_000;
/// let mut filter = BloomFilter::new(SAMPLE_SIZE as u64, 0.01).unwrap();
/// let keys: Vec<[u8; 16]> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// for key in &keys {
///     filter.insert(key);
/// }
///
/// // no false negatives
/// for key in &keys {
///     assert!(filter.contains(key));
/// }
///
/// // false positive rate
/// let false_positives = (0..SAMPLE_SIZE)
///     .map(|_| rng.gen::<[u8; 15]>())
///     .filter(|key| filter.contains(key))
///     .count();
/// let fp_rate = false_positives as f64 / SAMPLE_SIZE as f64;
/// assert!(fp_rate < 0.02, "False positive rate is {}", fp_rate);
/// ```
///
/// `insert` needs `&mut self`: sharing one filter between threads requires external
/// synchronization such as a `Mutex`. [`AtomicBloomFilter`](crate::AtomicBloomFilter) is the
/// lock-free alternative.
#[derive(Clone)]
pub struct BloomFilter {
    params: FilterParams,
    key: HashKey,
    words: Box<[u64]>,
}

impl BloomFilter {
    /// Creates an empty filter sized for `capacity` keys at `false_positive_rate`, hashing with the
    /// process-wide [`HashKey`].
    ///
    /// Fails if `capacity` is 0, if the rate is not within `(0, 1)`, if the bit array cannot be
    /// allocated, or if the process key cannot be drawn from the OS random source.
    pub fn new(capacity: u64, false_positive_rate: f64) -> Result<Self> {
        let key = HashKey::process()?;
        Self::with_key(capacity, false_positive_rate, *key)
    }

    /// Like [`new`](Self::new), hashing with `key` instead of the process-wide key.
    pub fn with_key(capacity: u64, false_positive_rate: f64, key: HashKey) -> Result<Self> {
        let params = FilterParams::optimal(capacity, false_positive_rate).map_err(|err| {
            tracing::warn!(capacity, false_positive_rate, %err, "rejected bloom filter parameters");
            err
        })?;
        Self::from_params(params, key)
    }

    /// Fixed-size preset: 10,000,000 expected keys, 2^26 bits (8 MiB), 4 probe rounds.
    ///
    /// The size does not adapt to any target rate; see [`FilterParams::fixed_preset`].
    pub fn fixed_preset() -> Result<Self> {
        let key = HashKey::process()?;
        Self::from_params(FilterParams::fixed_preset(), *key)
    }

    /// Creates an empty filter from `params`.
    ///
    /// Fails with [`Error::InvalidParameter`] if the bit array cannot be allocated.
    pub fn from_params(params: FilterParams, key: HashKey) -> Result<Self> {
        let num_words = params.num_words();
        let words = zeroed_words(num_words).map_err(|err| {
            tracing::warn!(num_words, %err, "could not allocate bloom filter");
            err
        })?;
        tracing::debug!(
            bit_size = params.bit_size(),
            num_hashes = params.num_hashes(),
            num_words,
            "constructed bloom filter"
        );

        Ok(Self { params, key, words })
    }

    pub(crate) fn into_parts(self) -> (FilterParams, HashKey, Box<[u64]>) {
        (self.params, self.key, self.words)
    }

    pub(crate) fn from_parts(params: FilterParams, key: HashKey, words: Box<[u64]>) -> Self {
        Self { params, key, words }
    }

    /// Adds `key` to the filter. Adding a key again has no further effect.
    pub fn insert<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K) {
        let num_words = self.words.len();
        for index in probes(&self.key, &self.params, key.as_ref()) {
            let (bucket, mask) = locate(index, num_words);
            self.words[bucket] |= mask;
        }
    }

    /// Returns `true` if `key` was possibly added, `false` if it definitely was not.
    pub fn contains<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        let num_words = self.words.len();
        probes(&self.key, &self.params, key.as_ref()).all(|index| {
            let (bucket, mask) = locate(index, num_words);
            self.words[bucket] & mask != 0
        })
    }

    /// Parameters the filter was built with.
    pub const fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Expected number of distinct keys the filter was sized for.
    pub const fn capacity(&self) -> u64 {
        self.params.capacity()
    }

    /// Target false-positive rate at capacity.
    pub const fn false_positive_rate(&self) -> f64 {
        self.params.false_positive_rate()
    }

    /// Number of addressable bits.
    pub const fn bit_size(&self) -> u64 {
        self.params.bit_size()
    }

    /// Number of probe rounds per key.
    pub const fn num_hashes(&self) -> u32 {
        self.params.num_hashes()
    }

    /// Number of 64-bit words backing the filter.
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// Number of bits currently set.
    pub fn bits_set(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Returns `true` if no bit is set, i.e. nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Fraction of addressable bits that are set.
    pub fn fill_ratio(&self) -> f64 {
        self.bits_set() as f64 / self.params.bit_size() as f64
    }

    /// False-positive rate estimated from the current fill ratio, `fill_ratio ^ num_hashes`.
    ///
    /// Unlike [`FilterParams::expected_false_positive_rate`] this needs no insertion count, and it
    /// reflects over-filling past capacity.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powf(f64::from(self.params.num_hashes()))
    }
}

/// Allocates `num_words` zeroed words, reporting allocation failure instead of aborting.
pub(crate) fn zeroed_words(num_words: usize) -> Result<Box<[u64]>> {
    let mut words = Vec::new();
    words.try_reserve_exact(num_words).map_err(|err| {
        Error::invalid(
            "bit_size",
            format!("cannot allocate {} words: {}", num_words, err),
        )
    })?;
    words.resize(num_words, 0);
    Ok(words.into_boxed_slice())
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("params", &self.params)
            .field("bits_set", &self.bits_set())
            .finish_non_exhaustive()
    }
}

impl Filter<[u8]> for BloomFilter {
    fn contains(&self, key: &[u8]) -> bool {
        BloomFilter::contains(self, key)
    }

    fn len(&self) -> usize {
        self.num_words()
    }
}

#[cfg(test)]
mod test {
    use crate::{BloomFilter, Error, Filter, FilterParams, HashKey};

    use proptest::prelude::*;
    use rand::Rng;

    fn filter(capacity: u64, rate: f64) -> BloomFilter {
        BloomFilter::with_key(capacity, rate, HashKey::from_seed(11)).unwrap()
    }

    #[test]
    fn test_empty_filter_contains_nothing() {
        let filter = filter(1_000, 0.01);
        let mut rng = rand::thread_rng();

        assert!(filter.is_empty());
        assert_eq!(filter.bits_set(), 0);
        assert!(!filter.contains(b""));
        for _ in 0..10_000 {
            let key: [u8; 12] = rng.gen();
            assert!(!filter.contains(&key));
        }
    }

    #[test]
    fn test_no_false_negatives() {
        const SAMPLE_SIZE: usize = 10_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<Vec<u8>> = (0..SAMPLE_SIZE)
            .map(|_| {
                let len = rng.gen_range(0..80);
                (0..len).map(|_| rng.gen()).collect()
            })
            .collect();

        let mut filter = filter(SAMPLE_SIZE as u64, 0.01);
        for key in &keys {
            filter.insert(key);
        }
        for key in &keys {
            assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut filter = filter(1_000, 0.01);
        filter.insert("apple");
        let once = filter.words.clone();
        let bits = filter.bits_set();

        filter.insert("apple");
        assert_eq!(filter.words, once);
        assert_eq!(filter.bits_set(), bits);
        assert!(bits >= 1 && bits <= u64::from(filter.num_hashes()));
    }

    #[test]
    fn test_monotonic() {
        let mut filter = filter(100, 0.01);
        filter.insert("banana");
        for n in 0..10_000u32 {
            filter.insert(&n.to_le_bytes());
            assert!(filter.contains("banana"));
        }
    }

    #[test]
    fn test_str_and_bytes_agree() {
        let mut filter = filter(100, 0.01);
        filter.insert("tangerine");
        assert!(filter.contains(b"tangerine"));
        assert!(filter.contains(&b"tangerine".to_vec()));
        assert!(Filter::contains(&filter, "tangerine".as_bytes()));
    }

    #[test]
    fn test_false_positives() {
        const CAPACITY: usize = 10_000;
        const RATE: f64 = 0.01;
        let mut rng = rand::thread_rng();

        let mut filter = filter(CAPACITY as u64, RATE);
        // Inserted keys start with 0, queried keys with 1, so the two sets are disjoint.
        for _ in 0..CAPACITY {
            let mut key: [u8; 16] = rng.gen();
            key[0] = 0;
            filter.insert(&key);
        }

        let false_positives = (0..10 * CAPACITY)
            .filter(|_| {
                let mut key: [u8; 16] = rng.gen();
                key[0] = 1;
                filter.contains(&key)
            })
            .count();
        let fp_rate = false_positives as f64 / (10 * CAPACITY) as f64;
        assert!(fp_rate < 3.0 * RATE, "False positive rate is {}", fp_rate);

        let estimate = filter.estimated_false_positive_rate();
        assert!(estimate < 3.0 * RATE, "Estimated rate is {}", estimate);
    }

    #[test]
    fn test_overfilling_raises_rate() {
        let mut filter = filter(1_000, 0.01);
        for n in 0..1_000u32 {
            filter.insert(&n.to_le_bytes());
        }
        let at_capacity = filter.estimated_false_positive_rate();
        for n in 1_000..10_000u32 {
            filter.insert(&n.to_le_bytes());
        }
        assert!(filter.estimated_false_positive_rate() > at_capacity);
        assert!(filter.fill_ratio() <= 1.0);
    }

    #[test]
    fn test_derived_parameters() {
        let filter = filter(10_000, 0.01);
        assert_eq!(filter.capacity(), 10_000);
        assert_eq!(filter.false_positive_rate(), 0.01);
        assert_eq!(filter.bit_size(), 95_851);
        assert_eq!(filter.num_hashes(), 7);
        assert_eq!(filter.num_words(), 1_498);
        assert_eq!(Filter::len(&filter), 1_498);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            BloomFilter::new(0, 0.01),
            Err(Error::InvalidParameter {
                name: "capacity",
                ..
            })
        ));
        assert!(matches!(
            BloomFilter::new(10, 1.0),
            Err(Error::InvalidParameter {
                name: "false_positive_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_fixed_preset() {
        let mut filter = BloomFilter::fixed_preset().unwrap();
        assert_eq!(filter.capacity(), FilterParams::PRESET_CAPACITY);
        assert_eq!(filter.bit_size(), 1 << 26);
        assert_eq!(filter.num_hashes(), 4);
        assert_eq!(filter.num_words(), 1 << 20);

        filter.insert("watermelon");
        assert!(filter.contains("watermelon"));
    }

    #[test]
    fn test_explicit_size_empty_filter() {
        let params = FilterParams::with_size(100, 1, 1).unwrap();
        let mut filter = BloomFilter::from_params(params, HashKey::from_seed(11)).unwrap();
        assert_eq!(filter.num_words(), 1);
        assert!(!filter.contains("never inserted"));

        filter.insert("x");
        assert!(filter.contains("x"));
        assert_eq!(filter.bits_set(), 1);
    }

    #[test]
    fn test_unallocatable_size_is_rejected() {
        assert!(BloomFilter::new(10u64.pow(17), 0.01).is_err());
        assert!(matches!(
            crate::bloom::zeroed_words(usize::MAX),
            Err(Error::InvalidParameter { name: "bit_size", .. })
        ));
    }

    #[test]
    fn test_debug_omits_words() {
        let mut filter = BloomFilter::fixed_preset().unwrap();
        filter.insert("kiwi");
        let debug = format!("{:?}", filter);
        assert!(debug.starts_with("BloomFilter { params: FilterParams {"), "{}", debug);
        assert!(debug.contains("bits_set: "), "{}", debug);
        assert!(!debug.contains("words"), "{}", debug);
        assert!(debug.len() < 300, "{}", debug);
    }

    #[test]
    fn test_process_key_filters_agree() {
        let mut a = BloomFilter::new(1_000, 0.01).unwrap();
        let mut b = BloomFilter::new(1_000, 0.01).unwrap();
        a.insert("cherry");
        b.insert("cherry");
        assert_eq!(a.words, b.words);
    }

    #[test]
    fn test_out_of_range_index_wraps() {
        let mut filter = filter(10, 0.1);
        let num_words = filter.num_words();
        let past_end = num_words as u64 * 64 + 3;
        let (bucket, mask) = crate::prelude::locate(past_end, num_words);
        filter.words[bucket] |= mask;
        assert_eq!(filter.words[0], 1 << 3);
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..200)) {
            let mut filter = filter(keys.len() as u64, 0.01);
            for key in &keys {
                filter.insert(key);
            }
            for key in &keys {
                prop_assert!(filter.contains(key));
            }
        }

        #[test]
        fn prop_insert_twice_same_state(keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..50)) {
            let mut once = filter(100, 0.01);
            let mut twice = filter(100, 0.01);
            for key in &keys {
                once.insert(key);
                twice.insert(key);
                twice.insert(key);
            }
            prop_assert_eq!(once.words, twice.words);
        }

        #[test]
        fn prop_contains_is_deterministic(key in prop::collection::vec(any::<u8>(), 0..100)) {
            let mut filter = filter(50, 0.05);
            filter.insert("seed key");
            let first = filter.contains(&key);
            for _ in 0..4 {
                prop_assert_eq!(filter.contains(&key), first);
            }
        }
    }
}
