//! Sizing of Bloom filters.
//!
//! For `n` expected keys and a target false-positive rate `p`:
//! - `m = ceil(-n * ln(p) / ln(2)^2)` bits
//! - `k = ceil(ln(2) * m / n)` probe rounds
//!
//! and after `n` insertions the false-positive rate is approximately `(1 - e^(-kn/m))^k`.

use crate::error::{Error, Result};
use core::f64::consts::LN_2;

/// Parameters a filter is built with. Fixed for the lifetime of the filter.
///
/// `FilterParams` can only be obtained through its validating constructors, so every value has at
/// least one bit and at least one probe round.
///
/// ```compile_fail
/// use mixbloom::FilterParams;
///
/// let mut params = FilterParams::optimal(100, 0.01).unwrap();
/// params.num_hashes = 0; // fields are private
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    capacity: u64,
    false_positive_rate: f64,
    bit_size: u64,
    num_hashes: u32,
}

impl FilterParams {
    /// Expected number of keys of the [fixed preset](Self::fixed_preset).
    pub const PRESET_CAPACITY: u64 = 10_000_000;
    /// Number of bits of the [fixed preset](Self::fixed_preset), 8 MiB of words.
    pub const PRESET_BIT_SIZE: u64 = 1 << 26;
    /// Number of probe rounds of the [fixed preset](Self::fixed_preset).
    pub const PRESET_NUM_HASHES: u32 = 4;
    /// Largest accepted bit array, 2^48 bits (32 TiB of words).
    pub const MAX_BIT_SIZE: u64 = 1 << 48;

    /// Derives the optimal bit size and probe count for `capacity` keys at `false_positive_rate`.
    ///
    /// ```
    /// use mixbloom::FilterParams;
    ///
    /// let params = FilterParams::optimal(10_000, 0.01).unwrap();
    /// assert_eq!(params.bit_size(), 95_851);
    /// assert_eq!(params.num_hashes(), 7);
    ///
    /// assert!(FilterParams::optimal(0, 0.01).is_err());
    /// assert!(FilterParams::optimal(10_000, 1.0).is_err());
    /// ```
    pub fn optimal(capacity: u64, false_positive_rate: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("capacity", "must be at least 1"));
        }
        // Written so that NaN fails the check as well.
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(Error::invalid(
                "false_positive_rate",
                format!("{} is not within (0, 1)", false_positive_rate),
            ));
        }

        let n = capacity as f64;
        let bits = (-n * false_positive_rate.ln() / (LN_2 * LN_2)).ceil();
        if !bits.is_finite() || bits > Self::MAX_BIT_SIZE as f64 {
            return Err(Error::invalid(
                "false_positive_rate",
                format!(
                    "{} keys at rate {} need more than {} bits",
                    capacity,
                    false_positive_rate,
                    Self::MAX_BIT_SIZE
                ),
            ));
        }
        let bit_size = bits as u64;

        let hashes = (LN_2 * bit_size as f64 / n).ceil();
        let num_hashes = (hashes as u32).max(1);

        Ok(Self {
            capacity,
            false_positive_rate,
            bit_size,
            num_hashes,
        })
    }

    /// Uses an explicit bit size and probe count instead of deriving them.
    ///
    /// `false_positive_rate` is set to the theoretical rate after `capacity` insertions.
    ///
    /// ```
    /// use mixbloom::FilterParams;
    ///
    /// let params = FilterParams::with_size(1_000, 1 << 14, 5).unwrap();
    /// assert_eq!(params.num_words(), 256);
    ///
    /// assert!(FilterParams::with_size(1_000, 1 << 14, 0).is_err());
    /// assert!(FilterParams::with_size(1_000, 0, 5).is_err());
    /// ```
    pub fn with_size(capacity: u64, bit_size: u64, num_hashes: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("capacity", "must be at least 1"));
        }
        if bit_size == 0 || bit_size > Self::MAX_BIT_SIZE {
            return Err(Error::invalid(
                "bit_size",
                format!("{} is not within [1, {}]", bit_size, Self::MAX_BIT_SIZE),
            ));
        }
        if num_hashes == 0 {
            return Err(Error::invalid("num_hashes", "must be at least 1"));
        }

        let mut params = Self {
            capacity,
            false_positive_rate: 0.0,
            bit_size,
            num_hashes,
        };
        params.false_positive_rate = params.expected_false_positive_rate(capacity);
        Ok(params)
    }

    /// Fixed-size preset: 10,000,000 expected keys, 2^26 bits, 4 probe rounds.
    ///
    /// This is *not* derived from a target rate. Its `false_positive_rate` is the theoretical rate
    /// at capacity, about 4%.
    pub fn fixed_preset() -> Self {
        let mut params = Self {
            capacity: Self::PRESET_CAPACITY,
            false_positive_rate: 0.0,
            bit_size: Self::PRESET_BIT_SIZE,
            num_hashes: Self::PRESET_NUM_HASHES,
        };
        params.false_positive_rate = params.expected_false_positive_rate(params.capacity);
        params
    }

    /// Expected number of distinct keys (n). Not enforced after construction.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Target false-positive rate (p) at `capacity` insertions.
    pub const fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }

    /// Number of addressable bits (m), at least 1.
    pub const fn bit_size(&self) -> u64 {
        self.bit_size
    }

    /// Number of probe rounds per key (k), at least 1.
    pub const fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of 64-bit words backing `bit_size` bits, rounding up.
    pub const fn num_words(&self) -> usize {
        self.bit_size.div_ceil(64) as usize
    }

    /// Theoretical false-positive rate after `inserted` distinct keys: `(1 - e^(-kn/m))^k`.
    pub fn expected_false_positive_rate(&self, inserted: u64) -> f64 {
        let k = f64::from(self.num_hashes);
        let exponent = -k * inserted as f64 / self.bit_size as f64;
        (1.0 - exponent.exp()).powf(k)
    }
}
