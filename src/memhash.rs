//! Keyed 64-bit mixing hash over arbitrary byte slices.
//!
//! Short inputs are folded into the accumulator with a handful of overlapping little-endian reads
//! chosen by length; inputs longer than 32 bytes are first consumed in 32-byte blocks by four
//! independent lanes. Every path ends in the same finalization step so that bits [avalanche].
//!
//! The hash is fast and well distributed, but it is *not* collision resistant against an adversary
//! who knows the key.
//!
//! [avalanche]: https://en.wikipedia.org/wiki/Avalanche_effect

use crate::{error::Result, splitmix64::splitmix64};
use core::fmt;
use rand::{rngs::OsRng, RngCore};
use std::sync::OnceLock;

// Four odd 64-bit multipliers.
const M1: u64 = 16_877_499_708_836_156_737;
const M2: u64 = 2_820_277_070_424_839_065;
const M3: u64 = 9_497_967_016_996_688_599;
const M4: u64 = 15_839_092_249_703_872_147;

static PROCESS_KEY: OnceLock<HashKey> = OnceLock::new();

/// One multiply-rotate-multiply round.
#[inline]
const fn mix(h: u64, a: u64, b: u64) -> u64 {
    h.wrapping_mul(a).rotate_left(31).wrapping_mul(b)
}

#[inline]
fn read32(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u64::from(u32::from_le_bytes(buf))
}

#[inline]
fn read64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Folds a tail of at most 32 bytes into `h`.
#[inline]
fn mix_tail(mut h: u64, tail: &[u8]) -> u64 {
    let len = tail.len();
    debug_assert!(len <= 32);
    match len {
        0 => h,
        1..=3 => {
            h ^= u64::from(tail[0]);
            h ^= u64::from(tail[len >> 1]) << 8;
            h ^= u64::from(tail[len - 1]) << 16;
            mix(h, M1, M2)
        }
        4..=8 => {
            h ^= read32(tail, 0);
            h ^= read32(tail, len - 4) << 32;
            mix(h, M1, M2)
        }
        9..=16 => {
            h = mix(h ^ read64(tail, 0), M1, M2);
            mix(h ^ read64(tail, len - 8), M1, M2)
        }
        _ => {
            h = mix(h ^ read64(tail, 0), M1, M2);
            h = mix(h ^ read64(tail, 8), M1, M2);
            h = mix(h ^ read64(tail, len - 16), M1, M2);
            mix(h ^ read64(tail, len - 8), M1, M2)
        }
    }
}

#[inline]
const fn finalize(mut h: u64) -> u64 {
    h ^= h >> 29;
    h = h.wrapping_mul(M3);
    h ^ (h >> 32)
}

/// The secret key of the mixing hash: four odd 64-bit words.
///
/// A `HashKey` decides how keys map to bit positions. Two filters only agree on positions when they
/// share a key, and a fresh random key per process keeps a fixed, adversarially chosen key set from
/// colliding run after run. Keys are plain `Copy` values; filters embed their own copy.
///
/// ```
/// use mixbloom::HashKey;
///
/// let key = HashKey::from_seed(7);
/// assert_eq!(key.hash(b"tangerine", 0), key.hash(b"tangerine", 0));
/// assert_ne!(key.hash(b"tangerine", 0), key.hash(b"tangerine", 1));
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HashKey {
    words: [u64; 4],
}

impl HashKey {
    /// Builds a key from explicit words. The low bit of every word is forced to 1.
    pub const fn from_words(words: [u64; 4]) -> Self {
        Self {
            words: [words[0] | 1, words[1] | 1, words[2] | 1, words[3] | 1],
        }
    }

    /// Builds a reproducible key by expanding `seed` with SplitMix64.
    pub fn from_seed(seed: u64) -> Self {
        let mut state = seed;
        Self::from_words([
            splitmix64(&mut state),
            splitmix64(&mut state),
            splitmix64(&mut state),
            splitmix64(&mut state),
        ])
    }

    /// Draws a fresh key from the operating system's secure random source.
    ///
    /// Fails with [`Error::RandomSource`](crate::Error::RandomSource) if the source is
    /// unavailable; there is no fallback to a fixed key.
    pub fn random() -> Result<Self> {
        let mut bytes = [0; 32];
        OsRng.try_fill_bytes(&mut bytes)?;

        let mut words = [0; 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            *word = read64(chunk, 0);
        }
        Ok(Self::from_words(words))
    }

    /// Returns the key shared by every filter in this process, drawing it on first use.
    ///
    /// The key is fixed for the lifetime of the process, so hashes and bit positions are stable
    /// within a run but differ between runs.
    pub fn process() -> Result<&'static Self> {
        if let Some(key) = PROCESS_KEY.get() {
            return Ok(key);
        }

        let key = Self::random()?;
        // A concurrent caller may have won the race; everyone ends up with the stored key.
        let key = PROCESS_KEY.get_or_init(|| {
            tracing::debug!("initialized process hash key");
            key
        });
        Ok(key)
    }

    /// Hashes `bytes` for probe round `seed`.
    #[inline]
    pub fn hash(&self, bytes: &[u8], seed: u64) -> u64 {
        let [k0, k1, k2, k3] = self.words;
        let mut h = seed.wrapping_add((bytes.len() as u64).wrapping_mul(k0));

        let mut tail = bytes;
        if bytes.len() > 32 {
            let mut v1 = h;
            let mut v2 = seed.wrapping_mul(k1);
            let mut v3 = seed.wrapping_mul(k2);
            let mut v4 = seed.wrapping_mul(k3);

            let mut blocks = bytes.chunks_exact(32);
            for block in &mut blocks {
                v1 = mix(v1 ^ read64(block, 0), M1, M2);
                v2 = mix(v2 ^ read64(block, 8), M2, M3);
                v3 = mix(v3 ^ read64(block, 16), M3, M4);
                v4 = mix(v4 ^ read64(block, 24), M4, M1);
            }

            tail = blocks.remainder();
            h = v1 ^ v2 ^ v3 ^ v4;
        }

        finalize(mix_tail(h, tail))
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashKey").finish_non_exhaustive()
    }
}
