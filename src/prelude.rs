//! Common methods for Bloom filters.

use crate::{memhash::HashKey, params::FilterParams};

/// Bit positions probed for `bytes`, one per round in `0..num_hashes`.
#[inline]
pub fn probes<'a>(
    key: &'a HashKey,
    params: &FilterParams,
    bytes: &'a [u8],
) -> impl Iterator<Item = u64> + 'a {
    let bit_size = params.bit_size();
    (0..u64::from(params.num_hashes())).map(move |round| key.hash(bytes, round) % bit_size)
}

/// Maps a bit position to its word and the mask selecting it within that word.
///
/// The word index wraps around `num_words`, so positions past the end of the array still land on
/// an allocated word.
#[inline]
pub const fn locate(index: u64, num_words: usize) -> (usize, u64) {
    let bucket = (index / 64) % num_words as u64;
    let offset = index & 63;
    (bucket as usize, 1 << offset)
}
