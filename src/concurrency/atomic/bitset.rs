//! Branded atomic bitsets.
//!
//! The visited mask of a traversal: one bit per vertex, set at most once per
//! search and cleared only by [`GhostAtomicBitset::clear_all`] between searches.

use std::collections::TryReserveError;
use core::sync::atomic::Ordering;

use super::GhostAtomicUsize;

/// A branded, word-packed atomic bitset.
pub struct GhostAtomicBitset<'brand> {
    bits: usize,
    words: Vec<GhostAtomicUsize<'brand>>,
}

impl<'brand> GhostAtomicBitset<'brand> {
    /// Creates a new bitset with `bits` bits, all cleared.
    ///
    /// # Errors
    /// Returns the allocator's error if the word storage cannot be reserved.
    pub fn try_new(bits: usize) -> Result<Self, TryReserveError> {
        let words_len = bits.div_ceil(WORD_BITS);
        let mut words = Vec::new();
        words.try_reserve_exact(words_len)?;
        words.extend((0..words_len).map(|_| GhostAtomicUsize::new(0)));
        Ok(Self { bits, words })
    }

    /// Number of bits.
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.bits
    }

    /// Clears all bits.
    pub fn clear_all(&self) {
        for w in &self.words {
            w.store(0, Ordering::Relaxed);
        }
    }

    /// Returns whether `bit` is set.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    #[inline]
    pub fn is_set(&self, bit: usize, order: Ordering) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range for {} bits", self.bits);
        let (word, mask) = bit_word_mask(bit);
        (self.words[word].load(order) & mask) != 0
    }

    /// Sets `bit` and returns `true` iff this call observed it previously cleared.
    ///
    /// Exactly one caller wins for each bit, which is what makes the contract
    /// phase's deduplication exact.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    #[inline]
    pub fn test_and_set(&self, bit: usize, order: Ordering) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range for {} bits", self.bits);
        let (word, mask) = bit_word_mask(bit);
        (self.words[word].fetch_or(mask, order) & mask) == 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

const WORD_BITS: usize = usize::BITS as usize;

#[inline(always)]
fn bit_word_mask(bit: usize) -> (usize, usize) {
    // `usize::BITS` is a power of two, so division and modulo reduce to shifts.
    (bit / WORD_BITS, 1usize << (bit % WORD_BITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_set_has_single_winner() {
        let b = GhostAtomicBitset::try_new(130).unwrap();
        assert_eq!(b.len_bits(), 130);
        assert!(b.test_and_set(129, Ordering::Relaxed));
        assert!(!b.test_and_set(129, Ordering::Relaxed));
        assert!(b.is_set(129, Ordering::Relaxed));
        assert!(!b.is_set(128, Ordering::Relaxed));
        assert_eq!(b.count_ones(), 1);
        b.clear_all();
        assert_eq!(b.count_ones(), 0);
    }

    #[test]
    fn concurrent_claims_are_unique() {
        let b = GhostAtomicBitset::try_new(64 * 8).unwrap();
        let wins: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        (0..b.len_bits())
                            .filter(|&i| b.test_and_set(i, Ordering::AcqRel))
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(wins, 64 * 8);
    }
}
