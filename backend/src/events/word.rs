//! Random words and bit budgets
//!
//! The sampler consumes one 31-bit random word per transition. Lookup
//! levels of the event tree peel bits off the top of the word; whatever is
//! left below the last peeled bit is a uniform fraction that the engine
//! reuses for thinning, balking, and slot selection.
//!
//! A word can also be built from a uniform double: `from_unit(u)` keeps the
//! 31 leading bits of `u`, so both entry points drive the exact same code.

use serde::{Deserialize, Serialize};

/// Width of the random word, in bits
pub const WORD_BITS: u8 = 31;

const WORD_MASK: u32 = (1 << WORD_BITS) - 1;
const WORD_SCALE: f64 = (1u64 << WORD_BITS) as f64;

/// Largest `f64` strictly below 1
pub(crate) const MAX_UNIT: f64 = 1.0 - f64::EPSILON / 2.0;

/// One 31-bit random value
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::events::RandomWord;
///
/// let word = RandomWord::from_unit(0.5);
/// assert_eq!(word.bits(), 1 << 30);
/// assert_eq!(word.to_unit(), 0.5);
/// assert_eq!(RandomWord::from_bits(u32::MAX).bits(), (1 << 31) - 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RandomWord(u32);

impl RandomWord {
    /// Keep the low 31 bits of `bits`
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & WORD_MASK)
    }

    /// Quantize a uniform in `[0, 1)`; values outside the interval are clamped
    pub fn from_unit(u: f64) -> Self {
        let scaled = (u * WORD_SCALE).floor();
        if scaled.is_nan() || scaled <= 0.0 {
            Self(0)
        } else if scaled >= WORD_MASK as f64 {
            Self(WORD_MASK)
        } else {
            Self(scaled as u32)
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The word as a fraction of `2^31`
    pub fn to_unit(self) -> f64 {
        f64::from(self.0) / WORD_SCALE
    }
}

/// Cursor over the bits of a random word
///
/// Tracks how many leading bits have been consumed so that nested lookups
/// never reuse a bit. Consumption past 31 bits is a construction bug of the
/// tree and trips a debug assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitBudget {
    word: u32,
    used: u8,
}

impl BitBudget {
    pub fn new(word: RandomWord) -> Self {
        Self {
            word: word.bits(),
            used: 0,
        }
    }

    pub fn used(&self) -> u8 {
        self.used
    }

    pub fn remaining(&self) -> u8 {
        WORD_BITS - self.used
    }

    /// Peel the next `bits` leading bits and return them as an index
    pub fn take(&mut self, bits: u8) -> usize {
        debug_assert!(
            bits <= self.remaining(),
            "bit budget exceeded: {} bits requested, {} left",
            bits,
            self.remaining()
        );
        let bits = bits.min(self.remaining());
        if bits == 0 {
            return 0;
        }
        let shift = self.remaining() - bits;
        let index = (self.word >> shift) & ((1u32 << bits) - 1);
        self.used += bits;
        index as usize
    }

    /// Unconsumed low bits as a fraction in `[0, 1)`
    pub fn residual(&self) -> f64 {
        let remaining = self.remaining();
        if remaining == 0 {
            return 0.0;
        }
        let mask = (1u32 << remaining) - 1;
        f64::from(self.word & mask) / f64::from(1u32 << remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unit_clamps() {
        assert_eq!(RandomWord::from_unit(-0.5).bits(), 0);
        assert_eq!(RandomWord::from_unit(f64::NAN).bits(), 0);
        assert_eq!(RandomWord::from_unit(1.0).bits(), WORD_MASK);
        assert_eq!(RandomWord::from_unit(MAX_UNIT).bits(), WORD_MASK);
    }

    #[test]
    fn test_take_peels_leading_bits() {
        // 101 1000...
        let word = RandomWord::from_bits(0b101 << 28);
        let mut budget = BitBudget::new(word);
        assert_eq!(budget.take(1), 1);
        assert_eq!(budget.take(2), 0b01);
        assert_eq!(budget.used(), 3);
        assert_eq!(budget.take(1), 0);
        assert_eq!(budget.residual(), 0.0);
    }

    #[test]
    fn test_residual_is_fraction_of_remaining_bits() {
        let word = RandomWord::from_unit(0.75);
        let mut budget = BitBudget::new(word);
        assert_eq!(budget.residual(), 0.75);
        budget.take(1);
        assert_eq!(budget.residual(), 0.5);
        budget.take(1);
        assert_eq!(budget.residual(), 0.0);
    }

    #[test]
    fn test_full_word_can_be_consumed() {
        let mut budget = BitBudget::new(RandomWord::from_bits(WORD_MASK));
        assert_eq!(budget.take(31), WORD_MASK as usize);
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.residual(), 0.0);
    }
}
