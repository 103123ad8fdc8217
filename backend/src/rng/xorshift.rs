//! xorshift64* random number generator
//!
//! Fast PRNG with 64-bit state that passes BigCrush. Same seed, same
//! sequence: replications are reproducible and checkpoints only need the
//! 64-bit state.

use crate::events::RandomWord;
use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let word = rng.next_word();
/// assert!(word.bits() < (1 << 31));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is replaced by 1 (xorshift requires a non-zero state).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Generate one 31-bit word for the CTMC sampler
    ///
    /// Takes the high bits of the output, which are the best mixed bits of
    /// xorshift64*.
    pub fn next_word(&mut self) -> RandomWord {
        RandomWord::from_bits((self.next() >> 33) as u32)
    }

    /// Get current RNG state (for checkpointing/replay)
    ///
    /// `RngManager::new(rng.get_state())` continues the same sequence.
    pub fn get_state(&self) -> u64 {
        self.state
    }
}
