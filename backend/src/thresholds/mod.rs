//! Operating-mode thresholds
//!
//! A call center rarely has every agent busy and the queue full at once, yet
//! plain uniformization pays for that worst case on every transition. An
//! operating mode is a threshold vector `(n_1, ..., n_I, h)` bounding the
//! busy agents of each group and the total queue size; while occupancy stays
//! below it, the chain can be uniformized at the smaller rate
//!
//! ```text
//! Λ_r = Σ_k λ̃_k + Σ_i n_i · w_i + h · Σ_k ν̃_k
//! ```
//!
//! and the gap to the global rate `Λ̃` (the rate of the maximal vector) is
//! paid in bulk by a geometric number of self-jumps instead of one draw per
//! false transition.
//!
//! [`ModeTable`] is the immutable part (vectors sorted by rate, per-mode
//! skip-ahead constants, band values per dimension), shared between clones.
//! [`OperatingModeThresholds`] tracks the active mode of one chain.

mod operating_mode;
mod table;

pub use operating_mode::OperatingModeThresholds;
pub use table::ModeTable;

use thiserror::Error;

/// Errors raised while validating a threshold matrix
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("Threshold vector {row} has {found} entries, expected {expected}")]
    WrongArity {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Threshold vector {row} has {value} in dimension {dimension}, above its bound {bound}")]
    ExceedsBound {
        row: usize,
        dimension: usize,
        value: u32,
        bound: u32,
    },

    #[error("No threshold vector equals the maximal occupancy")]
    MissingMaximalVector,

    #[error("Group weight vector has {found} entries, expected {expected}")]
    WeightArity { expected: usize, found: usize },
}
