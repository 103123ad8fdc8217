//! Errors raised by the CTMC engines
//!
//! Every failure is local and synchronous: the offending call returns an
//! error and leaves the instance unchanged. Variants fall into two groups,
//! invalid arguments (bad indices, rates, capacities, thresholds) and
//! invalid states (transition counter at its target, explicit transition
//! whose occupancy preconditions do not hold).

use crate::events::EventTreeError;
use crate::thresholds::ThresholdError;
use thiserror::Error;

/// Errors that can occur while configuring or driving a CTMC
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CtmcError {
    #[error("Contact type {index} out of range (number of contact types: {count})")]
    ContactTypeOutOfRange { index: usize, count: usize },

    #[error("Agent group {index} out of range (number of agent groups: {count})")]
    GroupOutOfRange { index: usize, count: usize },

    #[error("Invalid {what}: {value} (must be finite and within [0, {bound}])")]
    InvalidRate {
        what: &'static str,
        value: f64,
        bound: f64,
    },

    #[error("Invalid {what}: {value} (bound {bound})")]
    InvalidCount {
        what: &'static str,
        value: u32,
        bound: u32,
    },

    #[error("Invalid balking probability for contact type {contact_type}: {value}")]
    InvalidProbability { contact_type: usize, value: f64 },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    #[error("Event tree build failed: {0}")]
    EventTree(#[from] EventTreeError),

    #[error("Target transition count reached: {done} of {target}")]
    TargetReached { done: u64, target: u64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl CtmcError {
    /// Caller passed a value outside the accepted domain
    pub fn is_invalid_argument(&self) -> bool {
        !self.is_invalid_state()
    }

    /// Operation is not allowed in the current occupancy or counter state
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            CtmcError::TargetReached { .. } | CtmcError::InvalidTransition(_)
        )
    }

    pub(crate) fn transition(msg: impl Into<String>) -> Self {
        CtmcError::InvalidTransition(msg.into())
    }
}
