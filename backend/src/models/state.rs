//! Occupancy state of a call center CTMC
//!
//! The state of the chain is a handful of counters: queued contacts per
//! type, busy agents per group, and (when the engine needs the in-service
//! type mix) busy agents per (type, group) pair. Rates and capacities are
//! not part of the state; two chains with different parameters but equal
//! counters compare equal and hash alike.
//!
//! # Critical Invariants
//!
//! 1. Per-type queue counts sum to the total queue count
//! 2. Per-group busy counts sum to the total busy count
//! 3. When tracked, per-(type, group) busy counts sum to the per-group counts
//!
//! Capacity invariants (`queue <= H`, `busy_i <= N_i`) involve parameters
//! and are enforced by the engine, not here.

use crate::ctmc::CtmcError;
use serde::{Deserialize, Serialize};

/// Occupancy counters
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::CtmcState;
///
/// let state = CtmcState::new(2, 3, true);
/// assert_eq!(state.total_queue_size(), 0);
/// assert_eq!(state.num_busy_of_type(1, 2), Some(0));
/// assert!(state.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CtmcState {
    num_types: usize,
    num_groups: usize,
    queued: Vec<u32>,
    queued_total: u32,
    busy: Vec<u32>,
    busy_total: u32,
    /// Row-major K×I matrix; `None` when the in-service type mix is elided
    busy_by_type: Option<Vec<u32>>,
}

impl CtmcState {
    /// Empty state
    pub fn new(num_types: usize, num_groups: usize, track_service_types: bool) -> Self {
        Self {
            num_types,
            num_groups,
            queued: vec![0; num_types],
            queued_total: 0,
            busy: vec![0; num_groups],
            busy_total: 0,
            busy_by_type: track_service_types.then(|| vec![0; num_types * num_groups]),
        }
    }

    /// Build a state from raw counters, checking dimensions
    ///
    /// Totals are recomputed from the per-type and per-group counts. When a
    /// per-(type, group) matrix is given, its column sums must equal `busy`.
    pub fn from_counts(
        queued: Vec<u32>,
        busy: Vec<u32>,
        busy_by_type: Option<Vec<u32>>,
    ) -> Result<Self, CtmcError> {
        let num_types = queued.len();
        let num_groups = busy.len();
        if num_types == 0 || num_groups == 0 {
            return Err(CtmcError::DimensionMismatch(
                "state needs at least one contact type and one agent group".to_string(),
            ));
        }
        if let Some(matrix) = &busy_by_type {
            if matrix.len() != num_types * num_groups {
                return Err(CtmcError::DimensionMismatch(format!(
                    "busy matrix has {} entries, expected {}",
                    matrix.len(),
                    num_types * num_groups
                )));
            }
            for (i, &total) in busy.iter().enumerate() {
                let column: u64 = (0..num_types)
                    .map(|k| u64::from(matrix[k * num_groups + i]))
                    .sum();
                if column != u64::from(total) {
                    return Err(CtmcError::DimensionMismatch(format!(
                        "busy counts of group {} sum to {} across types, expected {}",
                        i, column, total
                    )));
                }
            }
        }
        let queued_total = sum_counts(&queued)?;
        let busy_total = sum_counts(&busy)?;
        Ok(Self {
            num_types,
            num_groups,
            queued,
            queued_total,
            busy,
            busy_total,
            busy_by_type,
        })
    }

    /// Reset every counter to zero
    pub fn reset(&mut self) {
        self.queued.iter_mut().for_each(|q| *q = 0);
        self.busy.iter_mut().for_each(|b| *b = 0);
        if let Some(matrix) = self.busy_by_type.as_mut() {
            matrix.iter_mut().for_each(|b| *b = 0);
        }
        self.queued_total = 0;
        self.busy_total = 0;
    }

    pub fn num_contact_types(&self) -> usize {
        self.num_types
    }

    pub fn num_agent_groups(&self) -> usize {
        self.num_groups
    }

    pub fn tracks_service_types(&self) -> bool {
        self.busy_by_type.is_some()
    }

    pub fn queue_size(&self, k: usize) -> u32 {
        self.queued[k]
    }

    pub fn queue_sizes(&self) -> &[u32] {
        &self.queued
    }

    pub fn total_queue_size(&self) -> u32 {
        self.queued_total
    }

    pub fn num_busy(&self, i: usize) -> u32 {
        self.busy[i]
    }

    pub fn busy_counts(&self) -> &[u32] {
        &self.busy
    }

    pub fn total_busy(&self) -> u32 {
        self.busy_total
    }

    /// Busy agents of group `i` serving type `k`, if the mix is tracked
    pub fn num_busy_of_type(&self, k: usize, i: usize) -> Option<u32> {
        self.busy_by_type
            .as_ref()
            .map(|matrix| matrix[k * self.num_groups + i])
    }

    /// Raw per-(type, group) matrix, row-major
    pub fn busy_by_type(&self) -> Option<&[u32]> {
        self.busy_by_type.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.queued_total == 0 && self.busy_total == 0
    }

    /// Same counters without the per-(type, group) breakdown
    pub fn without_service_types(&self) -> Self {
        Self {
            busy_by_type: None,
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------
    // Mutators. Callers validate preconditions; these only keep the sums
    // consistent.
    // ------------------------------------------------------------------

    pub(crate) fn add_busy(&mut self, k: Option<usize>, i: usize) {
        self.busy[i] += 1;
        self.busy_total += 1;
        if let (Some(matrix), Some(k)) = (self.busy_by_type.as_mut(), k) {
            matrix[k * self.num_groups + i] += 1;
        }
    }

    pub(crate) fn remove_busy(&mut self, k: Option<usize>, i: usize) {
        self.busy[i] -= 1;
        self.busy_total -= 1;
        if let (Some(matrix), Some(k)) = (self.busy_by_type.as_mut(), k) {
            matrix[k * self.num_groups + i] -= 1;
        }
    }

    pub(crate) fn enqueue(&mut self, k: usize) {
        self.queued[k] += 1;
        self.queued_total += 1;
    }

    pub(crate) fn dequeue(&mut self, k: usize) {
        self.queued[k] -= 1;
        self.queued_total -= 1;
    }
}

fn sum_counts(counts: &[u32]) -> Result<u32, CtmcError> {
    counts
        .iter()
        .try_fold(0u32, |acc, &c| acc.checked_add(c))
        .ok_or_else(|| CtmcError::DimensionMismatch("occupancy total overflows".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(state: &CtmcState) -> u64 {
        let mut hasher = DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_mutators_keep_totals() {
        let mut state = CtmcState::new(2, 2, true);
        state.add_busy(Some(1), 0);
        state.add_busy(Some(0), 0);
        state.enqueue(1);
        assert_eq!(state.total_busy(), 2);
        assert_eq!(state.num_busy(0), 2);
        assert_eq!(state.num_busy_of_type(1, 0), Some(1));
        assert_eq!(state.total_queue_size(), 1);

        state.remove_busy(Some(1), 0);
        state.dequeue(1);
        assert_eq!(state.num_busy_of_type(1, 0), Some(0));
        assert_eq!(state.total_busy(), 1);
        assert_eq!(state.total_queue_size(), 0);
    }

    #[test]
    fn test_untracked_state_ignores_types() {
        let mut state = CtmcState::new(2, 1, false);
        state.add_busy(Some(1), 0);
        assert_eq!(state.num_busy(0), 1);
        assert_eq!(state.num_busy_of_type(1, 0), None);
    }

    #[test]
    fn test_equal_states_hash_alike() {
        let mut a = CtmcState::new(1, 2, true);
        let mut b = CtmcState::new(1, 2, true);
        a.add_busy(Some(0), 1);
        b.add_busy(Some(0), 1);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        b.enqueue(0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_counts_checks_columns() {
        let ok = CtmcState::from_counts(vec![1, 0], vec![2], Some(vec![1, 1]));
        assert!(ok.is_ok());
        let state = ok.unwrap();
        assert_eq!(state.total_queue_size(), 1);
        assert_eq!(state.total_busy(), 2);

        let bad = CtmcState::from_counts(vec![0, 0], vec![2], Some(vec![1, 0]));
        assert!(bad.is_err());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = CtmcState::new(1, 1, true);
        state.add_busy(Some(0), 0);
        state.enqueue(0);
        state.reset();
        assert!(state.is_empty());
        assert_eq!(state, CtmcState::new(1, 1, true));
    }
}
