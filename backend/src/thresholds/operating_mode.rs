use super::ModeTable;
use crate::models::{CtmcState, TransitionRecord, TransitionType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Active operating mode of one chain
///
/// Each dimension keeps the index of the band its occupancy lies in. A
/// transition moves one occupancy by one, so band indices move by at most
/// one step; the mode for a band tuple is found once by scanning the table
/// and memoized afterwards.
///
/// Cloning deep-copies the band indices and the cache and shares the table.
#[derive(Debug, Clone)]
pub struct OperatingModeThresholds {
    table: Arc<ModeTable>,
    band_index: Vec<usize>,
    mode: usize,
    cache: HashMap<Vec<usize>, usize>,
}

impl OperatingModeThresholds {
    /// Tracker positioned at zero occupancy
    pub fn new(table: Arc<ModeTable>) -> Self {
        let band_index = vec![0; table.num_dimensions()];
        let mut thresholds = Self {
            table,
            band_index,
            mode: 0,
            cache: HashMap::new(),
        };
        thresholds.mode = thresholds.lookup();
        thresholds
    }

    pub fn table(&self) -> &ModeTable {
        &self.table
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    /// Number of memoized band tuples
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Recompute every band from scratch
    pub fn reset(&mut self, state: &CtmcState) {
        let queue_dim = self.table.queue_dimension();
        for d in 0..queue_dim {
            self.band_index[d] = self.table.band_of(d, state.num_busy(d));
        }
        self.band_index[queue_dim] = self.table.band_of(queue_dim, state.total_queue_size());
        self.mode = self.lookup();
    }

    /// Move dimension `d` to occupancy `value`; returns whether the mode changed
    pub fn update_dimension(&mut self, d: usize, value: u32) -> bool {
        let bands = self.table.bands(d);
        let mut b = self.band_index[d];
        while b + 1 < bands.len() && value > bands[b] {
            b += 1;
        }
        while b > 0 && value <= bands[b - 1] {
            b -= 1;
        }
        if b == self.band_index[d] {
            return false;
        }
        self.band_index[d] = b;
        let previous = self.mode;
        self.mode = self.lookup();
        if self.mode != previous {
            trace!(from = previous, to = self.mode, "operating mode switch");
        }
        self.mode != previous
    }

    /// Update the dimensions touched by an applied transition
    ///
    /// `state` must already reflect `record`.
    pub fn apply(&mut self, state: &CtmcState, record: &TransitionRecord) -> bool {
        let queue_dim = self.table.queue_dimension();
        match record.kind {
            TransitionType::ArrivalServed | TransitionType::EndServiceNoDequeue => {
                match record.group {
                    Some(i) => self.update_dimension(i, state.num_busy(i)),
                    None => false,
                }
            }
            TransitionType::ArrivalQueued
            | TransitionType::EndServiceAndDequeue
            | TransitionType::Abandonment => {
                self.update_dimension(queue_dim, state.total_queue_size())
            }
            TransitionType::ArrivalBalked
            | TransitionType::ArrivalBlocked
            | TransitionType::FalseTransition => false,
        }
    }

    fn lookup(&mut self) -> usize {
        if let Some(&mode) = self.cache.get(&self.band_index) {
            return mode;
        }
        let mode = self.table.dominating_mode(&self.band_index);
        self.cache.insert(self.band_index.clone(), mode);
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CtmcParams;

    fn table() -> Arc<ModeTable> {
        let mut params = CtmcParams::new(1, 2).unwrap();
        params.set_max_arrival_rate(0, 1.0).unwrap();
        params.set_max_service_rate(0, 0, 1.0).unwrap();
        params.set_max_service_rate(0, 1, 1.0).unwrap();
        params.set_max_num_agents(0, 4).unwrap();
        params.set_max_num_agents(1, 4).unwrap();
        params.set_max_queue_capacity(3).unwrap();
        let rows = vec![vec![4, 4, 3], vec![1, 1, 0], vec![2, 2, 1]];
        Arc::new(ModeTable::build(&params, Some(rows.as_slice()), &[1.0, 1.0]).unwrap())
    }

    #[test]
    fn test_starts_in_cheapest_mode() {
        let thresholds = OperatingModeThresholds::new(table());
        assert_eq!(thresholds.table().vector(thresholds.mode()), &[1, 1, 0]);
    }

    #[test]
    fn test_mode_follows_occupancy_up_and_down() {
        let mut thresholds = OperatingModeThresholds::new(table());
        assert!(!thresholds.update_dimension(0, 1));
        assert!(thresholds.update_dimension(0, 2));
        assert_eq!(thresholds.table().vector(thresholds.mode()), &[2, 2, 1]);
        assert!(thresholds.update_dimension(2, 2));
        assert_eq!(thresholds.table().vector(thresholds.mode()), &[4, 4, 3]);
        assert!(!thresholds.update_dimension(0, 1));
        assert!(thresholds.update_dimension(2, 0));
        assert_eq!(thresholds.mode(), 0);
    }

    #[test]
    fn test_occupancy_never_exceeds_active_mode() {
        let mut thresholds = OperatingModeThresholds::new(table());
        let path = [(0, 1), (0, 2), (1, 1), (2, 1), (0, 3), (0, 4), (0, 3), (2, 0), (1, 0)];
        let mut occupancy = [0u32; 3];
        for (d, v) in path {
            occupancy[d] = v;
            thresholds.update_dimension(d, v);
            let vector = thresholds.table().vector(thresholds.mode());
            for (o, t) in occupancy.iter().zip(vector) {
                assert!(o <= t, "occupancy {:?} above {:?}", occupancy, vector);
            }
        }
    }

    #[test]
    fn test_reset_from_state_and_cache() {
        let mut thresholds = OperatingModeThresholds::new(table());
        let state = CtmcState::from_counts(vec![2], vec![0, 1], None).unwrap();
        thresholds.reset(&state);
        assert_eq!(thresholds.table().vector(thresholds.mode()), &[4, 4, 3]);
        let cached = thresholds.cache_len();
        thresholds.reset(&state);
        assert_eq!(thresholds.cache_len(), cached);
    }
}
