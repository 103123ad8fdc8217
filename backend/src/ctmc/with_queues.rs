//! Waiting-time tracking decorator
//!
//! [`CallCenterCtmcWithQueues`] keeps, per contact type, a FIFO of the
//! transition indices at which the currently queued contacts arrived. When a
//! contact leaves the queue (served or abandoned), the difference between
//! the current index and its arrival index is its waiting time in
//! transitions; dividing by the uniformization rate converts it to time.
//!
//! All bookkeeping hangs off [`CallCenterCtmc::generate`], so sampled and
//! explicit transitions are observed alike. The arrival indices also feed
//! longest-waiting routing policies.

use super::{CallCenterCtmc, CtmcError};
use crate::events::RandomWord;
use crate::models::{CircularIntQueue, CtmcParams, CtmcState, TransitionRecord, TransitionType};
use crate::orchestrator::checkpoint::CtmcSnapshot;
use crate::routing::QueueWaits;
use crate::thresholds::ModeTable;

/// Engine wrapper recording arrival indices of queued contacts
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use callcenter_ctmc_core_rs::ctmc::{CallCenterCtmc, CallCenterCtmc11, CallCenterCtmcWithQueues};
/// use callcenter_ctmc_core_rs::models::CtmcParams;
/// use callcenter_ctmc_core_rs::routing::{SingleGroupSelector, SingleQueueSelector};
///
/// let mut params = CtmcParams::new(1, 1).unwrap();
/// params.set_max_queue_capacity(4).unwrap();
/// params.set_queue_capacity(4).unwrap();
/// params.set_max_patience_rate(0, 1.0).unwrap();
/// let inner = CallCenterCtmc11::new(
///     params,
///     None,
///     vec![Arc::new(SingleGroupSelector)],
///     vec![Arc::new(SingleQueueSelector)],
/// )
/// .unwrap();
/// let mut ctmc = CallCenterCtmcWithQueues::new(inner);
///
/// ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // transition 1
/// ctmc.generate_false_transition(2, 0).unwrap(); // transitions 2..=4
/// ctmc.generate_abandonment(0, 0, 0, 0).unwrap(); // transition 5
/// assert_eq!(ctmc.last_waiting_time(), Some(4));
/// ```
#[derive(Debug, Clone)]
pub struct CallCenterCtmcWithQueues<C> {
    inner: C,
    queues: Vec<CircularIntQueue>,
    last_wait: Option<u64>,
}

impl<C: CallCenterCtmc + Clone + 'static> CallCenterCtmcWithQueues<C> {
    /// Wrap `inner`; contacts already queued count as arriving now
    pub fn new(inner: C) -> Self {
        let mut ctmc = Self {
            inner,
            queues: Vec::new(),
            last_wait: None,
        };
        ctmc.reset_queues(None);
        ctmc
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn waiting_queues(&self) -> &[CircularIntQueue] {
        &self.queues
    }

    /// Rebuild the queues to match the inner occupancy, copying arrival
    /// indices from `source` where it has a queue of the right length
    fn reset_queues(&mut self, source: Option<&dyn CallCenterCtmc>) {
        let now = self.inner.transitions_done();
        let state = self.inner.state();
        self.queues = (0..state.num_contact_types())
            .map(|k| {
                let size = state.queue_size(k) as usize;
                match source.and_then(|s| s.waiting_queue(k)) {
                    Some(queue) if queue.len() == size => queue.clone(),
                    _ => std::iter::repeat(now).take(size).collect(),
                }
            })
            .collect();
        self.last_wait = None;
    }

    fn record_queue_change(&mut self, record: &TransitionRecord, index: u64) {
        self.last_wait = None;
        match record.kind {
            TransitionType::ArrivalQueued => {
                if let Some(k) = record.contact_type {
                    self.queues[k].push_back(index);
                }
            }
            TransitionType::EndServiceAndDequeue => {
                if let Some(k) = record.queued_type {
                    self.last_wait = self.queues[k]
                        .pop_front()
                        .map(|arrival| index.saturating_sub(arrival));
                }
            }
            TransitionType::Abandonment => {
                if let (Some(k), Some(position)) = (record.contact_type, record.queue_position) {
                    self.last_wait = self.queues[k]
                        .remove(position)
                        .map(|arrival| index.saturating_sub(arrival));
                }
            }
            _ => {}
        }
    }
}

impl<C: CallCenterCtmc + Clone + 'static> CallCenterCtmc for CallCenterCtmcWithQueues<C> {
    fn params(&self) -> &CtmcParams {
        self.inner.params()
    }

    fn state(&self) -> &CtmcState {
        self.inner.state()
    }

    fn transitions_done(&self) -> u64 {
        self.inner.transitions_done()
    }

    fn target_transitions(&self) -> u64 {
        self.inner.target_transitions()
    }

    fn set_target_transitions(&mut self, target: u64) {
        self.inner.set_target_transitions(target)
    }

    fn mode_table(&self) -> &ModeTable {
        self.inner.mode_table()
    }

    fn mode(&self) -> usize {
        self.inner.mode()
    }

    fn last_transition(&self) -> &TransitionRecord {
        self.inner.last_transition()
    }

    fn waiting_queue(&self, k: usize) -> Option<&CircularIntQueue> {
        self.queues.get(k)
    }

    fn last_waiting_time(&self) -> Option<u64> {
        self.last_wait
    }

    fn set_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_arrival_rate(k, rate)
    }

    fn set_max_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_max_arrival_rate(k, rate)
    }

    fn set_balking_probability(&mut self, k: usize, prob: f64) -> Result<(), CtmcError> {
        self.inner.set_balking_probability(k, prob)
    }

    fn set_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_patience_rate(k, rate)
    }

    fn set_max_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_max_patience_rate(k, rate)
    }

    fn set_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_service_rate(k, i, rate)
    }

    fn set_max_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_max_service_rate(k, i, rate)
    }

    fn set_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_group_service_rate(i, rate)
    }

    fn set_max_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.inner.set_max_group_service_rate(i, rate)
    }

    fn set_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.inner.set_num_agents(i, n)
    }

    fn set_max_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.inner.set_max_num_agents(i, n)
    }

    fn set_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.inner.set_queue_capacity(h)
    }

    fn set_max_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.inner.set_max_queue_capacity(h)
    }

    fn set_thresholds(&mut self, thresholds: Option<Vec<Vec<u32>>>) -> Result<(), CtmcError> {
        self.inner.set_thresholds(thresholds)
    }

    fn init_empty(&mut self) {
        self.inner.init_empty();
        self.reset_queues(None);
    }

    fn init_from(&mut self, other: &dyn CallCenterCtmc) -> Result<(), CtmcError> {
        self.inner.init_from(other)?;
        self.reset_queues(Some(other));
        Ok(())
    }

    fn snapshot(&self) -> CtmcSnapshot {
        let mut snapshot = self.inner.snapshot();
        snapshot.waiting_queues = Some(
            self.queues
                .iter()
                .map(|q| q.iter().collect())
                .collect(),
        );
        snapshot
    }

    fn restore_state(&mut self, snapshot: &CtmcSnapshot) -> Result<(), CtmcError> {
        if let Some(waiting) = &snapshot.waiting_queues {
            let consistent = waiting.len() == snapshot.queued.len()
                && waiting
                    .iter()
                    .zip(&snapshot.queued)
                    .all(|(q, &size)| q.len() == size as usize);
            if !consistent {
                return Err(CtmcError::DimensionMismatch(
                    "waiting queues do not match the queued counts".to_string(),
                ));
            }
        }
        self.inner.restore_state(snapshot)?;
        match &snapshot.waiting_queues {
            Some(waiting) => {
                self.queues = waiting
                    .iter()
                    .map(|q| q.iter().copied().collect())
                    .collect();
                self.last_wait = None;
            }
            None => self.reset_queues(None),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn CallCenterCtmc> {
        Box::new(self.clone())
    }

    fn preview_transition_with(
        &self,
        word: RandomWord,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<TransitionRecord, CtmcError> {
        let own: &dyn QueueWaits = &self.queues;
        self.inner
            .preview_transition_with(word, Some(waits.unwrap_or(own)))
    }

    fn preview_transition(&self, word: RandomWord) -> Result<TransitionRecord, CtmcError> {
        self.preview_transition_with(word, None)
    }

    fn generate(&mut self, record: TransitionRecord) -> Result<TransitionType, CtmcError> {
        let index = self
            .inner
            .transitions_done()
            .saturating_add(record.preceding_false)
            .saturating_add(1);
        let kind = self.inner.generate(record)?;
        self.record_queue_change(&record, index);
        Ok(kind)
    }

    fn select_contact_with(
        &mut self,
        i: usize,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<Option<usize>, CtmcError> {
        let now = self.inner.transitions_done();
        let own: &dyn QueueWaits = &self.queues;
        let selected = self
            .inner
            .select_contact_with(i, Some(waits.unwrap_or(own)))?;
        if let Some(k) = selected {
            self.last_wait = self.queues[k]
                .pop_front()
                .map(|arrival| now.saturating_sub(arrival));
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctmc::CallCenterCtmcKI;
    use crate::routing::{ListAgentGroupSelector, ListWaitingQueueSelector};
    use std::sync::Arc;

    fn two_type_engine() -> CallCenterCtmcWithQueues<CallCenterCtmcKI> {
        let mut params = CtmcParams::new(2, 1).unwrap();
        for k in 0..2 {
            params.set_max_arrival_rate(k, 1.0).unwrap();
            params.set_arrival_rate(k, 1.0).unwrap();
            params.set_max_service_rate(k, 0, 1.0).unwrap();
            params.set_service_rate(k, 0, 1.0).unwrap();
            params.set_max_patience_rate(k, 0.5).unwrap();
            params.set_patience_rate(k, 0.5).unwrap();
        }
        params.set_max_num_agents(0, 1).unwrap();
        params.set_num_agents(0, 1).unwrap();
        params.set_max_queue_capacity(5).unwrap();
        params.set_queue_capacity(5).unwrap();
        let inner = CallCenterCtmcKI::new(
            params,
            None,
            vec![
                Arc::new(ListAgentGroupSelector::new(vec![0])),
                Arc::new(ListAgentGroupSelector::new(vec![0])),
            ],
            vec![Arc::new(ListWaitingQueueSelector::new(vec![1, 0]))],
        )
        .unwrap();
        CallCenterCtmcWithQueues::new(inner)
    }

    #[test]
    fn test_waiting_time_on_dequeue() {
        let mut ctmc = two_type_engine();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap(); // 1
        ctmc.generate_arrival_queued(1, 0, 0).unwrap(); // 2
        ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // 3
        assert_eq!(ctmc.waiting_queue(1).unwrap().front(), Some(2));

        // Five false transitions fold in before the end of service at 9
        ctmc.generate_end_service_and_dequeue(Some(0), 0, 1, 5, 0).unwrap();
        assert_eq!(ctmc.last_waiting_time(), Some(7));
        assert!(ctmc.waiting_queue(1).unwrap().is_empty());
        assert_eq!(ctmc.waiting_queue(0).unwrap().len(), 1);
    }

    #[test]
    fn test_abandonment_removes_the_right_position() {
        let mut ctmc = two_type_engine();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap(); // 1
        ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // 2
        ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // 3
        ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // 4
        ctmc.generate_abandonment(0, 1, 0, 0).unwrap(); // 5
        assert_eq!(ctmc.last_waiting_time(), Some(2));
        let remaining: Vec<u64> = ctmc.waiting_queue(0).unwrap().iter().collect();
        assert_eq!(remaining, vec![2, 4]);
    }

    #[test]
    fn test_select_contact_reports_wait() {
        let mut ctmc = two_type_engine();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap(); // 1
        ctmc.generate_arrival_queued(0, 0, 0).unwrap(); // 2
        ctmc.generate_end_service(Some(0), 0, 3, 0).unwrap(); // 6
        assert_eq!(ctmc.select_contact(0).unwrap(), Some(0));
        assert_eq!(ctmc.last_waiting_time(), Some(4));
        assert_eq!(ctmc.transitions_done(), 6);
    }

    #[test]
    fn test_failed_generate_leaves_queues_alone() {
        let mut ctmc = two_type_engine();
        ctmc.generate_arrival_queued(1, 0, 0).unwrap();
        assert!(ctmc.generate_abandonment(1, 3, 0, 0).is_err());
        assert_eq!(ctmc.waiting_queue(1).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_arrival_indices() {
        let mut ctmc = two_type_engine();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        ctmc.generate_arrival_queued(1, 2, 0).unwrap();
        let snapshot = ctmc.snapshot();
        assert_eq!(snapshot.waiting_queues, Some(vec![vec![], vec![4]]));

        let mut restored = two_type_engine();
        restored.restore_state(&snapshot).unwrap();
        assert!(restored.state_eq(&ctmc));
        assert_eq!(restored.waiting_queue(1).unwrap().front(), Some(4));
    }
}
