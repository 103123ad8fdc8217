//! Generic uniformized CTMC engine
//!
//! [`CtmcEngine`] owns the parameters, the occupancy, the active operating
//! mode, and the routing selectors. Sampling tables come from a
//! [`TransitionSampler`]; the three aliases at the bottom of this module pick
//! the sampler of each call center topology.
//!
//! # Ownership
//!
//! | Field              | Clone behavior                         |
//! |--------------------|----------------------------------------|
//! | params, state      | deep copy                              |
//! | mode tracker       | deep copy of bands and cache           |
//! | mode table         | shared (`Arc`), immutable              |
//! | sampler tables     | shared (`Arc`), immutable              |
//! | selectors          | shared (`Arc`), stateless              |

use super::sampler::{LookupSampler, SameRateSampler, SingleQueueSampler, TransitionSampler};
use super::{CallCenterCtmc, CtmcError};
use crate::events::{EventAction, RandomWord};
use crate::models::{CtmcParams, CtmcState, TransitionRecord, TransitionType};
use crate::orchestrator::checkpoint::CtmcSnapshot;
use crate::routing::{AgentGroupSelector, QueueWaits, RoutingContext, WaitingQueueSelector};
use crate::thresholds::{ModeTable, OperatingModeThresholds};
use std::sync::Arc;
use tracing::{debug, trace};

/// General K×I engine with one random event tree per mode
pub type CallCenterCtmcKI = CtmcEngine<LookupSampler>;

/// Engine for groups serving every compatible type at one shared rate
pub type CallCenterCtmcSameRate = CtmcEngine<SameRateSampler>;

/// Single-type, single-group engine
pub type CallCenterCtmc11 = CtmcEngine<SingleQueueSampler>;

/// Uniformized call center chain over a sampler `S`
#[derive(Debug, Clone)]
pub struct CtmcEngine<S: TransitionSampler> {
    params: CtmcParams,
    threshold_config: Option<Vec<Vec<u32>>>,
    modes: OperatingModeThresholds,
    sampler: S,
    state: CtmcState,
    group_selectors: Vec<Arc<dyn AgentGroupSelector>>,
    queue_selectors: Vec<Arc<dyn WaitingQueueSelector>>,
    done: u64,
    target: u64,
    last: TransitionRecord,
}

fn required(field: Option<usize>, name: &str, kind: TransitionType) -> Result<usize, CtmcError> {
    field.ok_or_else(|| CtmcError::transition(format!("{} record without {}", kind, name)))
}

impl<S: TransitionSampler> CtmcEngine<S> {
    /// Build an empty chain
    ///
    /// `group_selectors[k]` routes arrivals of type `k`;
    /// `queue_selectors[i]` picks the next queued contact for group `i`.
    pub fn new(
        params: CtmcParams,
        thresholds: Option<Vec<Vec<u32>>>,
        group_selectors: Vec<Arc<dyn AgentGroupSelector>>,
        queue_selectors: Vec<Arc<dyn WaitingQueueSelector>>,
    ) -> Result<Self, CtmcError> {
        S::check_params(&params)?;
        let num_types = params.num_contact_types();
        let num_groups = params.num_agent_groups();
        if group_selectors.len() != num_types {
            return Err(CtmcError::DimensionMismatch(format!(
                "{} agent group selectors for {} contact types",
                group_selectors.len(),
                num_types
            )));
        }
        if queue_selectors.len() != num_groups {
            return Err(CtmcError::DimensionMismatch(format!(
                "{} waiting queue selectors for {} agent groups",
                queue_selectors.len(),
                num_groups
            )));
        }

        let (modes, sampler) = Self::rebuild(&params, thresholds.as_deref())?;
        debug!(
            engine = S::NAME,
            contact_types = num_types,
            agent_groups = num_groups,
            "created CTMC engine"
        );
        Ok(Self {
            params,
            threshold_config: thresholds,
            modes,
            sampler,
            state: CtmcState::new(num_types, num_groups, S::TRACKS_SERVICE_TYPES),
            group_selectors,
            queue_selectors,
            done: 0,
            target: u64::MAX,
            last: TransitionRecord::default(),
        })
    }

    fn rebuild(
        params: &CtmcParams,
        thresholds: Option<&[Vec<u32>]>,
    ) -> Result<(OperatingModeThresholds, S), CtmcError> {
        let weights = S::group_weights(params);
        let table = Arc::new(ModeTable::build(params, thresholds, &weights)?);
        let sampler = S::build(params, &table)?;
        debug!(
            engine = S::NAME,
            modes = table.num_modes(),
            uniformization_rate = table.uniformization_rate(),
            table_size = sampler.table_size(),
            "rebuilt operating modes"
        );
        Ok((OperatingModeThresholds::new(table), sampler))
    }

    pub fn thresholds(&self) -> &OperatingModeThresholds {
        &self.modes
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn threshold_config(&self) -> Option<&[Vec<u32>]> {
        self.threshold_config.as_deref()
    }

    /// Apply a bound change on a copy of the parameters and rebuild
    fn update_bounds(
        &mut self,
        update: impl FnOnce(&mut CtmcParams) -> Result<(), CtmcError>,
    ) -> Result<(), CtmcError> {
        let mut params = self.params.clone();
        update(&mut params)?;
        S::check_params(&params)?;
        check_occupancy(&self.state, &params)?;
        let (mut modes, sampler) = Self::rebuild(&params, self.threshold_config.as_deref())?;
        modes.reset(&self.state);
        self.params = params;
        self.modes = modes;
        self.sampler = sampler;
        Ok(())
    }

    fn reject_per_type_service(&self) -> Result<(), CtmcError> {
        if S::SHARED_SERVICE_RATES {
            return Err(CtmcError::Unsupported(format!(
                "{} engine sets service rates per group",
                S::NAME
            )));
        }
        Ok(())
    }

    fn remaining(&self) -> Result<u64, CtmcError> {
        if self.done >= self.target {
            return Err(CtmcError::TargetReached {
                done: self.done,
                target: self.target,
            });
        }
        Ok(self.target - self.done)
    }

    // ------------------------------------------------------------------
    // Sampling
    // ------------------------------------------------------------------

    fn decide(
        &self,
        word: RandomWord,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<TransitionRecord, CtmcError> {
        let remaining = self.remaining()?;
        let mode = self.modes.mode();
        let (skipped, word) = self.modes.table().split_self_jumps(mode, word);
        if skipped >= remaining {
            return Ok(TransitionRecord::false_transition().with_false_transitions(remaining - 1, 0));
        }

        let (action, frac) = self.sampler.sample(mode, word);
        let ctx = RoutingContext::new(&self.state, &self.params).with_waits(waits);
        let record = match action {
            EventAction::Arrival { contact_type } => self.resolve_arrival(&ctx, contact_type, frac),
            EventAction::EndService {
                contact_type,
                group,
            } => self.resolve_end_service(&ctx, mode, contact_type, group, frac),
            EventAction::Abandonment { contact_type } => {
                self.resolve_abandonment(mode, contact_type, frac)
            }
            EventAction::False => TransitionRecord::false_transition(),
        };
        Ok(record.with_false_transitions(skipped, 0))
    }

    fn resolve_arrival(&self, ctx: &RoutingContext<'_>, k: usize, frac: f64) -> TransitionRecord {
        let acceptance = self.params.arrival_acceptance(k);
        if frac >= acceptance {
            return TransitionRecord::false_transition();
        }
        let ctx = ctx.for_contact_type(k);
        if let Some(i) = self.group_selectors[k].select_agent_group(&ctx) {
            return TransitionRecord::arrival_served(k, i);
        }
        if self.state.total_queue_size() >= self.params.queue_capacity() {
            return TransitionRecord::arrival_blocked(k);
        }
        if frac / acceptance < self.params.balking_probability(k) {
            TransitionRecord::arrival_balked(k)
        } else {
            TransitionRecord::arrival_queued(k, self.state.queue_size(k) as usize)
        }
    }

    fn resolve_end_service(
        &self,
        ctx: &RoutingContext<'_>,
        mode: usize,
        k: Option<usize>,
        i: usize,
        frac: f64,
    ) -> TransitionRecord {
        let slots = self.modes.table().group_threshold(mode, i);
        let scaled = frac * f64::from(slots);
        let slot = scaled.floor();
        let occupied = k
            .and_then(|k| self.state.num_busy_of_type(k, i))
            .unwrap_or_else(|| self.state.num_busy(i));
        if slot >= f64::from(occupied) {
            return TransitionRecord::false_transition();
        }
        let acceptance = match k {
            Some(k) => self.params.service_acceptance(k, i),
            None => self.params.group_service_acceptance(i),
        };
        if scaled - slot >= acceptance {
            return TransitionRecord::false_transition();
        }

        // The freed agent picks up a queued contact only if the group is not
        // over its current agent count
        if self.state.num_busy(i) - 1 < self.params.num_agents(i) {
            let ctx = ctx.for_group(i);
            if let Some(queued) = self.queue_selectors[i].select_waiting_queue(&ctx) {
                return TransitionRecord::end_service_and_dequeue(k, i, queued);
            }
        }
        TransitionRecord::end_service(k, i)
    }

    fn resolve_abandonment(&self, mode: usize, k: usize, frac: f64) -> TransitionRecord {
        let slots = self.modes.table().queue_threshold(mode);
        let scaled = frac * f64::from(slots);
        let slot = scaled.floor();
        if slot >= f64::from(self.state.queue_size(k)) {
            return TransitionRecord::false_transition();
        }
        if scaled - slot >= self.params.patience_acceptance(k) {
            return TransitionRecord::false_transition();
        }
        TransitionRecord::abandonment(k, slot as usize)
    }

    // ------------------------------------------------------------------
    // Applying records
    // ------------------------------------------------------------------

    fn validate(&self, record: &TransitionRecord) -> Result<(), CtmcError> {
        let kind = record.kind;
        match kind {
            TransitionType::ArrivalServed => {
                let k = required(record.contact_type, "contact type", kind)?;
                let i = required(record.group, "agent group", kind)?;
                self.params.check_contact_type(k)?;
                self.params.check_group(i)?;
                if !self.params.is_compatible(k, i) {
                    return Err(CtmcError::transition(format!(
                        "group {} cannot serve contact type {}",
                        i, k
                    )));
                }
                if self.state.num_busy(i) >= self.params.num_agents(i) {
                    return Err(CtmcError::transition(format!(
                        "no free agent in group {}",
                        i
                    )));
                }
            }
            TransitionType::ArrivalBalked | TransitionType::ArrivalBlocked => {
                let k = required(record.contact_type, "contact type", kind)?;
                self.params.check_contact_type(k)?;
            }
            TransitionType::ArrivalQueued => {
                let k = required(record.contact_type, "contact type", kind)?;
                self.params.check_contact_type(k)?;
                if self.state.total_queue_size() >= self.params.queue_capacity() {
                    return Err(CtmcError::transition(format!(
                        "queue full ({} of {})",
                        self.state.total_queue_size(),
                        self.params.queue_capacity()
                    )));
                }
                let tail = self.state.queue_size(k) as usize;
                if let Some(position) = record.queue_position {
                    if position != tail {
                        return Err(CtmcError::transition(format!(
                            "queued contact of type {} must join at position {}, not {}",
                            k, tail, position
                        )));
                    }
                }
            }
            TransitionType::EndServiceNoDequeue => {
                self.validate_end_service(record)?;
            }
            TransitionType::EndServiceAndDequeue => {
                let i = self.validate_end_service(record)?;
                let queued = required(record.queued_type, "queued type", kind)?;
                self.params.check_contact_type(queued)?;
                if self.state.queue_size(queued) == 0 {
                    return Err(CtmcError::transition(format!(
                        "no queued contact of type {}",
                        queued
                    )));
                }
                if !self.params.is_compatible(queued, i) {
                    return Err(CtmcError::transition(format!(
                        "group {} cannot serve contact type {}",
                        i, queued
                    )));
                }
                if self.state.num_busy(i) - 1 >= self.params.num_agents(i) {
                    return Err(CtmcError::transition(format!(
                        "group {} is over its agent count",
                        i
                    )));
                }
            }
            TransitionType::Abandonment => {
                let k = required(record.contact_type, "contact type", kind)?;
                self.params.check_contact_type(k)?;
                let position = required(record.queue_position, "queue position", kind)?;
                if position >= self.state.queue_size(k) as usize {
                    return Err(CtmcError::transition(format!(
                        "no queued contact of type {} at position {}",
                        k, position
                    )));
                }
            }
            TransitionType::FalseTransition => {}
        }
        Ok(())
    }

    /// Returns the group of a valid end of service
    fn validate_end_service(&self, record: &TransitionRecord) -> Result<usize, CtmcError> {
        let i = required(record.group, "agent group", record.kind)?;
        self.params.check_group(i)?;
        if self.state.num_busy(i) == 0 {
            return Err(CtmcError::transition(format!("no busy agent in group {}", i)));
        }
        if self.state.tracks_service_types() {
            let k = required(record.contact_type, "contact type", record.kind)?;
            self.params.check_contact_type(k)?;
            if self.state.num_busy_of_type(k, i) == Some(0) {
                return Err(CtmcError::transition(format!(
                    "no contact of type {} in service in group {}",
                    k, i
                )));
            }
        } else if let Some(k) = record.contact_type {
            self.params.check_contact_type(k)?;
        }
        Ok(i)
    }

    /// Mutate the occupancy; `record` must be valid
    fn apply(&mut self, record: &TransitionRecord) {
        let state = &mut self.state;
        match (record.kind, record.contact_type, record.group) {
            (TransitionType::ArrivalServed, k, Some(i)) => state.add_busy(k, i),
            (TransitionType::ArrivalQueued, Some(k), _) => state.enqueue(k),
            (TransitionType::EndServiceNoDequeue, k, Some(i)) => state.remove_busy(k, i),
            (TransitionType::EndServiceAndDequeue, k, Some(i)) => {
                if let Some(queued) = record.queued_type {
                    state.remove_busy(k, i);
                    state.dequeue(queued);
                    state.add_busy(Some(queued), i);
                }
            }
            (TransitionType::Abandonment, Some(k), _) => state.dequeue(k),
            _ => {}
        }
    }

    fn install_state(&mut self, state: CtmcState) -> Result<(), CtmcError> {
        let num_types = self.params.num_contact_types();
        let num_groups = self.params.num_agent_groups();
        if state.num_contact_types() != num_types || state.num_agent_groups() != num_groups {
            return Err(CtmcError::DimensionMismatch(format!(
                "state has K={}, I={}, chain has K={}, I={}",
                state.num_contact_types(),
                state.num_agent_groups(),
                num_types,
                num_groups
            )));
        }
        let state = match (S::TRACKS_SERVICE_TYPES, state.tracks_service_types()) {
            (true, false) if num_types == 1 => CtmcState::from_counts(
                state.queue_sizes().to_vec(),
                state.busy_counts().to_vec(),
                Some(state.busy_counts().to_vec()),
            )?,
            (true, false) => {
                return Err(CtmcError::DimensionMismatch(
                    "source state does not track in-service contact types".to_string(),
                ))
            }
            (false, true) => state.without_service_types(),
            _ => state,
        };
        check_occupancy(&state, &self.params)?;
        self.state = state;
        self.modes.reset(&self.state);
        Ok(())
    }
}

/// Occupancy must fit the bounds and only compatible pairs may be in service
fn check_occupancy(state: &CtmcState, params: &CtmcParams) -> Result<(), CtmcError> {
    for i in 0..params.num_agent_groups() {
        let busy = state.num_busy(i);
        if busy > params.max_num_agents(i) {
            return Err(CtmcError::InvalidCount {
                what: "busy agents",
                value: busy,
                bound: params.max_num_agents(i),
            });
        }
        if busy > 0 && params.group_max_service_rate(i) <= 0.0 {
            return Err(CtmcError::InvalidConfig(format!(
                "group {} has {} busy agents but serves no contact type",
                i, busy
            )));
        }
        for k in 0..params.num_contact_types() {
            if let Some(count) = state.num_busy_of_type(k, i) {
                if count > 0 && !params.is_compatible(k, i) {
                    return Err(CtmcError::InvalidConfig(format!(
                        "{} contacts of type {} in service in group {}, which cannot serve them",
                        count, k, i
                    )));
                }
            }
        }
    }
    if state.total_queue_size() > params.max_queue_capacity() {
        return Err(CtmcError::InvalidCount {
            what: "queued contacts",
            value: state.total_queue_size(),
            bound: params.max_queue_capacity(),
        });
    }
    Ok(())
}

impl<S: TransitionSampler> CallCenterCtmc for CtmcEngine<S> {
    fn params(&self) -> &CtmcParams {
        &self.params
    }

    fn state(&self) -> &CtmcState {
        &self.state
    }

    fn transitions_done(&self) -> u64 {
        self.done
    }

    fn target_transitions(&self) -> u64 {
        self.target
    }

    fn set_target_transitions(&mut self, target: u64) {
        self.target = target;
    }

    fn mode_table(&self) -> &ModeTable {
        self.modes.table()
    }

    fn mode(&self) -> usize {
        self.modes.mode()
    }

    fn last_transition(&self) -> &TransitionRecord {
        &self.last
    }

    fn set_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.params.set_arrival_rate(k, rate)
    }

    fn set_max_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.update_bounds(|p| p.set_max_arrival_rate(k, rate))
    }

    fn set_balking_probability(&mut self, k: usize, prob: f64) -> Result<(), CtmcError> {
        self.params.set_balking_probability(k, prob)
    }

    fn set_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.params.set_patience_rate(k, rate)
    }

    fn set_max_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.update_bounds(|p| p.set_max_patience_rate(k, rate))
    }

    fn set_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.reject_per_type_service()?;
        self.params.set_service_rate(k, i, rate)
    }

    fn set_max_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.reject_per_type_service()?;
        self.update_bounds(|p| p.set_max_service_rate(k, i, rate))
    }

    fn set_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.params.set_group_service_rate(i, rate)
    }

    fn set_max_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        self.update_bounds(|p| p.set_max_group_service_rate(i, rate))
    }

    fn set_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.params.set_num_agents(i, n)
    }

    fn set_max_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.update_bounds(|p| p.set_max_num_agents(i, n))
    }

    fn set_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.params.set_queue_capacity(h)
    }

    fn set_max_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.update_bounds(|p| p.set_max_queue_capacity(h))
    }

    fn set_thresholds(&mut self, thresholds: Option<Vec<Vec<u32>>>) -> Result<(), CtmcError> {
        let (mut modes, sampler) = Self::rebuild(&self.params, thresholds.as_deref())?;
        modes.reset(&self.state);
        self.modes = modes;
        self.sampler = sampler;
        self.threshold_config = thresholds;
        Ok(())
    }

    fn init_empty(&mut self) {
        self.state.reset();
        self.modes.reset(&self.state);
        self.done = 0;
        self.last = TransitionRecord::default();
    }

    fn init_from(&mut self, other: &dyn CallCenterCtmc) -> Result<(), CtmcError> {
        self.install_state(other.state().clone())?;
        self.done = other.transitions_done();
        self.last = *other.last_transition();
        Ok(())
    }

    fn restore_state(&mut self, snapshot: &CtmcSnapshot) -> Result<(), CtmcError> {
        let state = CtmcState::from_counts(
            snapshot.queued.clone(),
            snapshot.busy.clone(),
            snapshot.busy_by_type.clone(),
        )?;
        self.install_state(state)?;
        self.done = snapshot.transitions_done;
        self.target = snapshot.target_transitions;
        self.last = TransitionRecord::default();
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
        self.decide(word, waits)
    }

    fn generate(&mut self, record: TransitionRecord) -> Result<TransitionType, CtmcError> {
        let remaining = self.remaining()?;
        let total = record
            .preceding_false
            .checked_add(record.following_false)
            .and_then(|n| n.checked_add(1))
            .filter(|&n| n <= remaining)
            .ok_or_else(|| {
                CtmcError::transition(format!(
                    "record spans more than the {} transitions left before the target",
                    remaining
                ))
            })?;
        self.validate(&record)?;
        self.apply(&record);
        let mode_changed = self.modes.apply(&self.state, &record);
        self.done += total;
        self.last = record;
        trace!(
            kind = %record.kind,
            preceding_false = record.preceding_false,
            done = self.done,
            mode = self.modes.mode(),
            mode_changed,
            "transition"
        );
        Ok(record.kind)
    }

    fn select_contact_with(
        &mut self,
        i: usize,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<Option<usize>, CtmcError> {
        self.params.check_group(i)?;
        if self.state.num_busy(i) >= self.params.num_agents(i) {
            return Ok(None);
        }
        let ctx = RoutingContext::new(&self.state, &self.params)
            .with_waits(waits)
            .for_group(i);
        let Some(k) = self.queue_selectors[i].select_waiting_queue(&ctx) else {
            return Ok(None);
        };
        self.params.check_contact_type(k)?;
        if self.state.queue_size(k) == 0 || !self.params.is_compatible(k, i) {
            return Err(CtmcError::transition(format!(
                "selector of group {} picked contact type {} it cannot take",
                i, k
            )));
        }
        self.state.dequeue(k);
        self.state.add_busy(Some(k), i);
        self.modes.update_dimension(i, self.state.num_busy(i));
        let queue_dim = self.modes.table().queue_dimension();
        self.modes
            .update_dimension(queue_dim, self.state.total_queue_size());
        trace!(group = i, contact_type = k, "selected queued contact");
        Ok(Some(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{SingleGroupSelector, SingleQueueSelector};

    fn engine_11(lambda: f64, mu: f64, n: u32, h: u32) -> CallCenterCtmc11 {
        let mut params = CtmcParams::new(1, 1).unwrap();
        params.set_max_arrival_rate(0, lambda).unwrap();
        params.set_arrival_rate(0, lambda).unwrap();
        params.set_max_service_rate(0, 0, mu).unwrap();
        params.set_service_rate(0, 0, mu).unwrap();
        params.set_max_num_agents(0, n).unwrap();
        params.set_num_agents(0, n).unwrap();
        params.set_max_queue_capacity(h).unwrap();
        params.set_queue_capacity(h).unwrap();
        CtmcEngine::new(
            params,
            None,
            vec![Arc::new(SingleGroupSelector)],
            vec![Arc::new(SingleQueueSelector)],
        )
        .unwrap()
    }

    #[test]
    fn test_selector_count_must_match() {
        let params = CtmcParams::new(1, 1).unwrap();
        let err = CallCenterCtmc11::new(params, None, vec![], vec![Arc::new(SingleQueueSelector)])
            .unwrap_err();
        assert!(matches!(err, CtmcError::DimensionMismatch(_)));
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let ctmc = engine_11(5.0, 2.0, 1, 0);
        let record = ctmc.preview_transition(RandomWord::from_unit(0.1)).unwrap();
        assert_eq!(record.kind, TransitionType::ArrivalServed);
        assert!(ctmc.state().is_empty());
        assert_eq!(ctmc.transitions_done(), 0);
    }

    #[test]
    fn test_thinning_rejects_above_current_rate() {
        let mut ctmc = engine_11(5.0, 2.0, 1, 0);
        ctmc.set_arrival_rate(0, 2.5).unwrap();
        // Arrival region is [0, 5/7); half of it is thinned away
        assert_eq!(
            ctmc.preview_transition(RandomWord::from_unit(0.2)).unwrap().kind,
            TransitionType::ArrivalServed
        );
        assert_eq!(
            ctmc.preview_transition(RandomWord::from_unit(0.6)).unwrap().kind,
            TransitionType::FalseTransition
        );
    }

    #[test]
    fn test_generate_rejects_invalid_records() {
        let mut ctmc = engine_11(5.0, 2.0, 1, 1);
        let err = ctmc.generate_end_service(Some(0), 0, 0, 0).unwrap_err();
        assert!(err.is_invalid_state());
        let err = ctmc.generate_abandonment(0, 0, 0, 0).unwrap_err();
        assert!(err.is_invalid_state());

        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        let err = ctmc.generate_arrival_served(0, 0, 0, 0).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(ctmc.transitions_done(), 1);
    }

    #[test]
    fn test_bound_change_below_occupancy_fails() {
        let mut ctmc = engine_11(5.0, 2.0, 3, 0);
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        ctmc.set_num_agents(0, 1).unwrap();
        assert!(ctmc.set_max_num_agents(0, 1).is_err());
        assert_eq!(ctmc.params().max_num_agents(0), 3);
    }

    #[test]
    fn test_over_capacity_group_does_not_dequeue() {
        let mut ctmc = engine_11(5.0, 2.0, 2, 2);
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        ctmc.generate_arrival_served(0, 0, 0, 0).unwrap();
        ctmc.generate_arrival_queued(0, 0, 0).unwrap();
        ctmc.set_num_agents(0, 1).unwrap();
        assert!(ctmc
            .generate_end_service_and_dequeue(Some(0), 0, 0, 0, 0)
            .is_err());
        assert_eq!(
            ctmc.generate_end_service(Some(0), 0, 0, 0).unwrap(),
            TransitionType::EndServiceNoDequeue
        );
        // Back at capacity: the next end of service may pick up the queued call
        ctmc.set_num_agents(0, 2).unwrap();
        assert_eq!(ctmc.select_contact(0).unwrap(), Some(0));
        assert_eq!(ctmc.state().num_busy(0), 2);
        assert_eq!(ctmc.state().total_queue_size(), 0);
        assert_eq!(ctmc.transitions_done(), 4);
    }

    #[test]
    fn test_record_overshooting_target_is_rejected() {
        let mut ctmc = engine_11(5.0, 2.0, 1, 0);
        ctmc.set_target_transitions(3);
        assert!(ctmc.generate_false_transition(2, 1).is_err());
        ctmc.generate_false_transition(1, 1).unwrap();
        assert_eq!(ctmc.transitions_done(), 3);
        let err = ctmc.next_transition_unit(0.1).unwrap_err();
        assert_eq!(err, CtmcError::TargetReached { done: 3, target: 3 });
    }
}
