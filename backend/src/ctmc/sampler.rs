//! Candidate-event samplers
//!
//! A sampler maps one random word to a candidate event of the active
//! operating mode, with probability proportional to the event's weight in
//! the mode's jump rate:
//!
//! - arrival of type `k`: `λ̃_k`
//! - end of service in group `i`: `n_i · μ̃_{k,i}` per type, or `n_i · μ̃_i`
//!   when all types share the group's rate
//! - abandonment of type `k`: `h · ν̃_k`
//!
//! where `(n, h)` is the mode's threshold vector. Whether the candidate
//! really happens (occupancy slot, thinning) is decided by the engine from
//! the residual fraction returned alongside.

use super::CtmcError;
use crate::events::{
    BitBudget, EventAction, EventTreeBuilder, RandomEventTree, RandomWord, MAX_UNIT,
};
use crate::models::CtmcParams;
use crate::thresholds::ModeTable;
use std::fmt::Debug;
use std::sync::Arc;

/// Per-mode sampling tables of one engine variant
pub trait TransitionSampler: Debug + Clone + Send + Sync + 'static {
    /// Whether states carry the per-(type, group) busy matrix
    const TRACKS_SERVICE_TYPES: bool;

    /// Whether service rates are set per group only
    const SHARED_SERVICE_RATES: bool;

    /// Short name for logs
    const NAME: &'static str;

    /// Reject parameters the variant cannot represent
    fn check_params(params: &CtmcParams) -> Result<(), CtmcError>;

    /// Jump-rate weight of one busy agent of each group
    fn group_weights(params: &CtmcParams) -> Vec<f64>;

    /// Precompute the tables of every mode of `table`
    fn build(params: &CtmcParams, table: &ModeTable) -> Result<Self, CtmcError>;

    /// Candidate event and a uniform fraction independent of it
    fn sample(&self, mode: usize, word: RandomWord) -> (EventAction, f64);

    /// Size of the precomputed tables, for logs
    fn table_size(&self) -> usize;
}

/// `(weight, action)` pairs of one mode
fn mode_outcomes(
    params: &CtmcParams,
    table: &ModeTable,
    mode: usize,
    per_type_service: bool,
) -> Vec<(f64, EventAction)> {
    let num_types = params.num_contact_types();
    let num_groups = params.num_agent_groups();
    let mut outcomes = Vec::with_capacity(num_types * (num_groups + 2));

    for k in 0..num_types {
        outcomes.push((
            params.max_arrival_rate(k),
            EventAction::Arrival { contact_type: k },
        ));
    }
    for i in 0..num_groups {
        let slots = f64::from(table.group_threshold(mode, i));
        if per_type_service {
            for k in 0..num_types {
                outcomes.push((
                    slots * params.max_service_rate(k, i),
                    EventAction::EndService {
                        contact_type: Some(k),
                        group: i,
                    },
                ));
            }
        } else {
            outcomes.push((
                slots * params.group_max_service_rate(i),
                EventAction::EndService {
                    contact_type: None,
                    group: i,
                },
            ));
        }
    }
    let queue_slots = f64::from(table.queue_threshold(mode));
    for k in 0..num_types {
        outcomes.push((
            queue_slots * params.max_patience_rate(k),
            EventAction::Abandonment { contact_type: k },
        ));
    }
    outcomes
}

fn has_events(outcomes: &[(f64, EventAction)]) -> bool {
    outcomes.iter().any(|(w, _)| *w > 0.0)
}

// ============================================================================
// General K×I: one lookup tree per mode
// ============================================================================

/// Random event trees over per-(type, group) service events
#[derive(Debug, Clone)]
pub struct LookupSampler {
    trees: Arc<[RandomEventTree]>,
}

impl TransitionSampler for LookupSampler {
    const TRACKS_SERVICE_TYPES: bool = true;
    const SHARED_SERVICE_RATES: bool = false;
    const NAME: &'static str = "lookup";

    fn check_params(_params: &CtmcParams) -> Result<(), CtmcError> {
        Ok(())
    }

    fn group_weights(params: &CtmcParams) -> Vec<f64> {
        (0..params.num_agent_groups())
            .map(|i| params.total_max_service_rate(i))
            .collect()
    }

    fn build(params: &CtmcParams, table: &ModeTable) -> Result<Self, CtmcError> {
        let builder = EventTreeBuilder::new();
        let trees = (0..table.num_modes())
            .map(|mode| {
                let outcomes = mode_outcomes(params, table, mode, true);
                if has_events(&outcomes) {
                    builder.build(&outcomes)
                } else {
                    Ok(RandomEventTree::constant(EventAction::False))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            trees: trees.into(),
        })
    }

    fn sample(&self, mode: usize, word: RandomWord) -> (EventAction, f64) {
        let mut budget = BitBudget::new(word);
        self.trees[mode].resolve(&mut budget)
    }

    fn table_size(&self) -> usize {
        self.trees.iter().map(RandomEventTree::num_nodes).sum()
    }
}

// ============================================================================
// Shared service rate per group: cumulative table, no per-type breakdown
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct CumulativeTable {
    upper: Vec<f64>,
    actions: Vec<EventAction>,
}

impl CumulativeTable {
    fn new(outcomes: &[(f64, EventAction)]) -> Self {
        let total: f64 = outcomes.iter().map(|(w, _)| w.max(0.0)).sum();
        let mut upper = Vec::with_capacity(outcomes.len());
        let mut actions = Vec::with_capacity(outcomes.len());
        if total > 0.0 {
            let mut acc = 0.0;
            for &(weight, action) in outcomes.iter().filter(|(w, _)| *w > 0.0) {
                acc += weight;
                upper.push(acc / total);
                actions.push(action);
            }
            if let Some(last) = upper.last_mut() {
                *last = 1.0;
            }
        }
        Self { upper, actions }
    }

    fn sample(&self, u: f64) -> (EventAction, f64) {
        if self.actions.is_empty() {
            return (EventAction::False, u);
        }
        let idx = self
            .upper
            .partition_point(|&c| c <= u)
            .min(self.actions.len() - 1);
        let lo = if idx == 0 { 0.0 } else { self.upper[idx - 1] };
        let hi = self.upper[idx];
        let frac = if hi > lo {
            ((u - lo) / (hi - lo)).clamp(0.0, MAX_UNIT)
        } else {
            0.0
        };
        (self.actions[idx], frac)
    }
}

/// Cumulative tables over per-group service events
///
/// Every type a group can serve shares the group's service rate, so an end
/// of service only needs the group; the in-service type mix is not tracked.
#[derive(Debug, Clone)]
pub struct SameRateSampler {
    tables: Arc<[CumulativeTable]>,
}

impl TransitionSampler for SameRateSampler {
    const TRACKS_SERVICE_TYPES: bool = false;
    const SHARED_SERVICE_RATES: bool = true;
    const NAME: &'static str = "same-service-rate";

    fn check_params(params: &CtmcParams) -> Result<(), CtmcError> {
        for i in 0..params.num_agent_groups() {
            if !params.has_shared_service_rate(i) {
                return Err(CtmcError::InvalidConfig(format!(
                    "service rates of group {} differ across contact types",
                    i
                )));
            }
        }
        Ok(())
    }

    fn group_weights(params: &CtmcParams) -> Vec<f64> {
        (0..params.num_agent_groups())
            .map(|i| params.group_max_service_rate(i))
            .collect()
    }

    fn build(params: &CtmcParams, table: &ModeTable) -> Result<Self, CtmcError> {
        let tables: Vec<CumulativeTable> = (0..table.num_modes())
            .map(|mode| CumulativeTable::new(&mode_outcomes(params, table, mode, false)))
            .collect();
        Ok(Self {
            tables: tables.into(),
        })
    }

    fn sample(&self, mode: usize, word: RandomWord) -> (EventAction, f64) {
        self.tables[mode].sample(word.to_unit())
    }

    fn table_size(&self) -> usize {
        self.tables.iter().map(|t| t.actions.len()).sum()
    }
}

// ============================================================================
// One type, one group: closed-form regions
// ============================================================================

/// Arrival, service, and abandonment regions of the unit interval
#[derive(Debug, Clone, Copy, PartialEq)]
struct Regions {
    arrival_end: f64,
    service_end: f64,
    has_events: bool,
}

/// Closed-form sampler of a single-type, single-group center
#[derive(Debug, Clone)]
pub struct SingleQueueSampler {
    regions: Arc<[Regions]>,
}

const SINGLE_SERVICE: EventAction = EventAction::EndService {
    contact_type: Some(0),
    group: 0,
};

impl TransitionSampler for SingleQueueSampler {
    const TRACKS_SERVICE_TYPES: bool = true;
    const SHARED_SERVICE_RATES: bool = false;
    const NAME: &'static str = "single-queue";

    fn check_params(params: &CtmcParams) -> Result<(), CtmcError> {
        if params.num_contact_types() != 1 || params.num_agent_groups() != 1 {
            return Err(CtmcError::DimensionMismatch(format!(
                "single-queue engine needs K=1 and I=1, got K={}, I={}",
                params.num_contact_types(),
                params.num_agent_groups()
            )));
        }
        Ok(())
    }

    fn group_weights(params: &CtmcParams) -> Vec<f64> {
        vec![params.max_service_rate(0, 0)]
    }

    fn build(params: &CtmcParams, table: &ModeTable) -> Result<Self, CtmcError> {
        let regions: Vec<Regions> = (0..table.num_modes())
            .map(|mode| {
                let arrival = params.max_arrival_rate(0);
                let service =
                    f64::from(table.group_threshold(mode, 0)) * params.max_service_rate(0, 0);
                let patience = f64::from(table.queue_threshold(mode)) * params.max_patience_rate(0);
                let total = arrival + service + patience;
                if total > 0.0 {
                    Regions {
                        arrival_end: arrival / total,
                        service_end: (arrival + service) / total,
                        has_events: true,
                    }
                } else {
                    Regions {
                        arrival_end: 0.0,
                        service_end: 0.0,
                        has_events: false,
                    }
                }
            })
            .collect();
        Ok(Self {
            regions: regions.into(),
        })
    }

    fn sample(&self, mode: usize, word: RandomWord) -> (EventAction, f64) {
        let r = self.regions[mode];
        let u = word.to_unit();
        if !r.has_events {
            return (EventAction::False, u);
        }
        if u < r.arrival_end {
            (
                EventAction::Arrival { contact_type: 0 },
                (u / r.arrival_end).min(MAX_UNIT),
            )
        } else if u < r.service_end {
            (
                SINGLE_SERVICE,
                ((u - r.arrival_end) / (r.service_end - r.arrival_end)).min(MAX_UNIT),
            )
        } else if r.service_end < 1.0 {
            (
                EventAction::Abandonment { contact_type: 0 },
                ((u - r.service_end) / (1.0 - r.service_end)).min(MAX_UNIT),
            )
        } else {
            // Rounding put u at the top of a service region ending at 1
            (SINGLE_SERVICE, MAX_UNIT)
        }
    }

    fn table_size(&self) -> usize {
        self.regions.len()
    }
}
