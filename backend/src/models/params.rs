//! Rate and capacity parameters of a call center CTMC
//!
//! Every rate and capacity is held as a *current* value and a *bound*.
//! Bounds fix the uniformization rate and everything precomputed from it
//! (operating modes, event trees). Current values may move freely below
//! their bound: the sampler reaches them through thinning, so changing a
//! current value never requires a rebuild.
//!
//! # Critical Invariants
//!
//! 1. `0 <= current <= bound` for every rate and count
//! 2. All rates are finite
//! 3. Balking probabilities lie in `[0, 1]`

use crate::ctmc::CtmcError;
use serde::{Deserialize, Serialize};

/// A non-negative rate with its upper bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundedRate {
    current: f64,
    bound: f64,
}

impl BoundedRate {
    pub fn new(current: f64, bound: f64, what: &'static str) -> Result<Self, CtmcError> {
        if !bound.is_finite() || bound < 0.0 {
            return Err(CtmcError::InvalidRate {
                what,
                value: bound,
                bound: f64::INFINITY,
            });
        }
        check_rate(current, bound, what)?;
        Ok(Self { current, bound })
    }

    pub fn zero() -> Self {
        Self {
            current: 0.0,
            bound: 0.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Probability of accepting a candidate drawn at the bound rate
    pub fn acceptance(&self) -> f64 {
        if self.bound > 0.0 {
            self.current / self.bound
        } else {
            0.0
        }
    }

    fn set_current(&mut self, value: f64, what: &'static str) -> Result<(), CtmcError> {
        check_rate(value, self.bound, what)?;
        self.current = value;
        Ok(())
    }

    fn set_bound(&mut self, value: f64, what: &'static str) -> Result<(), CtmcError> {
        if !value.is_finite() || value < self.current {
            return Err(CtmcError::InvalidRate {
                what,
                value,
                bound: f64::INFINITY,
            });
        }
        self.bound = value;
        Ok(())
    }
}

fn check_rate(value: f64, bound: f64, what: &'static str) -> Result<(), CtmcError> {
    if !value.is_finite() || value < 0.0 || value > bound {
        return Err(CtmcError::InvalidRate { what, value, bound });
    }
    Ok(())
}

/// A count (agents, queue slots) with its upper bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundedCount {
    current: u32,
    bound: u32,
}

impl BoundedCount {
    pub fn new(current: u32, bound: u32, what: &'static str) -> Result<Self, CtmcError> {
        if current > bound {
            return Err(CtmcError::InvalidCount {
                what,
                value: current,
                bound,
            });
        }
        Ok(Self { current, bound })
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }

    fn set_current(&mut self, value: u32, what: &'static str) -> Result<(), CtmcError> {
        if value > self.bound {
            return Err(CtmcError::InvalidCount {
                what,
                value,
                bound: self.bound,
            });
        }
        self.current = value;
        Ok(())
    }

    fn set_bound(&mut self, value: u32, what: &'static str) -> Result<(), CtmcError> {
        if value < self.current {
            return Err(CtmcError::InvalidCount {
                what,
                value,
                bound: self.current,
            });
        }
        self.bound = value;
        Ok(())
    }
}

/// All rate and capacity parameters of a K-type, I-group call center
///
/// Service rates are stored row-major: entry `(k, i)` at `k * I + i`.
/// A zero service-rate bound means group `i` cannot serve type `k`.
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::CtmcParams;
///
/// let mut params = CtmcParams::new(1, 1).unwrap();
/// params.set_max_arrival_rate(0, 5.0).unwrap();
/// params.set_arrival_rate(0, 4.0).unwrap();
/// assert_eq!(params.arrival_acceptance(0), 0.8);
/// assert!(params.set_arrival_rate(0, 6.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtmcParams {
    num_types: usize,
    num_groups: usize,
    arrival: Vec<BoundedRate>,
    balking: Vec<f64>,
    patience: Vec<BoundedRate>,
    service: Vec<BoundedRate>,
    agents: Vec<BoundedCount>,
    queue_capacity: BoundedCount,
}

impl CtmcParams {
    /// All rates and capacities zero
    pub fn new(num_types: usize, num_groups: usize) -> Result<Self, CtmcError> {
        if num_types == 0 || num_groups == 0 {
            return Err(CtmcError::InvalidConfig(format!(
                "need at least one contact type and one agent group, got K={}, I={}",
                num_types, num_groups
            )));
        }
        Ok(Self {
            num_types,
            num_groups,
            arrival: vec![BoundedRate::zero(); num_types],
            balking: vec![0.0; num_types],
            patience: vec![BoundedRate::zero(); num_types],
            service: vec![BoundedRate::zero(); num_types * num_groups],
            agents: vec![BoundedCount::default(); num_groups],
            queue_capacity: BoundedCount::default(),
        })
    }

    pub fn num_contact_types(&self) -> usize {
        self.num_types
    }

    pub fn num_agent_groups(&self) -> usize {
        self.num_groups
    }

    pub fn check_contact_type(&self, k: usize) -> Result<(), CtmcError> {
        if k >= self.num_types {
            return Err(CtmcError::ContactTypeOutOfRange {
                index: k,
                count: self.num_types,
            });
        }
        Ok(())
    }

    pub fn check_group(&self, i: usize) -> Result<(), CtmcError> {
        if i >= self.num_groups {
            return Err(CtmcError::GroupOutOfRange {
                index: i,
                count: self.num_groups,
            });
        }
        Ok(())
    }

    fn service_index(&self, k: usize, i: usize) -> Result<usize, CtmcError> {
        self.check_contact_type(k)?;
        self.check_group(i)?;
        Ok(k * self.num_groups + i)
    }

    // ------------------------------------------------------------------
    // Getters. Indices are assumed valid; out-of-range indices panic like
    // slice indexing.
    // ------------------------------------------------------------------

    pub fn arrival_rate(&self, k: usize) -> f64 {
        self.arrival[k].current()
    }

    pub fn max_arrival_rate(&self, k: usize) -> f64 {
        self.arrival[k].bound()
    }

    pub fn balking_probability(&self, k: usize) -> f64 {
        self.balking[k]
    }

    pub fn patience_rate(&self, k: usize) -> f64 {
        self.patience[k].current()
    }

    pub fn max_patience_rate(&self, k: usize) -> f64 {
        self.patience[k].bound()
    }

    pub fn service_rate(&self, k: usize, i: usize) -> f64 {
        self.service[k * self.num_groups + i].current()
    }

    pub fn max_service_rate(&self, k: usize, i: usize) -> f64 {
        self.service[k * self.num_groups + i].bound()
    }

    pub fn num_agents(&self, i: usize) -> u32 {
        self.agents[i].current()
    }

    pub fn max_num_agents(&self, i: usize) -> u32 {
        self.agents[i].bound()
    }

    pub fn queue_capacity(&self) -> u32 {
        self.queue_capacity.current()
    }

    pub fn max_queue_capacity(&self) -> u32 {
        self.queue_capacity.bound()
    }

    /// Whether group `i` can serve contact type `k`
    pub fn is_compatible(&self, k: usize, i: usize) -> bool {
        self.max_service_rate(k, i) > 0.0
    }

    // ------------------------------------------------------------------
    // Thinning ratios
    // ------------------------------------------------------------------

    pub fn arrival_acceptance(&self, k: usize) -> f64 {
        self.arrival[k].acceptance()
    }

    pub fn patience_acceptance(&self, k: usize) -> f64 {
        self.patience[k].acceptance()
    }

    pub fn service_acceptance(&self, k: usize, i: usize) -> f64 {
        self.service[k * self.num_groups + i].acceptance()
    }

    /// Acceptance of group `i` when every compatible type shares one rate
    ///
    /// Taken from the first type with a positive bound; zero when the group
    /// serves no type.
    pub fn group_service_acceptance(&self, i: usize) -> f64 {
        (0..self.num_types)
            .map(|k| self.service[k * self.num_groups + i])
            .find(|rate| rate.bound() > 0.0)
            .map_or(0.0, |rate| rate.acceptance())
    }

    // ------------------------------------------------------------------
    // Aggregates used to compute jump rates
    // ------------------------------------------------------------------

    /// Sum of arrival-rate bounds
    pub fn total_max_arrival_rate(&self) -> f64 {
        self.arrival.iter().map(BoundedRate::bound).sum()
    }

    /// Sum of patience-rate bounds
    pub fn total_max_patience_rate(&self) -> f64 {
        self.patience.iter().map(BoundedRate::bound).sum()
    }

    /// Sum over types of the service-rate bounds of group `i`
    pub fn total_max_service_rate(&self, i: usize) -> f64 {
        (0..self.num_types)
            .map(|k| self.max_service_rate(k, i))
            .sum()
    }

    /// Largest service-rate bound of group `i` across types
    pub fn group_max_service_rate(&self, i: usize) -> f64 {
        (0..self.num_types)
            .map(|k| self.max_service_rate(k, i))
            .fold(0.0, f64::max)
    }

    /// Whether every type group `i` can serve shares one current and one bound rate
    pub fn has_shared_service_rate(&self, i: usize) -> bool {
        let mut shared: Option<BoundedRate> = None;
        for k in 0..self.num_types {
            let rate = self.service[k * self.num_groups + i];
            if rate.bound() <= 0.0 {
                continue;
            }
            match shared {
                None => shared = Some(rate),
                Some(first) if first != rate => return false,
                Some(_) => {}
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    pub fn set_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.check_contact_type(k)?;
        self.arrival[k].set_current(rate, "arrival rate")
    }

    pub fn set_max_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.check_contact_type(k)?;
        self.arrival[k].set_bound(rate, "arrival rate bound")
    }

    pub fn set_balking_probability(&mut self, k: usize, prob: f64) -> Result<(), CtmcError> {
        self.check_contact_type(k)?;
        if !(0.0..=1.0).contains(&prob) {
            return Err(CtmcError::InvalidProbability {
                contact_type: k,
                value: prob,
            });
        }
        self.balking[k] = prob;
        Ok(())
    }

    pub fn set_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.check_contact_type(k)?;
        self.patience[k].set_current(rate, "patience rate")
    }

    pub fn set_max_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError> {
        self.check_contact_type(k)?;
        self.patience[k].set_bound(rate, "patience rate bound")
    }

    pub fn set_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        let idx = self.service_index(k, i)?;
        self.service[idx].set_current(rate, "service rate")
    }

    pub fn set_max_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError> {
        let idx = self.service_index(k, i)?;
        self.service[idx].set_bound(rate, "service rate bound")
    }

    /// Set the current service rate of every type group `i` can serve
    ///
    /// All-or-nothing: fails without changes if any bound is below `rate`.
    pub fn set_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        let indices = self.compatible_service_indices(i)?;
        for &idx in &indices {
            check_rate(rate, self.service[idx].bound(), "service rate")?;
        }
        for idx in indices {
            self.service[idx].current = rate;
        }
        Ok(())
    }

    /// Set the service-rate bound of every type group `i` can serve
    pub fn set_max_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError> {
        let indices = self.compatible_service_indices(i)?;
        for &idx in &indices {
            if !rate.is_finite() || rate < self.service[idx].current() {
                return Err(CtmcError::InvalidRate {
                    what: "service rate bound",
                    value: rate,
                    bound: f64::INFINITY,
                });
            }
        }
        for idx in indices {
            self.service[idx].bound = rate;
        }
        Ok(())
    }

    fn compatible_service_indices(&self, i: usize) -> Result<Vec<usize>, CtmcError> {
        self.check_group(i)?;
        Ok((0..self.num_types)
            .map(|k| k * self.num_groups + i)
            .filter(|&idx| self.service[idx].bound() > 0.0)
            .collect())
    }

    pub fn set_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.check_group(i)?;
        self.agents[i].set_current(n, "number of agents")
    }

    pub fn set_max_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError> {
        self.check_group(i)?;
        self.agents[i].set_bound(n, "number of agents bound")
    }

    pub fn set_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.queue_capacity.set_current(h, "queue capacity")
    }

    pub fn set_max_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError> {
        self.queue_capacity.set_bound(h, "queue capacity bound")
    }
}
