//! Engine configuration and factory
//!
//! [`CtmcConfig`] is the serializable description of a call center: rates,
//! capacities, thresholds, and routing. [`build_ctmc`] validates it and
//! returns the engine variant that fits it, optionally wrapped for
//! waiting-time tracking.

use super::{
    CallCenterCtmc, CallCenterCtmc11, CallCenterCtmcKI, CallCenterCtmcSameRate,
    CallCenterCtmcWithQueues, CtmcError,
};
use crate::models::CtmcParams;
use crate::routing::{
    AgentGroupSelector, ListAgentGroupSelector, ListWaitingQueueSelector, RankAgentGroupSelector,
    RankWaitingQueueSelector, SingleGroupSelector, SingleQueueSelector, TieBreak,
    WaitingQueueSelector,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Parameters of a K-type, I-group call center
///
/// Bounds default to the current values when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtmcConfig {
    /// Arrival rate λ_k per contact type
    pub arrival_rates: Vec<f64>,

    /// Upper bounds λ̃_k
    #[serde(default)]
    pub max_arrival_rates: Option<Vec<f64>>,

    /// Balking probability ρ_k per type (None = no balking)
    #[serde(default)]
    pub balking_probabilities: Option<Vec<f64>>,

    /// Patience (abandonment) rate ν_k per type
    pub patience_rates: Vec<f64>,

    /// Upper bounds ν̃_k
    #[serde(default)]
    pub max_patience_rates: Option<Vec<f64>>,

    /// Service rate μ_{k,i}, indexed `[k][i]`; zero means group `i` cannot
    /// serve type `k`
    pub service_rates: Vec<Vec<f64>>,

    /// Upper bounds μ̃_{k,i}
    #[serde(default)]
    pub max_service_rates: Option<Vec<Vec<f64>>>,

    /// Agents N_i per group
    pub num_agents: Vec<u32>,

    /// Upper bounds Ñ_i
    #[serde(default)]
    pub max_num_agents: Option<Vec<u32>>,

    /// Total queue capacity H
    pub queue_capacity: u32,

    /// Upper bound H̃
    #[serde(default)]
    pub max_queue_capacity: Option<u32>,

    /// Operating-mode threshold vectors `(n_1, ..., n_I, h)`
    #[serde(default)]
    pub thresholds: Option<Vec<Vec<u32>>>,

    /// Routing policy (None = equal ranks over compatible pairs)
    #[serde(default)]
    pub routing: Option<RoutingConfig>,
}

/// Routing policy of the whole center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingConfig {
    /// Fixed priority lists
    ListBased {
        /// `group_lists[k]`: groups tried, in order, for an arrival of type `k`
        group_lists: Vec<Vec<usize>>,
        /// `queue_lists[i]`: queues tried, in order, by a free agent of group `i`
        queue_lists: Vec<Vec<usize>>,
    },

    /// Rank matrix; lower ranks are preferred
    RankBased {
        /// `ranks[k][i]`, `None` when group `i` does not serve type `k`
        ranks: Vec<Vec<Option<f64>>>,
        /// Tie break between equal-rank queues
        #[serde(default)]
        tie_break: TieBreak,
    },
}

/// Engine implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtmcVariant {
    /// Most specialized variant the configuration allows
    #[default]
    Auto,
    /// [`CallCenterCtmcKI`]
    General,
    /// [`CallCenterCtmcSameRate`]
    SameServiceRate,
    /// [`CallCenterCtmc11`]
    SingleQueue,
}

impl CtmcVariant {
    /// Replace `Auto` by the variant fitting `params`
    pub fn resolve(self, params: &CtmcParams) -> CtmcVariant {
        if self != CtmcVariant::Auto {
            return self;
        }
        let num_groups = params.num_agent_groups();
        if params.num_contact_types() == 1 && num_groups == 1 {
            CtmcVariant::SingleQueue
        } else if (0..num_groups).all(|i| params.has_shared_service_rate(i)) {
            CtmcVariant::SameServiceRate
        } else {
            CtmcVariant::General
        }
    }
}

fn check_len(what: &str, found: usize, expected: usize) -> Result<(), CtmcError> {
    if found != expected {
        return Err(CtmcError::DimensionMismatch(format!(
            "{} has {} entries, expected {}",
            what, found, expected
        )));
    }
    Ok(())
}

impl CtmcConfig {
    pub fn num_contact_types(&self) -> usize {
        self.arrival_rates.len()
    }

    pub fn num_agent_groups(&self) -> usize {
        self.num_agents.len()
    }

    /// Check dimensions and routing references
    ///
    /// Value ranges are checked when the parameters are built.
    pub fn validate(&self) -> Result<(), CtmcError> {
        let num_types = self.num_contact_types();
        let num_groups = self.num_agent_groups();
        if num_types == 0 || num_groups == 0 {
            return Err(CtmcError::InvalidConfig(
                "need at least one contact type and one agent group".to_string(),
            ));
        }
        check_len("patience_rates", self.patience_rates.len(), num_types)?;
        check_len("service_rates", self.service_rates.len(), num_types)?;
        for row in &self.service_rates {
            check_len("service_rates row", row.len(), num_groups)?;
        }
        if let Some(v) = &self.max_arrival_rates {
            check_len("max_arrival_rates", v.len(), num_types)?;
        }
        if let Some(v) = &self.balking_probabilities {
            check_len("balking_probabilities", v.len(), num_types)?;
        }
        if let Some(v) = &self.max_patience_rates {
            check_len("max_patience_rates", v.len(), num_types)?;
        }
        if let Some(m) = &self.max_service_rates {
            check_len("max_service_rates", m.len(), num_types)?;
            for row in m {
                check_len("max_service_rates row", row.len(), num_groups)?;
            }
        }
        if let Some(v) = &self.max_num_agents {
            check_len("max_num_agents", v.len(), num_groups)?;
        }

        match &self.routing {
            None => {}
            Some(RoutingConfig::ListBased {
                group_lists,
                queue_lists,
            }) => {
                check_len("group_lists", group_lists.len(), num_types)?;
                check_len("queue_lists", queue_lists.len(), num_groups)?;
                for (k, groups) in group_lists.iter().enumerate() {
                    for &i in groups {
                        self.check_routable(k, i)?;
                    }
                }
                for (i, types) in queue_lists.iter().enumerate() {
                    for &k in types {
                        self.check_routable(k, i)?;
                    }
                }
            }
            Some(RoutingConfig::RankBased { ranks, .. }) => {
                check_len("ranks", ranks.len(), num_types)?;
                for (k, row) in ranks.iter().enumerate() {
                    check_len("ranks row", row.len(), num_groups)?;
                    for (i, rank) in row.iter().enumerate() {
                        match rank {
                            Some(r) if !r.is_finite() => {
                                return Err(CtmcError::InvalidConfig(format!(
                                    "rank of type {} in group {} is not finite",
                                    k, i
                                )))
                            }
                            Some(_) => self.check_routable(k, i)?,
                            None => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn max_service_rate(&self, k: usize, i: usize) -> f64 {
        self.max_service_rates
            .as_ref()
            .map_or(self.service_rates[k][i], |m| m[k][i])
    }

    fn check_routable(&self, k: usize, i: usize) -> Result<(), CtmcError> {
        if k >= self.num_contact_types() {
            return Err(CtmcError::ContactTypeOutOfRange {
                index: k,
                count: self.num_contact_types(),
            });
        }
        if i >= self.num_agent_groups() {
            return Err(CtmcError::GroupOutOfRange {
                index: i,
                count: self.num_agent_groups(),
            });
        }
        if self.max_service_rate(k, i) <= 0.0 {
            return Err(CtmcError::InvalidConfig(format!(
                "routing sends contact type {} to group {}, which cannot serve it",
                k, i
            )));
        }
        Ok(())
    }

    /// Validated parameters; bounds are set before current values
    pub fn to_params(&self) -> Result<CtmcParams, CtmcError> {
        self.validate()?;
        let num_types = self.num_contact_types();
        let num_groups = self.num_agent_groups();
        let mut params = CtmcParams::new(num_types, num_groups)?;

        for k in 0..num_types {
            let arrival = self.arrival_rates[k];
            let max_arrival = self.max_arrival_rates.as_ref().map_or(arrival, |v| v[k]);
            params.set_max_arrival_rate(k, max_arrival)?;
            params.set_arrival_rate(k, arrival)?;

            let patience = self.patience_rates[k];
            let max_patience = self.max_patience_rates.as_ref().map_or(patience, |v| v[k]);
            params.set_max_patience_rate(k, max_patience)?;
            params.set_patience_rate(k, patience)?;

            if let Some(balking) = &self.balking_probabilities {
                params.set_balking_probability(k, balking[k])?;
            }

            for i in 0..num_groups {
                params.set_max_service_rate(k, i, self.max_service_rate(k, i))?;
                params.set_service_rate(k, i, self.service_rates[k][i])?;
            }
        }
        for i in 0..num_groups {
            let agents = self.num_agents[i];
            let max_agents = self.max_num_agents.as_ref().map_or(agents, |v| v[i]);
            params.set_max_num_agents(i, max_agents)?;
            params.set_num_agents(i, agents)?;
        }
        params.set_max_queue_capacity(self.max_queue_capacity.unwrap_or(self.queue_capacity))?;
        params.set_queue_capacity(self.queue_capacity)?;
        Ok(params)
    }

    /// One agent selector per type and one queue selector per group
    #[allow(clippy::type_complexity)]
    pub fn selectors(
        &self,
        params: &CtmcParams,
    ) -> (
        Vec<Arc<dyn AgentGroupSelector>>,
        Vec<Arc<dyn WaitingQueueSelector>>,
    ) {
        let num_types = params.num_contact_types();
        let num_groups = params.num_agent_groups();
        match &self.routing {
            Some(RoutingConfig::ListBased {
                group_lists,
                queue_lists,
            }) => (
                group_lists
                    .iter()
                    .map(|groups| {
                        Arc::new(ListAgentGroupSelector::new(groups.clone()))
                            as Arc<dyn AgentGroupSelector>
                    })
                    .collect(),
                queue_lists
                    .iter()
                    .map(|types| {
                        Arc::new(ListWaitingQueueSelector::new(types.clone()))
                            as Arc<dyn WaitingQueueSelector>
                    })
                    .collect(),
            ),
            Some(RoutingConfig::RankBased { ranks, tie_break }) => {
                rank_selectors(ranks, *tie_break, num_types, num_groups)
            }
            None if num_types == 1 && num_groups == 1 => (
                vec![Arc::new(SingleGroupSelector) as Arc<dyn AgentGroupSelector>],
                vec![Arc::new(SingleQueueSelector) as Arc<dyn WaitingQueueSelector>],
            ),
            None => {
                let ranks: Vec<Vec<Option<f64>>> = (0..num_types)
                    .map(|k| {
                        (0..num_groups)
                            .map(|i| params.is_compatible(k, i).then_some(0.0))
                            .collect()
                    })
                    .collect();
                rank_selectors(&ranks, TieBreak::QueueLength, num_types, num_groups)
            }
        }
    }
}

#[allow(clippy::type_complexity)]
fn rank_selectors(
    ranks: &[Vec<Option<f64>>],
    tie_break: TieBreak,
    num_types: usize,
    num_groups: usize,
) -> (
    Vec<Arc<dyn AgentGroupSelector>>,
    Vec<Arc<dyn WaitingQueueSelector>>,
) {
    let group_selectors = (0..num_types)
        .map(|k| {
            Arc::new(RankAgentGroupSelector::new(ranks[k].clone())) as Arc<dyn AgentGroupSelector>
        })
        .collect();
    let queue_selectors = (0..num_groups)
        .map(|i| {
            let column = (0..num_types).map(|k| ranks[k][i]).collect();
            Arc::new(RankWaitingQueueSelector::new(column, tie_break))
                as Arc<dyn WaitingQueueSelector>
        })
        .collect();
    (group_selectors, queue_selectors)
}

fn boxed<C: CallCenterCtmc + Clone + 'static>(
    engine: C,
    with_queues: bool,
) -> Box<dyn CallCenterCtmc> {
    if with_queues {
        Box::new(CallCenterCtmcWithQueues::new(engine))
    } else {
        Box::new(engine)
    }
}

/// Build the engine described by `config`
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::ctmc::{build_ctmc, CallCenterCtmc, CtmcConfig, CtmcVariant};
///
/// let config = CtmcConfig {
///     arrival_rates: vec![10.0],
///     max_arrival_rates: None,
///     balking_probabilities: None,
///     patience_rates: vec![0.5],
///     max_patience_rates: None,
///     service_rates: vec![vec![1.0]],
///     max_service_rates: None,
///     num_agents: vec![1],
///     max_num_agents: None,
///     queue_capacity: 5,
///     max_queue_capacity: None,
///     thresholds: None,
///     routing: None,
/// };
/// let ctmc = build_ctmc(&config, CtmcVariant::Auto, true).unwrap();
/// assert_eq!(ctmc.uniformization_rate(), 10.0 + 1.0 + 5.0 * 0.5);
/// assert!(ctmc.waiting_queue(0).is_some());
/// ```
pub fn build_ctmc(
    config: &CtmcConfig,
    variant: CtmcVariant,
    with_queues: bool,
) -> Result<Box<dyn CallCenterCtmc>, CtmcError> {
    let params = config.to_params()?;
    let (group_selectors, queue_selectors) = config.selectors(&params);
    let thresholds = config.thresholds.clone();
    let resolved = variant.resolve(&params);
    debug!(requested = ?variant, resolved = ?resolved, with_queues, "building CTMC");

    let ctmc = match resolved {
        CtmcVariant::SingleQueue => boxed(
            CallCenterCtmc11::new(params, thresholds, group_selectors, queue_selectors)?,
            with_queues,
        ),
        CtmcVariant::SameServiceRate => boxed(
            CallCenterCtmcSameRate::new(params, thresholds, group_selectors, queue_selectors)?,
            with_queues,
        ),
        CtmcVariant::General | CtmcVariant::Auto => boxed(
            CallCenterCtmcKI::new(params, thresholds, group_selectors, queue_selectors)?,
            with_queues,
        ),
    };
    Ok(ctmc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(service_rates: Vec<Vec<f64>>, num_agents: Vec<u32>) -> CtmcConfig {
        let num_types = service_rates.len();
        CtmcConfig {
            arrival_rates: vec![1.0; num_types],
            max_arrival_rates: None,
            balking_probabilities: None,
            patience_rates: vec![0.1; num_types],
            max_patience_rates: None,
            service_rates,
            max_service_rates: None,
            num_agents,
            max_num_agents: None,
            queue_capacity: 3,
            max_queue_capacity: Some(6),
            thresholds: None,
            routing: None,
        }
    }

    #[test]
    fn test_auto_variant_resolution() {
        let single = config(vec![vec![1.0]], vec![1]).to_params().unwrap();
        assert_eq!(CtmcVariant::Auto.resolve(&single), CtmcVariant::SingleQueue);

        let shared = config(vec![vec![1.0, 0.0], vec![1.0, 2.0]], vec![1, 1])
            .to_params()
            .unwrap();
        assert_eq!(CtmcVariant::Auto.resolve(&shared), CtmcVariant::SameServiceRate);

        let general = config(vec![vec![1.0, 3.0], vec![1.0, 2.0]], vec![1, 1])
            .to_params()
            .unwrap();
        assert_eq!(CtmcVariant::Auto.resolve(&general), CtmcVariant::General);
        assert_eq!(CtmcVariant::SameServiceRate.resolve(&general), CtmcVariant::SameServiceRate);
    }

    #[test]
    fn test_bounds_default_to_current_values() {
        let params = config(vec![vec![2.0]], vec![3]).to_params().unwrap();
        assert_eq!(params.max_service_rate(0, 0), 2.0);
        assert_eq!(params.max_num_agents(0), 3);
        assert_eq!(params.queue_capacity(), 3);
        assert_eq!(params.max_queue_capacity(), 6);
    }

    #[test]
    fn test_dimension_errors() {
        let mut bad = config(vec![vec![1.0]], vec![1]);
        bad.patience_rates = vec![];
        assert!(matches!(bad.validate(), Err(CtmcError::DimensionMismatch(_))));

        let mut bad = config(vec![vec![1.0, 0.0]], vec![1, 1]);
        bad.routing = Some(RoutingConfig::ListBased {
            group_lists: vec![vec![1]],
            queue_lists: vec![vec![0], vec![0]],
        });
        assert!(matches!(bad.validate(), Err(CtmcError::InvalidConfig(_))));
    }

    #[test]
    fn test_forcing_same_rate_on_mixed_rates_fails() {
        let cfg = config(vec![vec![1.0, 3.0], vec![1.0, 2.0]], vec![1, 1]);
        let err = build_ctmc(&cfg, CtmcVariant::SameServiceRate, false).unwrap_err();
        assert!(matches!(err, CtmcError::InvalidConfig(_)));
        assert!(build_ctmc(&cfg, CtmcVariant::General, false).is_ok());
    }

    #[test]
    fn test_routing_config_serde() {
        let json = r#"{"type":"rank_based","ranks":[[1.0,null]],"tie_break":"longest_waiting"}"#;
        let routing: RoutingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            routing,
            RoutingConfig::RankBased {
                ranks: vec![vec![Some(1.0), None]],
                tie_break: TieBreak::LongestWaiting,
            }
        );
    }
}
