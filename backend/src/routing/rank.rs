use super::{AgentGroupSelector, RoutingContext, WaitingQueueSelector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How rank-based queue selection breaks ties between equal ranks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Longer queue first
    #[default]
    QueueLength,
    /// Queue whose oldest contact has waited longest first; falls back to
    /// queue length when arrival indices are not tracked
    LongestWaiting,
}

/// Lowest-rank group with a free agent; ties go to the group with more
/// free agents, then to the lower index
///
/// `ranks[i]` is `None` when the type cannot be served by group `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankAgentGroupSelector {
    ranks: Vec<Option<f64>>,
}

impl RankAgentGroupSelector {
    pub fn new(ranks: Vec<Option<f64>>) -> Self {
        Self { ranks }
    }

    pub fn ranks(&self) -> &[Option<f64>] {
        &self.ranks
    }
}

impl AgentGroupSelector for RankAgentGroupSelector {
    fn select_agent_group(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        let mut best: Option<(usize, f64, u32)> = None;
        for (i, rank) in self.ranks.iter().enumerate() {
            let Some(rank) = *rank else { continue };
            let free = ctx.free_agents(i);
            if free == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_rank, best_free)) => match rank.total_cmp(&best_rank) {
                    Ordering::Less => true,
                    Ordering::Equal => free > best_free,
                    Ordering::Greater => false,
                },
            };
            if better {
                best = Some((i, rank, free));
            }
        }
        best.map(|(i, _, _)| i)
    }
}

/// Lowest-rank non-empty queue, with a configurable tie break
///
/// `ranks[k]` is `None` when the group cannot serve type `k`.
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::{CircularIntQueue, CtmcParams, CtmcState};
/// use callcenter_ctmc_core_rs::routing::{
///     QueueWaits, RankWaitingQueueSelector, RoutingContext, TieBreak, WaitingQueueSelector,
/// };
///
/// let params = CtmcParams::new(2, 1).unwrap();
/// let state = CtmcState::from_counts(vec![3, 1], vec![0], None).unwrap();
/// let selector = RankWaitingQueueSelector::new(vec![Some(1.0), Some(1.0)], TieBreak::LongestWaiting);
///
/// // Without arrival indices the longer queue wins
/// let ctx = RoutingContext::new(&state, &params);
/// assert_eq!(selector.select_waiting_queue(&ctx), Some(0));
///
/// // The single contact of type 1 has waited longest
/// let queues: Vec<CircularIntQueue> = vec![
///     [10u64, 11, 12].into_iter().collect(),
///     [2u64].into_iter().collect(),
/// ];
/// let ctx = ctx.with_waits(Some(&queues as &dyn QueueWaits));
/// assert_eq!(selector.select_waiting_queue(&ctx), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RankWaitingQueueSelector {
    ranks: Vec<Option<f64>>,
    tie_break: TieBreak,
}

impl RankWaitingQueueSelector {
    pub fn new(ranks: Vec<Option<f64>>, tie_break: TieBreak) -> Self {
        Self { ranks, tie_break }
    }

    pub fn ranks(&self) -> &[Option<f64>] {
        &self.ranks
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// `Less` when queue `a` should be served before queue `b` of equal rank
    fn compare_ties(&self, ctx: &RoutingContext<'_>, a: usize, b: usize) -> Ordering {
        if self.tie_break == TieBreak::LongestWaiting {
            if let Some(waits) = ctx.waits {
                if let (Some(oldest_a), Some(oldest_b)) =
                    (waits.oldest_arrival(a), waits.oldest_arrival(b))
                {
                    return oldest_a.cmp(&oldest_b);
                }
            }
        }
        ctx.queue_size(b).cmp(&ctx.queue_size(a))
    }
}

impl WaitingQueueSelector for RankWaitingQueueSelector {
    fn select_waiting_queue(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (k, rank) in self.ranks.iter().enumerate() {
            let Some(rank) = *rank else { continue };
            if ctx.queue_size(k) == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_k, best_rank)) => match rank.total_cmp(&best_rank) {
                    Ordering::Less => true,
                    Ordering::Equal => self.compare_ties(ctx, k, best_k) == Ordering::Less,
                    Ordering::Greater => false,
                },
            };
            if better {
                best = Some((k, rank));
            }
        }
        best.map(|(k, _)| k)
    }
}
