//! Routing selectors
//!
//! When a contact arrives, the [`AgentGroupSelector`] of its type picks the
//! agent group that serves it, if any group has a free agent. When an agent
//! becomes free, the [`WaitingQueueSelector`] of its group picks the queued
//! contact type it serves next, if any compatible queue is non-empty.
//!
//! Selectors are stateless: they read the occupancy, the current agent
//! counts, and (for waiting-time aware policies) the arrival index of the
//! oldest contact of each queue, all through a [`RoutingContext`].
//!
//! # Available policies
//!
//! - [`ListAgentGroupSelector`] / [`ListWaitingQueueSelector`]: fixed
//!   priority list, first candidate that can take the contact wins
//! - [`RankAgentGroupSelector`] / [`RankWaitingQueueSelector`]: lowest rank
//!   wins, ties broken by free agents, queue length, or longest wait
//! - [`SingleGroupSelector`] / [`SingleQueueSelector`]: the only choice of
//!   a one-group or one-type center

mod list;
mod rank;

pub use list::{ListAgentGroupSelector, ListWaitingQueueSelector};
pub use rank::{RankAgentGroupSelector, RankWaitingQueueSelector, TieBreak};

use crate::models::{CircularIntQueue, CtmcParams, CtmcState};
use std::fmt::Debug;

/// Arrival indices of queued contacts, oldest first per type
pub trait QueueWaits {
    /// Transition index at which the oldest queued contact of type `k` arrived
    fn oldest_arrival(&self, k: usize) -> Option<u64>;
}

impl QueueWaits for Vec<CircularIntQueue> {
    fn oldest_arrival(&self, k: usize) -> Option<u64> {
        self.get(k).and_then(CircularIntQueue::front)
    }
}

/// Everything a selector may read
#[derive(Clone, Copy)]
pub struct RoutingContext<'a> {
    pub state: &'a CtmcState,
    pub params: &'a CtmcParams,
    pub waits: Option<&'a dyn QueueWaits>,
    contact_type: Option<usize>,
    group: Option<usize>,
}

impl<'a> RoutingContext<'a> {
    pub fn new(state: &'a CtmcState, params: &'a CtmcParams) -> Self {
        Self {
            state,
            params,
            waits: None,
            contact_type: None,
            group: None,
        }
    }

    /// Restrict [`free_agents`](Self::free_agents) to groups able to serve
    /// contact type `k` under the current bounds
    pub fn for_contact_type(mut self, k: usize) -> Self {
        self.contact_type = Some(k);
        self
    }

    /// Restrict [`queue_size`](Self::queue_size) to contact types group `i`
    /// can serve under the current bounds
    pub fn for_group(mut self, i: usize) -> Self {
        self.group = Some(i);
        self
    }

    pub fn with_waits(mut self, waits: Option<&'a dyn QueueWaits>) -> Self {
        self.waits = waits;
        self
    }

    /// Free agents of group `i` under the current agent count
    ///
    /// Zero when the group is over capacity after `N_i` was lowered, or
    /// when it cannot serve the contact type the context was built for.
    pub fn free_agents(&self, i: usize) -> u32 {
        if let Some(k) = self.contact_type {
            if !self.params.is_compatible(k, i) {
                return 0;
            }
        }
        self.params
            .num_agents(i)
            .saturating_sub(self.state.num_busy(i))
    }

    /// Queued contacts of type `k`; zero when the group the context was
    /// built for cannot serve them
    pub fn queue_size(&self, k: usize) -> u32 {
        if let Some(i) = self.group {
            if !self.params.is_compatible(k, i) {
                return 0;
            }
        }
        self.state.queue_size(k)
    }
}

impl Debug for RoutingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingContext")
            .field("state", self.state)
            .field("has_waits", &self.waits.is_some())
            .field("contact_type", &self.contact_type)
            .field("group", &self.group)
            .finish()
    }
}

/// Picks the agent group serving an arriving contact of one type
pub trait AgentGroupSelector: Debug + Send + Sync {
    /// A group with a free agent, or `None` if the contact cannot be served now
    fn select_agent_group(&self, ctx: &RoutingContext<'_>) -> Option<usize>;
}

/// Picks the queued contact type a freed agent of one group serves next
pub trait WaitingQueueSelector: Debug + Send + Sync {
    /// A non-empty queue, or `None` if the agent stays idle
    fn select_waiting_queue(&self, ctx: &RoutingContext<'_>) -> Option<usize>;
}

/// Agent selector of a center with a single agent group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleGroupSelector;

impl AgentGroupSelector for SingleGroupSelector {
    fn select_agent_group(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        (ctx.free_agents(0) > 0).then_some(0)
    }
}

/// Queue selector of a center with a single contact type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleQueueSelector;

impl WaitingQueueSelector for SingleQueueSelector {
    fn select_waiting_queue(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        (ctx.queue_size(0) > 0).then_some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_selectors() {
        let mut params = CtmcParams::new(1, 1).unwrap();
        params.set_max_num_agents(0, 1).unwrap();
        params.set_num_agents(0, 1).unwrap();
        let mut state = CtmcState::new(1, 1, true);

        let ctx = RoutingContext::new(&state, &params);
        assert_eq!(SingleGroupSelector.select_agent_group(&ctx), Some(0));
        assert_eq!(SingleQueueSelector.select_waiting_queue(&ctx), None);

        state.add_busy(Some(0), 0);
        state.enqueue(0);
        let ctx = RoutingContext::new(&state, &params);
        assert_eq!(SingleGroupSelector.select_agent_group(&ctx), None);
        assert_eq!(SingleQueueSelector.select_waiting_queue(&ctx), Some(0));
    }

    #[test]
    fn test_over_capacity_group_has_no_free_agent() {
        let mut params = CtmcParams::new(1, 1).unwrap();
        params.set_max_num_agents(0, 3).unwrap();
        params.set_num_agents(0, 3).unwrap();
        let mut state = CtmcState::new(1, 1, false);
        for _ in 0..3 {
            state.add_busy(None, 0);
        }
        params.set_num_agents(0, 1).unwrap();
        let ctx = RoutingContext::new(&state, &params);
        assert_eq!(ctx.free_agents(0), 0);
    }

    #[test]
    fn test_waits_from_queues() {
        let queues: Vec<CircularIntQueue> = vec![
            CircularIntQueue::new(),
            [4u64, 9].into_iter().collect(),
        ];
        assert_eq!(queues.oldest_arrival(0), None);
        assert_eq!(queues.oldest_arrival(1), Some(4));
        assert_eq!(queues.oldest_arrival(2), None);
    }

    #[test]
    fn test_context_hides_incompatible_pairs() {
        let mut params = CtmcParams::new(2, 2).unwrap();
        for i in 0..2 {
            params.set_max_num_agents(i, 1).unwrap();
            params.set_num_agents(i, 1).unwrap();
        }
        params.set_max_service_rate(0, 0, 1.0).unwrap();
        params.set_max_service_rate(1, 0, 1.0).unwrap();
        params.set_max_service_rate(1, 1, 1.0).unwrap();
        let mut state = CtmcState::new(2, 2, true);
        state.enqueue(0);

        let ctx = RoutingContext::new(&state, &params);
        assert_eq!(ctx.free_agents(1), 1);
        assert_eq!(ctx.queue_size(0), 1);

        assert_eq!(ctx.for_contact_type(0).free_agents(1), 0);
        assert_eq!(ctx.for_contact_type(1).free_agents(1), 1);
        assert_eq!(ctx.for_group(1).queue_size(0), 0);
        assert_eq!(ctx.for_group(0).queue_size(0), 1);
    }
}
