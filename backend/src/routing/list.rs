use super::{AgentGroupSelector, RoutingContext, WaitingQueueSelector};

/// First group of a fixed priority list with a free agent
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::{CtmcParams, CtmcState};
/// use callcenter_ctmc_core_rs::routing::{AgentGroupSelector, ListAgentGroupSelector, RoutingContext};
///
/// let mut params = CtmcParams::new(1, 2).unwrap();
/// params.set_max_num_agents(1, 1).unwrap();
/// params.set_num_agents(1, 1).unwrap();
/// let state = CtmcState::new(1, 2, true);
///
/// // Group 0 has no agents, so group 1 takes the call
/// let selector = ListAgentGroupSelector::new(vec![0, 1]);
/// assert_eq!(selector.select_agent_group(&RoutingContext::new(&state, &params)), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAgentGroupSelector {
    groups: Vec<usize>,
}

impl ListAgentGroupSelector {
    pub fn new(groups: Vec<usize>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[usize] {
        &self.groups
    }
}

impl AgentGroupSelector for ListAgentGroupSelector {
    fn select_agent_group(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        self.groups.iter().copied().find(|&i| ctx.free_agents(i) > 0)
    }
}

/// First non-empty queue of a fixed priority list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListWaitingQueueSelector {
    contact_types: Vec<usize>,
}

impl ListWaitingQueueSelector {
    pub fn new(contact_types: Vec<usize>) -> Self {
        Self { contact_types }
    }

    pub fn contact_types(&self) -> &[usize] {
        &self.contact_types
    }
}

impl WaitingQueueSelector for ListWaitingQueueSelector {
    fn select_waiting_queue(&self, ctx: &RoutingContext<'_>) -> Option<usize> {
        self.contact_types
            .iter()
            .copied()
            .find(|&k| ctx.queue_size(k) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CtmcParams, CtmcState};

    fn params() -> CtmcParams {
        let mut params = CtmcParams::new(3, 2).unwrap();
        for i in 0..2 {
            params.set_max_num_agents(i, 1).unwrap();
            params.set_num_agents(i, 1).unwrap();
        }
        params
    }

    #[test]
    fn test_group_list_order_matters() {
        let params = params();
        let mut state = CtmcState::new(3, 2, false);
        let selector = ListAgentGroupSelector::new(vec![1, 0]);
        assert_eq!(selector.select_agent_group(&RoutingContext::new(&state, &params)), Some(1));

        state.add_busy(None, 1);
        assert_eq!(selector.select_agent_group(&RoutingContext::new(&state, &params)), Some(0));

        state.add_busy(None, 0);
        assert_eq!(selector.select_agent_group(&RoutingContext::new(&state, &params)), None);
    }

    #[test]
    fn test_queue_list_skips_empty_and_unlisted() {
        let params = params();
        let mut state = CtmcState::new(3, 2, false);
        let selector = ListWaitingQueueSelector::new(vec![2, 0]);
        state.enqueue(1);
        assert_eq!(selector.select_waiting_queue(&RoutingContext::new(&state, &params)), None);

        state.enqueue(0);
        assert_eq!(selector.select_waiting_queue(&RoutingContext::new(&state, &params)), Some(0));

        state.enqueue(2);
        assert_eq!(selector.select_waiting_queue(&RoutingContext::new(&state, &params)), Some(2));
    }
}
