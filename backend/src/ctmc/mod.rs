//! Call center CTMC engines
//!
//! The chain is uniformized: every step is a draw from a fixed global rate
//! `Λ̃`, and events that cannot happen in the current state are padded as
//! false transitions (self-jumps). Operating modes shrink the per-state
//! rate, and runs of self-jumps are folded into a single draw.
//!
//! # Engines
//!
//! - [`CallCenterCtmcKI`]: general K types × I groups, one random event
//!   tree per operating mode
//! - [`CallCenterCtmcSameRate`]: every type a group serves shares the
//!   group's service rate; the in-service type mix is not tracked
//! - [`CallCenterCtmc11`]: one type, one group, closed-form sampling
//! - [`CallCenterCtmcWithQueues`]: wraps any engine and records the arrival
//!   index of every queued contact to report waiting times
//!
//! # Transition flow
//!
//! ```text
//! word ──> split self-jumps ──> sample candidate ──> slot / thinning
//!                                                    │
//!                        preview_transition  <───────┘
//!                              │
//!                        generate(record)   (validates, mutates, counts)
//! ```
//!
//! Every state change, sampled or explicit, goes through
//! [`CallCenterCtmc::generate`].

pub mod config;
pub mod engine;
pub mod error;
pub mod sampler;
pub mod with_queues;

pub use config::{build_ctmc, CtmcConfig, CtmcVariant, RoutingConfig};
pub use engine::{CallCenterCtmc11, CallCenterCtmcKI, CallCenterCtmcSameRate, CtmcEngine};
pub use error::CtmcError;
pub use sampler::{LookupSampler, SameRateSampler, SingleQueueSampler, TransitionSampler};
pub use with_queues::CallCenterCtmcWithQueues;

use crate::events::RandomWord;
use crate::models::{CircularIntQueue, CtmcParams, CtmcState, TransitionRecord, TransitionType};
use crate::orchestrator::checkpoint::CtmcSnapshot;
use crate::routing::QueueWaits;
use crate::thresholds::ModeTable;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

/// Common interface of the call center chains
///
/// Object safe: drivers hold a `Box<dyn CallCenterCtmc>`.
pub trait CallCenterCtmc: Debug + Send + Sync {
    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    fn params(&self) -> &CtmcParams;

    fn state(&self) -> &CtmcState;

    fn num_contact_types(&self) -> usize {
        self.params().num_contact_types()
    }

    fn num_agent_groups(&self) -> usize {
        self.params().num_agent_groups()
    }

    /// Transitions of the uniformized chain simulated so far, false ones included
    fn transitions_done(&self) -> u64;

    /// Counter value at which sampling stops; `u64::MAX` when unbounded
    fn target_transitions(&self) -> u64;

    fn set_target_transitions(&mut self, target: u64);

    fn mode_table(&self) -> &ModeTable;

    /// Index of the active operating mode
    fn mode(&self) -> usize;

    /// Jump rate of the active mode
    fn mode_jump_rate(&self) -> f64 {
        self.mode_table().rate(self.mode())
    }

    /// Global uniformization rate `Λ̃`
    fn uniformization_rate(&self) -> f64 {
        self.mode_table().uniformization_rate()
    }

    /// Record of the last generated transition
    fn last_transition(&self) -> &TransitionRecord;

    /// Arrival indices of the queued contacts of type `k`, when tracked
    fn waiting_queue(&self, _k: usize) -> Option<&CircularIntQueue> {
        None
    }

    /// Transitions spent in queue by the contact that left it last, when tracked
    fn last_waiting_time(&self) -> Option<u64> {
        None
    }

    // ------------------------------------------------------------------
    // Parameters. Current values are cheap to change; bounds and
    // thresholds rebuild the operating modes and sampling tables.
    // ------------------------------------------------------------------

    fn set_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_max_arrival_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_balking_probability(&mut self, k: usize, prob: f64) -> Result<(), CtmcError>;

    fn set_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_max_patience_rate(&mut self, k: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_max_service_rate(&mut self, k: usize, i: usize, rate: f64) -> Result<(), CtmcError>;

    /// Service rate of every type group `i` can serve
    fn set_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError>;

    fn set_max_group_service_rate(&mut self, i: usize, rate: f64) -> Result<(), CtmcError>;

    /// May drop below the busy count; the group then takes no new contact
    /// until enough services end
    fn set_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError>;

    fn set_max_num_agents(&mut self, i: usize, n: u32) -> Result<(), CtmcError>;

    /// May drop below the queue size; arrivals are blocked until it shrinks
    fn set_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError>;

    fn set_max_queue_capacity(&mut self, h: u32) -> Result<(), CtmcError>;

    /// Replace the threshold matrix; `None` uses the single maximal mode
    fn set_thresholds(&mut self, thresholds: Option<Vec<Vec<u32>>>) -> Result<(), CtmcError>;

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Empty the system, reset the transition counter, recompute the mode
    fn init_empty(&mut self);

    /// Copy occupancy and transition counter from a compatible chain
    ///
    /// Rates, capacities, and the target are left untouched.
    fn init_from(&mut self, other: &dyn CallCenterCtmc) -> Result<(), CtmcError>;

    fn snapshot(&self) -> CtmcSnapshot {
        let state = self.state();
        CtmcSnapshot {
            transitions_done: self.transitions_done(),
            target_transitions: self.target_transitions(),
            queued: state.queue_sizes().to_vec(),
            busy: state.busy_counts().to_vec(),
            busy_by_type: state.busy_by_type().map(<[u32]>::to_vec),
            waiting_queues: None,
        }
    }

    /// Restore occupancy and counters, validating against the bounds
    fn restore_state(&mut self, snapshot: &CtmcSnapshot) -> Result<(), CtmcError>;

    fn clone_box(&self) -> Box<dyn CallCenterCtmc>;

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Side-effect-free preview of the next transition
    ///
    /// `waits` gives waiting-time aware selectors the oldest arrival of
    /// each queue.
    fn preview_transition_with(
        &self,
        word: RandomWord,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<TransitionRecord, CtmcError>;

    fn preview_transition(&self, word: RandomWord) -> Result<TransitionRecord, CtmcError> {
        self.preview_transition_with(word, None)
    }

    /// Sample and apply one transition
    fn next_transition(&mut self, word: RandomWord) -> Result<TransitionType, CtmcError> {
        let record = self.preview_transition(word)?;
        self.generate(record)
    }

    /// Same as [`next_transition`](Self::next_transition) with a uniform in `[0, 1)`
    fn next_transition_unit(&mut self, u: f64) -> Result<TransitionType, CtmcError> {
        self.next_transition(RandomWord::from_unit(u))
    }

    /// Validate and apply a transition record
    ///
    /// Fails without changes if the counter would pass its target or the
    /// occupancy does not allow the transition.
    fn generate(&mut self, record: TransitionRecord) -> Result<TransitionType, CtmcError>;

    /// Assign a free agent of group `i` to a queued contact, outside the
    /// transition stream
    ///
    /// Returns the served contact type. Does not draw randomness nor touch
    /// the transition counter.
    fn select_contact_with(
        &mut self,
        i: usize,
        waits: Option<&dyn QueueWaits>,
    ) -> Result<Option<usize>, CtmcError>;

    fn select_contact(&mut self, i: usize) -> Result<Option<usize>, CtmcError> {
        self.select_contact_with(i, None)
    }

    // ------------------------------------------------------------------
    // Explicit generators
    // ------------------------------------------------------------------

    fn generate_arrival_served(
        &mut self,
        k: usize,
        i: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::arrival_served(k, i)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    fn generate_arrival_balked(
        &mut self,
        k: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::arrival_balked(k)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    /// Queue a contact of type `k` at the back of its queue
    fn generate_arrival_queued(
        &mut self,
        k: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.params().check_contact_type(k)?;
        let position = self.state().queue_size(k) as usize;
        self.generate(
            TransitionRecord::arrival_queued(k, position)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    fn generate_arrival_blocked(
        &mut self,
        k: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::arrival_blocked(k)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    /// End a service in group `i`; `k` is required when the engine tracks
    /// in-service types
    fn generate_end_service(
        &mut self,
        k: Option<usize>,
        i: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::end_service(k, i)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    /// End a service in group `i` and serve the oldest contact of `queued_type`
    fn generate_end_service_and_dequeue(
        &mut self,
        k: Option<usize>,
        i: usize,
        queued_type: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::end_service_and_dequeue(k, i, queued_type)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    fn generate_abandonment(
        &mut self,
        k: usize,
        position: usize,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::abandonment(k, position)
                .with_false_transitions(preceding_false, following_false),
        )
    }

    fn generate_false_transition(
        &mut self,
        preceding_false: u64,
        following_false: u64,
    ) -> Result<TransitionType, CtmcError> {
        self.generate(
            TransitionRecord::false_transition()
                .with_false_transitions(preceding_false, following_false),
        )
    }

    // ------------------------------------------------------------------
    // State identity
    // ------------------------------------------------------------------

    /// Hash of the occupancy only
    fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.state().hash(&mut hasher);
        hasher.finish()
    }

    /// Occupancy equality, ignoring rates and capacities
    fn state_eq(&self, other: &dyn CallCenterCtmc) -> bool {
        self.state() == other.state()
    }
}

impl Clone for Box<dyn CallCenterCtmc> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
