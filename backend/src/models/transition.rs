//! Transition types and transition records
//!
//! Every call to the CTMC sampler (or to one of the explicit generators)
//! produces exactly one [`TransitionRecord`]. The record carries the
//! [`TransitionType`] plus the identifiers external bookkeeping reads after
//! the transition: which contact type arrived or left, which agent group
//! was involved, which queued contact was promoted, and at which queue
//! position an abandonment happened.
//!
//! # Counting
//!
//! A record stands for `1 + preceding_false + following_false` transitions
//! of the uniformized chain. The self-jump batching of the sampler folds
//! runs of false transitions into a single draw; they are reported here
//! rather than returned one by one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of transition of the uniformized call center chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    /// A contact arrived and was routed to a free agent
    ArrivalServed,
    /// A contact arrived, found no free agent, and left without queueing
    ArrivalBalked,
    /// A contact arrived and joined the waiting queue
    ArrivalQueued,
    /// A contact arrived and was blocked because the queue was full
    ArrivalBlocked,
    /// A service ended and no queued contact was promoted
    EndServiceNoDequeue,
    /// A service ended and the freed agent picked up a queued contact
    EndServiceAndDequeue,
    /// A queued contact abandoned
    Abandonment,
    /// Self-jump: no state change
    FalseTransition,
}

impl TransitionType {
    /// All transition kinds, in declaration order
    pub const ALL: [TransitionType; 8] = [
        TransitionType::ArrivalServed,
        TransitionType::ArrivalBalked,
        TransitionType::ArrivalQueued,
        TransitionType::ArrivalBlocked,
        TransitionType::EndServiceNoDequeue,
        TransitionType::EndServiceAndDequeue,
        TransitionType::Abandonment,
        TransitionType::FalseTransition,
    ];

    /// Dense index in [`TransitionType::ALL`], used by tallies
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_arrival(self) -> bool {
        matches!(
            self,
            TransitionType::ArrivalServed
                | TransitionType::ArrivalBalked
                | TransitionType::ArrivalQueued
                | TransitionType::ArrivalBlocked
        )
    }

    pub fn is_end_service(self) -> bool {
        matches!(
            self,
            TransitionType::EndServiceNoDequeue | TransitionType::EndServiceAndDequeue
        )
    }

    /// Whether a transition of this kind changes the occupancy counters
    pub fn changes_state(self) -> bool {
        !matches!(
            self,
            TransitionType::ArrivalBalked
                | TransitionType::ArrivalBlocked
                | TransitionType::FalseTransition
        )
    }

    /// Net change of the total queue occupancy
    pub fn queue_delta(self) -> i64 {
        match self {
            TransitionType::ArrivalQueued => 1,
            TransitionType::EndServiceAndDequeue | TransitionType::Abandonment => -1,
            _ => 0,
        }
    }

    /// Net change of the total service occupancy
    ///
    /// `EndServiceAndDequeue` frees one agent and immediately reassigns it,
    /// so the total stays unchanged.
    pub fn service_delta(self) -> i64 {
        match self {
            TransitionType::ArrivalServed => 1,
            TransitionType::EndServiceNoDequeue => -1,
            _ => 0,
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionType::ArrivalServed => "ARRIVALSERVED",
            TransitionType::ArrivalBalked => "ARRIVALBALKED",
            TransitionType::ArrivalQueued => "ARRIVALQUEUED",
            TransitionType::ArrivalBlocked => "ARRIVALBLOCKED",
            TransitionType::EndServiceNoDequeue => "ENDSERVICENODEQUEUE",
            TransitionType::EndServiceAndDequeue => "ENDSERVICEANDDEQUEUE",
            TransitionType::Abandonment => "ABANDONMENT",
            TransitionType::FalseTransition => "FALSETRANSITION",
        };
        f.write_str(name)
    }
}

/// One generated (or previewed) transition with its side-channel data
///
/// Fields that do not apply to a kind are `None`. For instance an
/// `ArrivalQueued` record has a contact type and a queue position but no
/// agent group.
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::{TransitionRecord, TransitionType};
///
/// let record = TransitionRecord::arrival_queued(0, 3).with_false_transitions(2, 1);
/// assert_eq!(record.kind, TransitionType::ArrivalQueued);
/// assert_eq!(record.queue_position, Some(3));
/// assert_eq!(record.total_transitions(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: TransitionType,

    /// Type of the arriving, ending, or abandoning contact
    ///
    /// `None` for false transitions, and for end-of-service transitions of
    /// engines that do not track the in-service type mix.
    pub contact_type: Option<usize>,

    /// Agent group that received or freed an agent
    pub group: Option<usize>,

    /// Type of the queued contact promoted to service
    pub queued_type: Option<usize>,

    /// Queue position (0 = oldest) of the queued, dequeued, or abandoning contact
    pub queue_position: Option<usize>,

    /// False transitions folded in before this transition
    pub preceding_false: u64,

    /// False transitions folded in after this transition
    pub following_false: u64,
}

impl TransitionRecord {
    fn of_kind(kind: TransitionType) -> Self {
        Self {
            kind,
            contact_type: None,
            group: None,
            queued_type: None,
            queue_position: None,
            preceding_false: 0,
            following_false: 0,
        }
    }

    pub fn arrival_served(contact_type: usize, group: usize) -> Self {
        Self {
            contact_type: Some(contact_type),
            group: Some(group),
            ..Self::of_kind(TransitionType::ArrivalServed)
        }
    }

    pub fn arrival_balked(contact_type: usize) -> Self {
        Self {
            contact_type: Some(contact_type),
            ..Self::of_kind(TransitionType::ArrivalBalked)
        }
    }

    /// Contact joins the back of its queue, at `position` (= queue length before arrival)
    pub fn arrival_queued(contact_type: usize, position: usize) -> Self {
        Self {
            contact_type: Some(contact_type),
            queue_position: Some(position),
            ..Self::of_kind(TransitionType::ArrivalQueued)
        }
    }

    pub fn arrival_blocked(contact_type: usize) -> Self {
        Self {
            contact_type: Some(contact_type),
            ..Self::of_kind(TransitionType::ArrivalBlocked)
        }
    }

    pub fn end_service(contact_type: Option<usize>, group: usize) -> Self {
        Self {
            contact_type,
            group: Some(group),
            ..Self::of_kind(TransitionType::EndServiceNoDequeue)
        }
    }

    /// Service ends in `group` and the oldest contact of `queued_type` takes the agent
    pub fn end_service_and_dequeue(
        contact_type: Option<usize>,
        group: usize,
        queued_type: usize,
    ) -> Self {
        Self {
            contact_type,
            group: Some(group),
            queued_type: Some(queued_type),
            queue_position: Some(0),
            ..Self::of_kind(TransitionType::EndServiceAndDequeue)
        }
    }

    pub fn abandonment(contact_type: usize, position: usize) -> Self {
        Self {
            contact_type: Some(contact_type),
            queue_position: Some(position),
            ..Self::of_kind(TransitionType::Abandonment)
        }
    }

    pub fn false_transition() -> Self {
        Self::of_kind(TransitionType::FalseTransition)
    }

    /// Set the folded false-transition counts
    pub fn with_false_transitions(mut self, preceding: u64, following: u64) -> Self {
        self.preceding_false = preceding;
        self.following_false = following;
        self
    }

    /// Number of uniformized-chain transitions this record accounts for
    pub fn total_transitions(&self) -> u64 {
        1 + self.preceding_false + self.following_false
    }

    /// Number of false transitions this record accounts for, itself included
    pub fn false_transitions(&self) -> u64 {
        let own = u64::from(self.kind == TransitionType::FalseTransition);
        own + self.preceding_false + self.following_false
    }
}

impl Default for TransitionRecord {
    fn default() -> Self {
        Self::false_transition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_match_kinds() {
        assert_eq!(TransitionType::ArrivalServed.service_delta(), 1);
        assert_eq!(TransitionType::ArrivalServed.queue_delta(), 0);
        assert_eq!(TransitionType::EndServiceAndDequeue.service_delta(), 0);
        assert_eq!(TransitionType::EndServiceAndDequeue.queue_delta(), -1);
        assert_eq!(TransitionType::Abandonment.queue_delta(), -1);
        assert!(!TransitionType::ArrivalBlocked.changes_state());
        assert!(TransitionType::ArrivalQueued.changes_state());
    }

    #[test]
    fn test_index_is_dense() {
        for (i, kind) in TransitionType::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_false_transition_counting() {
        let record = TransitionRecord::false_transition().with_false_transitions(4, 0);
        assert_eq!(record.total_transitions(), 5);
        assert_eq!(record.false_transitions(), 5);

        let record = TransitionRecord::arrival_served(0, 1).with_false_transitions(2, 3);
        assert_eq!(record.total_transitions(), 6);
        assert_eq!(record.false_transitions(), 5);
    }

    #[test]
    fn test_display_uses_upper_case_names() {
        assert_eq!(
            TransitionType::EndServiceAndDequeue.to_string(),
            "ENDSERVICEANDDEQUEUE"
        );
    }
}
