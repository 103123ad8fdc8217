//! Growable circular queue of transition indices
//!
//! Records, for each queued contact of one type, the index of the transition
//! at which it arrived. Contacts leave from the front (dequeued for service)
//! or from an arbitrary position (abandonment), so the queue also supports
//! positional removal.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// FIFO of `u64` values with positional access and removal
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::CircularIntQueue;
///
/// let mut q = CircularIntQueue::new();
/// q.push_back(3);
/// q.push_back(7);
/// q.push_back(9);
/// assert_eq!(q.remove(1), Some(7));
/// assert_eq!(q.pop_front(), Some(3));
/// assert_eq!(q.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularIntQueue {
    values: VecDeque<u64>,
}

impl CircularIntQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push_back(&mut self, value: u64) {
        self.values.push_back(value);
    }

    pub fn pop_front(&mut self) -> Option<u64> {
        self.values.pop_front()
    }

    pub fn front(&self) -> Option<u64> {
        self.values.front().copied()
    }

    /// Remove the value at `position`, shifting younger values forward
    pub fn remove(&mut self, position: usize) -> Option<u64> {
        self.values.remove(position)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Values from oldest to youngest
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.values.iter().copied()
    }
}

impl FromIterator<u64> for CircularIntQueue {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
