//! Random event tree
//!
//! Maps the leading bits of a random word to a candidate event with as few
//! bits as possible. The unit interval is split into `2^b` equal cells at
//! the root; a cell lying inside one outcome's probability region becomes a
//! terminal action, a cell straddling a boundary is split again with the
//! next `b'` bits, and so on until the bit budget of the tree is spent.
//! A cell still straddling boundaries at that point resolves its outcome by
//! comparing the residual fraction of the word against the exact cut points,
//! so the tree is exact up to the resolution of the word.
//!
//! Trees are built once per operating mode and never mutated afterwards;
//! engines share them between clones behind an `Arc`.

use super::word::{BitBudget, RandomWord, MAX_UNIT, WORD_BITS};
use thiserror::Error;

/// Default total bits a tree may peel before falling back to cut points
pub const DEFAULT_MAX_TREE_BITS: u8 = 14;

/// Default bits per lookup level below the root
pub const DEFAULT_LEVEL_BITS: u8 = 4;

/// Upper limit for the automatically chosen root width
const MAX_AUTO_ROOT_BITS: u8 = 12;

/// Errors raised while building an event tree
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventTreeError {
    #[error("Bit budget of {requested} bits exceeds the {available} bits available")]
    BitBudgetExceeded { requested: u8, available: u8 },

    #[error("Lookup levels must consume at least one bit")]
    ZeroLevelBits,

    #[error("Invalid weight {weight} for outcome {index}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("All outcome weights are zero")]
    EmptyDistribution,
}

/// Candidate event produced by a sampler, before thinning and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// Arrival of a contact of the given type
    Arrival { contact_type: usize },

    /// End of service in `group`, for a contact of `contact_type` when the
    /// engine tracks the in-service type mix
    EndService {
        contact_type: Option<usize>,
        group: usize,
    },

    /// Abandonment of a queued contact of the given type
    Abandonment { contact_type: usize },

    /// No event
    False,
}

#[derive(Debug, Clone)]
enum EventNode {
    Action(EventAction),
    Lookup {
        bits: u8,
        children: Box<[EventNode]>,
    },
    Selection {
        cuts: Box<[f64]>,
        actions: Box<[EventAction]>,
    },
}

/// Immutable index from random words to candidate events
#[derive(Debug, Clone)]
pub struct RandomEventTree {
    root: EventNode,
    max_bits: u8,
    num_nodes: usize,
}

impl RandomEventTree {
    /// Tree always resolving to `action`
    pub fn constant(action: EventAction) -> Self {
        Self {
            root: EventNode::Action(action),
            max_bits: 0,
            num_nodes: 1,
        }
    }

    /// Resolve an action, consuming bits from `budget`
    ///
    /// Returns the action and a uniform fraction in `[0, 1)` independent of
    /// the choice of action, for use by thinning and selection tests.
    pub fn resolve(&self, budget: &mut BitBudget) -> (EventAction, f64) {
        let mut node = &self.root;
        loop {
            match node {
                EventNode::Action(action) => return (*action, budget.residual()),
                EventNode::Lookup { bits, children } => {
                    node = &children[budget.take(*bits)];
                }
                EventNode::Selection { cuts, actions } => {
                    let f = budget.residual();
                    let idx = cuts.partition_point(|&c| c <= f);
                    let lo = if idx == 0 { 0.0 } else { cuts[idx - 1] };
                    let hi = if idx == cuts.len() { 1.0 } else { cuts[idx] };
                    let frac = if hi > lo {
                        ((f - lo) / (hi - lo)).min(MAX_UNIT)
                    } else {
                        0.0
                    };
                    return (actions[idx], frac);
                }
            }
        }
    }

    /// Resolve from a fresh word
    pub fn resolve_word(&self, word: RandomWord) -> (EventAction, f64) {
        let mut budget = BitBudget::new(word);
        self.resolve(&mut budget)
    }

    /// Most bits any lookup path may consume
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }
}

/// Builder for [`RandomEventTree`]
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::events::{EventAction, EventTreeBuilder, RandomWord};
///
/// let tree = EventTreeBuilder::new()
///     .build(&[
///         (3.0, EventAction::Arrival { contact_type: 0 }),
///         (1.0, EventAction::Abandonment { contact_type: 0 }),
///     ])
///     .unwrap();
///
/// let (action, _) = tree.resolve_word(RandomWord::from_unit(0.2));
/// assert_eq!(action, EventAction::Arrival { contact_type: 0 });
/// let (action, _) = tree.resolve_word(RandomWord::from_unit(0.9));
/// assert_eq!(action, EventAction::Abandonment { contact_type: 0 });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EventTreeBuilder {
    max_bits: u8,
    level_bits: u8,
    root_bits: Option<u8>,
}

impl Default for EventTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Distribution<'a> {
    upper: &'a [f64],
    actions: &'a [EventAction],
}

impl EventTreeBuilder {
    pub fn new() -> Self {
        Self {
            max_bits: DEFAULT_MAX_TREE_BITS,
            level_bits: DEFAULT_LEVEL_BITS,
            root_bits: None,
        }
    }

    /// Total bits any path may peel; at most 31
    pub fn max_bits(mut self, bits: u8) -> Self {
        self.max_bits = bits;
        self
    }

    /// Bits per lookup level below the root
    pub fn level_bits(mut self, bits: u8) -> Self {
        self.level_bits = bits;
        self
    }

    /// Root width; chosen from the number of outcomes when unset
    pub fn root_bits(mut self, bits: u8) -> Self {
        self.root_bits = Some(bits);
        self
    }

    /// Build a tree from `(weight, action)` pairs
    ///
    /// Weights are normalized; zero-weight outcomes are dropped.
    pub fn build(
        &self,
        outcomes: &[(f64, EventAction)],
    ) -> Result<RandomEventTree, EventTreeError> {
        if self.max_bits > WORD_BITS {
            return Err(EventTreeError::BitBudgetExceeded {
                requested: self.max_bits,
                available: WORD_BITS,
            });
        }
        if self.level_bits == 0 {
            return Err(EventTreeError::ZeroLevelBits);
        }
        if let Some(root) = self.root_bits {
            if root > self.max_bits {
                return Err(EventTreeError::BitBudgetExceeded {
                    requested: root,
                    available: self.max_bits,
                });
            }
        }

        for (index, &(weight, _)) in outcomes.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EventTreeError::InvalidWeight { index, weight });
            }
        }
        let kept: Vec<(f64, EventAction)> =
            outcomes.iter().copied().filter(|(w, _)| *w > 0.0).collect();
        let total: f64 = kept.iter().map(|(w, _)| w).sum();
        if kept.is_empty() || total <= 0.0 {
            return Err(EventTreeError::EmptyDistribution);
        }

        let mut upper = Vec::with_capacity(kept.len());
        let mut acc = 0.0;
        for (w, _) in &kept {
            acc += w;
            upper.push(acc / total);
        }
        if let Some(last) = upper.last_mut() {
            *last = 1.0;
        }
        let actions: Vec<EventAction> = kept.iter().map(|(_, a)| *a).collect();

        if actions.len() == 1 {
            return Ok(RandomEventTree::constant(actions[0]));
        }

        let root_bits = self
            .root_bits
            .unwrap_or_else(|| default_root_bits(actions.len()))
            .min(self.max_bits);
        let dist = Distribution {
            upper: &upper,
            actions: &actions,
        };
        let mut num_nodes = 0;
        let mut max_used = 0;
        let root = self.build_cell(&dist, 0.0, 1.0, 0, root_bits, &mut num_nodes, &mut max_used);

        Ok(RandomEventTree {
            root,
            max_bits: max_used,
            num_nodes,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_cell(
        &self,
        dist: &Distribution<'_>,
        lo: f64,
        width: f64,
        used: u8,
        next_bits: u8,
        num_nodes: &mut usize,
        max_used: &mut u8,
    ) -> EventNode {
        *num_nodes += 1;
        *max_used = (*max_used).max(used);
        let n = dist.actions.len();
        let hi = lo + width;
        let first = dist.upper.partition_point(|&c| c <= lo).min(n - 1);
        let last = dist.upper.partition_point(|&c| c < hi).min(n - 1);
        if first >= last {
            return EventNode::Action(dist.actions[first]);
        }

        let bits = next_bits.min(self.max_bits - used);
        if bits > 0 {
            let count = 1usize << bits;
            let child_width = width / count as f64;
            let children: Vec<EventNode> = (0..count)
                .map(|c| {
                    self.build_cell(
                        dist,
                        lo + c as f64 * child_width,
                        child_width,
                        used + bits,
                        self.level_bits,
                        num_nodes,
                        max_used,
                    )
                })
                .collect();
            return EventNode::Lookup {
                bits,
                children: children.into_boxed_slice(),
            };
        }

        let cuts: Vec<f64> = (first..last)
            .map(|j| (dist.upper[j] - lo) / width)
            .collect();
        EventNode::Selection {
            cuts: cuts.into_boxed_slice(),
            actions: dist.actions[first..=last].to_vec().into_boxed_slice(),
        }
    }
}

fn default_root_bits(num_outcomes: usize) -> u8 {
    let ceil_log2 = usize::BITS - (num_outcomes.max(2) - 1).leading_zeros();
    (ceil_log2 as u8 + 2).clamp(1, MAX_AUTO_ROOT_BITS)
}
