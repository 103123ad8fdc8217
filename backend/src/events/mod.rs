//! Event sampling primitives
//!
//! One transition of the chain consumes one [`RandomWord`]. The word is read
//! through a [`BitBudget`]: lookup levels of a [`RandomEventTree`] peel off
//! leading bits to pick a candidate event, and the unconsumed tail becomes a
//! uniform fraction for thinning and selection.
//!
//! # Critical Invariants
//!
//! 1. No path through a tree consumes more than 31 bits
//! 2. The probability of each action equals its normalized weight, up to
//!    the resolution of the word
//! 3. Trees are immutable once built

mod tree;
mod word;

pub use tree::{
    EventAction, EventTreeBuilder, EventTreeError, RandomEventTree, DEFAULT_LEVEL_BITS,
    DEFAULT_MAX_TREE_BITS,
};
pub use word::{BitBudget, RandomWord, WORD_BITS};

pub(crate) use word::MAX_UNIT;
