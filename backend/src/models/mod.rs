//! Domain models for the call center chain

pub mod circular_queue;
pub mod params;
pub mod state;
pub mod transition;

// Re-exports
pub use circular_queue::CircularIntQueue;
pub use params::{BoundedCount, BoundedRate, CtmcParams};
pub use state::CtmcState;
pub use transition::{TransitionRecord, TransitionType};
