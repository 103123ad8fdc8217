//! Orchestrator - replication driver and checkpoints
//!
//! See `engine.rs` for the run loop and `checkpoint.rs` for save/load.

pub mod checkpoint;
pub mod engine;

pub use engine::{Replication, ReplicationConfig, ReplicationError, TransitionCounts};

pub use checkpoint::{compute_config_hash, CtmcSnapshot, ReplicationSnapshot};
