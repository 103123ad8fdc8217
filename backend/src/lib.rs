//! Call Center CTMC Core - Rust Engine
//!
//! Uniformized continuous-time Markov chains of multi-skill call centers
//! with deterministic, replayable execution.
//!
//! # Architecture
//!
//! - **models**: Domain types (parameters, occupancy, transition records)
//! - **events**: Random words and random event trees
//! - **thresholds**: Operating modes and self-jump batching
//! - **routing**: Agent group and waiting queue selection
//! - **ctmc**: Chain engines and the waiting-queue decorator
//! - **orchestrator**: Replication driver and checkpoints
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Every transition, sampled or explicit, goes through `generate`
//! 2. All randomness is deterministic (seeded RNG, one word per step)
//! 3. The transition counter never passes its target

// Module declarations
pub mod ctmc;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod rng;
pub mod routing;
pub mod thresholds;

// Re-exports for convenience
pub use ctmc::{
    build_ctmc, CallCenterCtmc, CallCenterCtmc11, CallCenterCtmcKI, CallCenterCtmcSameRate,
    CallCenterCtmcWithQueues, CtmcConfig, CtmcError, CtmcVariant, RoutingConfig,
};
pub use events::{EventAction, EventTreeBuilder, EventTreeError, RandomEventTree, RandomWord};
pub use models::{CircularIntQueue, CtmcParams, CtmcState, TransitionRecord, TransitionType};
pub use orchestrator::{
    compute_config_hash, CtmcSnapshot, Replication, ReplicationConfig, ReplicationError,
    ReplicationSnapshot, TransitionCounts,
};
pub use rng::RngManager;
pub use routing::{
    AgentGroupSelector, ListAgentGroupSelector, ListWaitingQueueSelector, QueueWaits,
    RankAgentGroupSelector, RankWaitingQueueSelector, RoutingContext, TieBreak,
    WaitingQueueSelector,
};
pub use thresholds::{ModeTable, OperatingModeThresholds, ThresholdError};
