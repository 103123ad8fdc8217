//! Replication driver
//!
//! Owns one chain and one seeded RNG, and steps the chain until its target
//! transition count is reached while tallying transition kinds.
//!
//! # Architecture
//!
//! ```text
//! ReplicationConfig ──> build_ctmc ──> Box<dyn CallCenterCtmc>
//!                                             │
//!   RngManager::next_word ──> next_transition ┘──> TransitionCounts
//! ```
//!
//! # Example
//!
//! ```
//! use callcenter_ctmc_core_rs::{CtmcConfig, CtmcVariant, Replication, ReplicationConfig};
//!
//! let config = ReplicationConfig {
//!     ctmc: CtmcConfig {
//!         arrival_rates: vec![2.0],
//!         max_arrival_rates: None,
//!         balking_probabilities: None,
//!         patience_rates: vec![0.5],
//!         max_patience_rates: None,
//!         service_rates: vec![vec![1.0]],
//!         max_service_rates: None,
//!         num_agents: vec![2],
//!         max_num_agents: None,
//!         queue_capacity: 4,
//!         max_queue_capacity: None,
//!         thresholds: None,
//!         routing: None,
//!     },
//!     variant: CtmcVariant::Auto,
//!     track_waiting_times: false,
//!     rng_seed: 42,
//!     num_transitions: 1_000,
//! };
//!
//! let mut replication = Replication::new(config).unwrap();
//! let counts = replication.run().unwrap();
//! assert_eq!(counts.total(), 1_000);
//! ```

use super::checkpoint::{compute_config_hash, validate_snapshot, ReplicationSnapshot};
use crate::ctmc::{build_ctmc, CallCenterCtmc, CtmcConfig, CtmcError, CtmcVariant};
use crate::models::{TransitionRecord, TransitionType};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Complete configuration of one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub ctmc: CtmcConfig,

    /// Engine to build (Auto picks the most specific one)
    #[serde(default)]
    pub variant: CtmcVariant,

    /// Wrap the chain to record arrival indices of queued contacts
    #[serde(default)]
    pub track_waiting_times: bool,

    /// RNG seed (for determinism)
    pub rng_seed: u64,

    /// Transitions of the uniformized chain to simulate
    pub num_transitions: u64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReplicationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ctmc(#[from] CtmcError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config mismatch: snapshot taken under {expected}, loading under {actual}")]
    ConfigMismatch { expected: String, actual: String },

    #[error("State validation error: {0}")]
    StateValidationError(String),
}

// ============================================================================
// Transition tally
// ============================================================================

/// Number of transitions of each kind, false transitions folded into
/// records included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCounts {
    records: [u64; 8],
    false_transitions: u64,
    total: u64,
}

impl TransitionCounts {
    pub fn record(&mut self, record: &TransitionRecord) {
        self.records[record.kind.index()] += 1;
        self.false_transitions += record.false_transitions();
        self.total += record.total_transitions();
    }

    /// Records of the given kind
    pub fn count(&self, kind: TransitionType) -> u64 {
        self.records[kind.index()]
    }

    /// Self-jumps, whether returned as records or folded into one
    pub fn false_transitions(&self) -> u64 {
        self.false_transitions
    }

    /// Transitions of the uniformized chain
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Arrivals of every outcome
    pub fn arrivals(&self) -> u64 {
        TransitionType::ALL
            .iter()
            .filter(|kind| kind.is_arrival())
            .map(|&kind| self.count(kind))
            .sum()
    }

    /// Share of arrivals that found the queue full
    pub fn blocked_fraction(&self) -> f64 {
        match self.arrivals() {
            0 => 0.0,
            n => self.count(TransitionType::ArrivalBlocked) as f64 / n as f64,
        }
    }
}

// ============================================================================
// Replication
// ============================================================================

/// One seeded run of a call center chain
pub struct Replication {
    config: ReplicationConfig,
    config_hash: String,
    ctmc: Box<dyn CallCenterCtmc>,
    rng: RngManager,
    counts: TransitionCounts,
}

impl Replication {
    /// Build the chain, set its target and start from an empty system
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero transition count; chain construction
    /// errors otherwise.
    pub fn new(config: ReplicationConfig) -> Result<Self, ReplicationError> {
        if config.num_transitions == 0 {
            return Err(ReplicationError::InvalidConfig(
                "num_transitions must be positive".to_string(),
            ));
        }

        let config_hash = compute_config_hash(&config)?;
        let mut ctmc = build_ctmc(&config.ctmc, config.variant, config.track_waiting_times)?;
        ctmc.set_target_transitions(config.num_transitions);
        ctmc.init_empty();

        info!(
            seed = config.rng_seed,
            transitions = config.num_transitions,
            contact_types = ctmc.num_contact_types(),
            agent_groups = ctmc.num_agent_groups(),
            modes = ctmc.mode_table().num_modes(),
            uniformization_rate = ctmc.uniformization_rate(),
            "replication created"
        );

        Ok(Self {
            rng: RngManager::new(config.rng_seed),
            config,
            config_hash,
            ctmc,
            counts: TransitionCounts::default(),
        })
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn ctmc(&self) -> &dyn CallCenterCtmc {
        self.ctmc.as_ref()
    }

    /// Mutable access, e.g. to change rates between steps
    pub fn ctmc_mut(&mut self) -> &mut dyn CallCenterCtmc {
        self.ctmc.as_mut()
    }

    pub fn counts(&self) -> &TransitionCounts {
        &self.counts
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.get_state()
    }

    pub fn is_finished(&self) -> bool {
        self.ctmc.transitions_done() >= self.ctmc.target_transitions()
    }

    /// Draw one word and apply the sampled transition
    pub fn step(&mut self) -> Result<TransitionType, ReplicationError> {
        let word = self.rng.next_word();
        let kind = self.ctmc.next_transition(word)?;
        self.counts.record(self.ctmc.last_transition());
        Ok(kind)
    }

    /// Step until the target is reached
    pub fn run(&mut self) -> Result<TransitionCounts, ReplicationError> {
        debug!(done = self.ctmc.transitions_done(), "replication running");
        while !self.is_finished() {
            self.step()?;
        }

        info!(
            transitions = self.counts.total(),
            false_transitions = self.counts.false_transitions(),
            arrivals = self.counts.arrivals(),
            blocked = self.counts.count(TransitionType::ArrivalBlocked),
            abandoned = self.counts.count(TransitionType::Abandonment),
            "replication finished"
        );
        Ok(self.counts.clone())
    }

    // ========================================================================
    // Checkpoint
    // ========================================================================

    pub fn save_state(&self) -> ReplicationSnapshot {
        ReplicationSnapshot {
            ctmc: self.ctmc.snapshot(),
            rng_state: self.rng.get_state(),
            counts: self.counts.clone(),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Rebuild a replication from its config and a snapshot taken under it
    pub fn load_state(
        config: ReplicationConfig,
        snapshot: &ReplicationSnapshot,
    ) -> Result<Self, ReplicationError> {
        let mut replication = Self::new(config)?;

        if snapshot.config_hash != replication.config_hash {
            warn!(
                expected = %snapshot.config_hash,
                actual = %replication.config_hash,
                "snapshot config hash mismatch"
            );
            return Err(ReplicationError::ConfigMismatch {
                expected: snapshot.config_hash.clone(),
                actual: replication.config_hash,
            });
        }

        validate_snapshot(snapshot)?;
        replication.ctmc.restore_state(&snapshot.ctmc)?;
        replication.rng = RngManager::new(snapshot.rng_state);
        replication.counts = snapshot.counts.clone();

        info!(
            done = snapshot.ctmc.transitions_done,
            target = snapshot.ctmc.target_transitions,
            "replication restored"
        );
        Ok(replication)
    }
}

impl std::fmt::Debug for Replication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replication")
            .field("config_hash", &self.config_hash)
            .field("transitions_done", &self.ctmc.transitions_done())
            .field("target_transitions", &self.ctmc.target_transitions())
            .field("rng_state", &self.rng.get_state())
            .field("counts", &self.counts)
            .finish()
    }
}
