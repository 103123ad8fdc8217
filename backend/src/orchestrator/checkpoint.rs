//! Checkpoint - Save/Load Replication State
//!
//! A replication can be paused and resumed from a [`ReplicationSnapshot`]:
//! the occupancy and counters of the chain, the RNG state, and the
//! transition tally. Rates and capacities are not stored; they come from the
//! configuration, which must hash to the same value on load.
//!
//! # Critical Invariants
//!
//! - **Determinism**: same config + snapshot resumes the same trajectory
//! - **Counter consistency**: the tally accounts for every transition done
//! - **Queue integrity**: arrival indices match the queued counts
//! - **Config matching**: a snapshot only loads under its own config

use super::engine::{ReplicationError, TransitionCounts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Occupancy and counters of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtmcSnapshot {
    /// Transitions simulated so far
    pub transitions_done: u64,

    /// Target transition count
    pub target_transitions: u64,

    /// Queued contacts per type
    pub queued: Vec<u32>,

    /// Busy agents per group
    pub busy: Vec<u32>,

    /// Busy agents per (type, group), row-major, when tracked
    pub busy_by_type: Option<Vec<u32>>,

    /// Arrival indices of queued contacts per type, when tracked
    pub waiting_queues: Option<Vec<Vec<u64>>>,
}

/// Complete replication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationSnapshot {
    pub ctmc: CtmcSnapshot,

    /// xorshift64* state (CRITICAL for determinism)
    pub rng_state: u64,

    /// Transition tally so far
    pub counts: TransitionCounts,

    /// SHA256 hash of the replication config
    pub config_hash: String,
}

impl ReplicationSnapshot {
    pub fn to_json(&self) -> Result<String, ReplicationError> {
        serde_json::to_string(self).map_err(|e| {
            ReplicationError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ReplicationError> {
        serde_json::from_str(json).map_err(|e| {
            ReplicationError::SerializationError(format!("Snapshot deserialization failed: {}", e))
        })
    }
}

// ============================================================================
// Config hashing
// ============================================================================

/// SHA256 of the canonical JSON form of `config` (object keys sorted)
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, ReplicationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        ReplicationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        ReplicationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Structural checks that do not need the chain's parameters
pub fn validate_snapshot(snapshot: &ReplicationSnapshot) -> Result<(), ReplicationError> {
    let ctmc = &snapshot.ctmc;

    if ctmc.transitions_done > ctmc.target_transitions {
        return Err(ReplicationError::StateValidationError(format!(
            "{} transitions done past target {}",
            ctmc.transitions_done, ctmc.target_transitions
        )));
    }

    if snapshot.counts.total() != ctmc.transitions_done {
        return Err(ReplicationError::StateValidationError(format!(
            "tally accounts for {} transitions, chain has done {}",
            snapshot.counts.total(),
            ctmc.transitions_done
        )));
    }

    if let Some(waiting) = &ctmc.waiting_queues {
        if waiting.len() != ctmc.queued.len() {
            return Err(ReplicationError::StateValidationError(format!(
                "{} waiting queues for {} contact types",
                waiting.len(),
                ctmc.queued.len()
            )));
        }
        for (k, (queue, &size)) in waiting.iter().zip(&ctmc.queued).enumerate() {
            if queue.len() != size as usize {
                return Err(ReplicationError::StateValidationError(format!(
                    "type {} has {} queued contacts but {} arrival indices",
                    k,
                    size,
                    queue.len()
                )));
            }
            if queue.iter().any(|&arrival| arrival > ctmc.transitions_done) {
                return Err(ReplicationError::StateValidationError(format!(
                    "type {} has a contact arriving after transition {}",
                    k, ctmc.transitions_done
                )));
            }
        }
    }
    Ok(())
}
