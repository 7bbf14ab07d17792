//! The closed set of error kinds callers are expected to match on.
//!
//! Purely informational failures (a state-repair miss, a retried save) do not
//! go through this enum — they accumulate into the result structures the
//! owning module already returns (`state::LoadOutcome`, `recovery::RepairReport`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkstreamError {
    #[error("workstream cap reached ({max} active)")]
    MaxReached { max: usize },

    #[error("workstream not found: {id}")]
    NotFound { id: String },

    #[error("pairing is not active")]
    NotPairing,

    #[error("pairing already active on workstream {active_id}")]
    AlreadyPairing { active_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
