//! Error types for the simulation core.
//!
//! Cache rejection is deliberately *not* an error: `put` returning `false`
//! is a normal signal the execution models react to. Everything here either
//! aborts ingest (`InvalidInput`), aborts construction (`Config`), or marks
//! a programming bug (`GraphMisuse`).

use thiserror::Error;

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

/// Main error type for simulation core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The workload stream violates the ingest contract (negative
    /// magnitudes, missing fields, non-monotonic timestamps).
    #[error("invalid workload input: {message}")]
    InvalidInput {
        /// What the offending row looked like and why it was rejected.
        message: String,
    },

    /// A dependency-graph operation was used against its contract, e.g.
    /// removing a node other nodes still depend on.
    #[error("dependency graph misuse: {message}")]
    GraphMisuse {
        /// The violated precondition.
        message: String,
    },

    /// A configuration value is unusable (unknown cache type, negative
    /// capacity, zero vCPUs). Raised at construction, never mid-run.
    #[error("configuration error: {message}")]
    Config {
        /// The rejected setting.
        message: String,
    },
}

impl CoreError {
    /// Invalid workload input, aborting ingest.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Dependency-graph contract violation.
    pub fn graph_misuse(message: impl Into<String>) -> Self {
        Self::GraphMisuse {
            message: message.into(),
        }
    }

    /// Construction-time configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
