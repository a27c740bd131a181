//! Error types for workload generation and transport.

use thiserror::Error;

/// Result alias for this crate.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors raised while generating, loading, or storing workloads.
#[derive(Error, Debug)]
pub enum WorkloadError {
    /// The generation profile is unusable (zero size, fractions out of
    /// range, inverted magnitude bounds).
    #[error("invalid workload profile: {message}")]
    Profile {
        /// The rejected setting.
        message: String,
    },

    /// A transported row could not be interpreted.
    #[error("malformed workload row: {message}")]
    MalformedRow {
        /// What the offending cell looked like.
        message: String,
    },

    /// The core rejected the assembled stream.
    #[error(transparent)]
    Core(#[from] steadysim_core::CoreError),

    /// CSV transport failure.
    #[error("csv transport error: {source}")]
    Csv {
        /// Underlying reader/writer error.
        #[from]
        source: csv::Error,
    },

    /// JSON serialization failure.
    #[error("json error: {source}")]
    Json {
        /// Underlying serializer error.
        #[from]
        source: serde_json::Error,
    },

    /// Filesystem failure.
    #[error("io error: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: std::io::Error,
    },
}

impl WorkloadError {
    /// Profile validation failure.
    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile {
            message: message.into(),
        }
    }

    /// Malformed transported row.
    pub fn malformed_row(message: impl Into<String>) -> Self {
        Self::MalformedRow {
            message: message.into(),
        }
    }
}
