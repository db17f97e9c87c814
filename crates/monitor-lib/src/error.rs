//! Error types for the monitor library
//!
//! Only I/O, encoding and configuration problems are errors. Missing or
//! inconsistent observations are reported as data, never through these types.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the monitor library
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to encode or decode intervals: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid backend configuration for {backend}: {reason}")]
    InvalidBackend { backend: String, reason: String },

    #[error("invalid match pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to read pod logs in {namespace}: {reason}")]
    PodLogs { namespace: String, reason: String },

    #[error("allowed disruption lookup failed for {backend}: {reason}")]
    AllowedDisruptionLookup { backend: String, reason: String },
}

/// Reasons a single backend probe failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0}")]
    Request(String),

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
