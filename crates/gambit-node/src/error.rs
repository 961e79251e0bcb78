//! Error types for the game node.

use serde::Serialize;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a submission was turned away at intake.
///
/// Rejections are part of the protocol, not faults: the store guards
/// every write and reports the reason to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// The round is not accepting submissions
    RoundNotActive,
    /// The participant already acted this round
    Duplicate,
    /// The delegation target is unknown to the round, or is the sender
    InvalidTarget,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RoundNotActive => "ROUND_NOT_ACTIVE",
            Self::Duplicate => "DUPLICATE",
            Self::InvalidTarget => "INVALID_TARGET",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Submission rejected by the intake guard
    #[error("Submission rejected: {0}")]
    Rejected(RejectReason),

    /// Scoring engine error (invalid round parameters)
    #[error("Scoring error: {0}")]
    Scoring(#[from] gambit_scoring::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
