//! Error types for the scoring engine.

use thiserror::Error;

/// Result type for scoring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when scoring a round.
///
/// Graph shape is never an error here: cycles and dangling delegation
/// targets are first-class scoring outcomes. Only misconfigured
/// parameters fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A scoring parameter is negative, NaN, or infinite.
    #[error("invalid scoring parameter {name}: {value}")]
    InvalidParam {
        /// Parameter name (lambda, beta, gamma, pass_score)
        name: &'static str,
        /// The rejected value
        value: f64,
    },
}
