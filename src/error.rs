//! Error taxonomy for the control plane.
//!
//! Every failure the core can produce falls into one of four classes,
//! and the class decides how the caller reacts:
//!
//! ```text
//! Policy            → abort the generation cycle, never retried
//! TransientNetwork  → retried in acquisition, logged-and-skipped in polling
//! Structural        → abort, retrying cannot change the document shape
//! Process           → surfaced to the runner, which exits non-zero
//! ```

use thiserror::Error;

/// Errors produced by the control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Invalid or contradictory deployment options.
    #[error("policy error: {0}")]
    Policy(String),

    /// A remote call or token source failed.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// The overall acquisition deadline expired.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// A fetched or transformed document had an unexpected shape.
    #[error("structural error: {0}")]
    Structural(String),

    /// The supervised proxy exited, could not be signalled, or did not stop in time.
    #[error("process error: {0}")]
    Process(String),
}

impl ControlPlaneError {
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::TransientNetwork(msg.into())
    }

    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Whether a retry loop may try the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

impl From<reqwest::Error> for ControlPlaneError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransientNetwork(err.to_string())
    }
}

impl From<serde_json::Error> for ControlPlaneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Structural(err.to_string())
    }
}

impl From<std::io::Error> for ControlPlaneError {
    fn from(err: std::io::Error) -> Self {
        Self::Process(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;
