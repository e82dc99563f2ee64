//! Driver error type

use thiserror::Error;

/// Error surface of the page driver port
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    /// Locator expression rejected by the driver
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Scope exists but cannot be searched (cross-origin frame)
    #[error("scope access denied: {0}")]
    AccessDenied(String),

    /// Script evaluation failed
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Referenced node no longer exists
    #[error("node gone: {0}")]
    NodeGone(String),

    /// Driver or page unavailable
    #[error("driver unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    /// Access-denial is expected for cross-origin frames and is treated
    /// as "not searchable" rather than as a failure.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, DriverError::AccessDenied(_))
    }
}
