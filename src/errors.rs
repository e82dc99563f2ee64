//! Terminal failure surfaced to callers

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wayfinder_core_types::ResolveErrorKind;

/// Terminal resolve failure
///
/// Only surfaced when the candidate list and the recovery chain are
/// both exhausted, or the call's budget elapsed. Carries diagnostics
/// for the caller; the outcome has already been recorded.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("resolve failed ({kind}) after {attempts} attempts in {elapsed_ms}ms: {message}")]
pub struct ResolveFailure {
    /// Classified failure
    pub kind: ResolveErrorKind,

    /// Locate attempts made, recovery included
    pub attempts: u32,

    /// Wall-clock time spent
    pub elapsed_ms: u64,

    /// Human-readable detail
    pub message: String,
}

impl ResolveFailure {
    pub fn is_timeout(&self) -> bool {
        self.kind == ResolveErrorKind::Timeout
    }
}
