//! Resolve-error taxonomy shared across the engine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified reason a locate attempt or resolve call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveErrorKind {
    /// No element matched
    NotFound,

    /// Matched element is not visible
    NotVisible,

    /// Matched element is disabled or otherwise inert
    NotInteractable,

    /// More than one element matched
    AmbiguousMatch,

    /// Budget elapsed or the call was cancelled
    Timeout,

    /// Cross-origin frame could not be searched
    FrameAccessDenied,

    /// Locator expression is structurally invalid
    MalformedLocator,
}

impl ResolveErrorKind {
    /// Get kind name as string
    pub fn name(&self) -> &'static str {
        match self {
            ResolveErrorKind::NotFound => "not-found",
            ResolveErrorKind::NotVisible => "not-visible",
            ResolveErrorKind::NotInteractable => "not-interactable",
            ResolveErrorKind::AmbiguousMatch => "ambiguous-match",
            ResolveErrorKind::Timeout => "timeout",
            ResolveErrorKind::FrameAccessDenied => "frame-access-denied",
            ResolveErrorKind::MalformedLocator => "malformed-locator",
        }
    }

    /// Check if a later retry of the same locator could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveErrorKind::Timeout | ResolveErrorKind::NotVisible
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ResolveErrorKind::MalformedLocator => 3,
            ResolveErrorKind::Timeout => 2,
            ResolveErrorKind::NotFound
            | ResolveErrorKind::AmbiguousMatch
            | ResolveErrorKind::NotInteractable => 1,
            ResolveErrorKind::NotVisible | ResolveErrorKind::FrameAccessDenied => 0,
        }
    }
}

impl fmt::Display for ResolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ResolveErrorKind::Timeout.is_retryable());
        assert!(!ResolveErrorKind::NotFound.is_retryable());
        assert!(!ResolveErrorKind::MalformedLocator.is_retryable());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(
            ResolveErrorKind::MalformedLocator.severity() > ResolveErrorKind::Timeout.severity()
        );
        assert!(ResolveErrorKind::Timeout.severity() > ResolveErrorKind::NotFound.severity());
    }
}
