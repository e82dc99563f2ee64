//! Challenge model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Known obstruction patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Modal or dialog overlay covering the page
    ModalOverlay,
    /// Cookie/privacy consent gate
    ConsentGate,
    /// CAPTCHA or bot-detection wall
    Captcha,
    /// Interactive elements present but disabled
    DisabledElement,
    /// Elements present but hidden
    HiddenElement,
    /// Form fields flagged invalid
    ValidationError,
    /// Elevated page-load latency
    SlowNetwork,
    /// Navigation landed on an unexpected host
    UnexpectedRedirect,
}

impl ChallengeKind {
    /// Get kind name as string
    pub fn name(&self) -> &'static str {
        match self {
            ChallengeKind::ModalOverlay => "modal-overlay",
            ChallengeKind::ConsentGate => "consent-gate",
            ChallengeKind::Captcha => "captcha",
            ChallengeKind::DisabledElement => "disabled-element",
            ChallengeKind::HiddenElement => "hidden-element",
            ChallengeKind::ValidationError => "validation-error",
            ChallengeKind::SlowNetwork => "slow-network",
            ChallengeKind::UnexpectedRedirect => "unexpected-redirect",
        }
    }

    /// Severity used to order remediation
    pub fn default_severity(&self) -> Severity {
        match self {
            ChallengeKind::Captcha => Severity::Critical,
            ChallengeKind::UnexpectedRedirect => Severity::High,
            ChallengeKind::ModalOverlay
            | ChallengeKind::ConsentGate
            | ChallengeKind::ValidationError
            | ChallengeKind::DisabledElement => Severity::Medium,
            ChallengeKind::SlowNetwork | ChallengeKind::HiddenElement => Severity::Low,
        }
    }
}

/// Obstruction severity, lowest first so `Ord` sorts ascending
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A detected page-level obstruction
///
/// Created by the detector, consumed and closed by recovery. Instances
/// live only in a bounded rolling history used for trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub kind: ChallengeKind,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub max_retries: u32,

    /// What tripped the probe (selector, hint, host)
    pub note: String,
}

impl Challenge {
    pub fn new(kind: ChallengeKind, note: impl Into<String>, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            severity: kind.default_severity(),
            detected_at: Utc::now(),
            resolved_at: None,
            attempts: 0,
            max_retries,
            note: note.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_challenge_lifecycle_fields() {
        let mut challenge = Challenge::new(ChallengeKind::Captcha, "captcha iframe", 3);
        assert_eq!(challenge.severity, Severity::Critical);
        assert!(!challenge.is_resolved());
        assert!(challenge.can_retry());

        challenge.attempts = 3;
        assert!(!challenge.can_retry());

        challenge.resolved_at = Some(Utc::now());
        assert!(challenge.is_resolved());
    }
}
