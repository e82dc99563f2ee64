//! Recovery context, proposals and attempt history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfinder_core_types::{DomLocation, ElementDescriptor, Locator, ResolveErrorKind};

use challenge_watch::ChallengeKind;

/// Everything a tactic may condition on
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    /// The descriptor being resolved
    pub descriptor: ElementDescriptor,

    /// The best-ranked locator that failed
    pub failed_locator: Locator,

    /// Classified failure of the seeking phase
    pub error: ResolveErrorKind,

    /// Match count of the most informative failed attempt
    pub match_count: usize,

    /// Hidden elements seen in the failed match sets
    pub hidden_matches: usize,

    /// Candidates already attempted before recovery started
    pub prior_attempts: u32,

    /// Obstructions detected on the page
    pub challenges: Vec<ChallengeKind>,
}

impl RecoveryContext {
    pub fn has_challenge(&self, kind: ChallengeKind) -> bool {
        self.challenges.contains(&kind)
    }
}

/// A locator proposed by a tactic, with its rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub locator: Locator,
    pub reasoning: String,
}

/// Verdict from re-validating a proposal through the full evaluation
/// pipeline (not raw traversal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeVerdict {
    pub accepted: bool,
    pub confidence: f64,
    pub location: Option<DomLocation>,
}

impl ProbeVerdict {
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            confidence: 0.0,
            location: None,
        }
    }
}

/// Re-validates proposed locators against the live page
///
/// Implemented by the orchestrator so proposals run through candidate
/// evaluation and outcome recording like any first-class attempt.
#[async_trait]
pub trait ProposalProber: Send + Sync {
    async fn probe(&self, locator: &Locator) -> ProbeVerdict;
}

/// One recovery attempt, kept in the bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub tactic: String,
    pub locator: Locator,
    pub success: bool,
    pub duration_ms: u64,
    pub reasoning: String,
    pub at: DateTime<Utc>,
}

/// Aggregated per-tactic statistics from the attempt history
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TacticStats {
    pub attempts: u64,
    pub successes: u64,
}

impl TacticStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Terminal result of a recovery run
#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    /// A tactic's proposal validated successfully
    Recovered {
        locator: Locator,
        tactic: &'static str,
        confidence: f64,
        location: DomLocation,
        attempts: u32,
    },

    /// Every applicable tactic ran out of retries
    Exhausted { attempts: u32 },

    /// Budget elapsed or the caller cancelled
    Aborted { reason: String, attempts: u32 },
}

impl RecoveryOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RecoveryOutcome::Recovered { attempts, .. }
            | RecoveryOutcome::Exhausted { attempts }
            | RecoveryOutcome::Aborted { attempts, .. } => *attempts,
        }
    }
}
