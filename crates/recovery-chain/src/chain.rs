//! The chain dispatcher

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tactics::Tactic;
use crate::types::{
    ProposalProber, RecoveryAttempt, RecoveryContext, RecoveryOutcome, TacticStats,
};

/// Chain tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Wall-clock budget for the whole chain
    pub total_budget_ms: u64,

    /// Timeout applied to each individual proposal probe
    pub tactic_timeout_ms: u64,

    /// Base delay for wait-and-retry backoff
    pub wait_base_ms: u64,

    /// Attempt-history ring capacity
    pub history_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            total_budget_ms: 8000,
            tactic_timeout_ms: 2000,
            wait_base_ms: 200,
            history_capacity: 128,
        }
    }
}

/// Ordered fallback dispatcher with bounded attempt history
pub struct RecoveryChain {
    config: RecoveryConfig,
    history: Mutex<VecDeque<RecoveryAttempt>>,
}

impl RecoveryChain {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Run the chain for a failed resolution
    ///
    /// Walks the tactic catalog in priority order, skipping tactics
    /// whose predicate rejects the context. Stops at the first proposal
    /// the prober accepts. Total attempts are bounded by the sum of
    /// per-tactic retry caps, and wall-clock time by the chain budget.
    pub async fn run(
        &self,
        ctx: &RecoveryContext,
        prober: &dyn ProposalProber,
        cancel: &CancellationToken,
    ) -> RecoveryOutcome {
        let deadline = Instant::now() + Duration::from_millis(self.config.total_budget_ms);
        let mut attempts = 0u32;

        info!(
            failed = %ctx.failed_locator,
            error = %ctx.error,
            "starting recovery chain"
        );

        for tactic in Tactic::catalog() {
            if !tactic.applies(ctx) {
                debug!(tactic = tactic.name(), "tactic not applicable");
                continue;
            }

            for retry in 0..tactic.max_retries() {
                if cancel.is_cancelled() {
                    return RecoveryOutcome::Aborted {
                        reason: "cancelled".into(),
                        attempts,
                    };
                }
                let remaining = match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => {
                        return RecoveryOutcome::Aborted {
                            reason: "recovery budget elapsed".into(),
                            attempts,
                        }
                    }
                };

                if *tactic == Tactic::WaitAndRetry {
                    let backoff =
                        Duration::from_millis(self.config.wait_base_ms * (1 << retry.min(4)));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return RecoveryOutcome::Aborted { reason: "cancelled".into(), attempts };
                        }
                        _ = tokio::time::sleep(backoff.min(remaining)) => {}
                    }
                }

                let Some(proposal) = tactic.propose(ctx) else {
                    break;
                };

                attempts += 1;
                let started = Instant::now();
                let probe_budget = remaining
                    .min(Duration::from_millis(self.config.tactic_timeout_ms));
                let verdict = match timeout(probe_budget, prober.probe(&proposal.locator)).await {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        warn!(tactic = tactic.name(), "proposal probe timed out");
                        self.remember(tactic, &proposal, false, started);
                        continue;
                    }
                };

                self.remember(tactic, &proposal, verdict.accepted, started);

                if verdict.accepted {
                    let location = verdict
                        .location
                        .unwrap_or_else(wayfinder_core_types::DomLocation::document);
                    info!(
                        tactic = tactic.name(),
                        locator = %proposal.locator,
                        confidence = verdict.confidence,
                        "recovery succeeded"
                    );
                    return RecoveryOutcome::Recovered {
                        locator: proposal.locator,
                        tactic: tactic.name(),
                        confidence: verdict.confidence,
                        location,
                        attempts,
                    };
                }
                debug!(
                    tactic = tactic.name(),
                    locator = %proposal.locator,
                    "proposal rejected"
                );
            }
        }

        info!(attempts, "recovery chain exhausted");
        RecoveryOutcome::Exhausted { attempts }
    }

    fn remember(&self, tactic: &Tactic, proposal: &crate::types::Proposal, success: bool, started: Instant) {
        let mut history = self.history.lock();
        if history.len() == self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(RecoveryAttempt {
            tactic: tactic.name().to_string(),
            locator: proposal.locator.clone(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
            reasoning: proposal.reasoning.clone(),
            at: Utc::now(),
        });
    }

    /// Per-tactic success rates over the attempt history
    pub fn tactic_stats(&self) -> BTreeMap<String, TacticStats> {
        let history = self.history.lock();
        let mut stats: BTreeMap<String, TacticStats> = BTreeMap::new();
        for attempt in history.iter() {
            let entry = stats.entry(attempt.tactic.clone()).or_default();
            entry.attempts += 1;
            if attempt.success {
                entry.successes += 1;
            }
        }
        stats
    }

    pub fn history(&self) -> Vec<RecoveryAttempt> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn reset(&self) {
        self.history.lock().clear();
    }
}

impl Default for RecoveryChain {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}
