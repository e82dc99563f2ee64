//! Observability report

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfinder_core_types::ElementKind;

use challenge_watch::{Challenge, Severity};
use metrics_center::{MetricKey, SelectorMetric};
use recovery_chain::TacticStats;

/// One locator line in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorSummary {
    pub locator_key: String,
    pub domain: String,
    pub kind: ElementKind,
    pub reliability: f64,
    pub attempts: u64,
    pub avg_latency_ms: f64,
}

impl LocatorSummary {
    pub(crate) fn from_entry(key: MetricKey, metric: SelectorMetric) -> Self {
        Self {
            locator_key: key.locator_key,
            domain: key.domain,
            kind: key.kind,
            reliability: metric.reliability,
            attempts: metric.attempts,
            avg_latency_ms: metric.avg_latency_ms,
        }
    }
}

/// Aggregated view of learned state, obstruction trends and alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    /// Domain filter the report was built with
    pub domain: Option<String>,

    /// Most reliable locators, best first
    pub top_locators: Vec<LocatorSummary>,

    /// Locators whose reliability sank below the weak threshold
    pub weak_locators: Vec<LocatorSummary>,

    /// Obstruction counts per kind over the rolling history
    pub challenge_trends: BTreeMap<String, usize>,

    /// Recovery tactic success rates
    pub tactic_stats: BTreeMap<String, TacticStats>,

    /// Conditions worth a human look
    pub alerts: Vec<String>,

    pub generated_at: DateTime<Utc>,
}

pub(crate) fn alerts_from(
    weak_locators: &[LocatorSummary],
    challenges: &[Challenge],
) -> Vec<String> {
    let mut alerts = Vec::new();
    for challenge in challenges {
        if challenge.severity >= Severity::High && !challenge.is_resolved() {
            alerts.push(format!(
                "{} obstruction unresolved: {} ({})",
                challenge.severity.name(),
                challenge.kind.name(),
                challenge.note
            ));
        }
    }
    if !weak_locators.is_empty() {
        alerts.push(format!(
            "{} locator(s) below the reliability threshold",
            weak_locators.len()
        ));
    }
    alerts
}
