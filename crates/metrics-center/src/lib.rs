//! Durable in-process outcome metrics
//!
//! Records every locate outcome per (locator, domain, element kind) and
//! derives stability and reliability scores from the stored counters.
//! Derived fields are pure functions of the counters; they are
//! recomputed on every update and never mutated independently.
//!
//! The map is shared process-wide across sessions; updates to one key
//! are serialized through the sharded map's entry reference, while
//! different keys proceed independently.

pub mod window;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wayfinder_core_types::{ElementKind, Locator};

pub use window::OutcomeWindow;

/// Metrics key: one entry per locator per domain per element kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub locator_key: String,
    pub domain: String,
    pub kind: ElementKind,
}

impl MetricKey {
    pub fn new(domain: impl Into<String>, kind: ElementKind, locator: &Locator) -> Self {
        Self {
            locator_key: locator.cache_key(),
            domain: domain.into(),
            kind,
        }
    }
}

/// One recorded locate outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub latency_ms: f64,
    pub match_count: usize,
}

/// Metrics tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Weight of the newest latency sample (exponential smoothing)
    pub latency_smoothing: f64,

    /// Recent-outcome window capacity
    pub window_capacity: usize,

    /// Sub-windows used for the stability variance
    pub sub_windows: usize,

    /// Reliability weight of the success rate
    pub weight_success: f64,

    /// Reliability weight of the uniqueness rate
    pub weight_uniqueness: f64,

    /// Reliability weight of the stability score
    pub weight_stability: f64,

    /// Attempts required before an entry ranks in reports
    pub min_attempts: u64,

    /// Reliability below which an entry counts as weak
    pub weak_threshold: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_smoothing: 0.3,
            window_capacity: 32,
            sub_windows: 4,
            weight_success: 0.5,
            weight_uniqueness: 0.2,
            weight_stability: 0.3,
            min_attempts: 3,
            weak_threshold: 0.4,
        }
    }
}

/// Historical record for one (locator, domain, kind)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorMetric {
    /// The locator this entry tracks (kept so learned state can be
    /// reconstructed from metrics alone)
    pub locator: Locator,

    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,

    /// Attempts that matched exactly one element
    pub unique_matches: u64,

    /// Exponentially smoothed latency
    pub avg_latency_ms: f64,

    /// How consistent success is across recent time windows (0-1)
    pub stability: f64,

    /// Weighted composite of success rate, uniqueness and stability (0-1)
    pub reliability: f64,

    pub last_outcome_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    window: OutcomeWindow,
}

impl SelectorMetric {
    fn new(locator: Locator, window_capacity: usize) -> Self {
        Self {
            locator,
            attempts: 0,
            successes: 0,
            failures: 0,
            unique_matches: 0,
            avg_latency_ms: 0.0,
            stability: 0.5,
            reliability: 0.0,
            last_outcome_at: None,
            window: OutcomeWindow::new(window_capacity),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn uniqueness_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.unique_matches as f64 / self.attempts as f64
        }
    }

    fn apply(&mut self, outcome: Outcome, config: &MetricsConfig) {
        self.attempts += 1;
        if outcome.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if outcome.match_count == 1 {
            self.unique_matches += 1;
        }

        let alpha = config.latency_smoothing.clamp(0.0, 1.0);
        self.avg_latency_ms = if self.attempts == 1 {
            outcome.latency_ms
        } else {
            (1.0 - alpha) * self.avg_latency_ms + alpha * outcome.latency_ms
        };

        self.window.push(outcome.success);
        self.last_outcome_at = Some(Utc::now());
        self.recompute(config);
    }

    /// Recompute derived scores from stored state only
    fn recompute(&mut self, config: &MetricsConfig) {
        self.stability = self.window.stability(config.sub_windows);
        self.reliability = (config.weight_success * self.success_rate()
            + config.weight_uniqueness * self.uniqueness_rate()
            + config.weight_stability * self.stability)
            .clamp(0.0, 1.0);
    }
}

/// Serializable view of the whole store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub entries: Vec<(MetricKey, SelectorMetric)>,
    pub taken_at: DateTime<Utc>,
}

/// Process-wide outcome store
#[derive(Default)]
pub struct MetricsCenter {
    entries: DashMap<MetricKey, SelectorMetric>,
    config: MetricsConfig,
}

impl MetricsCenter {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Record one outcome; returns the updated entry
    pub fn record_outcome(
        &self,
        domain: &str,
        kind: ElementKind,
        locator: &Locator,
        outcome: Outcome,
    ) -> SelectorMetric {
        let key = MetricKey::new(domain, kind, locator);
        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| SelectorMetric::new(locator.clone(), self.config.window_capacity));
        entry.apply(outcome, &self.config);
        debug!(
            locator = %locator,
            domain,
            success = outcome.success,
            reliability = entry.reliability,
            "recorded locate outcome"
        );
        entry.clone()
    }

    pub fn get(&self, domain: &str, kind: ElementKind, locator: &Locator) -> Option<SelectorMetric> {
        self.entries
            .get(&MetricKey::new(domain, kind, locator))
            .map(|entry| entry.clone())
    }

    /// Best-known entries by reliability
    ///
    /// Only entries with enough attempts rank; pass `kind`/`domain` to
    /// narrow the scan.
    pub fn top_by_reliability(
        &self,
        kind: Option<ElementKind>,
        domain: Option<&str>,
        limit: usize,
    ) -> Vec<(MetricKey, SelectorMetric)> {
        let mut ranked: Vec<(MetricKey, SelectorMetric)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().attempts >= self.config.min_attempts)
            .filter(|entry| kind.map_or(true, |k| entry.key().kind == k))
            .filter(|entry| domain.map_or(true, |d| entry.key().domain == d))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.reliability
                .partial_cmp(&a.1.reliability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        ranked
    }

    /// Entries whose reliability has sunk below the weak threshold
    pub fn weak_entries(
        &self,
        domain: Option<&str>,
        limit: usize,
    ) -> Vec<(MetricKey, SelectorMetric)> {
        let mut weak: Vec<(MetricKey, SelectorMetric)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().attempts >= self.config.min_attempts)
            .filter(|entry| entry.value().reliability < self.config.weak_threshold)
            .filter(|entry| domain.map_or(true, |d| entry.key().domain == d))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        weak.sort_by(|a, b| {
            a.1.reliability
                .partial_cmp(&b.1.reliability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        weak.truncate(limit);
        weak
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries: self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            taken_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> Locator {
        Locator::Css("#submit".into())
    }

    fn success() -> Outcome {
        Outcome {
            success: true,
            latency_ms: 100.0,
            match_count: 1,
        }
    }

    fn failure() -> Outcome {
        Outcome {
            success: false,
            latency_ms: 250.0,
            match_count: 0,
        }
    }

    #[test]
    fn test_counter_invariant_holds_under_any_sequence() {
        let center = MetricsCenter::default();
        // Deterministic but irregular success pattern
        for i in 0..200u64 {
            let outcome = if i % 7 == 0 || i % 3 == 1 {
                failure()
            } else {
                success()
            };
            let metric =
                center.record_outcome("example.com", ElementKind::Button, &locator(), outcome);
            assert_eq!(metric.successes + metric.failures, metric.attempts);
            assert!((0.0..=1.0).contains(&metric.success_rate()));
            assert!((0.0..=1.0).contains(&metric.uniqueness_rate()));
            assert!((0.0..=1.0).contains(&metric.stability));
            assert!((0.0..=1.0).contains(&metric.reliability));
        }
    }

    #[test]
    fn test_reliability_is_deterministic() {
        let center = MetricsCenter::default();
        for _ in 0..10 {
            center.record_outcome("example.com", ElementKind::Button, &locator(), success());
        }
        let first = center
            .get("example.com", ElementKind::Button, &locator())
            .unwrap();

        // Recomputing from the same stored state yields the same value
        let mut copy = first.clone();
        copy.recompute(&MetricsConfig::default());
        assert_eq!(copy.reliability, first.reliability);
        assert_eq!(copy.stability, first.stability);
    }

    #[test]
    fn test_latency_smoothing() {
        let center = MetricsCenter::default();
        let m1 = center.record_outcome(
            "example.com",
            ElementKind::Button,
            &locator(),
            Outcome {
                success: true,
                latency_ms: 100.0,
                match_count: 1,
            },
        );
        assert_eq!(m1.avg_latency_ms, 100.0);

        let m2 = center.record_outcome(
            "example.com",
            ElementKind::Button,
            &locator(),
            Outcome {
                success: true,
                latency_ms: 200.0,
                match_count: 1,
            },
        );
        // 70% old, 30% new
        assert!((m2.avg_latency_ms - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_consistent_success_reaches_full_reliability() {
        let center = MetricsCenter::default();
        let mut metric = None;
        for _ in 0..32 {
            metric = Some(center.record_outcome(
                "example.com",
                ElementKind::Button,
                &locator(),
                success(),
            ));
        }
        let metric = metric.unwrap();
        assert!(metric.reliability > 0.95);
        assert_eq!(metric.stability, 1.0);
    }

    #[test]
    fn test_failures_drag_reliability_down() {
        let center = MetricsCenter::default();
        for _ in 0..16 {
            center.record_outcome("example.com", ElementKind::Button, &locator(), success());
        }
        let before = center
            .get("example.com", ElementKind::Button, &locator())
            .unwrap()
            .reliability;
        for _ in 0..16 {
            center.record_outcome("example.com", ElementKind::Button, &locator(), failure());
        }
        let after = center
            .get("example.com", ElementKind::Button, &locator())
            .unwrap()
            .reliability;
        assert!(after < before);
    }

    #[test]
    fn test_sparse_data_yields_neutral_stability() {
        let center = MetricsCenter::default();
        let metric =
            center.record_outcome("example.com", ElementKind::Button, &locator(), success());
        assert_eq!(metric.stability, 0.5);
    }

    #[test]
    fn test_top_and_weak_ranking() {
        let center = MetricsCenter::default();
        let good = Locator::Css("#good".into());
        let bad = Locator::Css("#bad".into());
        for _ in 0..8 {
            center.record_outcome("example.com", ElementKind::Button, &good, success());
            center.record_outcome("example.com", ElementKind::Button, &bad, failure());
        }

        let top = center.top_by_reliability(Some(ElementKind::Button), None, 10);
        assert_eq!(top[0].0.locator_key, "css:#good");

        let weak = center.weak_entries(Some("example.com"), 10);
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].0.locator_key, "css:#bad");
    }

    #[test]
    fn test_reset_clears_state() {
        let center = MetricsCenter::default();
        center.record_outcome("example.com", ElementKind::Button, &locator(), success());
        assert!(!center.is_empty());
        center.reset();
        assert!(center.is_empty());
    }
}
