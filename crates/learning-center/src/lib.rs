//! Learned locator strategies
//!
//! Aggregates resolution outcomes into per-(domain, kind) strategies:
//! ranked locator lists with confidence scores. Strategies are derived
//! state; they can always be rebuilt from the metrics store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wayfinder_core_types::{ElementKind, Locator};

use metrics_center::MetricsCenter;

/// Strategy key: one strategy per domain per element kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyKey {
    pub domain: String,
    pub kind: ElementKind,
}

/// One locator inside a strategy, with its learned confidence (0-100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedLocator {
    pub locator: Locator,
    pub confidence: f64,
    pub last_used_at: DateTime<Utc>,
}

/// Ranked locator set for a (domain, kind)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Strategy {
    pub entries: Vec<RankedLocator>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Strategy {
    /// Aggregate confidence: the best entry's confidence
    pub fn confidence(&self) -> f64 {
        self.entries
            .iter()
            .map(|entry| entry.confidence)
            .fold(0.0, f64::max)
    }
}

/// Learning tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Cap on locators kept per strategy
    pub max_locators: usize,

    /// Fraction of the remaining headroom gained per success
    pub reinforce_rate: f64,

    /// Confidence multiplier applied per failure
    pub decay_factor: f64,

    /// Entries decayed below this confidence are evicted
    pub confidence_floor: f64,

    /// Confidence granted to a newly learned locator
    pub initial_confidence: f64,

    /// Minimum reliability for entries restored by a rebuild
    pub rebuild_min_reliability: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_locators: 8,
            reinforce_rate: 0.2,
            decay_factor: 0.7,
            confidence_floor: 5.0,
            initial_confidence: 55.0,
            rebuild_min_reliability: 0.6,
        }
    }
}

/// Serializable view of all learned strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub strategies: Vec<(StrategyKey, Strategy)>,
    pub taken_at: DateTime<Utc>,
}

/// Process-wide strategy store
pub struct LearningCenter {
    strategies: DashMap<StrategyKey, Strategy>,
    metrics: Arc<MetricsCenter>,
    config: LearningConfig,
}

impl LearningCenter {
    pub fn new(metrics: Arc<MetricsCenter>, config: LearningConfig) -> Self {
        Self {
            strategies: DashMap::new(),
            metrics,
            config,
        }
    }

    /// Fold one resolution outcome into the strategy table
    ///
    /// Success reinforces (bounded at 100), failure decays; entries
    /// decayed below the floor are evicted and the list stays capped.
    pub fn record_experience(
        &self,
        domain: &str,
        kind: ElementKind,
        locator: &Locator,
        success: bool,
    ) {
        let key = StrategyKey {
            domain: domain.to_string(),
            kind,
        };
        let mut strategy = self.strategies.entry(key).or_default();
        let now = Utc::now();
        let cache_key = locator.cache_key();

        match strategy
            .entries
            .iter_mut()
            .find(|entry| entry.locator.cache_key() == cache_key)
        {
            Some(entry) => {
                if success {
                    entry.confidence += (100.0 - entry.confidence) * self.config.reinforce_rate;
                    entry.confidence = entry.confidence.min(100.0);
                } else {
                    entry.confidence *= self.config.decay_factor;
                }
                entry.last_used_at = now;
            }
            None if success => {
                strategy.entries.push(RankedLocator {
                    locator: locator.clone(),
                    confidence: self.config.initial_confidence,
                    last_used_at: now,
                });
            }
            // A failure for an unknown locator teaches nothing worth keeping
            None => {}
        }

        strategy
            .entries
            .retain(|entry| entry.confidence >= self.config.confidence_floor);
        strategy.entries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        strategy.entries.truncate(self.config.max_locators);
        strategy.updated_at = Some(now);

        debug!(
            domain,
            kind = kind.name(),
            locator = %locator,
            success,
            entries = strategy.entries.len(),
            "recorded learning experience"
        );
    }

    /// Best known locators for this context, confidence-ordered
    ///
    /// Serves the learned strategy when one exists with structurally
    /// well-formed locators; otherwise generalizes across domains
    /// through the metrics store's top entries for the same kind.
    pub fn best_locators_for(&self, domain: &str, kind: ElementKind) -> Vec<Locator> {
        let key = StrategyKey {
            domain: domain.to_string(),
            kind,
        };
        if let Some(strategy) = self.strategies.get(&key) {
            let locators: Vec<Locator> = strategy
                .entries
                .iter()
                .filter(|entry| entry.locator.is_well_formed())
                .map(|entry| entry.locator.clone())
                .collect();
            if !locators.is_empty() {
                return locators;
            }
        }

        // Cross-domain generalization: what works for this kind elsewhere
        let fallback: Vec<Locator> = self
            .metrics
            .top_by_reliability(Some(kind), None, self.config.max_locators)
            .into_iter()
            .map(|(_, metric)| metric.locator)
            .filter(|locator| locator.is_well_formed())
            .collect();
        if !fallback.is_empty() {
            debug!(
                domain,
                kind = kind.name(),
                count = fallback.len(),
                "serving cross-domain locators"
            );
        }
        fallback
    }

    /// Current strategy for a (domain, kind), if any
    pub fn strategy(&self, domain: &str, kind: ElementKind) -> Option<Strategy> {
        self.strategies
            .get(&StrategyKey {
                domain: domain.to_string(),
                kind,
            })
            .map(|entry| entry.clone())
    }

    /// Rebuild every strategy from the metrics store
    ///
    /// Strategies are derived, never authoritative: this restores the
    /// table from durable counters alone.
    pub fn rebuild_from_metrics(&self) {
        self.strategies.clear();
        let now = Utc::now();
        for (key, metric) in self.metrics.snapshot().entries {
            if metric.reliability < self.config.rebuild_min_reliability {
                continue;
            }
            let strategy_key = StrategyKey {
                domain: key.domain,
                kind: key.kind,
            };
            let mut strategy = self.strategies.entry(strategy_key).or_default();
            strategy.entries.push(RankedLocator {
                locator: metric.locator.clone(),
                confidence: metric.reliability * 100.0,
                last_used_at: now,
            });
            strategy.entries.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            strategy.entries.truncate(self.config.max_locators);
            strategy.updated_at = Some(now);
        }
    }

    pub fn snapshot(&self) -> LearningSnapshot {
        LearningSnapshot {
            strategies: self
                .strategies
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            taken_at: Utc::now(),
        }
    }

    pub fn reset(&self) {
        self.strategies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_center::{MetricsConfig, Outcome};

    fn center() -> LearningCenter {
        LearningCenter::new(
            Arc::new(MetricsCenter::new(MetricsConfig::default())),
            LearningConfig::default(),
        )
    }

    fn css(selector: &str) -> Locator {
        Locator::Css(selector.into())
    }

    #[test]
    fn test_success_learns_and_reinforces() {
        let learning = center();
        learning.record_experience("example.com", ElementKind::Button, &css("#submit"), true);

        let strategy = learning
            .strategy("example.com", ElementKind::Button)
            .unwrap();
        assert_eq!(strategy.entries.len(), 1);
        let initial = strategy.entries[0].confidence;

        for _ in 0..50 {
            learning.record_experience("example.com", ElementKind::Button, &css("#submit"), true);
        }
        let strategy = learning
            .strategy("example.com", ElementKind::Button)
            .unwrap();
        let reinforced = strategy.entries[0].confidence;
        assert!(reinforced > initial);
        assert!(reinforced <= 100.0);
    }

    #[test]
    fn test_failure_decays_and_evicts() {
        let learning = center();
        learning.record_experience("example.com", ElementKind::Button, &css("#submit"), true);

        for _ in 0..12 {
            learning.record_experience("example.com", ElementKind::Button, &css("#submit"), false);
        }
        // 55 * 0.7^12 is far below the floor of 5
        let strategy = learning
            .strategy("example.com", ElementKind::Button)
            .unwrap();
        assert!(strategy.entries.is_empty());
    }

    #[test]
    fn test_strategy_cap() {
        let learning = center();
        for i in 0..20 {
            learning.record_experience(
                "example.com",
                ElementKind::Button,
                &css(&format!("#button-{i}")),
                true,
            );
        }
        let strategy = learning
            .strategy("example.com", ElementKind::Button)
            .unwrap();
        assert_eq!(strategy.entries.len(), LearningConfig::default().max_locators);
    }

    #[test]
    fn test_best_locators_are_confidence_ordered() {
        let learning = center();
        learning.record_experience("example.com", ElementKind::Button, &css("#weak"), true);
        for _ in 0..10 {
            learning.record_experience("example.com", ElementKind::Button, &css("#strong"), true);
        }

        let best = learning.best_locators_for("example.com", ElementKind::Button);
        assert_eq!(best[0], css("#strong"));
        assert_eq!(best[1], css("#weak"));
    }

    #[test]
    fn test_malformed_learned_locators_are_not_served() {
        let learning = center();
        learning.record_experience(
            "example.com",
            ElementKind::Button,
            &css("button[broken"),
            true,
        );
        assert!(learning
            .best_locators_for("example.com", ElementKind::Button)
            .is_empty());
    }

    #[test]
    fn test_cross_domain_generalization() {
        let metrics = Arc::new(MetricsCenter::new(MetricsConfig::default()));
        let learning = LearningCenter::new(metrics.clone(), LearningConfig::default());

        // Another domain has a proven button locator
        for _ in 0..8 {
            metrics.record_outcome(
                "other.com",
                ElementKind::Button,
                &css("[data-testid=\"submit\"]"),
                Outcome {
                    success: true,
                    latency_ms: 50.0,
                    match_count: 1,
                },
            );
        }

        let best = learning.best_locators_for("fresh.com", ElementKind::Button);
        assert_eq!(best, vec![css("[data-testid=\"submit\"]")]);

        // Nothing known for a different kind
        assert!(learning
            .best_locators_for("fresh.com", ElementKind::Link)
            .is_empty());
    }

    #[test]
    fn test_rebuild_from_metrics() {
        let metrics = Arc::new(MetricsCenter::new(MetricsConfig::default()));
        let learning = LearningCenter::new(metrics.clone(), LearningConfig::default());

        for _ in 0..16 {
            metrics.record_outcome(
                "example.com",
                ElementKind::Button,
                &css("#submit"),
                Outcome {
                    success: true,
                    latency_ms: 50.0,
                    match_count: 1,
                },
            );
        }
        learning.record_experience("example.com", ElementKind::Button, &css("#submit"), true);
        learning.reset();
        assert!(learning
            .strategy("example.com", ElementKind::Button)
            .is_none());

        learning.rebuild_from_metrics();
        let strategy = learning
            .strategy("example.com", ElementKind::Button)
            .unwrap();
        assert_eq!(strategy.entries.len(), 1);
        assert_eq!(strategy.entries[0].locator, css("#submit"));
        assert!(strategy.confidence() > 0.0);
    }
}
