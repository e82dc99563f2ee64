//! Engine configuration
//!
//! Every hand-tuned weight in the engine lives here rather than in the
//! code. Values layer in the usual order: built-in defaults, then an
//! optional config file, then `WAYFINDER_`-prefixed environment
//! variables (e.g. `WAYFINDER_RESOLVE__BUDGET_MS=30000`).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use candidate_gen::GeneratorConfig;
use challenge_watch::ChallengeConfig;
use dom_walker::WalkerConfig;
use learning_center::LearningConfig;
use metrics_center::MetricsConfig;
use recovery_chain::RecoveryConfig;
use selector_eval::EvalConfig;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolve: ResolveConfig,
    pub generator: GeneratorConfig,
    pub walker: WalkerConfig,
    pub evaluator: EvalConfig,
    pub metrics: MetricsConfig,
    pub learning: LearningConfig,
    pub challenges: ChallengeConfig,
    pub recovery: RecoveryConfig,
}

/// Orchestrator-level knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Total wall-clock budget for one resolve call
    pub budget_ms: u64,

    /// Entries shown per section of the observability report
    pub report_limit: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            budget_ms: 15_000,
            report_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Load layered configuration
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&EngineConfig::default())
                .context("failed to serialize default configuration")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("WAYFINDER")
                .separator("__")
                .try_parsing(true),
        );
        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_sources() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.resolve.budget_ms, 15_000);
        assert_eq!(config.walker.max_depth, 3);
        assert_eq!(config.generator.max_candidates, 10);
        assert_eq!(config.learning.max_locators, 8);
    }

    #[test]
    fn test_default_weights_are_sane() {
        let config = EngineConfig::default();
        let weights = config.metrics.weight_success
            + config.metrics.weight_uniqueness
            + config.metrics.weight_stability;
        assert!((weights - 1.0).abs() < 1e-9);
        assert!(config.evaluator.acceptance_threshold < 100.0);
        assert!(config.recovery.total_budget_ms < config.resolve.budget_ms);
    }
}
