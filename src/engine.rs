//! Resolve orchestrator
//!
//! One resolve-and-learn cycle: learned locators first, then freshly
//! generated candidates, each validated against the live page; on
//! exhaustion the page is scanned for obstructions and the recovery
//! chain proposes fallbacks. Every terminal transition records its
//! outcome exactly once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use candidate_gen::CandidateGenerator;
use challenge_watch::{Challenge, ChallengeWatch};
use dom_walker::{DomWalker, WalkError};
use learning_center::LearningCenter;
use metrics_center::{MetricsCenter, Outcome};
use page_port::PageDriver;
use recovery_chain::{
    ProbeVerdict, ProposalProber, RecoveryChain, RecoveryContext, RecoveryOutcome,
};
use selector_eval::SelectorEvaluator;
use wayfinder_core_types::{
    DomLocation, ElementDescriptor, ElementKind, Locator, LocatorCandidate, LocatorFamily,
    ResolveErrorKind, TextMatch,
};

use crate::config::EngineConfig;
use crate::errors::ResolveFailure;
use crate::report::{alerts_from, EngineReport, LocatorSummary};

/// How the winning locator was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySource {
    /// Served from the learning store
    Learned,
    /// Freshly generated from the descriptor
    Generated,
    /// Proposed by the named recovery tactic
    Recovered(String),
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Override of the configured total budget
    pub budget: Option<Duration>,

    /// Cancellation token of the owning task
    pub cancel: Option<CancellationToken>,
}

/// Successful resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResult {
    /// The locator that validated
    pub locator: Locator,

    /// Where the element was found
    pub location: DomLocation,

    /// Final confidence (0-100), nested-context discount applied
    pub confidence: f64,

    pub strategy_used: StrategySource,

    /// Locate attempts made, recovery included
    pub attempts: u32,

    pub elapsed_ms: u64,
}

/// The element-resolution engine
///
/// Owns its stores for the process lifetime. Construct one per process
/// (or share metrics/learning across engines via `with_shared_state`);
/// sessions issue resolve calls sequentially against their own page.
pub struct ResolveEngine {
    driver: Arc<dyn PageDriver>,
    walker: DomWalker,
    generator: CandidateGenerator,
    evaluator: SelectorEvaluator,
    metrics: Arc<MetricsCenter>,
    learning: Arc<LearningCenter>,
    challenges: ChallengeWatch,
    recovery: RecoveryChain,
    config: EngineConfig,
}

impl ResolveEngine {
    /// Create an engine owning fresh state
    pub fn new(driver: Arc<dyn PageDriver>, config: EngineConfig) -> Self {
        let metrics = Arc::new(MetricsCenter::new(config.metrics.clone()));
        let learning = Arc::new(LearningCenter::new(metrics.clone(), config.learning.clone()));
        Self::with_shared_state(driver, config, metrics, learning)
    }

    /// Create an engine sharing metrics/learning with other sessions
    ///
    /// The stores serialize per-key updates internally, so engines on
    /// different pages can share them safely.
    pub fn with_shared_state(
        driver: Arc<dyn PageDriver>,
        config: EngineConfig,
        metrics: Arc<MetricsCenter>,
        learning: Arc<LearningCenter>,
    ) -> Self {
        Self {
            walker: DomWalker::new(driver.clone(), config.walker.clone()),
            generator: CandidateGenerator::new(config.generator.clone()),
            evaluator: SelectorEvaluator::new(config.evaluator.clone()),
            challenges: ChallengeWatch::new(config.challenges.clone()),
            recovery: RecoveryChain::new(config.recovery.clone()),
            driver,
            metrics,
            learning,
            config,
        }
    }

    pub fn metrics(&self) -> Arc<MetricsCenter> {
        self.metrics.clone()
    }

    pub fn learning(&self) -> Arc<LearningCenter> {
        self.learning.clone()
    }

    /// Resolve a descriptor to a currently-valid locator
    ///
    /// Bounded by the call budget; cancellation of the owning task
    /// propagates into traversal and recovery. The outcome, success or
    /// not, is folded into the metrics and learning stores.
    pub async fn resolve(
        &self,
        descriptor: &ElementDescriptor,
        options: ResolveOptions,
    ) -> Result<ResolveResult, ResolveFailure> {
        let started = Instant::now();
        let budget = options
            .budget
            .unwrap_or(Duration::from_millis(self.config.resolve.budget_ms));
        let cancel = options.cancel.unwrap_or_default();
        let attempts = AtomicU32::new(0);
        let primary: Mutex<Option<Locator>> = Mutex::new(None);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(InnerFailure {
                kind: ResolveErrorKind::Timeout,
                message: "cancelled".into(),
            }),
            result = timeout(
                budget,
                self.resolve_inner(descriptor, &cancel, &attempts, &primary),
            ) => match result {
                Ok(inner) => inner,
                Err(_) => Err(InnerFailure {
                    kind: ResolveErrorKind::Timeout,
                    message: format!("resolve budget of {}ms elapsed", budget.as_millis()),
                }),
            },
        };

        let attempts = attempts.load(Ordering::SeqCst);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // Terminal transition: exactly one learning write per resolve
        match outcome {
            Ok(resolved) => {
                self.learning.record_experience(
                    &descriptor.domain,
                    descriptor.kind,
                    &resolved.locator,
                    true,
                );
                info!(
                    locator = %resolved.locator,
                    confidence = resolved.confidence,
                    attempts,
                    elapsed_ms,
                    "resolved element"
                );
                Ok(ResolveResult {
                    locator: resolved.locator,
                    location: resolved.location,
                    confidence: resolved.confidence,
                    strategy_used: resolved.strategy_used,
                    attempts,
                    elapsed_ms,
                })
            }
            Err(failure) => {
                if let Some(locator) = primary.lock().clone() {
                    self.learning.record_experience(
                        &descriptor.domain,
                        descriptor.kind,
                        &locator,
                        false,
                    );
                }
                warn!(
                    kind = %failure.kind,
                    attempts,
                    elapsed_ms,
                    "resolve failed terminally"
                );
                Err(ResolveFailure {
                    kind: failure.kind,
                    attempts,
                    elapsed_ms,
                    message: failure.message,
                })
            }
        }
    }

    async fn resolve_inner(
        &self,
        descriptor: &ElementDescriptor,
        cancel: &CancellationToken,
        attempts: &AtomicU32,
        primary: &Mutex<Option<Locator>>,
    ) -> Result<Resolved, InnerFailure> {
        let domain = descriptor.domain.as_str();
        let kind = descriptor.kind;

        // Seeking: learned locators first, then fresh candidates
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: Vec<(LocatorCandidate, StrategySource)> = Vec::new();
        for locator in self.learning.best_locators_for(domain, kind) {
            if seen.insert(locator.cache_key()) {
                let family = family_of(&locator);
                queue.push((
                    LocatorCandidate::new(locator, family),
                    StrategySource::Learned,
                ));
            }
        }
        for candidate in self.generator.generate(descriptor) {
            if seen.insert(candidate.locator.cache_key()) {
                queue.push((candidate, StrategySource::Generated));
            }
        }

        if queue.is_empty() {
            return Err(InnerFailure {
                kind: ResolveErrorKind::NotFound,
                message: "descriptor carries no usable hints and nothing is learned".into(),
            });
        }
        *primary.lock() = Some(queue[0].0.locator.clone());

        let mut first_error = None;
        let mut max_match_count = 0usize;
        let mut hidden_matches = 0usize;

        for (candidate, source) in &queue {
            if cancel.is_cancelled() {
                return Err(InnerFailure {
                    kind: ResolveErrorKind::Timeout,
                    message: "cancelled".into(),
                });
            }
            attempts.fetch_add(1, Ordering::SeqCst);
            let report = self.probe_candidate(domain, kind, candidate).await;
            if report.accepted {
                return Ok(Resolved {
                    locator: candidate.locator.clone(),
                    location: report.location.unwrap_or_else(DomLocation::document),
                    confidence: report.confidence,
                    strategy_used: source.clone(),
                });
            }
            if first_error.is_none() {
                first_error = report.error;
            }
            max_match_count = max_match_count.max(report.match_count);
            hidden_matches = hidden_matches.max(report.hidden);
        }

        // Recovering: classify the page, then walk the fallback chain
        let error = first_error.unwrap_or(ResolveErrorKind::NotFound);
        info!(
            candidates = queue.len(),
            error = %error,
            "candidates exhausted; entering recovery"
        );
        let challenges = self.challenges.scan(&self.driver, Some(domain)).await;
        let context = RecoveryContext {
            descriptor: descriptor.clone(),
            failed_locator: queue[0].0.locator.clone(),
            error,
            match_count: max_match_count,
            hidden_matches,
            prior_attempts: attempts.load(Ordering::SeqCst),
            challenges: challenges.iter().map(|c| c.kind).collect(),
        };
        let prober = EngineProber {
            engine: self,
            domain: domain.to_string(),
            kind,
        };

        match self.recovery.run(&context, &prober, cancel).await {
            RecoveryOutcome::Recovered {
                locator,
                tactic,
                confidence,
                location,
                attempts: recovery_attempts,
            } => {
                attempts.fetch_add(recovery_attempts, Ordering::SeqCst);
                Ok(Resolved {
                    locator,
                    location,
                    confidence,
                    strategy_used: StrategySource::Recovered(tactic.to_string()),
                })
            }
            RecoveryOutcome::Exhausted {
                attempts: recovery_attempts,
            } => {
                attempts.fetch_add(recovery_attempts, Ordering::SeqCst);
                Err(InnerFailure {
                    kind: error,
                    message: "candidates and recovery tactics exhausted".into(),
                })
            }
            RecoveryOutcome::Aborted {
                reason,
                attempts: recovery_attempts,
            } => {
                attempts.fetch_add(recovery_attempts, Ordering::SeqCst);
                Err(InnerFailure {
                    kind: ResolveErrorKind::Timeout,
                    message: reason,
                })
            }
        }
    }

    /// Validate one candidate against the live page
    ///
    /// Traversal, evaluation (history-blended), and a liveness check on
    /// the single match; the outcome is recorded to metrics so failure
    /// data improves future ranking too.
    async fn probe_candidate(
        &self,
        domain: &str,
        kind: ElementKind,
        candidate: &LocatorCandidate,
    ) -> ProbeReport {
        let started = Instant::now();

        let matches = match self.walker.locate(&candidate.locator).await {
            Ok(matches) => matches,
            Err(WalkError::Malformed(reason)) => {
                debug!(locator = %candidate.locator, reason, "malformed candidate");
                self.record(domain, kind, candidate, false, started, 0);
                return ProbeReport::failed(ResolveErrorKind::MalformedLocator);
            }
            Err(WalkError::Driver(reason)) => {
                warn!(locator = %candidate.locator, reason, "traversal failed");
                self.record(domain, kind, candidate, false, started, 0);
                return ProbeReport::failed(ResolveErrorKind::NotFound);
            }
        };

        let history = self
            .metrics
            .get(domain, kind, &candidate.locator)
            .map(|metric| metric.reliability);
        let evaluation = self.evaluator.evaluate(candidate, &matches, history);
        let hidden = matches
            .iter()
            .filter(|m| m.handle.has_hidden_attribute())
            .count();

        let mut accepted = evaluation.accepted;
        let mut error = match matches.len() {
            0 => Some(ResolveErrorKind::NotFound),
            1 if accepted => None,
            1 => Some(ResolveErrorKind::NotFound),
            _ => Some(ResolveErrorKind::AmbiguousMatch),
        };

        if accepted {
            let best = &matches[0];
            match best.scope.is_visible(&best.handle).await {
                Ok(false) => {
                    accepted = false;
                    error = Some(ResolveErrorKind::NotVisible);
                }
                Ok(true) => {}
                Err(err) => warn!(error = %err, "visibility check unavailable"),
            }
        }
        if accepted {
            let best = &matches[0];
            match best.scope.is_enabled(&best.handle).await {
                Ok(false) => {
                    accepted = false;
                    error = Some(ResolveErrorKind::NotInteractable);
                }
                Ok(true) => {}
                Err(err) => warn!(error = %err, "enablement check unavailable"),
            }
        }

        self.record(domain, kind, candidate, accepted, started, matches.len());

        ProbeReport {
            accepted,
            confidence: evaluation.confidence,
            location: matches.first().map(|m| m.location.clone()),
            match_count: matches.len(),
            hidden,
            error,
        }
    }

    fn record(
        &self,
        domain: &str,
        kind: ElementKind,
        candidate: &LocatorCandidate,
        success: bool,
        started: Instant,
        match_count: usize,
    ) {
        self.metrics.record_outcome(
            domain,
            kind,
            &candidate.locator,
            Outcome {
                success,
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                match_count,
            },
        );
    }

    /// Scan the current page for obstructions
    pub async fn challenge_scan(&self, expected_host: Option<&str>) -> Vec<Challenge> {
        self.challenges.scan(&self.driver, expected_host).await
    }

    /// Observability report, optionally narrowed to one domain
    pub fn report(&self, domain: Option<&str>) -> EngineReport {
        let limit = self.config.resolve.report_limit;
        let top_locators: Vec<LocatorSummary> = self
            .metrics
            .top_by_reliability(None, domain, limit)
            .into_iter()
            .map(|(key, metric)| LocatorSummary::from_entry(key, metric))
            .collect();
        let weak_locators: Vec<LocatorSummary> = self
            .metrics
            .weak_entries(domain, limit)
            .into_iter()
            .map(|(key, metric)| LocatorSummary::from_entry(key, metric))
            .collect();
        let history = self.challenges.history();
        let alerts = alerts_from(&weak_locators, &history);

        EngineReport {
            domain: domain.map(str::to_string),
            top_locators,
            weak_locators,
            challenge_trends: self.challenges.trend(),
            tactic_stats: self.recovery.tactic_stats(),
            alerts,
            generated_at: chrono::Utc::now(),
        }
    }

    /// Clear all learned state (test isolation only)
    pub fn reset(&self) {
        self.metrics.reset();
        self.learning.reset();
        self.challenges.reset();
        self.recovery.reset();
    }
}

struct Resolved {
    locator: Locator,
    location: DomLocation,
    confidence: f64,
    strategy_used: StrategySource,
}

struct InnerFailure {
    kind: ResolveErrorKind,
    message: String,
}

struct ProbeReport {
    accepted: bool,
    confidence: f64,
    location: Option<DomLocation>,
    match_count: usize,
    hidden: usize,
    error: Option<ResolveErrorKind>,
}

impl ProbeReport {
    fn failed(kind: ResolveErrorKind) -> Self {
        Self {
            accepted: false,
            confidence: 0.0,
            location: None,
            match_count: 0,
            hidden: 0,
            error: Some(kind),
        }
    }
}

struct EngineProber<'a> {
    engine: &'a ResolveEngine,
    domain: String,
    kind: ElementKind,
}

#[async_trait]
impl ProposalProber for EngineProber<'_> {
    async fn probe(&self, locator: &Locator) -> ProbeVerdict {
        let candidate = LocatorCandidate::new(locator.clone(), family_of(locator));
        let report = self
            .engine
            .probe_candidate(&self.domain, self.kind, &candidate)
            .await;
        ProbeVerdict {
            accepted: report.accepted,
            confidence: report.confidence,
            location: report.location,
        }
    }
}

/// Infer the generation family of a locator that arrived without one
/// (learned entries, recovery proposals)
fn family_of(locator: &Locator) -> LocatorFamily {
    match locator {
        Locator::Css(selector) if selector.starts_with('#') => LocatorFamily::Identifier,
        Locator::Css(selector) if selector.contains("[data-") => LocatorFamily::TestAttribute,
        Locator::Css(selector) if selector.contains(":nth-of-type") => LocatorFamily::Positional,
        Locator::Css(_) => LocatorFamily::Attribute,
        Locator::Text { mode, .. } => match mode {
            TextMatch::Exact => LocatorFamily::TextExact,
            TextMatch::Normalized => LocatorFamily::TextNormalized,
            TextMatch::Contains => LocatorFamily::TextContains,
        },
        Locator::Role { .. } => LocatorFamily::Role,
        Locator::Labelled(_) => LocatorFamily::Proximity,
    }
}
