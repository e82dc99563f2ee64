//! Wayfinder - adaptive element resolution for browser automation
//!
//! Given an abstract description of a target UI element, the engine
//! returns a concrete, currently-valid locator despite markup drift,
//! asynchronous loading, iframes and shadow-encapsulated components.
//! Every outcome feeds a process-local learning loop, and a recovery
//! chain of ordered fallback tactics heals resolutions that stop
//! working.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayfinder::{
//!     ElementDescriptor, ElementKind, EngineConfig, ResolveEngine, ResolveOptions,
//! };
//! # async fn example(driver: Arc<dyn wayfinder::PageDriver>) -> anyhow::Result<()> {
//! let engine = ResolveEngine::new(driver, EngineConfig::default());
//! let descriptor = ElementDescriptor::new("example.com", ElementKind::Button)
//!     .with_text("Submit");
//! let result = engine.resolve(&descriptor, ResolveOptions::default()).await?;
//! println!("resolved via {} at {:?}", result.locator, result.location.context);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod report;
pub mod telemetry;

pub use config::{EngineConfig, ResolveConfig};
pub use engine::{ResolveEngine, ResolveOptions, ResolveResult, StrategySource};
pub use errors::ResolveFailure;
pub use report::{EngineReport, LocatorSummary};
pub use telemetry::init_telemetry;

// The engine's vocabulary, re-exported for embedders
pub use wayfinder_core_types::{
    DomContext, DomLocation, ElementDescriptor, ElementKind, Locator, LocatorCandidate,
    LocatorFamily, ResolveErrorKind, TextMatch,
};

pub use candidate_gen::{CandidateGenerator, GeneratorConfig};
pub use challenge_watch::{Challenge, ChallengeConfig, ChallengeKind, ChallengeWatch, Severity};
pub use dom_walker::{DomWalker, LocatedElement, WalkerConfig};
pub use learning_center::{LearningCenter, LearningConfig, Strategy};
pub use metrics_center::{MetricsCenter, MetricsConfig, Outcome, SelectorMetric};
pub use page_port::{BoundingBox, DriverError, ElementHandle, PageDriver, ScopeKind, ScopeRef};
pub use recovery_chain::{RecoveryChain, RecoveryConfig, RecoveryContext, Tactic};
pub use selector_eval::{EvalConfig, SelectorEvaluation, SelectorEvaluator};
