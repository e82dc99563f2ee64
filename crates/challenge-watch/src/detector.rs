//! Best-effort obstruction probes

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use page_port::{DriverError, PageDriver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use wayfinder_core_types::Locator;

use crate::types::{Challenge, ChallengeKind};

/// Selectors that usually indicate a blocking overlay
const OVERLAY_SELECTORS: &[&str] = &[
    "[role=\"dialog\"]",
    "[role=\"alertdialog\"]",
    ".modal",
    ".overlay",
    ".popup",
];

/// Selectors for fields the page itself flags as invalid
const VALIDATION_SELECTORS: &[&str] = &["[aria-invalid=\"true\"]"];

/// Text fragments that betray a consent gate
const CONSENT_HINTS: &[&str] = &[
    "accept cookies",
    "accept all",
    "cookie preferences",
    "privacy choices",
    "we value your privacy",
];

/// Text fragments that betray a captcha or bot wall
const CAPTCHA_HINTS: &[&str] = &[
    "captcha",
    "verify you are human",
    "unusual traffic",
    "are you a robot",
];

/// Navigation latency in milliseconds since navigation start
const NAV_LATENCY_PROBE: &str = "performance.now() - performance.timing.navigationStart";

/// Visible page text sample for hint matching
const PAGE_TEXT_PROBE: &str = "document.body ? document.body.innerText.slice(0, 4000) : ''";

/// Detector tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Load latency above this is a slow-network challenge
    pub latency_threshold_ms: f64,

    /// Rolling history capacity
    pub history_capacity: usize,

    /// Default retry budget stamped onto new challenges
    pub max_retries: u32,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 4000.0,
            history_capacity: 64,
            max_retries: 3,
        }
    }
}

/// Page-level obstruction detector with a bounded rolling history
pub struct ChallengeWatch {
    config: ChallengeConfig,
    history: Mutex<VecDeque<Challenge>>,
}

impl ChallengeWatch {
    pub fn new(config: ChallengeConfig) -> Self {
        Self {
            config,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Scan the page for obstructions
    ///
    /// Every probe is isolated: a throwing probe is logged and skipped.
    /// Findings are ordered most-severe first and appended to the
    /// rolling history.
    pub async fn scan(
        &self,
        driver: &Arc<dyn PageDriver>,
        expected_host: Option<&str>,
    ) -> Vec<Challenge> {
        let mut found = Vec::new();

        self.run_probe("overlay", self.probe_overlays(driver), &mut found)
            .await;
        self.run_probe("page-text", self.probe_text_hints(driver), &mut found)
            .await;
        self.run_probe("disabled", self.probe_attribute(driver, "disabled"), &mut found)
            .await;
        self.run_probe("hidden", self.probe_attribute(driver, "hidden"), &mut found)
            .await;
        self.run_probe("validation", self.probe_validation(driver), &mut found)
            .await;
        self.run_probe("latency", self.probe_latency(driver), &mut found)
            .await;
        if let Some(host) = expected_host {
            self.run_probe("redirect", self.probe_redirect(driver, host), &mut found)
                .await;
        }

        found.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.remember(&found);
        found
    }

    async fn run_probe(
        &self,
        name: &str,
        probe: impl std::future::Future<Output = Result<Vec<Challenge>, DriverError>>,
        out: &mut Vec<Challenge>,
    ) {
        match probe.await {
            Ok(mut challenges) => out.append(&mut challenges),
            Err(err) => warn!(probe = name, error = %err, "challenge probe failed"),
        }
    }

    async fn probe_overlays(
        &self,
        driver: &Arc<dyn PageDriver>,
    ) -> Result<Vec<Challenge>, DriverError> {
        let mut found = Vec::new();
        for selector in OVERLAY_SELECTORS {
            let matches = driver
                .query_all(&Locator::Css((*selector).to_string()))
                .await?;
            let visible = matches
                .iter()
                .filter(|handle| !handle.has_hidden_attribute())
                .count();
            if visible > 0 {
                found.push(self.challenge(ChallengeKind::ModalOverlay, *selector));
                break;
            }
        }
        Ok(found)
    }

    async fn probe_text_hints(
        &self,
        driver: &Arc<dyn PageDriver>,
    ) -> Result<Vec<Challenge>, DriverError> {
        let sample = driver.evaluate(PAGE_TEXT_PROBE).await?;
        let text = sample.as_str().unwrap_or_default().to_lowercase();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        if let Some(hint) = CAPTCHA_HINTS.iter().find(|hint| text.contains(**hint)) {
            found.push(self.challenge(ChallengeKind::Captcha, *hint));
        }
        if let Some(hint) = CONSENT_HINTS.iter().find(|hint| text.contains(**hint)) {
            found.push(self.challenge(ChallengeKind::ConsentGate, *hint));
        }
        Ok(found)
    }

    async fn probe_attribute(
        &self,
        driver: &Arc<dyn PageDriver>,
        attribute: &str,
    ) -> Result<Vec<Challenge>, DriverError> {
        let selector = format!("[{attribute}]");
        let matches = driver.query_all(&Locator::Css(selector.clone())).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        let kind = if attribute == "disabled" {
            ChallengeKind::DisabledElement
        } else {
            ChallengeKind::HiddenElement
        };
        Ok(vec![self.challenge(
            kind,
            format!("{} elements match {selector}", matches.len()),
        )])
    }

    async fn probe_validation(
        &self,
        driver: &Arc<dyn PageDriver>,
    ) -> Result<Vec<Challenge>, DriverError> {
        for selector in VALIDATION_SELECTORS {
            let matches = driver
                .query_all(&Locator::Css((*selector).to_string()))
                .await?;
            if !matches.is_empty() {
                return Ok(vec![self.challenge(
                    ChallengeKind::ValidationError,
                    format!("{} invalid fields", matches.len()),
                )]);
            }
        }
        Ok(Vec::new())
    }

    async fn probe_latency(
        &self,
        driver: &Arc<dyn PageDriver>,
    ) -> Result<Vec<Challenge>, DriverError> {
        let value = driver.evaluate(NAV_LATENCY_PROBE).await?;
        let Some(latency) = value.as_f64() else {
            return Ok(Vec::new());
        };
        if latency > self.config.latency_threshold_ms {
            debug!(latency, "elevated page-load latency");
            return Ok(vec![self.challenge(
                ChallengeKind::SlowNetwork,
                format!("load latency {latency:.0}ms"),
            )]);
        }
        Ok(Vec::new())
    }

    async fn probe_redirect(
        &self,
        driver: &Arc<dyn PageDriver>,
        expected_host: &str,
    ) -> Result<Vec<Challenge>, DriverError> {
        let current = driver.current_url().await?;
        let Ok(url) = Url::parse(&current) else {
            return Ok(Vec::new());
        };
        let Some(host) = url.host_str() else {
            return Ok(Vec::new());
        };
        let expected = expected_host.trim_start_matches("www.");
        let actual = host.trim_start_matches("www.");
        if actual != expected && !actual.ends_with(&format!(".{expected}")) {
            return Ok(vec![self.challenge(
                ChallengeKind::UnexpectedRedirect,
                format!("expected {expected_host}, on {host}"),
            )]);
        }
        Ok(Vec::new())
    }

    fn challenge(&self, kind: ChallengeKind, note: impl Into<String>) -> Challenge {
        Challenge::new(kind, note, self.config.max_retries)
    }

    fn remember(&self, challenges: &[Challenge]) {
        let mut history = self.history.lock();
        for challenge in challenges {
            if history.len() == self.config.history_capacity {
                history.pop_front();
            }
            history.push_back(challenge.clone());
        }
    }

    /// Close a challenge after recovery consumed it
    pub fn mark_resolved(&self, id: &str) {
        let mut history = self.history.lock();
        if let Some(challenge) = history.iter_mut().find(|c| c.id == id) {
            challenge.resolved_at = Some(chrono::Utc::now());
        }
    }

    /// Detection counts per kind over the rolling history
    pub fn trend(&self) -> BTreeMap<String, usize> {
        let history = self.history.lock();
        let mut counts = BTreeMap::new();
        for challenge in history.iter() {
            *counts.entry(challenge.kind.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn history(&self) -> Vec<Challenge> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn reset(&self) {
        self.history.lock().clear();
    }
}

impl Default for ChallengeWatch {
    fn default() -> Self {
        Self::new(ChallengeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use page_port::testkit::{FakeElement, FakePage};

    #[tokio::test]
    async fn test_modal_overlay_detected() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("div").with_attr("role", "dialog").with_text("Sign up!"));

        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        assert!(found.iter().any(|c| c.kind == ChallengeKind::ModalOverlay));
    }

    #[tokio::test]
    async fn test_captcha_outranks_lesser_findings() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("p").with_text("Please verify you are human"));
        page.add_element(FakeElement::new("button").with_text("Go").disabled());

        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        assert!(found.len() >= 2);
        assert_eq!(found[0].kind, ChallengeKind::Captcha);
        assert_eq!(found[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_slow_network_detected() {
        let page = FakePage::new();
        page.set_load_time_ms(9000.0);

        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        assert!(found.iter().any(|c| c.kind == ChallengeKind::SlowNetwork));
    }

    #[tokio::test]
    async fn test_redirect_detected() {
        let page = FakePage::with_url("https://login.evil.example.net/verify");
        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), Some("example.com")).await;
        assert!(found
            .iter()
            .any(|c| c.kind == ChallengeKind::UnexpectedRedirect));

        let same = FakePage::with_url("https://app.example.com/checkout");
        let found = watch.scan(&same.driver(), Some("example.com")).await;
        assert!(found
            .iter()
            .all(|c| c.kind != ChallengeKind::UnexpectedRedirect));
    }

    #[tokio::test]
    async fn test_validation_error_detected() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("input").with_attr("aria-invalid", "true"));

        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        assert!(found
            .iter()
            .any(|c| c.kind == ChallengeKind::ValidationError));
    }

    #[tokio::test]
    async fn test_probe_failures_degrade_gracefully() {
        let page = FakePage::new();
        page.set_load_time_ms(9000.0);
        page.set_fail_queries(true);

        // Query probes fail, evaluate probes still report
        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        assert!(found.iter().any(|c| c.kind == ChallengeKind::SlowNetwork));
        assert!(found.iter().all(|c| c.kind != ChallengeKind::ModalOverlay));
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_trended() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("div").with_attr("role", "dialog").with_text("Modal"));

        let watch = ChallengeWatch::new(ChallengeConfig {
            history_capacity: 5,
            ..ChallengeConfig::default()
        });
        for _ in 0..12 {
            watch.scan(&page.driver(), None).await;
        }
        assert_eq!(watch.history().len(), 5);
        assert_eq!(watch.trend().get("modal-overlay"), Some(&5));
    }

    #[tokio::test]
    async fn test_mark_resolved() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("div").with_attr("role", "dialog").with_text("Modal"));

        let watch = ChallengeWatch::default();
        let found = watch.scan(&page.driver(), None).await;
        let id = found[0].id.clone();
        watch.mark_resolved(&id);
        assert!(watch
            .history()
            .iter()
            .find(|c| c.id == id)
            .unwrap()
            .is_resolved());
    }
}
