//! Selector evaluator

use dom_walker::LocatedElement;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wayfinder_core_types::{Locator, LocatorCandidate};

/// Evaluator tuning knobs
///
/// The numeric weightings are hand-tuned; they are configuration, not
/// constants, and behavior is pinned by scenario tests rather than by
/// the exact values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Quality before penalties and bonuses
    pub quality_baseline: f64,

    /// Penalty per element away from exactly one match
    pub match_penalty: f64,

    /// Scale applied to the family prior as a quality bonus
    pub family_bonus_scale: f64,

    /// Minimum quality for acceptance
    pub acceptance_threshold: f64,

    /// Weight of historical reliability when history exists (0-1)
    pub history_weight: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            quality_baseline: 60.0,
            match_penalty: 25.0,
            family_bonus_scale: 20.0,
            acceptance_threshold: 55.0,
            history_weight: 0.7,
        }
    }
}

/// Outcome of scoring one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorEvaluation {
    /// Structural quality of the candidate on this page (0-100)
    pub quality: f64,

    /// Trust in the candidate, history-blended and discounted for
    /// nested-context matches (0-100)
    pub confidence: f64,

    /// How close the match set is to a single element (0-100)
    pub uniqueness: f64,

    /// Number of elements matched
    pub match_count: usize,

    /// Accepted only when quality clears the threshold and exactly one
    /// element matched
    pub accepted: bool,

    /// Human-readable improvement hints
    pub recommendations: Vec<String>,
}

/// Scores candidates against live traversal results
#[derive(Debug, Clone, Default)]
pub struct SelectorEvaluator {
    config: EvalConfig,
}

impl SelectorEvaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    /// Evaluate a candidate given its matches and optional history
    ///
    /// `history_reliability` is the stored reliability score in [0,1]
    /// for this (locator, domain, kind), when one exists.
    pub fn evaluate(
        &self,
        candidate: &LocatorCandidate,
        matches: &[LocatedElement],
        history_reliability: Option<f64>,
    ) -> SelectorEvaluation {
        let match_count = matches.len();
        let distance = (match_count as f64 - 1.0).abs();

        let quality = (self.config.quality_baseline
            + candidate.family.prior_weight() * self.config.family_bonus_scale
            - distance * self.config.match_penalty)
            .clamp(0.0, 100.0);

        let uniqueness = match match_count {
            0 => 0.0,
            n => 100.0 / n as f64,
        };

        let structural = structural_confidence(&candidate.locator, candidate.family.prior_weight());
        let blended = match history_reliability {
            Some(reliability) => {
                let w = self.config.history_weight.clamp(0.0, 1.0);
                w * reliability.clamp(0.0, 1.0) * 100.0 + (1.0 - w) * structural
            }
            None => structural,
        };
        // A match found deeper than the document is worth less than the
        // same match at the top level.
        let discount = if matches.is_empty() {
            1.0
        } else {
            matches.iter().map(|m| m.discount).fold(0.0_f64, f64::max)
        };
        let confidence = (blended * discount).clamp(0.0, 100.0);

        let accepted = match_count == 1 && quality >= self.config.acceptance_threshold;
        let recommendations = recommendations(candidate, matches, quality, &self.config);

        debug!(
            locator = %candidate.locator,
            quality,
            confidence,
            match_count,
            accepted,
            "evaluated candidate"
        );

        SelectorEvaluation {
            quality,
            confidence,
            uniqueness,
            match_count,
            accepted,
            recommendations,
        }
    }
}

fn structural_confidence(locator: &Locator, prior: f64) -> f64 {
    let mut confidence = 30.0 + prior * 60.0;
    if let Locator::Css(selector) = locator {
        // Identifier and test-attribute syntax is the strongest signal
        // a page author left on purpose.
        if selector.starts_with('#') || selector.contains("[data-") {
            confidence += 5.0;
        }
    }
    confidence.clamp(0.0, 100.0)
}

fn recommendations(
    candidate: &LocatorCandidate,
    matches: &[LocatedElement],
    quality: f64,
    config: &EvalConfig,
) -> Vec<String> {
    let mut out = Vec::new();
    match matches.len() {
        0 => out.push("no elements matched; try a text or role fallback".to_string()),
        1 => {}
        n => out.push(format!("{n} elements matched; narrow the locator")),
    }
    if matches
        .iter()
        .any(|m| m.handle.has_hidden_attribute())
    {
        out.push("match set includes hidden elements; add a visibility filter".to_string());
    }
    if matches.iter().any(|m| m.location.depth > 0) {
        out.push("match found in a nested scope; prefer scoping the search".to_string());
    }
    if quality < config.acceptance_threshold && candidate.locator.has_hierarchy() {
        out.push("compound selector scored low; consider simplifying it".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::testkit::{FakeElement, FakePage};
    use wayfinder_core_types::{Locator, LocatorFamily};

    use dom_walker::{DomWalker, WalkerConfig};

    async fn located(page: &FakePage, locator: &Locator) -> Vec<LocatedElement> {
        DomWalker::new(page.driver(), WalkerConfig::default())
            .locate(locator)
            .await
            .unwrap()
    }

    fn candidate(selector: &str, family: LocatorFamily) -> LocatorCandidate {
        LocatorCandidate::new(Locator::Css(selector.into()), family)
    }

    #[tokio::test]
    async fn test_unique_match_is_accepted() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_attr("id", "submit"));

        let cand = candidate("#submit", LocatorFamily::Identifier);
        let matches = located(&page, &cand.locator).await;
        let eval = SelectorEvaluator::default().evaluate(&cand, &matches, None);

        assert!(eval.accepted);
        assert_eq!(eval.match_count, 1);
        assert_eq!(eval.uniqueness, 100.0);
        assert!(eval.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_two_matches_are_rejected() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_attr("type", "submit"));
        page.add_element(FakeElement::new("button").with_attr("type", "submit"));

        let cand = candidate("button[type=\"submit\"]", LocatorFamily::Attribute);
        let matches = located(&page, &cand.locator).await;
        let evaluator = SelectorEvaluator::default();
        let eval = evaluator.evaluate(&cand, &matches, None);

        assert_eq!(eval.match_count, 2);
        assert!(!eval.accepted);
        assert_eq!(eval.uniqueness, 50.0);
        assert!(eval.quality < EvalConfig::default().acceptance_threshold);
        assert!(eval
            .recommendations
            .iter()
            .any(|r| r.contains("narrow the locator")));
    }

    #[tokio::test]
    async fn test_zero_matches_are_rejected() {
        let cand = candidate("#missing", LocatorFamily::Identifier);
        let eval = SelectorEvaluator::default().evaluate(&cand, &[], None);
        assert!(!eval.accepted);
        assert_eq!(eval.uniqueness, 0.0);
    }

    #[tokio::test]
    async fn test_history_raises_confidence() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_attr("id", "submit"));
        let cand = candidate("#submit", LocatorFamily::Identifier);
        let matches = located(&page, &cand.locator).await;

        let evaluator = SelectorEvaluator::default();
        let cold = evaluator.evaluate(&cand, &matches, None);
        let proven = evaluator.evaluate(&cand, &matches, Some(0.98));
        let burned = evaluator.evaluate(&cand, &matches, Some(0.05));

        assert!(proven.confidence > cold.confidence);
        assert!(burned.confidence < cold.confidence);
    }

    #[tokio::test]
    async fn test_nested_match_confidence_is_discounted() {
        let document_page = FakePage::new();
        document_page.add_element(FakeElement::new("button").with_text("Pay"));

        let framed_page = FakePage::new();
        let frame = framed_page.add_iframe("iframe#pay", true);
        frame.add_element(FakeElement::new("button").with_text("Pay"));

        let cand = candidate("button", LocatorFamily::Positional);
        let evaluator = SelectorEvaluator::default();

        let doc_eval =
            evaluator.evaluate(&cand, &located(&document_page, &cand.locator).await, None);
        let frame_eval =
            evaluator.evaluate(&cand, &located(&framed_page, &cand.locator).await, None);

        assert!(frame_eval.confidence < doc_eval.confidence);
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_attr("id", "submit"));
        let cand = candidate("#submit", LocatorFamily::Identifier);
        let matches = located(&page, &cand.locator).await;

        let evaluator = SelectorEvaluator::default();
        let first = evaluator.evaluate(&cand, &matches, Some(0.8));
        let second = evaluator.evaluate(&cand, &matches, Some(0.8));
        assert_eq!(first, second);
    }
}
