//! Observability report, reset and learned-state reconstruction

use page_port::testkit::{FakeElement, FakePage};
use wayfinder::{
    ElementDescriptor, ElementKind, EngineConfig, Locator, ResolveEngine, ResolveOptions,
};

fn engine_for(page: &FakePage) -> ResolveEngine {
    wayfinder::init_telemetry();
    ResolveEngine::new(page.driver(), EngineConfig::default())
}

#[tokio::test]
async fn report_surfaces_top_and_weak_locators() {
    let page = FakePage::new();
    page.add_element(FakeElement::new("button").with_attr("id", "submit").with_text("Submit"));

    let engine = engine_for(&page);
    let good = ElementDescriptor::new("example.com", ElementKind::Button)
        .with_attribute("id", "submit");
    let doomed = ElementDescriptor::new("example.com", ElementKind::Link)
        .with_attribute("id", "retired-link");

    for _ in 0..4 {
        engine.resolve(&good, ResolveOptions::default()).await.unwrap();
        let _ = engine.resolve(&doomed, ResolveOptions::default()).await;
    }

    let report = engine.report(Some("example.com"));
    assert!(!report.top_locators.is_empty());
    assert_eq!(report.top_locators[0].locator_key, "css:#submit");
    assert!(report.top_locators[0].reliability > 0.5);

    assert!(report
        .weak_locators
        .iter()
        .any(|summary| summary.locator_key == "css:#retired-link"));
    assert!(report
        .alerts
        .iter()
        .any(|alert| alert.contains("below the reliability threshold")));

    // Filtering by an unknown domain empties the tables
    let other = engine.report(Some("nowhere.example"));
    assert!(other.top_locators.is_empty());
    assert!(other.weak_locators.is_empty());
}

#[tokio::test]
async fn report_carries_challenge_trends_and_alerts() {
    let page = FakePage::new();
    page.add_element(FakeElement::new("p").with_text("Please verify you are human"));

    let engine = engine_for(&page);
    engine.challenge_scan(Some("example.com")).await;

    let report = engine.report(None);
    assert_eq!(report.challenge_trends.get("captcha"), Some(&1));
    assert!(report
        .alerts
        .iter()
        .any(|alert| alert.contains("captcha")));

    // Reports are plain data for whatever dashboard consumes them
    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("challenge_trends").is_some());
}

#[tokio::test]
async fn report_includes_tactic_stats_after_recovery() {
    let page = FakePage::new();
    page.add_element(
        FakeElement::new("div")
            .with_child(
                FakeElement::new("button")
                    .with_attr("type", "submit")
                    .with_text("Old")
                    .hidden(),
            )
            .with_child(
                FakeElement::new("button")
                    .with_attr("type", "submit")
                    .with_text("Save"),
            ),
    );

    let engine = engine_for(&page);
    let descriptor = ElementDescriptor::new("example.com", ElementKind::Button)
        .with_attribute("type", "submit");
    engine
        .resolve(&descriptor, ResolveOptions::default())
        .await
        .unwrap();

    let report = engine.report(None);
    let stats = report.tactic_stats.get("next-ranked-match").unwrap();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn reset_restores_a_blank_engine() {
    let page = FakePage::new();
    page.add_element(FakeElement::new("button").with_text("Submit"));

    let engine = engine_for(&page);
    let descriptor =
        ElementDescriptor::new("example.com", ElementKind::Button).with_text("Submit");
    engine
        .resolve(&descriptor, ResolveOptions::default())
        .await
        .unwrap();
    assert!(!engine.metrics().is_empty());

    engine.reset();
    assert!(engine.metrics().is_empty());
    assert!(engine
        .learning()
        .best_locators_for("example.com", ElementKind::Button)
        .is_empty());
    let report = engine.report(None);
    assert!(report.top_locators.is_empty());
    assert!(report.challenge_trends.is_empty());
}

/// Strategies are derived state: wiping them and rebuilding from the
/// metrics store restores the learned ranking.
#[tokio::test]
async fn strategies_rebuild_from_metrics() {
    let page = FakePage::new();
    page.add_element(FakeElement::new("button").with_attr("id", "submit").with_text("Submit"));

    let engine = engine_for(&page);
    let descriptor = ElementDescriptor::new("example.com", ElementKind::Button)
        .with_attribute("id", "submit");
    for _ in 0..16 {
        engine
            .resolve(&descriptor, ResolveOptions::default())
            .await
            .unwrap();
    }

    engine.learning().reset();
    assert!(engine
        .learning()
        .best_locators_for("example.com", ElementKind::Button)
        .is_empty());

    engine.learning().rebuild_from_metrics();
    let served = engine
        .learning()
        .best_locators_for("example.com", ElementKind::Button);
    assert_eq!(served[0], Locator::Css("#submit".into()));
}
