//! Breadth-first scope traversal with depth bound

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use page_port::{DriverError, ElementHandle, PageDriver, ScopeKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use wayfinder_core_types::{DomLocation, Locator};

/// Traversal error
///
/// Zero matches is a value, not an error; only malformed locators and
/// hard driver failures surface here.
#[derive(Debug, Error, Clone)]
pub enum WalkError {
    /// Driver rejected the locator expression
    #[error("malformed locator: {0}")]
    Malformed(String),

    /// Driver or page unavailable
    #[error("driver failure: {0}")]
    Driver(String),
}

impl From<DriverError> for WalkError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::InvalidSelector(reason) => WalkError::Malformed(reason),
            other => WalkError::Driver(other.to_string()),
        }
    }
}

/// Walker tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Maximum nesting depth below the main document
    pub max_depth: usize,

    /// Search shadow roots when the document has no match
    pub search_shadow: bool,

    /// Search same-origin frames when shadow search has no match
    pub search_frames: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            search_shadow: true,
            search_frames: true,
        }
    }
}

/// A match together with where it was found
#[derive(Clone)]
pub struct LocatedElement {
    /// The matched element
    pub handle: ElementHandle,

    /// Scope path to the match
    pub location: DomLocation,

    /// Accumulated confidence discount for the match's nesting (0-1]
    pub discount: f64,

    /// Driver for the scope the match lives in; liveness checks must go
    /// through this scope, not the root document
    pub scope: Arc<dyn PageDriver>,
}

impl fmt::Debug for LocatedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatedElement")
            .field("handle", &self.handle)
            .field("location", &self.location)
            .field("discount", &self.discount)
            .finish()
    }
}

/// Bounded traversal over a page and its nested scopes
pub struct DomWalker {
    root: Arc<dyn PageDriver>,
    config: WalkerConfig,
}

impl DomWalker {
    pub fn new(root: Arc<dyn PageDriver>, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Locate all matches for a candidate locator
    ///
    /// Main document first; on zero matches descend into shadow roots,
    /// then into same-origin frames, each bounded by `max_depth`.
    pub async fn locate(&self, locator: &Locator) -> Result<Vec<LocatedElement>, WalkError> {
        let document = self
            .query_scope(self.root.clone(), locator, DomLocation::document(), 1.0)
            .await?;
        if !document.is_empty() {
            return Ok(document);
        }

        if self.config.search_shadow {
            let matches = self.search_nested(locator, ScopeKind::ShadowRoot).await?;
            if !matches.is_empty() {
                return Ok(matches);
            }
        }

        if self.config.search_frames {
            return self.search_nested(locator, ScopeKind::Iframe).await;
        }

        Ok(Vec::new())
    }

    /// Breadth-first search through nested scopes of the given kind
    ///
    /// The frame pass also descends into shadow roots hosted inside
    /// frames; the shadow pass stays shadow-only (frame paths are the
    /// frame pass's job).
    async fn search_nested(
        &self,
        locator: &Locator,
        primary: ScopeKind,
    ) -> Result<Vec<LocatedElement>, WalkError> {
        let expand: &[ScopeKind] = match primary {
            ScopeKind::ShadowRoot => &[ScopeKind::ShadowRoot],
            ScopeKind::Iframe => &[ScopeKind::Iframe, ScopeKind::ShadowRoot],
        };

        let mut matches = Vec::new();
        let mut queue: VecDeque<(Arc<dyn PageDriver>, DomLocation, f64)> = VecDeque::new();
        self.enqueue_children(&self.root, &DomLocation::document(), 1.0, &[primary], &mut queue)
            .await;

        while let Some((driver, location, discount)) = queue.pop_front() {
            let found = self
                .query_scope(driver.clone(), locator, location.clone(), discount)
                .await?;
            matches.extend(found);

            if location.depth < self.config.max_depth {
                self.enqueue_children(&driver, &location, discount, expand, &mut queue)
                    .await;
            }
        }

        Ok(matches)
    }

    /// Enqueue searchable child scopes; denied or broken scopes are
    /// skipped, not reported.
    async fn enqueue_children(
        &self,
        driver: &Arc<dyn PageDriver>,
        location: &DomLocation,
        discount: f64,
        kinds: &[ScopeKind],
        queue: &mut VecDeque<(Arc<dyn PageDriver>, DomLocation, f64)>,
    ) {
        for kind in kinds {
            let scopes = match driver.child_scopes(*kind).await {
                Ok(scopes) => scopes,
                Err(err) => {
                    warn!(error = %err, "scope enumeration failed");
                    continue;
                }
            };
            for scope in scopes {
                match driver.enter_scope(&scope).await {
                    Ok(child) => {
                        let child_location = location.descend(kind.context(), scope.label.clone());
                        let child_discount = discount * kind.context().level_discount();
                        queue.push_back((child, child_location, child_discount));
                    }
                    Err(err) if err.is_access_denied() => {
                        debug!(scope = %scope.label, "cross-origin frame not searchable");
                    }
                    Err(err) => {
                        warn!(scope = %scope.label, error = %err, "scope entry failed");
                    }
                }
            }
        }
    }

    async fn query_scope(
        &self,
        driver: Arc<dyn PageDriver>,
        locator: &Locator,
        location: DomLocation,
        discount: f64,
    ) -> Result<Vec<LocatedElement>, WalkError> {
        let handles = driver.query_all(locator).await?;
        Ok(handles
            .into_iter()
            .map(|handle| LocatedElement {
                handle,
                location: location.clone(),
                discount,
                scope: driver.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::testkit::{FakeElement, FakePage};
    use wayfinder_core_types::DomContext;

    fn walker(page: &FakePage) -> DomWalker {
        DomWalker::new(page.driver(), WalkerConfig::default())
    }

    #[tokio::test]
    async fn test_document_match_has_no_discount() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_text("Submit"));

        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.context, DomContext::Document);
        assert_eq!(matches[0].discount, 1.0);
    }

    #[tokio::test]
    async fn test_shadow_match_is_discounted() {
        let page = FakePage::new();
        let shadow = page.add_shadow_root("widget-host");
        shadow.add_element(FakeElement::new("button").with_text("Submit"));

        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.context, DomContext::ShadowDom);
        assert_eq!(matches[0].location.depth, 1);
        assert!((matches[0].discount - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nested_iframe_discount_compounds() {
        let page = FakePage::new();
        let outer = page.add_iframe("iframe#outer", true);
        let inner = outer.add_iframe("iframe#inner", true);
        inner.add_element(FakeElement::new("button").with_text("Pay"));

        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.context, DomContext::Iframe);
        assert_eq!(matches[0].location.depth, 2);
        assert!((matches[0].discount - 0.85 * 0.85).abs() < 1e-9);
        assert_eq!(
            matches[0].location.path,
            vec!["iframe#outer", "iframe#inner"]
        );
    }

    #[tokio::test]
    async fn test_depth_bound_is_never_exceeded() {
        let page = FakePage::new();
        let mut scope = page.clone();
        for depth in 1..=10 {
            scope = scope.add_shadow_root(format!("host-{depth}"));
            if depth == 5 {
                scope.add_element(FakeElement::new("button").with_text("Deep"));
            }
        }

        // Element at depth 5 is beyond the default bound of 3
        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert!(matches.is_empty());

        // Raising the bound makes it reachable
        let deep_walker = DomWalker::new(
            page.driver(),
            WalkerConfig {
                max_depth: 6,
                ..WalkerConfig::default()
            },
        );
        let matches = deep_walker
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.depth, 5);
    }

    #[tokio::test]
    async fn test_cross_origin_frame_is_swallowed() {
        let page = FakePage::new();
        page.add_iframe("iframe[src=ads]", false);

        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_document_match_skips_nested_search() {
        let page = FakePage::new();
        page.add_element(FakeElement::new("button").with_text("Top"));
        let frame = page.add_iframe("iframe#dup", true);
        frame.add_element(FakeElement::new("button").with_text("Nested"));

        let matches = walker(&page)
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].handle.text, "Top");
    }

    #[tokio::test]
    async fn test_malformed_locator_is_an_error() {
        let page = FakePage::new();
        let result = walker(&page).locate(&Locator::Css("button[[".into())).await;
        assert!(matches!(result, Err(WalkError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_disabled_frame_search() {
        let page = FakePage::new();
        let frame = page.add_iframe("iframe#only", true);
        frame.add_element(FakeElement::new("button").with_text("Hidden away"));

        let no_frames = DomWalker::new(
            page.driver(),
            WalkerConfig {
                search_frames: false,
                ..WalkerConfig::default()
            },
        );
        let matches = no_frames
            .locate(&Locator::Css("button".into()))
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
