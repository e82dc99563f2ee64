//! Page driver capability trait and handle types

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfinder_core_types::{DomContext, Locator};

use crate::errors::DriverError;

/// Driver-agnostic reference to a matched element
///
/// Carries the structural snapshot needed for scoring; liveness checks
/// (visibility, enablement, geometry) go back through the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Opaque node reference understood by the originating driver
    pub node_ref: String,

    /// Element tag name (lowercase)
    pub tag: String,

    /// Visible text content
    pub text: String,

    /// Attribute snapshot at query time
    pub attributes: BTreeMap<String, String>,
}

impl ElementHandle {
    /// Look up an attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Whether the snapshot carries the `hidden` attribute
    pub fn has_hidden_attribute(&self) -> bool {
        self.attributes.contains_key("hidden")
    }
}

/// Element geometry in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Kind of child scope a page can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Iframe,
    ShadowRoot,
}

impl ScopeKind {
    /// The DOM context matches found in this scope belong to
    pub fn context(&self) -> DomContext {
        match self {
            ScopeKind::Iframe => DomContext::Iframe,
            ScopeKind::ShadowRoot => DomContext::ShadowDom,
        }
    }
}

/// Reference to a child scope (frame or shadow root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeRef {
    /// Opaque scope id understood by the driver
    pub id: String,

    pub kind: ScopeKind,

    /// Human-readable label for DOM locations (host selector, frame src)
    pub label: String,
}

/// The capability set the engine consumes from the automation driver
///
/// Every scope (main document, frame, shadow root) exposes the same
/// surface; `enter_scope` yields a driver for the child scope or an
/// access-denied error for cross-origin frames.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// All elements matching the locator within this scope's document
    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;

    /// Evaluate a script expression in this scope
    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError>;

    /// Child scopes of the given kind hosted by this scope
    async fn child_scopes(&self, kind: ScopeKind) -> Result<Vec<ScopeRef>, DriverError>;

    /// Obtain a driver for a child scope
    async fn enter_scope(&self, scope: &ScopeRef) -> Result<Arc<dyn PageDriver>, DriverError>;

    /// Current URL of this scope's document
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Element geometry, `None` when the element has no box (hidden)
    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, DriverError>;

    /// Whether the element is currently rendered and visible
    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Whether the element accepts interaction
    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError>;
}
