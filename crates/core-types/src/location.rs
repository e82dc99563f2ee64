//! Where in the page tree a match was found

use serde::{Deserialize, Serialize};

/// Rendering context that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomContext {
    /// Main document
    Document,
    /// Inside a shadow root
    ShadowDom,
    /// Inside a (possibly nested) iframe
    Iframe,
}

impl DomContext {
    pub fn name(&self) -> &'static str {
        match self {
            DomContext::Document => "document",
            DomContext::ShadowDom => "shadow-dom",
            DomContext::Iframe => "iframe",
        }
    }

    /// Confidence discount applied per nesting level in this context
    ///
    /// Matches found deeper than the main document are more fragile:
    /// shadow trees re-render independently and frames reload on their
    /// own schedule.
    pub fn level_discount(&self) -> f64 {
        match self {
            DomContext::Document => 1.0,
            DomContext::ShadowDom => 0.9,
            DomContext::Iframe => 0.85,
        }
    }
}

/// Path to the scope a match was found in
///
/// Ephemeral, produced per search; not owned beyond the resolve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomLocation {
    /// Context of the innermost scope
    pub context: DomContext,

    /// Scope labels from the document down to the match
    pub path: Vec<String>,

    /// Nesting depth (0 for the main document)
    pub depth: usize,
}

impl DomLocation {
    /// Location for a main-document match
    pub fn document() -> Self {
        Self {
            context: DomContext::Document,
            path: Vec::new(),
            depth: 0,
        }
    }

    /// Descend one level into a child scope
    pub fn descend(&self, context: DomContext, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            context,
            path,
            depth: self.depth + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_location() {
        let location = DomLocation::document();
        assert_eq!(location.context, DomContext::Document);
        assert_eq!(location.depth, 0);
        assert!(location.path.is_empty());
    }

    #[test]
    fn test_descend_tracks_path_and_depth() {
        let location = DomLocation::document()
            .descend(DomContext::Iframe, "iframe#checkout")
            .descend(DomContext::ShadowDom, "payment-widget");

        assert_eq!(location.context, DomContext::ShadowDom);
        assert_eq!(location.depth, 2);
        assert_eq!(location.path, vec!["iframe#checkout", "payment-widget"]);
    }

    #[test]
    fn test_level_discounts() {
        assert_eq!(DomContext::Document.level_discount(), 1.0);
        assert_eq!(DomContext::ShadowDom.level_discount(), 0.9);
        assert_eq!(DomContext::Iframe.level_discount(), 0.85);
    }
}
