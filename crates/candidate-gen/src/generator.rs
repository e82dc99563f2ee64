//! Candidate generator

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayfinder_core_types::{
    ElementDescriptor, Locator, LocatorCandidate, LocatorFamily, TextMatch,
};

/// Attributes set by teams specifically for automation; highest-value
/// hints after a plain id.
const TEST_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test",
    "data-qa",
    "data-cy",
    "data-automation-id",
];

/// Structural attributes worth a dedicated candidate, best first.
const ATTRIBUTE_PRIORITY: &[&str] = &[
    "name",
    "type",
    "placeholder",
    "aria-label",
    "title",
    "href",
    "alt",
    "value",
];

/// Generator tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Hard cap on emitted candidates
    pub max_candidates: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { max_candidates: 10 }
    }
}

/// Produces ranked locator candidates for a descriptor
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    config: GeneratorConfig,
}

impl CandidateGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate candidates in descending priority order
    ///
    /// Each family is emitted only when the descriptor carries its
    /// supporting hint; the list is capped at `max_candidates`.
    pub fn generate(&self, descriptor: &ElementDescriptor) -> Vec<LocatorCandidate> {
        let mut candidates = Vec::new();
        let tag = descriptor.kind.html_tag();

        self.push_identifier(descriptor, &mut candidates);
        self.push_test_attributes(descriptor, tag, &mut candidates);
        self.push_attributes(descriptor, tag, &mut candidates);
        self.push_role(descriptor, &mut candidates);
        self.push_text(descriptor, &mut candidates);
        self.push_proximity(descriptor, &mut candidates);
        self.push_positional(descriptor, tag, &mut candidates);

        candidates.truncate(self.config.max_candidates);
        debug!(
            count = candidates.len(),
            kind = descriptor.kind.name(),
            "generated locator candidates"
        );
        candidates
    }

    fn push_identifier(&self, descriptor: &ElementDescriptor, out: &mut Vec<LocatorCandidate>) {
        if let Some(id) = descriptor.attribute("id").filter(|id| is_css_ident(id)) {
            out.push(LocatorCandidate::new(
                Locator::Css(format!("#{id}")),
                LocatorFamily::Identifier,
            ));
        }
    }

    fn push_test_attributes(
        &self,
        descriptor: &ElementDescriptor,
        tag: Option<&str>,
        out: &mut Vec<LocatorCandidate>,
    ) {
        for attr in TEST_ATTRIBUTES {
            if let Some(value) = descriptor.attribute(attr).filter(|v| is_attr_value(v)) {
                out.push(LocatorCandidate::new(
                    Locator::Css(attr_selector(tag, attr, value)),
                    LocatorFamily::TestAttribute,
                ));
            }
        }
    }

    fn push_attributes(
        &self,
        descriptor: &ElementDescriptor,
        tag: Option<&str>,
        out: &mut Vec<LocatorCandidate>,
    ) {
        for attr in ATTRIBUTE_PRIORITY {
            if let Some(value) = descriptor.attribute(attr).filter(|v| is_attr_value(v)) {
                out.push(LocatorCandidate::new(
                    Locator::Css(attr_selector(tag, attr, value)),
                    LocatorFamily::Attribute,
                ));
            }
        }
    }

    fn push_role(&self, descriptor: &ElementDescriptor, out: &mut Vec<LocatorCandidate>) {
        // The role family needs an explicit ARIA hint; the kind alone
        // only supplies the role string.
        if descriptor.attribute("role").is_none() && descriptor.attribute("aria-label").is_none() {
            return;
        }
        let role = descriptor
            .attribute("role")
            .map(str::to_string)
            .or_else(|| {
                descriptor
                    .kind
                    .aria_roles()
                    .first()
                    .map(|role| (*role).to_string())
            });
        let Some(role) = role else {
            return;
        };
        let name = descriptor
            .attribute("aria-label")
            .or_else(|| descriptor.accessible_name())
            .map(|name| name.trim().to_string());
        out.push(LocatorCandidate::new(
            Locator::Role { role, name },
            LocatorFamily::Role,
        ));
    }

    fn push_text(&self, descriptor: &ElementDescriptor, out: &mut Vec<LocatorCandidate>) {
        let Some(text) = descriptor.text.as_deref().map(str::trim) else {
            return;
        };
        if text.is_empty() {
            return;
        }
        for (mode, family) in [
            (TextMatch::Exact, LocatorFamily::TextExact),
            (TextMatch::Normalized, LocatorFamily::TextNormalized),
            (TextMatch::Contains, LocatorFamily::TextContains),
        ] {
            out.push(LocatorCandidate::new(
                Locator::Text {
                    pattern: text.to_string(),
                    mode,
                },
                family,
            ));
        }
    }

    fn push_proximity(&self, descriptor: &ElementDescriptor, out: &mut Vec<LocatorCandidate>) {
        if let Some(label) = descriptor.nearby_label.as_deref().map(str::trim) {
            if !label.is_empty() {
                out.push(LocatorCandidate::new(
                    Locator::Labelled(label.to_string()),
                    LocatorFamily::Proximity,
                ));
            }
        }
    }

    fn push_positional(
        &self,
        _descriptor: &ElementDescriptor,
        tag: Option<&str>,
        out: &mut Vec<LocatorCandidate>,
    ) {
        if let Some(tag) = tag {
            out.push(LocatorCandidate::new(
                Locator::Css(format!("{tag}:nth-of-type(1)")),
                LocatorFamily::Positional,
            ));
        }
    }
}

fn attr_selector(tag: Option<&str>, attr: &str, value: &str) -> String {
    match tag {
        Some(tag) => format!("{tag}[{attr}=\"{value}\"]"),
        None => format!("[{attr}=\"{value}\"]"),
    }
}

fn is_css_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn is_attr_value(s: &str) -> bool {
    !s.trim().is_empty() && !s.contains('"')
}
