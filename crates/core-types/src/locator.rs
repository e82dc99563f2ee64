//! Locator expressions and generation families

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text matching mode for text locators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Exact match on the raw text
    Exact,
    /// Whitespace-collapsed, case-insensitive match
    Normalized,
    /// Substring match on normalized text
    Contains,
}

impl TextMatch {
    pub fn name(&self) -> &'static str {
        match self {
            TextMatch::Exact => "exact",
            TextMatch::Normalized => "normalized",
            TextMatch::Contains => "contains",
        }
    }
}

/// An expression identifying zero or more elements in a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// CSS selector
    Css(String),

    /// Visible text content
    Text { pattern: String, mode: TextMatch },

    /// ARIA role plus optional accessible name
    Role { role: String, name: Option<String> },

    /// Control associated with a visible label
    Labelled(String),
}

impl Locator {
    /// Canonical key used for metrics and learning state
    pub fn cache_key(&self) -> String {
        match self {
            Locator::Css(selector) => format!("css:{selector}"),
            Locator::Text { pattern, mode } => format!("text:{}:{}", mode.name(), pattern),
            Locator::Role { role, name } => match name {
                Some(name) => format!("role:{role}:{name}"),
                None => format!("role:{role}"),
            },
            Locator::Labelled(label) => format!("label:{label}"),
        }
    }

    /// Structural validity check
    ///
    /// Learned locators are re-checked before being served; a selector
    /// that has become malformed (e.g. truncated by a bad merge) is
    /// dropped rather than attempted.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Locator::Css(selector) => {
                let selector = selector.trim();
                !selector.is_empty()
                    && !selector.starts_with('>')
                    && balanced(selector, '[', ']')
                    && balanced(selector, '(', ')')
                    && selector.matches('"').count() % 2 == 0
                    && selector.matches('\'').count() % 2 == 0
            }
            Locator::Text { pattern, .. } => !pattern.trim().is_empty(),
            Locator::Role { role, .. } => !role.trim().is_empty(),
            Locator::Labelled(label) => !label.trim().is_empty(),
        }
    }

    /// Whether a CSS locator uses hierarchy operators
    pub fn has_hierarchy(&self) -> bool {
        match self {
            Locator::Css(selector) => {
                selector.contains('>') || selector.trim().contains(char::is_whitespace)
            }
            _ => false,
        }
    }

    /// Reduce a compound CSS selector to its last segment
    pub fn simplified(&self) -> Option<Locator> {
        match self {
            Locator::Css(selector) if self.has_hierarchy() => selector
                .split(&[' ', '>'][..])
                .rev()
                .find(|segment| !segment.trim().is_empty())
                .map(|segment| Locator::Css(segment.trim().to_string())),
            _ => None,
        }
    }

    /// Disambiguate a CSS selector with a positional index (1-based)
    pub fn with_index(&self, index: usize) -> Option<Locator> {
        match self {
            Locator::Css(selector) if !selector.contains(":nth-of-type") => {
                Some(Locator::Css(format!("{selector}:nth-of-type({index})")))
            }
            _ => None,
        }
    }

    /// Exclude hidden elements from a CSS selector
    pub fn visible_only(&self) -> Option<Locator> {
        match self {
            Locator::Css(selector) if !selector.contains(":not([hidden])") => {
                Some(Locator::Css(format!("{selector}:not([hidden])")))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

fn balanced(s: &str, open: char, close: char) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

/// Collapse whitespace and lowercase for normalized text comparison
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Locator generation family, in descending prior weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorFamily {
    /// Unique id attribute
    Identifier,
    /// Dedicated test/automation attribute
    TestAttribute,
    /// Other structural attribute
    Attribute,
    /// ARIA role and accessible name
    Role,
    /// Exact text content
    TextExact,
    /// Whitespace-insensitive text content
    TextNormalized,
    /// Text substring
    TextContains,
    /// Nearby visible label
    Proximity,
    /// Positional index fallback
    Positional,
}

impl LocatorFamily {
    /// Get family name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorFamily::Identifier => "identifier",
            LocatorFamily::TestAttribute => "test-attribute",
            LocatorFamily::Attribute => "attribute",
            LocatorFamily::Role => "role",
            LocatorFamily::TextExact => "text-exact",
            LocatorFamily::TextNormalized => "text-normalized",
            LocatorFamily::TextContains => "text-contains",
            LocatorFamily::Proximity => "proximity",
            LocatorFamily::Positional => "positional",
        }
    }

    /// Prior weight from the fixed priority table (0.0-1.0)
    pub fn prior_weight(&self) -> f64 {
        match self {
            LocatorFamily::Identifier => 0.95,
            LocatorFamily::TestAttribute => 0.90,
            LocatorFamily::Attribute => 0.80,
            LocatorFamily::Role => 0.75,
            LocatorFamily::TextExact => 0.70,
            LocatorFamily::TextNormalized => 0.65,
            LocatorFamily::TextContains => 0.55,
            LocatorFamily::Proximity => 0.50,
            LocatorFamily::Positional => 0.25,
        }
    }

    /// All families in priority order
    pub fn priority_table() -> &'static [LocatorFamily] {
        &[
            LocatorFamily::Identifier,
            LocatorFamily::TestAttribute,
            LocatorFamily::Attribute,
            LocatorFamily::Role,
            LocatorFamily::TextExact,
            LocatorFamily::TextNormalized,
            LocatorFamily::TextContains,
            LocatorFamily::Proximity,
            LocatorFamily::Positional,
        ]
    }
}

/// A locator proposed but not yet validated against the live page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorCandidate {
    /// The locator expression
    pub locator: Locator,

    /// Family that generated it
    pub family: LocatorFamily,

    /// Provisional quality estimate before any page contact (0-100)
    pub provisional_quality: f64,
}

impl LocatorCandidate {
    pub fn new(locator: Locator, family: LocatorFamily) -> Self {
        let provisional_quality = family.prior_weight() * 100.0;
        Self {
            locator,
            family,
            provisional_quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(Locator::Css("#submit".into()).cache_key(), "css:#submit");
        assert_eq!(
            Locator::Text {
                pattern: "Submit".into(),
                mode: TextMatch::Exact,
            }
            .cache_key(),
            "text:exact:Submit"
        );
        assert_eq!(
            Locator::Role {
                role: "button".into(),
                name: Some("Submit".into()),
            }
            .cache_key(),
            "role:button:Submit"
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(Locator::Css("#submit".into()).is_well_formed());
        assert!(Locator::Css("button[type=\"submit\"]".into()).is_well_formed());
        assert!(!Locator::Css("".into()).is_well_formed());
        assert!(!Locator::Css("button[type=\"submit\"".into()).is_well_formed());
        assert!(!Locator::Css("> div".into()).is_well_formed());
        assert!(!Locator::Text {
            pattern: "  ".into(),
            mode: TextMatch::Exact,
        }
        .is_well_formed());
    }

    #[test]
    fn test_simplified_takes_last_segment() {
        let locator = Locator::Css("#login-form .actions > button.primary".into());
        assert!(locator.has_hierarchy());
        assert_eq!(
            locator.simplified(),
            Some(Locator::Css("button.primary".into()))
        );

        let simple = Locator::Css("#submit".into());
        assert!(!simple.has_hierarchy());
        assert_eq!(simple.simplified(), None);
    }

    #[test]
    fn test_index_and_visibility_modifiers() {
        let locator = Locator::Css("button[type=\"submit\"]".into());
        assert_eq!(
            locator.with_index(2),
            Some(Locator::Css("button[type=\"submit\"]:nth-of-type(2)".into()))
        );
        assert_eq!(
            locator.visible_only(),
            Some(Locator::Css("button[type=\"submit\"]:not([hidden])".into()))
        );
        // Text locators cannot carry CSS modifiers
        let text = Locator::Text {
            pattern: "Submit".into(),
            mode: TextMatch::Exact,
        };
        assert_eq!(text.with_index(2), None);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Submit \n Order  "), "submit order");
    }

    #[test]
    fn test_priority_table_is_strictly_decreasing() {
        let table = LocatorFamily::priority_table();
        for pair in table.windows(2) {
            assert!(pair[0].prior_weight() > pair[1].prior_weight());
        }
    }
}
