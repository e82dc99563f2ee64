//! Caller-supplied element descriptions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Broad category of the element being targeted
///
/// The kind drives which locator families can be generated (e.g. the
/// positional fallback needs a concrete tag, role candidates need a
/// known ARIA role set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Input,
    Button,
    Link,
    Select,
    Checkbox,
    Radio,
    TextArea,
    Image,
    Form,
    Table,
    Generic,
}

impl ElementKind {
    /// Get kind name as string
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Input => "input",
            ElementKind::Button => "button",
            ElementKind::Link => "link",
            ElementKind::Select => "select",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Radio => "radio",
            ElementKind::TextArea => "textarea",
            ElementKind::Image => "image",
            ElementKind::Form => "form",
            ElementKind::Table => "table",
            ElementKind::Generic => "generic",
        }
    }

    /// The HTML tag this kind usually renders as, if it has one
    pub fn html_tag(&self) -> Option<&'static str> {
        match self {
            ElementKind::Input | ElementKind::Checkbox | ElementKind::Radio => Some("input"),
            ElementKind::Button => Some("button"),
            ElementKind::Link => Some("a"),
            ElementKind::Select => Some("select"),
            ElementKind::TextArea => Some("textarea"),
            ElementKind::Image => Some("img"),
            ElementKind::Form => Some("form"),
            ElementKind::Table => Some("table"),
            ElementKind::Generic => None,
        }
    }

    /// ARIA roles commonly carried by this kind, best first
    pub fn aria_roles(&self) -> &'static [&'static str] {
        match self {
            ElementKind::Input => &["textbox", "searchbox", "spinbutton"],
            ElementKind::Button => &["button"],
            ElementKind::Link => &["link"],
            ElementKind::Select => &["combobox", "listbox"],
            ElementKind::Checkbox => &["checkbox"],
            ElementKind::Radio => &["radio"],
            ElementKind::TextArea => &["textbox"],
            ElementKind::Image => &["img"],
            ElementKind::Form => &["form"],
            ElementKind::Table => &["table", "grid"],
            ElementKind::Generic => &[],
        }
    }

    /// Whether this kind is normally interactive
    pub fn is_interactive(&self) -> bool {
        !matches!(
            self,
            ElementKind::Image | ElementKind::Form | ElementKind::Table | ElementKind::Generic
        )
    }
}

/// Abstract description of a target element
///
/// Immutable, caller-supplied per resolve request. Hints are optional;
/// each locator family is only generated when its supporting hint is
/// present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Domain the page belongs to (learning scope)
    pub domain: String,

    /// Element category
    pub kind: ElementKind,

    /// Visible text hint
    pub text: Option<String>,

    /// Structural attribute hints (id, name, data-testid, ...)
    pub attributes: BTreeMap<String, String>,

    /// Text of a label rendered near the element
    pub nearby_label: Option<String>,
}

impl ElementDescriptor {
    /// Create a new descriptor with domain and kind only
    pub fn new(domain: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            domain: domain.into(),
            kind,
            text: None,
            attributes: BTreeMap::new(),
            nearby_label: None,
        }
    }

    /// Set the visible-text hint
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a structural attribute hint
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the nearby-label hint
    pub fn with_nearby_label(mut self, label: impl Into<String>) -> Self {
        self.nearby_label = Some(label.into());
        self
    }

    /// Look up an attribute hint
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Best available accessible-name hint (text, then nearby label)
    pub fn accessible_name(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.nearby_label
                    .as_deref()
                    .filter(|l| !l.trim().is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables() {
        assert_eq!(ElementKind::Button.html_tag(), Some("button"));
        assert_eq!(ElementKind::Generic.html_tag(), None);
        assert!(ElementKind::Button.aria_roles().contains(&"button"));
        assert!(ElementKind::Button.is_interactive());
        assert!(!ElementKind::Table.is_interactive());
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = ElementDescriptor::new("example.com", ElementKind::Button)
            .with_text("Submit")
            .with_attribute("id", "submit-btn")
            .with_nearby_label("Order form");

        assert_eq!(descriptor.domain, "example.com");
        assert_eq!(descriptor.attribute("id"), Some("submit-btn"));
        assert_eq!(descriptor.accessible_name(), Some("Submit"));
    }

    #[test]
    fn test_accessible_name_falls_back_to_label() {
        let descriptor =
            ElementDescriptor::new("example.com", ElementKind::Input).with_nearby_label("Email");
        assert_eq!(descriptor.accessible_name(), Some("Email"));
    }
}
