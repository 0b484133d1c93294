use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a locator value is interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// CSS selector, evaluated with `querySelectorAll`
    Css,
    /// XPath expression, evaluated relative to the scope
    #[serde(rename = "xpath")]
    XPath,
    /// Innermost element whose text contains the value
    Text,
    /// Innermost element whose trimmed text equals the value
    ExactText,
}

impl LocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::Css => "css",
            LocatorKind::XPath => "xpath",
            LocatorKind::Text => "text",
            LocatorKind::ExactText => "exact_text",
        }
    }
}

/// Opaque reference to a node on the live page.
///
/// The id is only meaningful to the [`Page`](crate::dom::Page) that produced it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// Where a locator is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The top-level document of the page
    Page,
    /// Descendants of an element (an `iframe` scope searches its content document)
    Element(ElementHandle),
}

impl From<ElementHandle> for Scope {
    fn from(handle: ElementHandle) -> Self {
        Scope::Element(handle)
    }
}

/// One strategy in a fallback chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Locator {
    pub kind: LocatorKind,

    pub value: String,

    /// How long to keep polling before this strategy counts as a miss
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Only accept matches whose visible text contains this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            timeout_ms: default_timeout_ms(),
            text: None,
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Text, value)
    }

    pub fn exact_text(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::ExactText, value)
    }

    /// Builder method: set the polling timeout in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Builder method: require the match's text to contain `text`
    pub fn containing(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.value)?;
        if let Some(text) = &self.text {
            write!(f, " (text contains {:?})", text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_builder() {
        let loc = Locator::css("button[data-testid=\"uicl-button\"]")
            .timeout_ms(300)
            .containing("Send Proposal");

        assert_eq!(loc.kind, LocatorKind::Css);
        assert_eq!(loc.timeout(), Duration::from_millis(300));
        assert_eq!(loc.text.as_deref(), Some("Send Proposal"));
        assert_eq!(
            loc.to_string(),
            "css:button[data-testid=\"uicl-button\"] (text contains \"Send Proposal\")"
        );
    }

    #[test]
    fn test_locator_deserialize_defaults() {
        let loc: Locator = serde_json::from_value(serde_json::json!({
            "kind": "xpath",
            "value": ".//li[@role='option']"
        }))
        .unwrap();

        assert_eq!(loc.kind, LocatorKind::XPath);
        assert_eq!(loc.timeout_ms, 2000);
        assert!(loc.text.is_none());
    }
}
