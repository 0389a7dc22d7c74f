//! Lenient HTML document access.
//!
//! Wraps `scraper` so adapters can query pages with selectors that come from
//! configuration. Selector strings are user data, so a bad selector is an
//! error value rather than a panic.

use scraper::{ElementRef, Html, Selector};

/// A parsed page.
///
/// `scraper` parses with html5ever, so unclosed tags and a missing doctype
/// are repaired the same way a browser would.
pub struct Document {
    html: Html,
}

/// A configured CSS selector failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

impl std::fmt::Display for SelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid selector '{}': {}", self.selector, self.message)
    }
}

impl std::error::Error for SelectorError {}

/// Compiles a selector taken from configuration.
pub fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl Document {
    /// Parses a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Returns every element matching `selector`, in document order.
    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, SelectorError> {
        let selector = compile(selector)?;
        Ok(self.html.select(&selector).collect())
    }
}

/// Returns every descendant of `element` matching `selector`, in document order.
pub fn select_within<'a>(element: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    element.select(selector).collect()
}

/// Trimmed text content of an element, or an empty string.
pub fn text(element: Option<ElementRef<'_>>) -> String {
    element
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Attribute value of an element, or an empty string.
pub fn attr(element: Option<ElementRef<'_>>, name: &str) -> String {
    element
        .and_then(|el| el.value().attr(name))
        .unwrap_or_default()
        .to_string()
}
