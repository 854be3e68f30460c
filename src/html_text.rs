//! HTML fragment to plain text.

use scraper::Html;

use crate::contract::TextExtractor;
use crate::error::ExtractError;

/// Collects every text node of the fragment, trims each one, drops the empty ones and joins
/// the rest with a single space.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextExtractor;

impl HtmlTextExtractor {
    pub fn new() -> Self {
        HtmlTextExtractor
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, html: &str) -> Result<String, ExtractError> {
        let fragment = Html::parse_fragment(html);
        let text = fragment
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }
}
