use log::{debug, warn};
use scraper::{Html, Selector};

use crate::error::{AgentError, ParseError};
use crate::source::RawDocument;

/// Selector for the table cell holding the usage tooltip value
pub const DEFAULT_USAGE_SELECTOR: &str = "td.highcharts-tooltip";

/// Locates the usage figure in the report page markup
#[derive(Debug, Clone)]
pub struct UsageExtractor {
    selector: Selector,
    css: String,
}

impl UsageExtractor {
    /// Create an extractor for the given CSS selector
    pub fn new(css: &str) -> Result<Self, AgentError> {
        let selector = Selector::parse(css)
            .map_err(|e| AgentError::Config(format!("invalid usage selector '{}': {:?}", css, e)))?;

        Ok(Self {
            selector,
            css: css.to_string(),
        })
    }

    pub fn selector(&self) -> &str {
        &self.css
    }

    /// Parse the usage value out of a document
    ///
    /// The first matching element in document order is used. Its text,
    /// nested elements included, must be a plain finite number once
    /// surrounding whitespace is trimmed.
    pub fn extract(&self, document: &RawDocument) -> Result<f64, ParseError> {
        let html = Html::parse_document(document.as_str());

        let Some(element) = html.select(&self.selector).next() else {
            warn!("No element matches '{}' in usage page", self.css);
            return Err(ParseError::NotFound);
        };

        let text = element.text().collect::<String>();
        let text = text.trim();

        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                debug!("Extracted usage value {} from '{}'", value, self.css);
                Ok(value)
            }
            _ => {
                warn!("Usage element '{}' holds unparsable text {:?}", self.css, text);
                Err(ParseError::Malformed(text.to_string()))
            }
        }
    }
}
