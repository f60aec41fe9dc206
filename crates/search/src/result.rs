//! Normalised search results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One result from any provider, normalised to a common shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider name: "duckduckgo", "ticketmaster", ...
    pub source: String,
    pub title: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    // Event-specific fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,

    pub retrieved_at: DateTime<Utc>,
}

impl SearchResult {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            snippet: snippet.into(),
            url: None,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: HashMap::new(),
            event_date: None,
            venue: None,
            location: None,
            price_range: None,
            retrieved_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Compact dictionary form handed to the LLM as context.
    pub fn to_context_value(&self) -> Value {
        let mut out = serde_json::json!({
            "source": self.source,
            "title": self.title,
            "snippet": self.snippet,
        });
        if let Some(url) = &self.url {
            out["url"] = Value::String(url.clone());
        }
        if let Some(date) = &self.event_date {
            out["date"] = Value::String(date.clone());
        }
        if let Some(venue) = &self.venue {
            out["venue"] = Value::String(venue.clone());
        }
        if let Some(location) = &self.location {
            out["location"] = Value::String(location.clone());
        }
        if let Some(price) = &self.price_range {
            out["price"] = Value::String(price.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(SearchResult::new("brave", "t", "s", 1.4).confidence, 1.0);
        assert_eq!(SearchResult::new("brave", "t", "s", -0.1).confidence, 0.0);
    }

    #[test]
    fn test_context_value_skips_empty_fields() {
        let result = SearchResult::new("duckduckgo", "Fells Point", "Historic waterfront", 0.8)
            .with_url("https://example.com");
        let ctx = result.to_context_value();
        assert_eq!(ctx["url"], "https://example.com");
        assert!(ctx.get("venue").is_none());
    }
}
