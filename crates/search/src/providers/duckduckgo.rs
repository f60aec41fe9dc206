//! DuckDuckGo instant-answer provider
//!
//! Free, no API key. Good for general knowledge; thin on events and
//! local information.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::SearchError;

pub struct DuckDuckGoProvider {
    http: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .build()
            .expect("reqwest client");
        Self { http }
    }
}

impl Default for DuckDuckGoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Abstract", default)]
    abstract_text: String,
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "AbstractSource", default)]
    abstract_source: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<Value>,
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        _location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .http
            .get("https://api.duckduckgo.com/")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: InstantAnswer = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let mut results = Vec::new();

        if !data.abstract_text.is_empty() {
            let title = if data.heading.is_empty() {
                "Instant Answer".to_string()
            } else {
                data.heading.clone()
            };
            results.push(
                SearchResult::new(self.name(), title, &data.abstract_text, 0.9)
                    .with_url(&data.abstract_url)
                    .with_metadata("abstract_source", Value::String(data.abstract_source)),
            );
        }

        for topic in data.related_topics.iter().take(limit) {
            let Some(text) = topic.get("Text").and_then(Value::as_str) else {
                continue;
            };
            let title: String = text.chars().take(100).collect();
            let mut result = SearchResult::new(self.name(), title, text, 0.7);
            if let Some(url) = topic.get("FirstURL").and_then(Value::as_str) {
                result = result.with_url(url);
            }
            results.push(result);
        }

        results.truncate(limit);
        tracing::info!(count = results.len(), "duckduckgo search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_answer_parsing() {
        let json = r#"{
            "Abstract": "Baltimore is a city in Maryland.",
            "Heading": "Baltimore",
            "AbstractURL": "https://en.wikipedia.org/wiki/Baltimore",
            "AbstractSource": "Wikipedia",
            "RelatedTopics": [{"Text": "Inner Harbor - waterfront", "FirstURL": "https://x"}]
        }"#;
        let data: InstantAnswer = serde_json::from_str(json).unwrap();
        assert_eq!(data.heading, "Baltimore");
        assert_eq!(data.related_topics.len(), 1);
    }
}
