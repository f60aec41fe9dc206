//! SearXNG metasearch provider
//!
//! Self-hosted aggregator over multiple engines; no API key. Results
//! confirmed by several engines get a small confidence boost.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::SearchError;

pub struct SearxngProvider {
    base_url: String,
    http: reqwest::Client,
}

impl SearxngProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Hearth/1.0)")
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    engines: Vec<String>,
    #[serde(default)]
    category: Option<String>,
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(
        &self,
        query: &str,
        _location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .http
            .get(format!("{}/search", self.base_url.trim_end_matches('/')))
            .query(&[("q", query), ("format", "json"), ("pageno", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: SearxngResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let results: Vec<SearchResult> = data
            .results
            .into_iter()
            .take(limit)
            .map(|item| {
                let base_score = item.score.unwrap_or(0.7);
                let multi_engine_boost = if item.engines.len() > 1 {
                    (0.1 * (item.engines.len() as f64 - 1.0)).min(0.2)
                } else {
                    0.0
                };
                let confidence = (base_score + multi_engine_boost).min(1.0);

                let mut result =
                    SearchResult::new(self.name(), item.title, item.content, confidence)
                        .with_metadata(
                            "engines",
                            Value::Array(
                                item.engines.into_iter().map(Value::String).collect(),
                            ),
                        );
                if let Some(url) = item.url {
                    result = result.with_url(url);
                }
                if let Some(category) = item.category {
                    result = result.with_metadata("category", Value::String(category));
                }
                result
            })
            .collect();

        tracing::info!(count = results.len(), "searxng search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_engine_boost_is_capped() {
        let json = r#"{"results": [
            {"title": "a", "content": "b", "url": "https://x", "score": 0.7,
             "engines": ["google", "bing", "brave", "mojeek"], "category": "general"}
        ]}"#;
        let data: SearxngResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.results[0].engines.len(), 4);
    }
}
