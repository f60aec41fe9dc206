//! Brave Search provider
//!
//! Independent index, strong news coverage. Requires a subscription
//! token; the free tier allows 2 000 queries per month.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::SearchError;

const BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct BraveProvider {
    api_key: String,
    http: reqwest::Client,
}

impl BraveProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            api_key: api_key.into(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    age: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        _location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let count = limit.min(20).to_string();
        let response = self
            .http
            .get(BASE_URL)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("count", &count),
                ("search_lang", "en"),
                ("country", "US"),
                ("safesearch", "moderate"),
                ("text_decorations", "false"),
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

        let data: BraveResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let results: Vec<SearchResult> = data
            .web
            .results
            .into_iter()
            .take(limit)
            .map(|item| {
                let mut result =
                    SearchResult::new(self.name(), item.title, item.description, 0.85);
                if let Some(url) = item.url {
                    result = result.with_url(url);
                }
                if let Some(age) = item.age {
                    result = result.with_metadata("age", Value::String(age));
                }
                if let Some(language) = item.language {
                    result = result.with_metadata("language", Value::String(language));
                }
                result
            })
            .collect();

        tracing::info!(count = results.len(), "brave search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brave_response_parsing() {
        let json = r#"{"web": {"results": [
            {"title": "Ravens News", "description": "Latest updates", "url": "https://x", "age": "2 hours"}
        ]}}"#;
        let data: BraveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.web.results.len(), 1);
        assert_eq!(data.web.results[0].title, "Ravens News");
    }
}
