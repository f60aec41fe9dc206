//! Eventbrite provider
//!
//! Local community events: meetups, workshops, smaller venues.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::SearchError;

const BASE_URL: &str = "https://www.eventbriteapi.com/v3";

pub struct EventbriteProvider {
    token: String,
    http: reqwest::Client,
}

impl EventbriteProvider {
    pub fn new(token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            token: token.into(),
            http,
        }
    }

    fn parse_event(&self, event: &Value) -> SearchResult {
        let name = event
            .pointer("/name/text")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Event");
        let summary = event
            .pointer("/summary")
            .and_then(Value::as_str)
            .or_else(|| event.pointer("/description/text").and_then(Value::as_str))
            .unwrap_or_default();
        let start = event
            .pointer("/start/local")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let venue = event
            .pointer("/venue/name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let snippet = if summary.is_empty() {
            format!("{name} starting {start}")
        } else {
            summary.chars().take(200).collect()
        };

        let mut result = SearchResult::new(self.name(), name, snippet, 0.85);
        if let Some(url) = event.get("url").and_then(Value::as_str) {
            result = result.with_url(url);
        }
        if !start.is_empty() {
            result.event_date = Some(start.to_string());
        }
        if !venue.is_empty() {
            result.venue = Some(venue.to_string());
        }
        if event.pointer("/is_free").and_then(Value::as_bool) == Some(true) {
            result.price_range = Some("Free".to_string());
        }
        result
    }
}

#[async_trait]
impl SearchProvider for EventbriteProvider {
    fn name(&self) -> &'static str {
        "eventbrite"
    }

    async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let mut params = vec![("q", query.to_string()), ("expand", "venue".to_string())];
        if let Some(address) = location {
            params.push(("location.address", address.to_string()));
            params.push(("location.within", "25mi".to_string()));
        }

        let response = self
            .http
            .get(format!("{BASE_URL}/events/search/"))
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        let events = data
            .get("events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let results: Vec<SearchResult> = events
            .iter()
            .take(limit)
            .map(|event| self.parse_event(event))
            .collect();

        tracing::info!(count = results.len(), "eventbrite search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_parsing() {
        let provider = EventbriteProvider::new("token");
        let event: Value = serde_json::from_str(
            r#"{
                "name": {"text": "Rust Meetup"},
                "summary": "Monthly systems programming meetup",
                "url": "https://eb.example/e/2",
                "start": {"local": "2026-08-20T18:00:00"},
                "venue": {"name": "Impact Hub"},
                "is_free": true
            }"#,
        )
        .unwrap();

        let result = provider.parse_event(&event);
        assert_eq!(result.title, "Rust Meetup");
        assert_eq!(result.venue.as_deref(), Some("Impact Hub"));
        assert_eq!(result.price_range.as_deref(), Some("Free"));
    }
}
