//! Ticketmaster Discovery API provider
//!
//! Official event data: concerts, sports, live entertainment. Scores
//! highest on event intents and is never used for general queries.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::SearchError;

const BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2";

pub struct TicketmasterProvider {
    api_key: String,
    http: reqwest::Client,
}

impl TicketmasterProvider {
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

    fn parse_event(&self, event: &Value, fallback_location: Option<&str>) -> SearchResult {
        let name = event
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Event");
        let url = event.get("url").and_then(Value::as_str);

        let event_date = event
            .pointer("/dates/start/localDate")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let event_time = event
            .pointer("/dates/start/localTime")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let venue = event.pointer("/_embedded/venues/0");
        let venue_name = venue
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let venue_city = venue
            .and_then(|v| v.pointer("/city/name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let venue_state = venue
            .and_then(|v| v.pointer("/state/stateCode"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let location = if !venue_city.is_empty() && !venue_state.is_empty() {
            format!("{venue_city}, {venue_state}")
        } else {
            fallback_location.unwrap_or_default().to_string()
        };

        let price_range = event
            .pointer("/priceRanges/0")
            .and_then(|range| {
                let min = range.get("min")?.as_f64()?;
                let max = range.get("max")?.as_f64()?;
                let currency = range
                    .get("currency")
                    .and_then(Value::as_str)
                    .unwrap_or("USD");
                Some(format!("${min:.2} - ${max:.2} {currency}"))
            });

        let mut snippet = format!("{name} on {event_date}");
        if !event_time.is_empty() {
            snippet.push_str(&format!(" at {event_time}"));
        }
        if !venue_name.is_empty() {
            snippet.push_str(&format!(", {venue_name}"));
        }

        let mut result = SearchResult::new(self.name(), name, snippet, 0.95);
        if let Some(url) = url {
            result = result.with_url(url);
        }
        if !event_date.is_empty() {
            result.event_date = Some(event_date.to_string());
        }
        if !venue_name.is_empty() {
            result.venue = Some(venue_name.to_string());
        }
        if !location.is_empty() {
            result.location = Some(location);
        }
        result.price_range = price_range;
        result
    }
}

#[async_trait]
impl SearchProvider for TicketmasterProvider {
    fn name(&self) -> &'static str {
        "ticketmaster"
    }

    async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let size = limit.to_string();
        let mut params = vec![
            ("apikey", self.api_key.as_str()),
            ("keyword", query),
            ("size", size.as_str()),
            ("sort", "date,asc"),
            ("radius", "25"),
        ];
        if let Some(city) = location {
            params.push(("city", city));
        }

        let response = self
            .http
            .get(format!("{BASE_URL}/events.json"))
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
            .pointer("/_embedded/events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let results: Vec<SearchResult> = events
            .iter()
            .take(limit)
            .map(|event| self.parse_event(event, location))
            .collect();

        tracing::info!(count = results.len(), "ticketmaster search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_parsing() {
        let provider = TicketmasterProvider::new("key");
        let event: Value = serde_json::from_str(
            r#"{
                "name": "Orchestra Night",
                "url": "https://tm.example/e/1",
                "dates": {"start": {"localDate": "2026-08-14", "localTime": "19:30"}},
                "_embedded": {"venues": [{
                    "name": "The Meyerhoff",
                    "city": {"name": "Baltimore"},
                    "state": {"stateCode": "MD"}
                }]},
                "priceRanges": [{"min": 35.0, "max": 120.0, "currency": "USD"}]
            }"#,
        )
        .unwrap();

        let result = provider.parse_event(&event, Some("Baltimore, MD"));
        assert_eq!(result.title, "Orchestra Night");
        assert_eq!(result.event_date.as_deref(), Some("2026-08-14"));
        assert_eq!(result.venue.as_deref(), Some("The Meyerhoff"));
        assert_eq!(result.location.as_deref(), Some("Baltimore, MD"));
        assert_eq!(result.price_range.as_deref(), Some("$35.00 - $120.00 USD"));
    }
}
