//! Usage records for cloud LLM cost accounting
//!
//! One record per cloud call that produced tokens. Records are append-only
//! and written fire-and-forget; two records may land out of order, the
//! timestamp reconstructs ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cloud LLM call worth of accounting data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost in USD, rounded to six decimals
    pub cost_usd: f64,
    pub latency_ms: u64,
    /// Time to first token, streaming calls only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttft_ms: Option<u64>,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub was_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub stored_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            latency_ms: 0,
            ttft_ms: None,
            streaming: false,
            request_id: None,
            session_id: None,
            intent: None,
            was_fallback: false,
            fallback_reason: None,
            stored_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_record_serializes_without_empty_optionals() {
        let record = UsageRecord::new("anthropic", "claude-3-5-haiku-20241022");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"provider\":\"anthropic\""));
        assert!(!json.contains("ttft_ms"));
        assert!(!json.contains("fallback_reason"));
    }
}
