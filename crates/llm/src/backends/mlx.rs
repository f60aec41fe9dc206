//! Secondary local inference backend (OpenAI-compatible completions API)
//!
//! No token streaming: the router performs a single synchronous call and
//! yields the whole result as one chunk.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use hearth_core::FinishReason;

use crate::types::Generation;
use crate::LlmError;

pub const BACKEND_NAME: &str = "mlx";

/// Per-call parameters resolved by the router
#[derive(Debug, Clone)]
pub struct MlxParams {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub options: HashMap<String, Value>,
}

pub struct MlxBackend {
    http: reqwest::Client,
}

impl MlxBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn generate(
        &self,
        params: &MlxParams,
        prompt: &str,
    ) -> Result<Generation, LlmError> {
        let start = Instant::now();

        let mut payload = serde_json::json!({
            "model": params.model,
            "prompt": prompt,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });
        for (key, value) in &params.options {
            if !value.is_null() {
                payload[key] = value.clone();
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/completions", params.endpoint))
            .timeout(params.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()))?;

        Ok(Generation {
            text: choice.text,
            input_tokens: data.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: data.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
            backend: BACKEND_NAME.to_string(),
            latency: start.elapsed(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_response_parsing() {
        let json = r#"{
            "choices": [{"text": "Hello there", "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let resp: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].text, "Hello there");
        assert_eq!(resp.usage.unwrap().completion_tokens, 3);
    }
}
