//! Google cloud backend
//!
//! Native generateContent wire format. No suitable async streaming
//! support: the router performs a single call and yields the whole result
//! as one chunk; callers must not depend on partial output here.

use std::time::{Duration, Instant};

use serde_json::Value;

use hearth_core::{FinishReason, Message, Role, ToolDefinition};

use crate::tools;
use crate::types::{Generation, ToolGeneration, ToolOutcome};
use crate::LlmError;

pub const BACKEND_NAME: &str = "google";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleParams {
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct GoogleBackend {
    http: reqwest::Client,
}

impl GoogleBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint(params: &GoogleParams) -> String {
        let base = params.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            params.model
        )
    }

    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    },
                    "parts": [{"text": m.content}],
                })
            })
            .collect();

        (system, contents)
    }

    async fn call(
        &self,
        params: &GoogleParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
        system_override: Option<&str>,
    ) -> Result<(Value, Duration), LlmError> {
        let start = Instant::now();
        let (system, contents) = Self::convert_messages(messages);

        let mut payload = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
            },
        });
        if let Some(system) = system_override.map(str::to_string).or(system) {
            payload["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }
        if !tool_defs.is_empty() {
            payload["tools"] = Value::Array(tools::to_google(tool_defs));
        }

        let response = self
            .http
            .post(Self::endpoint(params))
            .query(&[("key", params.api_key.as_str())])
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

        let data: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok((data, start.elapsed()))
    }

    pub async fn generate(
        &self,
        params: &GoogleParams,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Generation, LlmError> {
        let messages = vec![Message::user(prompt)];
        let (data, latency) = self.call(params, &messages, &[], system_prompt).await?;

        let text = collect_text(&data);
        let (input_tokens, output_tokens) = usage_counts(&data);

        Ok(Generation {
            text,
            input_tokens,
            output_tokens,
            finish_reason: FinishReason::Stop,
            backend: BACKEND_NAME.to_string(),
            latency,
        })
    }

    pub async fn generate_with_tools(
        &self,
        params: &GoogleParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> Result<ToolGeneration, LlmError> {
        let (data, latency) = self.call(params, messages, tool_defs, None).await?;

        let parts = data
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let calls = tools::normalize_google_calls(&parts);
        let (_, output_tokens) = usage_counts(&data);

        let outcome = if calls.is_empty() {
            ToolOutcome::Text(collect_text(&data))
        } else {
            ToolOutcome::ToolCalls(calls)
        };

        Ok(ToolGeneration {
            outcome,
            backend: BACKEND_NAME.to_string(),
            model: params.model.clone(),
            output_tokens,
            latency,
        })
    }
}

fn collect_text(data: &Value) -> String {
    data.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn usage_counts(data: &Value) -> (Option<u32>, Option<u32>) {
    let input = data
        .pointer("/usageMetadata/promptTokenCount")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    let output = data
        .pointer("/usageMetadata/candidatesTokenCount")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    (input, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_role_maps_to_model() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let (system, contents) = GoogleBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn test_response_text_and_usage() {
        let data: Value = serde_json::from_str(
            r#"{
                "candidates": [{"content": {"parts": [{"text": "Sunny, "}, {"text": "72F."}]}}],
                "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(collect_text(&data), "Sunny, 72F.");
        assert_eq!(usage_counts(&data), (Some(8), Some(5)));
    }

    #[test]
    fn test_function_call_parts_normalise() {
        let data: Value = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"functionCall": {"name": "get_weather", "args": {"location": "Towson"}}}
            ]}}]}"#,
        )
        .unwrap();
        let parts = data
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap();
        let calls = tools::normalize_google_calls(&parts);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments["location"], "Towson");
    }
}
