//! OpenAI cloud backend
//!
//! Native chat-completions wire format, including the SSE streaming
//! envelope with `stream_options.include_usage` for accurate token counts.

use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use hearth_core::{FinishReason, Message, ToolDefinition};

use crate::backends::LineBuffer;
use crate::tools;
use crate::types::{Generation, TokenChunk, ToolGeneration, ToolOutcome};
use crate::LlmError;

pub const BACKEND_NAME: &str = "openai";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

#[derive(Debug, Clone)]
pub struct OpenAiParams {
    pub api_key: String,
    /// Override for proxies and OpenAI-compatible local servers
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct OpenAiBackend {
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint(params: &OpenAiParams) -> String {
        let base = params.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }

    async fn post(
        &self,
        params: &OpenAiParams,
        payload: &Value,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(Self::endpoint(params))
            .bearer_auth(&params.api_key)
            .timeout(params.timeout)
            .json(payload)
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
        Ok(response)
    }

    pub async fn generate(
        &self,
        params: &OpenAiParams,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Generation, LlmError> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let payload = serde_json::json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let data: ChatResponse = self
            .post(params, &payload)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()))?;

        Ok(Generation {
            text: choice.message.content.unwrap_or_default(),
            input_tokens: data.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: data.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: finish_reason(choice.finish_reason.as_deref()),
            backend: BACKEND_NAME.to_string(),
            latency: start.elapsed(),
        })
    }

    pub async fn generate_with_tools(
        &self,
        params: &OpenAiParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> Result<ToolGeneration, LlmError> {
        let start = Instant::now();

        let mut payload = serde_json::json!({
            "model": params.model,
            "messages": messages.iter().map(|m| serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })).collect::<Vec<_>>(),
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });
        if !tool_defs.is_empty() {
            payload["tools"] = Value::Array(tools::to_openai(tool_defs));
            payload["tool_choice"] = Value::String("auto".to_string());
        }

        let data: Value = self
            .post(params, &payload)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let message = data
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| LlmError::InvalidResponse("missing message".to_string()))?;

        let output_tokens = data
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .map(|n| n as u32);

        let outcome = match message.get("tool_calls").and_then(Value::as_array) {
            Some(raw) if !raw.is_empty() => {
                ToolOutcome::ToolCalls(tools::normalize_openai_calls(raw))
            }
            _ => ToolOutcome::Text(
                message
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        };

        Ok(ToolGeneration {
            outcome,
            backend: BACKEND_NAME.to_string(),
            model: params.model.clone(),
            output_tokens,
            latency: start.elapsed(),
        })
    }

    /// Streaming generation over the SSE chunk stream. Returns
    /// `(input_tokens, output_tokens, ttft)` for usage tracking.
    pub async fn generate_stream(
        &self,
        params: &OpenAiParams,
        prompt: &str,
        system_prompt: Option<&str>,
        tx: &mpsc::Sender<TokenChunk>,
    ) -> Result<(u32, u32, Option<Duration>), LlmError> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let payload = serde_json::json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        let response = self.post(params, &payload).await?;
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();

        let mut input_tokens = 0u32;
        let mut output_tokens = 0u32;
        let mut first_token_at: Option<Duration> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    continue;
                }
                let Ok(event) = serde_json::from_str::<Value>(data) else {
                    continue;
                };

                if let Some(usage) = event.get("usage").filter(|u| !u.is_null()) {
                    input_tokens = usage
                        .get("prompt_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u32;
                    output_tokens = usage
                        .get("completion_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u32;
                }

                if let Some(content) = event
                    .pointer("/choices/0/delta/content")
                    .and_then(Value::as_str)
                {
                    if !content.is_empty() {
                        if first_token_at.is_none() {
                            first_token_at = Some(start.elapsed());
                        }
                        if tx
                            .send(TokenChunk::token(content, BACKEND_NAME))
                            .await
                            .is_err()
                        {
                            return Ok((input_tokens, output_tokens, first_token_at));
                        }
                    }
                }
            }
        }

        let _ = tx
            .send(TokenChunk::terminal(
                BACKEND_NAME,
                Some(input_tokens),
                Some(output_tokens),
                start.elapsed(),
            ))
            .await;

        Ok((input_tokens, output_tokens, first_token_at))
    }
}

fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_parsing() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hi!"));
        assert_eq!(resp.usage.unwrap().prompt_tokens, 9);
    }

    #[test]
    fn test_endpoint_override_for_local_servers() {
        let params = OpenAiParams {
            api_key: "sk-local".into(),
            endpoint: Some("http://localhost:8800/".into()),
            model: "qwen2.5:7b".into(),
            temperature: 0.1,
            max_tokens: 500,
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            OpenAiBackend::endpoint(&params),
            "http://localhost:8800/v1/chat/completions"
        );
    }
}
