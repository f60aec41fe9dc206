//! Anthropic cloud backend
//!
//! Native Messages API with tool_use blocks and the SSE event stream.
//! System messages are lifted into the top-level `system` field; tool
//! results travel back as user messages.

use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use hearth_core::{FinishReason, Message, Role, ToolCall, ToolDefinition};

use crate::backends::LineBuffer;
use crate::tools;
use crate::types::{Generation, TokenChunk, ToolGeneration, ToolOutcome};
use crate::LlmError;

pub const BACKEND_NAME: &str = "anthropic";
const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicParams {
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct AnthropicBackend {
    http: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint(params: &AnthropicParams) -> String {
        let base = params.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }

    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<ApiMessage>) {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        let api_messages = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    // Tool results come back as user messages
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        (system, api_messages)
    }

    async fn post(
        &self,
        params: &AnthropicParams,
        payload: &Value,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(Self::endpoint(params))
            .header("x-api-key", &params.api_key)
            .header("anthropic-version", API_VERSION)
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
        params: &AnthropicParams,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Generation, LlmError> {
        let messages = vec![Message::user(prompt)];
        let result = self
            .call(params, &messages, &[], system_prompt.map(str::to_string))
            .await?;

        let text = match result.outcome {
            ToolOutcome::Text(text) => text,
            ToolOutcome::ToolCalls(_) => String::new(),
        };

        Ok(Generation {
            text,
            input_tokens: Some(result.input_tokens),
            output_tokens: Some(result.output_tokens),
            finish_reason: result.finish_reason,
            backend: BACKEND_NAME.to_string(),
            latency: result.latency,
        })
    }

    pub async fn generate_with_tools(
        &self,
        params: &AnthropicParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> Result<ToolGeneration, LlmError> {
        let result = self.call(params, messages, tool_defs, None).await?;
        Ok(ToolGeneration {
            outcome: result.outcome,
            backend: BACKEND_NAME.to_string(),
            model: params.model.clone(),
            output_tokens: Some(result.output_tokens),
            latency: result.latency,
        })
    }

    async fn call(
        &self,
        params: &AnthropicParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
        system_override: Option<String>,
    ) -> Result<CallResult, LlmError> {
        let start = Instant::now();
        let (system, api_messages) = Self::convert_messages(messages);

        let mut payload = serde_json::json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": api_messages,
            "temperature": params.temperature,
        });
        if let Some(system) = system_override.or(system) {
            payload["system"] = Value::String(system);
        }
        if !tool_defs.is_empty() {
            payload["tools"] = Value::Array(tools::to_anthropic(tool_defs));
        }

        let data: ApiResponse = self
            .post(params, &payload)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let calls = tools::normalize_anthropic_calls(&data.content);
        let text: String = data
            .content
            .iter()
            .filter_map(|block| {
                (block.get("type")?.as_str()? == "text")
                    .then(|| block.get("text")?.as_str().map(str::to_string))
                    .flatten()
            })
            .collect();

        let outcome = if calls.is_empty() {
            ToolOutcome::Text(text)
        } else {
            ToolOutcome::ToolCalls(calls)
        };

        Ok(CallResult {
            outcome,
            finish_reason: stop_reason_to_finish(&data.stop_reason),
            input_tokens: data.usage.input_tokens,
            output_tokens: data.usage.output_tokens,
            latency: start.elapsed(),
        })
    }

    /// Streaming generation over the Messages SSE stream. Tool-use input
    /// deltas are accumulated per content block. Returns
    /// `(input_tokens, output_tokens, ttft, tool_calls)`.
    pub async fn generate_stream(
        &self,
        params: &AnthropicParams,
        prompt: &str,
        system_prompt: Option<&str>,
        tx: &mpsc::Sender<TokenChunk>,
    ) -> Result<(u32, u32, Option<Duration>, Vec<ToolCall>), LlmError> {
        let start = Instant::now();

        let mut payload = serde_json::json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": params.temperature,
            "stream": true,
        });
        if let Some(system) = system_prompt {
            payload["system"] = Value::String(system.to_string());
        }

        let response = self.post(params, &payload).await?;
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();

        let mut input_tokens = 0u32;
        let mut output_tokens = 0u32;
        let mut first_token_at: Option<Duration> = None;
        let mut tool_calls = Vec::new();
        let mut current_tool: Option<(String, String, String)> = None; // (id, name, input json)

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(event) = serde_json::from_str::<Value>(data) else {
                    continue;
                };

                match event.get("type").and_then(Value::as_str) {
                    Some("message_start") => {
                        if let Some(n) = event
                            .pointer("/message/usage/input_tokens")
                            .and_then(Value::as_u64)
                        {
                            input_tokens = n as u32;
                        }
                    }
                    Some("content_block_start") => {
                        let block = &event["content_block"];
                        if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                            current_tool = Some((
                                block["id"].as_str().unwrap_or_default().to_string(),
                                block["name"].as_str().unwrap_or_default().to_string(),
                                String::new(),
                            ));
                        }
                    }
                    Some("content_block_delta") => match event
                        .pointer("/delta/type")
                        .and_then(Value::as_str)
                    {
                        Some("text_delta") => {
                            if let Some(text) =
                                event.pointer("/delta/text").and_then(Value::as_str)
                            {
                                if first_token_at.is_none() {
                                    first_token_at = Some(start.elapsed());
                                }
                                if tx
                                    .send(TokenChunk::token(text, BACKEND_NAME))
                                    .await
                                    .is_err()
                                {
                                    return Ok((
                                        input_tokens,
                                        output_tokens,
                                        first_token_at,
                                        tool_calls,
                                    ));
                                }
                            }
                        }
                        Some("input_json_delta") => {
                            if let Some((_, _, input)) = current_tool.as_mut() {
                                if let Some(partial) = event
                                    .pointer("/delta/partial_json")
                                    .and_then(Value::as_str)
                                {
                                    input.push_str(partial);
                                }
                            }
                        }
                        _ => {}
                    },
                    Some("content_block_stop") => {
                        if let Some((id, name, input)) = current_tool.take() {
                            let arguments =
                                serde_json::from_str(&input).unwrap_or_else(|_| Value::Object(Default::default()));
                            tool_calls.push(ToolCall { id, name, arguments });
                        }
                    }
                    Some("message_delta") => {
                        if let Some(n) = event
                            .pointer("/usage/output_tokens")
                            .and_then(Value::as_u64)
                        {
                            output_tokens = n as u32;
                        }
                    }
                    _ => {}
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

        Ok((input_tokens, output_tokens, first_token_at, tool_calls))
    }
}

struct CallResult {
    outcome: ToolOutcome,
    finish_reason: FinishReason,
    input_tokens: u32,
    output_tokens: u32,
    latency: Duration,
}

fn stop_reason_to_finish(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: String,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_is_lifted() {
        let messages = vec![
            Message::system("You are terse."),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let (system, api) = AnthropicBackend::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("You are terse."));
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "user");
        assert_eq!(api[1].role, "assistant");
    }

    #[test]
    fn test_response_parsing_with_tool_use() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Baltimore"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 100, "output_tokens": 30}
        }"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        let calls = tools::normalize_anthropic_calls(&resp.content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(stop_reason_to_finish(&resp.stop_reason), FinishReason::ToolCalls);
    }
}
