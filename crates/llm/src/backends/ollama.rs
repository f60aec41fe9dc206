//! Primary local inference backend (ollama-compatible API)
//!
//! Plain generation uses `/api/generate`, tool calling uses `/api/chat`,
//! streaming consumes the NDJSON line stream. The `keep_alive` field is
//! forwarded as an integer: −1 keep forever, 0 release immediately,
//! >0 seconds.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use hearth_core::{FinishReason, Message, ToolDefinition};

use crate::backends::LineBuffer;
use crate::tools;
use crate::types::{Generation, TokenChunk, ToolGeneration, ToolOutcome};
use crate::LlmError;

pub const BACKEND_NAME: &str = "ollama";

/// Per-call parameters resolved by the router from descriptor + model config
#[derive(Debug, Clone)]
pub struct OllamaParams {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub keep_alive: i64,
    pub options: HashMap<String, Value>,
}

pub struct OllamaBackend {
    http: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn build_options(params: &OllamaParams) -> Value {
        let mut options = serde_json::Map::new();
        options.insert("temperature".into(), params.temperature.into());
        options.insert("num_predict".into(), params.max_tokens.into());
        for (key, value) in &params.options {
            if !value.is_null() {
                options.insert(key.clone(), value.clone());
            }
        }
        Value::Object(options)
    }

    /// Plain generation, single response.
    pub async fn generate(
        &self,
        params: &OllamaParams,
        prompt: &str,
    ) -> Result<Generation, LlmError> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &params.model,
            prompt,
            stream: false,
            options: Self::build_options(params),
            keep_alive: params.keep_alive,
        };

        let response = self
            .http
            .post(format!("{}/api/generate", params.endpoint))
            .timeout(params.timeout)
            .json(&request)
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

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(Generation {
            text: data.response.unwrap_or_default(),
            input_tokens: data.prompt_eval_count,
            output_tokens: data.eval_count,
            finish_reason: if data.done {
                FinishReason::Stop
            } else {
                FinishReason::Length
            },
            backend: BACKEND_NAME.to_string(),
            latency: start.elapsed(),
        })
    }

    /// Streaming generation over the NDJSON line stream. Tokens are pushed
    /// into `tx` in arrival order; the terminal chunk carries counts.
    pub async fn generate_stream(
        &self,
        params: &OllamaParams,
        prompt: &str,
        tx: &mpsc::Sender<TokenChunk>,
    ) -> Result<(), LlmError> {
        let start = Instant::now();
        let request = GenerateRequest {
            model: &params.model,
            prompt,
            stream: true,
            options: Self::build_options(params),
            keep_alive: params.keep_alive,
        };

        let response = self
            .http
            .post(format!("{}/api/generate", params.endpoint))
            .timeout(params.timeout)
            .json(&request)
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

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                if line.is_empty() {
                    continue;
                }
                let Ok(piece) = serde_json::from_str::<StreamPiece>(&line) else {
                    let preview: String = line.chars().take(100).collect();
                    tracing::warn!(line = %preview, "ollama stream parse error");
                    continue;
                };

                if !piece.response.is_empty()
                    && tx
                        .send(TokenChunk::token(&piece.response, BACKEND_NAME))
                        .await
                        .is_err()
                {
                    // Consumer went away; stop pulling from the provider.
                    return Ok(());
                }

                if piece.done {
                    let _ = tx
                        .send(TokenChunk::terminal(
                            BACKEND_NAME,
                            piece.prompt_eval_count,
                            piece.eval_count,
                            start.elapsed(),
                        ))
                        .await;
                    return Ok(());
                }
            }
        }

        let _ = tx
            .send(TokenChunk::terminal(BACKEND_NAME, None, None, start.elapsed()))
            .await;
        Ok(())
    }

    /// Tool-calling chat via `/api/chat`, native tool support.
    pub async fn generate_with_tools(
        &self,
        params: &OllamaParams,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> Result<ToolGeneration, LlmError> {
        let start = Instant::now();

        let mut request = serde_json::json!({
            "model": params.model,
            "messages": messages.iter().map(|m| serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })).collect::<Vec<_>>(),
            "tools": tools::to_openai(tool_defs),
            "stream": false,
            "options": Self::build_options(params),
            "keep_alive": params.keep_alive,
        });

        // qwen3 writes to a separate thinking field unless disabled.
        if params.model.to_lowercase().contains("qwen3") {
            request["think"] = Value::Bool(false);
        }

        let response = self
            .http
            .post(format!("{}/api/chat", params.endpoint))
            .timeout(params.timeout)
            .json(&request)
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

        let message = data.get("message").cloned().unwrap_or_default();
        let output_tokens = data
            .get("eval_count")
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

    /// Health probe via the model list endpoint.
    pub async fn is_available(&self, endpoint: &str) -> bool {
        self.http
            .get(format!("{endpoint}/api/tags"))
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Value,
    keep_alive: i64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamPiece {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> OllamaParams {
        OllamaParams {
            endpoint: "http://localhost:11434".into(),
            model: "phi3:mini".into(),
            temperature: 0.7,
            max_tokens: 256,
            timeout: Duration::from_secs(30),
            keep_alive: -1,
            options: HashMap::from([("num_ctx".to_string(), Value::from(8192))]),
        }
    }

    #[test]
    fn test_options_merge_model_config() {
        let options = OllamaBackend::build_options(&params());
        assert_eq!(options["num_predict"], 256);
        assert_eq!(options["num_ctx"], 8192);
        assert!((options["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_stream_piece_parsing() {
        let line = r#"{"model":"phi3:mini","response":"Hel","done":false}"#;
        let piece: StreamPiece = serde_json::from_str(line).unwrap();
        assert_eq!(piece.response, "Hel");
        assert!(!piece.done);

        let last = r#"{"response":"","done":true,"eval_count":42,"prompt_eval_count":10}"#;
        let piece: StreamPiece = serde_json::from_str(last).unwrap();
        assert!(piece.done);
        assert_eq!(piece.eval_count, Some(42));
    }
}
