//! Router-level request and response types

use std::time::Duration;

use hearth_core::{FinishReason, ToolCall};

/// Per-call options for any generate variant
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    /// Classified intent, carried into usage records and metrics
    pub intent: Option<String>,
    /// Pipeline stage tag for metrics ("classify", "synthesize", ...)
    pub stage: Option<String>,
}

impl GenerateOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// Result of a plain generation call
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub finish_reason: FinishReason,
    /// Which backend actually served the call
    pub backend: String,
    pub latency: Duration,
}

/// Tool-calling result: either text or normalised tool calls
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Result of a tool-calling generation
#[derive(Debug, Clone)]
pub struct ToolGeneration {
    pub outcome: ToolOutcome,
    pub backend: String,
    pub model: String,
    pub output_tokens: Option<u32>,
    pub latency: Duration,
}

impl ToolGeneration {
    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.outcome {
            ToolOutcome::ToolCalls(calls) => calls,
            ToolOutcome::Text(_) => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Text(text) => Some(text),
            ToolOutcome::ToolCalls(_) => None,
        }
    }
}

/// One item of a router token stream. The terminal item (`done == true`)
/// carries token counts and the total duration.
#[derive(Debug, Clone)]
pub struct TokenChunk {
    pub token: String,
    pub done: bool,
    pub backend: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_duration: Option<Duration>,
}

impl TokenChunk {
    pub fn token(token: impl Into<String>, backend: &str) -> Self {
        Self {
            token: token.into(),
            done: false,
            backend: backend.to_string(),
            input_tokens: None,
            output_tokens: None,
            total_duration: None,
        }
    }

    pub fn terminal(
        backend: &str,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        total_duration: Duration,
    ) -> Self {
        Self {
            token: String::new(),
            done: true,
            backend: backend.to_string(),
            input_tokens,
            output_tokens,
            total_duration: Some(total_duration),
        }
    }
}
