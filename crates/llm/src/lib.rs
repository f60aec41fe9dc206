//! LLM Router
//!
//! One uniform interface over every language-model backend:
//! - Plain generation, tool-calling generation, streaming generation
//! - Local inference servers (ollama-compatible, OpenAI-compatible) and
//!   cloud providers (OpenAI, Anthropic, Google)
//! - Tool-schema translation between providers
//! - Cost accounting with fire-and-forget usage records
//! - Bounded rolling performance metrics

pub mod backends;
pub mod metrics;
pub mod router;
pub mod tools;
pub mod types;
pub mod usage_sink;

pub use metrics::{MetricsReport, MetricsWindow};
pub use router::LlmRouter;
pub use types::{GenerateOptions, Generation, TokenChunk, ToolGeneration, ToolOutcome};
pub use usage_sink::{AdminUsageSink, UsageSink};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures eligible for the single jittered retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for hearth_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Api { status, body } if status < 500 => {
                hearth_core::Error::BadRequest(format!("{status}: {body}"))
            }
            LlmError::Api { status, body } => {
                hearth_core::Error::Upstream(format!("{status}: {body}"))
            }
            LlmError::Network(msg) => hearth_core::Error::Upstream(msg),
            LlmError::InvalidResponse(msg) => hearth_core::Error::Upstream(msg),
            LlmError::Timeout => hearth_core::Error::Timeout("llm call".to_string()),
            LlmError::NotConfigured(provider) => {
                hearth_core::Error::ProviderNotConfigured(provider)
            }
            LlmError::Configuration(msg) => hearth_core::Error::Config(msg),
        }
    }
}
