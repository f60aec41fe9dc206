//! Backend descriptors and per-model execution configs
//!
//! A backend descriptor says *where* a model runs; the model config says
//! *how* (context window, batch size, sampling knobs). The split lets one
//! backend serve many models with different execution profiles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pricing::ModelPricing;

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Primary local inference server (ollama-compatible API)
    Ollama,
    /// Secondary local inference server (OpenAI-compatible completions)
    Mlx,
    /// Try the preferred local backend first, fall back to the other
    Auto,
    OpenAi,
    Anthropic,
    Google,
}

impl BackendType {
    pub fn is_cloud(&self) -> bool {
        matches!(
            self,
            BackendType::OpenAi | BackendType::Anthropic | BackendType::Google
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Ollama => "ollama",
            BackendType::Mlx => "mlx",
            BackendType::Auto => "auto",
            BackendType::OpenAi => "openai",
            BackendType::Anthropic => "anthropic",
            BackendType::Google => "google",
        }
    }

    /// Parse a `provider/model` prefix; returns the provider and true model id.
    pub fn from_model_prefix(model: &str) -> Option<(BackendType, &str)> {
        let (prefix, rest) = model.split_once('/')?;
        let backend = match prefix.to_ascii_lowercase().as_str() {
            "openai" => BackendType::OpenAi,
            "anthropic" => BackendType::Anthropic,
            "google" => BackendType::Google,
            _ => return None,
        };
        Some((backend, rest))
    }
}

/// Where and with which limits a model runs. Loaded from the admin store,
/// cached for a bounded TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub model_name: String,
    pub backend_type: BackendType,
    /// Endpoint URL for local backends; cloud providers use their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// The real model id when `model_name` carries a provider prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature_default: f32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// −1 = keep loaded forever, 0 = release immediately, >0 = seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

fn default_true() -> bool {
    true
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout() -> u64 {
    60
}
fn default_keep_alive() -> i64 {
    -1
}

impl BackendDescriptor {
    /// Safe default: point an unknown model at the primary local backend.
    pub fn local_default(model: &str, ollama_url: &str) -> Self {
        Self {
            model_name: model.to_string(),
            backend_type: BackendType::Ollama,
            endpoint_url: Some(ollama_url.to_string()),
            model_id: None,
            priority: 0,
            enabled: true,
            max_tokens: default_max_tokens(),
            temperature_default: default_temperature(),
            timeout_seconds: default_timeout(),
            keep_alive_seconds: default_keep_alive(),
            pricing: None,
        }
    }

    /// Descriptor synthesised from a `provider/model` prefix.
    pub fn cloud_from_prefix(model: &str, backend: BackendType, model_id: &str) -> Self {
        Self {
            model_name: model.to_string(),
            backend_type: backend,
            endpoint_url: None,
            model_id: Some(model_id.to_string()),
            priority: 0,
            enabled: true,
            max_tokens: 4096,
            temperature_default: default_temperature(),
            timeout_seconds: 120,
            keep_alive_seconds: default_keep_alive(),
            pricing: None,
        }
    }

    /// The model id sent to the provider API.
    pub fn effective_model_id(&self) -> &str {
        self.model_id.as_deref().unwrap_or_else(|| {
            self.model_name
                .split_once('/')
                .map(|(_, id)| id)
                .unwrap_or(&self.model_name)
        })
    }
}

/// Per-model execution profile, separate from the backend descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    /// Ollama execution options (num_ctx, num_batch, mirostat, top_k, ...)
    #[serde(default)]
    pub ollama_options: HashMap<String, serde_json::Value>,
    /// MLX execution options (max_kv_size, quantization, ...)
    #[serde(default)]
    pub mlx_options: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive_seconds: Option<i64>,
}

impl ModelConfig {
    /// Empty profile; backend defaults apply.
    pub fn empty(model: &str) -> Self {
        Self {
            model_name: model.to_string(),
            ollama_options: HashMap::new(),
            mlx_options: HashMap::new(),
            temperature: None,
            max_tokens: None,
            timeout_seconds: None,
            keep_alive_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_prefix_parsing() {
        let (backend, id) = BackendType::from_model_prefix("openai/gpt-4o-mini").unwrap();
        assert_eq!(backend, BackendType::OpenAi);
        assert_eq!(id, "gpt-4o-mini");

        assert!(BackendType::from_model_prefix("phi3:mini").is_none());
        assert!(BackendType::from_model_prefix("acme/whatever").is_none());
    }

    #[test]
    fn test_effective_model_id() {
        let desc = BackendDescriptor::cloud_from_prefix(
            "anthropic/claude-3-5-haiku-20241022",
            BackendType::Anthropic,
            "claude-3-5-haiku-20241022",
        );
        assert_eq!(desc.effective_model_id(), "claude-3-5-haiku-20241022");

        let local = BackendDescriptor::local_default("phi3:mini", "http://localhost:11434");
        assert_eq!(local.effective_model_id(), "phi3:mini");
        assert_eq!(local.keep_alive_seconds, -1);
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"{"model_name": "qwen3:8b", "backend_type": "ollama"}"#;
        let desc: BackendDescriptor = serde_json::from_str(json).unwrap();
        assert!(desc.enabled);
        assert_eq!(desc.max_tokens, 2048);
        assert_eq!(desc.keep_alive_seconds, -1);
    }
}
