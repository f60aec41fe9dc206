//! Static settings loaded at startup
//!
//! Environment variables override file values; the admin store overrides
//! both at runtime for the kinds it owns (gateway knobs, backends, flags).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            home_assistant: HomeAssistantConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional API key; when set, requests must carry it
    pub api_key: Option<String>,
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_key: None,
            cors_enabled: true,
        }
    }
}

/// Admin store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub url: String,
    /// Per-kind snapshot cache TTL
    pub cache_ttl_seconds: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            cache_ttl_seconds: 60,
        }
    }
}

/// Global token-bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
        }
    }
}

/// Orchestrator circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub recovery_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_seconds: 30,
        }
    }
}

/// LLM routing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Primary local inference endpoint (ollama-compatible)
    pub ollama_url: String,
    /// Secondary local inference endpoint (OpenAI-compatible completions)
    pub mlx_url: String,
    /// Backend order tried for `auto` models
    pub auto_backend_order: Vec<String>,
    /// Default model when a request names a virtual alias
    pub default_model: String,
    /// Model used by the keyword-fallback intent classifier
    pub intent_model: String,
    pub intent_temperature: f32,
    pub intent_max_tokens: u32,
    pub intent_timeout_seconds: u64,
    /// Rolling metrics window length
    pub metrics_window_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            mlx_url: "http://localhost:8800".to_string(),
            auto_backend_order: vec!["mlx".to_string(), "ollama".to_string()],
            default_model: "phi3:mini".to_string(),
            intent_model: "phi3:mini".to_string(),
            intent_temperature: 0.1,
            intent_max_tokens: 10,
            intent_timeout_seconds: 5,
            metrics_window_size: 100,
        }
    }
}

/// Parallel search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Global deadline for a provider fan-out, seconds
    pub timeout_seconds: f64,
    pub limit_per_provider: usize,
    pub brave_api_key: Option<String>,
    pub ticketmaster_api_key: Option<String>,
    pub eventbrite_api_key: Option<String>,
    pub searxng_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 3.0,
            limit_per_provider: 5,
            brave_api_key: None,
            ticketmaster_api_key: None,
            eventbrite_api_key: None,
            searxng_url: None,
        }
    }
}

/// Home Assistant connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    pub url: String,
    pub token: Option<String>,
    /// Room assumed when satellite detection finds nothing
    pub default_room: String,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            token: None,
            default_room: "office".to_string(),
        }
    }
}

/// Session manager knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub session_ttl_seconds: u64,
    pub max_turns: usize,
    pub cleanup_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 256,
            session_ttl_seconds: 1800,
            max_turns: 20,
            cleanup_interval_seconds: 300,
        }
    }
}

/// Load settings from an optional TOML file plus environment variables.
///
/// Layering (later wins): defaults ← file ← `HEARTH_*` env ← well-known
/// plain env names (`RATE_LIMIT_RPM`, `ADMIN_API_URL`, ...).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    builder = builder.add_source(
        Environment::with_prefix("HEARTH")
            .separator("__")
            .try_parsing(true),
    );

    let mut settings: Settings = builder.build()?.try_deserialize().unwrap_or_default();

    // Well-known plain environment names, kept for deployment compatibility.
    if let Ok(v) = std::env::var("RATE_LIMIT_RPM") {
        if let Ok(rpm) = v.parse() {
            settings.rate_limit.requests_per_minute = rpm;
        }
    }
    if let Ok(v) = std::env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD") {
        if let Ok(n) = v.parse() {
            settings.circuit_breaker.failure_threshold = n;
        }
    }
    if let Ok(v) = std::env::var("CIRCUIT_BREAKER_RECOVERY_SECONDS") {
        if let Ok(n) = v.parse() {
            settings.circuit_breaker.recovery_seconds = n;
        }
    }
    if let Ok(v) = std::env::var("SEARCH_TIMEOUT") {
        if let Ok(n) = v.parse() {
            settings.search.timeout_seconds = n;
        }
    }
    if let Ok(v) = std::env::var("ADMIN_API_URL") {
        settings.admin.url = v;
    }
    if let Ok(v) = std::env::var("OLLAMA_URL") {
        settings.llm.ollama_url = v;
    }
    if let Ok(v) = std::env::var("MLX_URL") {
        settings.llm.mlx_url = v;
    }
    if let Ok(v) = std::env::var("HA_URL") {
        settings.home_assistant.url = v;
    }
    if let Ok(v) = std::env::var("HA_TOKEN") {
        settings.home_assistant.token = Some(v);
    }
    if let Ok(v) = std::env::var("GATEWAY_API_KEY") {
        settings.server.api_key = Some(v);
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.rate_limit.requests_per_minute, 60);
        assert_eq!(settings.circuit_breaker.failure_threshold, 5);
        assert_eq!(settings.search.timeout_seconds, 3.0);
        assert_eq!(settings.llm.auto_backend_order, vec!["mlx", "ollama"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/hearth.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
