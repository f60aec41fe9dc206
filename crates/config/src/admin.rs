//! Admin store client
//!
//! Every dynamic-config read goes through here: backend descriptors, model
//! execution configs, decrypted provider credentials, pricing, feature
//! flags, intent routing, component-model assignments, plus fire-and-forget
//! usage and metric writes. Each kind is cached for its own TTL; the push
//! invalidation endpoint clears entries so the next read refills.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hearth_core::UsageRecord;

use crate::backends::{BackendDescriptor, BackendType, ModelConfig};
use crate::flags::{FeatureFlag, FeatureFlagCache};
use crate::pricing::{default_pricing, ModelPricing};
use crate::ConfigError;

/// Decrypted credentials for a cloud provider. Served over a trusted
/// channel only; cached briefly so rotation propagates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// A named role ("intent_classifier", "smart_home_control") bound to a
/// model by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentModel {
    pub component: String,
    pub model_name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Per-intent routing row from the admin store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRouting {
    #[serde(default)]
    pub use_rag: bool,
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Gateway knobs owned by the admin store; these override env settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_requests_per_minute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_failure_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_recovery_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

struct Cached<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn fresh(&self) -> Option<T> {
        (Instant::now() < self.expires_at).then(|| self.value.clone())
    }
}

/// HTTP client for the admin backend with per-kind snapshot caches.
pub struct AdminClient {
    base_url: String,
    http: reqwest::Client,
    cache_ttl: Duration,

    backends: RwLock<HashMap<String, Cached<BackendDescriptor>>>,
    model_configs: RwLock<HashMap<String, Cached<ModelConfig>>>,
    credentials: RwLock<HashMap<String, Cached<Option<ProviderCredentials>>>>,
    pricing: RwLock<HashMap<String, Cached<ModelPricing>>>,
    component_models: RwLock<HashMap<String, Cached<Option<ComponentModel>>>>,
    intent_routing: RwLock<Option<Cached<HashMap<String, IntentRouting>>>>,
    gateway_overrides: RwLock<Option<Cached<GatewayOverrides>>>,

    pub flags: FeatureFlagCache,
}

const CREDENTIALS_TTL: Duration = Duration::from_secs(300);
const PRICING_TTL: Duration = Duration::from_secs(3600);

impl AdminClient {
    pub fn new(base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into(),
            http,
            cache_ttl,
            backends: RwLock::new(HashMap::new()),
            model_configs: RwLock::new(HashMap::new()),
            credentials: RwLock::new(HashMap::new()),
            pricing: RwLock::new(HashMap::new()),
            component_models: RwLock::new(HashMap::new()),
            intent_routing: RwLock::new(None),
            gateway_overrides: RwLock::new(None),
            flags: FeatureFlagCache::new(cache_ttl),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Backend descriptor for a model.
    ///
    /// `provider/model` prefixes force the cloud path without consulting
    /// the store; unknown models synthesise a local default so routing
    /// never fails on a lookup miss.
    pub async fn backend_for(&self, model: &str, ollama_url: &str) -> BackendDescriptor {
        if let Some(cached) = self.backends.read().get(model).and_then(Cached::fresh) {
            return cached;
        }

        if let Some((backend, model_id)) = BackendType::from_model_prefix(model) {
            let desc = BackendDescriptor::cloud_from_prefix(model, backend, model_id);
            self.cache_backend(desc.clone());
            return desc;
        }

        match self.fetch_backends().await {
            Ok(list) => {
                let desc = list
                    .into_iter()
                    .find(|b| b.model_name == model)
                    .unwrap_or_else(|| {
                        tracing::warn!(model, "no backend descriptor, using local default");
                        BackendDescriptor::local_default(model, ollama_url)
                    });
                self.cache_backend(desc.clone());
                desc
            }
            Err(err) => {
                tracing::error!(model, error = %err, "backend config fetch failed");
                BackendDescriptor::local_default(model, ollama_url)
            }
        }
    }

    fn cache_backend(&self, desc: BackendDescriptor) {
        self.backends.write().insert(
            desc.model_name.clone(),
            Cached {
                value: desc,
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
    }

    async fn fetch_backends(&self) -> Result<Vec<BackendDescriptor>, ConfigError> {
        let resp = self
            .http
            .get(self.url("/api/llm-backends/public"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// All known backend descriptors, for `/v1/models` discovery.
    pub async fn list_backends(&self) -> Vec<BackendDescriptor> {
        self.fetch_backends().await.unwrap_or_default()
    }

    /// Model execution profile; empty profile when the store has none.
    pub async fn model_config(&self, model: &str) -> ModelConfig {
        if let Some(cached) = self.model_configs.read().get(model).and_then(Cached::fresh) {
            return cached;
        }

        let config = match self
            .http
            .get(self.url(&format!("/api/model-configs/public/{model}")))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                resp.json().await.unwrap_or_else(|err| {
                    tracing::warn!(model, error = %err, "model config parse failed");
                    ModelConfig::empty(model)
                })
            }
            Ok(_) => ModelConfig::empty(model),
            Err(err) => {
                tracing::warn!(model, error = %err, "model config fetch failed");
                ModelConfig::empty(model)
            }
        };

        self.model_configs.write().insert(
            model.to_string(),
            Cached {
                value: config.clone(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
        config
    }

    /// Decrypted cloud credentials. None when the store has no row or the
    /// request failed; cached for five minutes either way.
    pub async fn credentials(&self, provider: &str) -> Option<ProviderCredentials> {
        if let Some(cached) = self
            .credentials
            .read()
            .get(provider)
            .and_then(Cached::fresh)
        {
            return cached;
        }

        let creds = match self
            .http
            .get(self.url(&format!("/api/external-api-keys/public/{provider}/key")))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.json().await.ok(),
            Ok(resp) => {
                tracing::warn!(provider, status = %resp.status(), "credentials not found");
                None
            }
            Err(err) => {
                tracing::error!(provider, error = %err, "credentials fetch failed");
                None
            }
        };

        self.credentials.write().insert(
            provider.to_string(),
            Cached {
                value: creds.clone(),
                expires_at: Instant::now() + CREDENTIALS_TTL,
            },
        );
        creds
    }

    /// Pricing for a cloud model, store first, hardcoded fallback second.
    pub async fn pricing(&self, provider: &str, model: &str) -> ModelPricing {
        let key = format!("{provider}/{model}");
        if let Some(cached) = self.pricing.read().get(&key).and_then(Cached::fresh) {
            return cached;
        }

        #[derive(Deserialize)]
        struct PricingRow {
            input_cost_per_1m: f64,
            output_cost_per_1m: f64,
        }

        let pricing = match self
            .http
            .get(self.url(&format!("/api/cloud-providers/pricing/{provider}/{model}")))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp
                .json::<PricingRow>()
                .await
                .map(|row| ModelPricing::new(row.input_cost_per_1m, row.output_cost_per_1m))
                .unwrap_or_else(|_| default_pricing(provider, model)),
            _ => default_pricing(provider, model),
        };

        self.pricing.write().insert(
            key,
            Cached {
                value: pricing,
                expires_at: Instant::now() + PRICING_TTL,
            },
        );
        pricing
    }

    /// Feature flag lookup with the per-flag cache.
    pub async fn feature_flag(&self, name: &str) -> Option<FeatureFlag> {
        if let Some(flag) = self.flags.get(name) {
            return Some(flag);
        }

        match self
            .http
            .get(self.url(&format!("/api/features/public/{name}")))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                let flag: FeatureFlag = resp.json().await.ok()?;
                self.flags.put(flag.clone());
                Some(flag)
            }
            _ => None,
        }
    }

    /// Convenience: enabled state with a default for unknown flags.
    pub async fn is_feature_enabled(&self, name: &str, default: bool) -> bool {
        self.feature_flag(name)
            .await
            .map(|f| f.enabled)
            .unwrap_or(default)
    }

    /// Component-model assignment ("intent_classifier" → model), cached.
    pub async fn component_model(&self, component: &str) -> Option<ComponentModel> {
        if let Some(cached) = self
            .component_models
            .read()
            .get(component)
            .and_then(Cached::fresh)
        {
            return cached;
        }

        let assignment = match self
            .http
            .get(self.url(&format!("/api/component-models/public/{component}")))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.json().await.ok(),
            _ => None,
        };

        self.component_models.write().insert(
            component.to_string(),
            Cached {
                value: assignment.clone(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
        assignment
    }

    /// Intent→provider routing table for the search engine, cached.
    pub async fn intent_routing(&self) -> HashMap<String, IntentRouting> {
        if let Some(cached) = self
            .intent_routing
            .read()
            .as_ref()
            .and_then(Cached::fresh)
        {
            return cached;
        }

        let routing = match self
            .http
            .get(self.url("/api/search/intent-routing/public"))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.json().await.unwrap_or_default(),
            _ => HashMap::new(),
        };

        *self.intent_routing.write() = Some(Cached {
            value: routing.clone(),
            expires_at: Instant::now() + self.cache_ttl,
        });
        routing
    }

    /// Gateway knobs owned by the admin store.
    pub async fn gateway_overrides(&self) -> GatewayOverrides {
        if let Some(cached) = self
            .gateway_overrides
            .read()
            .as_ref()
            .and_then(Cached::fresh)
        {
            return cached;
        }

        let overrides = match self
            .http
            .get(self.url("/api/gateway-config/public"))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.json().await.unwrap_or_default(),
            _ => GatewayOverrides::default(),
        };

        *self.gateway_overrides.write() = Some(Cached {
            value: overrides.clone(),
            expires_at: Instant::now() + self.cache_ttl,
        });
        overrides
    }

    /// Drop the gateway-config snapshot so the next read refills.
    pub fn invalidate_gateway_overrides(&self) {
        *self.gateway_overrides.write() = None;
    }

    /// Drop backend/model-config snapshots.
    pub fn invalidate_backends(&self) {
        self.backends.write().clear();
        self.model_configs.write().clear();
    }

    /// Append one usage record, fire-and-forget. Failures are logged and
    /// never propagate into request handling.
    pub fn submit_usage(&self, record: UsageRecord) {
        let url = self.url("/api/cloud-llm-usage");
        let http = self.http.clone();
        tokio::spawn(async move {
            match http.post(&url).json(&record).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(status = %resp.status(), "usage record rejected");
                }
                Err(err) => tracing::error!(error = %err, "usage record write failed"),
                _ => {}
            }
        });
    }

    /// Append one latency/throughput metric, fire-and-forget.
    pub fn submit_metric(&self, metric: Value) {
        let url = self.url("/api/llm-backends/metrics");
        let http = self.http.clone();
        tokio::spawn(async move {
            match http.post(&url).json(&metric).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(status = %resp.status(), "metric rejected");
                }
                Err(err) => tracing::error!(error = %err, "metric write failed"),
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AdminClient {
        // Points at a closed port; every fetch falls back.
        AdminClient::new("http://127.0.0.1:9", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_backend_for_prefix_skips_store() {
        let c = client();
        let desc = c.backend_for("openai/gpt-4o-mini", "http://localhost:11434").await;
        assert_eq!(desc.backend_type, BackendType::OpenAi);
        assert_eq!(desc.effective_model_id(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_backend_for_unknown_model_falls_back_to_local() {
        let c = client();
        let desc = c.backend_for("phi3:mini", "http://localhost:11434").await;
        assert_eq!(desc.backend_type, BackendType::Ollama);
        assert_eq!(desc.endpoint_url.as_deref(), Some("http://localhost:11434"));
    }

    #[tokio::test]
    async fn test_pricing_falls_back_to_defaults() {
        let c = client();
        let pricing = c.pricing("openai", "gpt-4o").await;
        assert_eq!(pricing, ModelPricing::new(2.50, 10.00));
    }

    #[tokio::test]
    async fn test_model_config_empty_on_failure() {
        let c = client();
        let config = c.model_config("qwen3:8b").await;
        assert!(config.ollama_options.is_empty());
        assert!(config.max_tokens.is_none());
    }
}
