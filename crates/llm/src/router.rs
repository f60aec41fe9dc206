//! The LLM router
//!
//! Owns every outbound call to any language-model backend. Selection
//! order: backend descriptor lookup → `provider/model` prefix forces the
//! cloud path → `auto` tries the preferred local backend first and falls
//! through to the alternative → cloud backends gate on stored credentials.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use hearth_config::settings::LlmConfig;
use hearth_config::{AdminClient, BackendDescriptor, BackendType, ModelConfig};
use hearth_core::{Message, ToolDefinition, UsageRecord};

use crate::backends::{
    anthropic::AnthropicParams, google::GoogleParams, mlx::MlxParams, ollama::OllamaParams,
    openai::OpenAiParams, AnthropicBackend, GoogleBackend, MlxBackend, OllamaBackend,
    OpenAiBackend,
};
use crate::metrics::{MetricSample, MetricsWindow};
use crate::types::{GenerateOptions, Generation, TokenChunk, ToolGeneration};
use crate::usage_sink::UsageSink;
use crate::LlmError;

/// Resolved per-call knobs after layering options over model config over
/// the backend descriptor.
struct ResolvedParams {
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    keep_alive: i64,
}

fn resolve(
    opts: &GenerateOptions,
    model_config: &ModelConfig,
    descriptor: &BackendDescriptor,
) -> ResolvedParams {
    ResolvedParams {
        temperature: opts
            .temperature
            .or(model_config.temperature)
            .unwrap_or(descriptor.temperature_default),
        max_tokens: opts
            .max_tokens
            .or(model_config.max_tokens)
            .unwrap_or(descriptor.max_tokens),
        timeout: Duration::from_secs(
            model_config
                .timeout_seconds
                .unwrap_or(descriptor.timeout_seconds),
        ),
        keep_alive: model_config
            .keep_alive_seconds
            .unwrap_or(descriptor.keep_alive_seconds),
    }
}

/// Routes LLM requests to configured backends.
pub struct LlmRouter {
    admin: Arc<AdminClient>,
    config: LlmConfig,
    ollama: OllamaBackend,
    mlx: MlxBackend,
    openai: OpenAiBackend,
    anthropic: AnthropicBackend,
    google: GoogleBackend,
    metrics: MetricsWindow,
    usage_sink: Arc<dyn UsageSink>,
}

impl LlmRouter {
    pub fn new(
        admin: Arc<AdminClient>,
        config: LlmConfig,
        usage_sink: Arc<dyn UsageSink>,
    ) -> Self {
        let http = reqwest::Client::new();
        let metrics = MetricsWindow::new(config.metrics_window_size);
        Self {
            admin,
            config,
            ollama: OllamaBackend::new(http.clone()),
            mlx: MlxBackend::new(http.clone()),
            openai: OpenAiBackend::new(http.clone()),
            anthropic: AnthropicBackend::new(http.clone()),
            google: GoogleBackend::new(http),
            metrics,
            usage_sink,
        }
    }

    /// Plain text generation.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        let descriptor = self
            .admin
            .backend_for(model, &self.config.ollama_url)
            .await;
        let model_config = self.admin.model_config(model).await;
        let params = resolve(opts, &model_config, &descriptor);

        tracing::info!(
            model,
            backend = descriptor.backend_type.as_str(),
            keep_alive = params.keep_alive,
            "routing llm request"
        );

        let result = match descriptor.backend_type {
            BackendType::Auto => self.generate_auto(model, prompt, &model_config, &params).await,
            BackendType::Ollama => {
                let call = self.ollama_params(&descriptor, &model_config, &params);
                self.retry_once(|| self.ollama.generate(&call, prompt)).await
            }
            BackendType::Mlx => {
                let call = self.mlx_params(&descriptor, &model_config, &params);
                self.retry_once(|| self.mlx.generate(&call, prompt)).await
            }
            BackendType::OpenAi => {
                let call = self.openai_params(&descriptor, &params).await?;
                let result = self.openai
                    .generate(&call, prompt, opts.system_prompt.as_deref())
                    .await;
                self.finish_cloud_call("openai", &call.model, result, opts, false)
                    .await
            }
            BackendType::Anthropic => {
                let call = self.anthropic_params(&descriptor, &params).await?;
                let result = self.anthropic
                    .generate(&call, prompt, opts.system_prompt.as_deref())
                    .await;
                self.finish_cloud_call("anthropic", &call.model, result, opts, false)
                    .await
            }
            BackendType::Google => {
                let call = self.google_params(&descriptor, &params).await?;
                let result = self.google
                    .generate(&call, prompt, opts.system_prompt.as_deref())
                    .await;
                self.finish_cloud_call("google", &call.model, result, opts, false)
                    .await
            }
        };

        if let Ok(generation) = &result {
            self.record_metric(model, generation, opts);
        }
        result
    }

    /// Tool-calling generation. Tool-call responses are normalised to the
    /// canonical shape regardless of provider.
    pub async fn generate_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
        opts: &GenerateOptions,
    ) -> Result<ToolGeneration, LlmError> {
        let descriptor = self
            .admin
            .backend_for(model, &self.config.ollama_url)
            .await;
        let model_config = self.admin.model_config(model).await;
        let params = resolve(opts, &model_config, &descriptor);

        tracing::info!(
            model,
            backend = descriptor.backend_type.as_str(),
            tool_count = tool_defs.len(),
            request_id = opts.request_id.as_deref().unwrap_or(""),
            "routing tool-calling request"
        );

        let result = match descriptor.backend_type {
            BackendType::OpenAi => {
                let call = self.openai_params(&descriptor, &params).await?;
                let outcome = self
                    .openai
                    .generate_with_tools(&call, messages, tool_defs)
                    .await;
                self.finish_cloud_tools("openai", &call.model, outcome, opts)
                    .await
            }
            BackendType::Anthropic => {
                let call = self.anthropic_params(&descriptor, &params).await?;
                let outcome = self
                    .anthropic
                    .generate_with_tools(&call, messages, tool_defs)
                    .await;
                self.finish_cloud_tools("anthropic", &call.model, outcome, opts)
                    .await
            }
            BackendType::Google => {
                let call = self.google_params(&descriptor, &params).await?;
                let outcome = self
                    .google
                    .generate_with_tools(&call, messages, tool_defs)
                    .await;
                self.finish_cloud_tools("google", &call.model, outcome, opts)
                    .await
            }
            // Local backends: ollama speaks native tool calling, mlx and
            // auto fall back to it.
            _ => {
                let call = self.ollama_params(&descriptor, &model_config, &params);
                self.ollama
                    .generate_with_tools(&call, messages, tool_defs)
                    .await
            }
        };

        if let Ok(generation) = &result {
            let sample = MetricSample::new(
                model,
                &generation.backend,
                generation.latency,
                generation.output_tokens.unwrap_or(0),
            );
            self.push_sample(sample, opts);
        }
        result
    }

    /// Streaming generation. Tokens are pushed into `tx` in provider
    /// order; the terminal chunk carries token counts and total duration.
    /// Backends without suitable streaming support yield the entire result
    /// as one chunk followed by the terminal item.
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        opts: &GenerateOptions,
        tx: mpsc::Sender<TokenChunk>,
    ) -> Result<(), LlmError> {
        let descriptor = self
            .admin
            .backend_for(model, &self.config.ollama_url)
            .await;
        let model_config = self.admin.model_config(model).await;
        let params = resolve(opts, &model_config, &descriptor);

        tracing::info!(
            model,
            backend = descriptor.backend_type.as_str(),
            "llm stream starting"
        );

        match descriptor.backend_type {
            BackendType::Ollama => {
                let call = self.ollama_params(&descriptor, &model_config, &params);
                self.ollama.generate_stream(&call, prompt, &tx).await
            }
            BackendType::OpenAi => {
                let call = self.openai_params(&descriptor, &params).await?;
                let start = std::time::Instant::now();
                let (input, output, ttft) = self
                    .openai
                    .generate_stream(&call, prompt, opts.system_prompt.as_deref(), &tx)
                    .await?;
                self.track_cloud_usage(
                    "openai", &call.model, input, output,
                    start.elapsed(), ttft, true, opts, false,
                )
                .await;
                Ok(())
            }
            BackendType::Anthropic => {
                let call = self.anthropic_params(&descriptor, &params).await?;
                let start = std::time::Instant::now();
                let (input, output, ttft, _) = self
                    .anthropic
                    .generate_stream(&call, prompt, opts.system_prompt.as_deref(), &tx)
                    .await?;
                self.track_cloud_usage(
                    "anthropic", &call.model, input, output,
                    start.elapsed(), ttft, true, opts, false,
                )
                .await;
                Ok(())
            }
            BackendType::Google => {
                let call = self.google_params(&descriptor, &params).await?;
                let generation = self
                    .google
                    .generate(&call, prompt, opts.system_prompt.as_deref())
                    .await;
                let generation = self
                    .finish_cloud_call("google", &call.model, generation, opts, false)
                    .await?;
                self.yield_whole(&generation, &tx).await;
                Ok(())
            }
            BackendType::Mlx | BackendType::Auto => {
                let generation = match descriptor.backend_type {
                    BackendType::Mlx => {
                        let call = self.mlx_params(&descriptor, &model_config, &params);
                        self.mlx.generate(&call, prompt).await?
                    }
                    _ => {
                        self.generate_auto(model, prompt, &model_config, &params)
                            .await?
                    }
                };
                self.yield_whole(&generation, &tx).await;
                Ok(())
            }
        }
    }

    /// Aggregated rolling metrics.
    pub fn report_metrics(&self) -> crate::metrics::MetricsReport {
        self.metrics.report()
    }

    // ------------------------------------------------------------------
    // Backend selection helpers
    // ------------------------------------------------------------------

    /// `auto`: try the configured order of local backends, falling through
    /// on any failure.
    async fn generate_auto(
        &self,
        model: &str,
        prompt: &str,
        model_config: &ModelConfig,
        params: &ResolvedParams,
    ) -> Result<Generation, LlmError> {
        let mut last_error = LlmError::Configuration("no local backends configured".into());

        for backend in &self.config.auto_backend_order {
            let attempt = match backend.as_str() {
                "mlx" => {
                    let call = MlxParams {
                        endpoint: self.config.mlx_url.clone(),
                        model: model.to_string(),
                        temperature: params.temperature,
                        max_tokens: params.max_tokens,
                        timeout: params.timeout,
                        options: model_config.mlx_options.clone(),
                    };
                    self.mlx.generate(&call, prompt).await
                }
                "ollama" => {
                    let call = OllamaParams {
                        endpoint: self.config.ollama_url.clone(),
                        model: model.to_string(),
                        temperature: params.temperature,
                        max_tokens: params.max_tokens,
                        timeout: params.timeout,
                        keep_alive: params.keep_alive,
                        options: model_config.ollama_options.clone(),
                    };
                    self.ollama.generate(&call, prompt).await
                }
                other => {
                    tracing::warn!(backend = other, "unknown auto backend, skipping");
                    continue;
                }
            };

            match attempt {
                Ok(generation) => return Ok(generation),
                Err(err) => {
                    tracing::warn!(backend = %backend, error = %err, "auto backend failed, falling through");
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }

    fn ollama_params(
        &self,
        descriptor: &BackendDescriptor,
        model_config: &ModelConfig,
        params: &ResolvedParams,
    ) -> OllamaParams {
        OllamaParams {
            endpoint: descriptor
                .endpoint_url
                .clone()
                .unwrap_or_else(|| self.config.ollama_url.clone()),
            model: descriptor.effective_model_id().to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: params.timeout,
            keep_alive: params.keep_alive,
            options: model_config.ollama_options.clone(),
        }
    }

    fn mlx_params(
        &self,
        descriptor: &BackendDescriptor,
        model_config: &ModelConfig,
        params: &ResolvedParams,
    ) -> MlxParams {
        MlxParams {
            endpoint: descriptor
                .endpoint_url
                .clone()
                .unwrap_or_else(|| self.config.mlx_url.clone()),
            model: descriptor.effective_model_id().to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: params.timeout,
            options: model_config.mlx_options.clone(),
        }
    }

    async fn cloud_credentials(&self, provider: &str) -> Result<(String, Option<String>), LlmError> {
        let creds = self
            .admin
            .credentials(provider)
            .await
            .ok_or_else(|| LlmError::NotConfigured(provider.to_string()))?;
        if !creds.enabled {
            return Err(LlmError::NotConfigured(format!("{provider} disabled")));
        }
        let api_key = creds
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::NotConfigured(provider.to_string()))?;
        Ok((api_key, creds.endpoint_url))
    }

    async fn openai_params(
        &self,
        descriptor: &BackendDescriptor,
        params: &ResolvedParams,
    ) -> Result<OpenAiParams, LlmError> {
        let (api_key, endpoint) = self.cloud_credentials("openai").await?;
        Ok(OpenAiParams {
            api_key,
            endpoint: descriptor.endpoint_url.clone().or(endpoint),
            model: descriptor.effective_model_id().to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: params.timeout,
        })
    }

    async fn anthropic_params(
        &self,
        descriptor: &BackendDescriptor,
        params: &ResolvedParams,
    ) -> Result<AnthropicParams, LlmError> {
        let (api_key, endpoint) = self.cloud_credentials("anthropic").await?;
        Ok(AnthropicParams {
            api_key,
            endpoint: descriptor.endpoint_url.clone().or(endpoint),
            model: descriptor.effective_model_id().to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: params.timeout,
        })
    }

    async fn google_params(
        &self,
        descriptor: &BackendDescriptor,
        params: &ResolvedParams,
    ) -> Result<GoogleParams, LlmError> {
        let (api_key, endpoint) = self.cloud_credentials("google").await?;
        Ok(GoogleParams {
            api_key,
            endpoint: descriptor.endpoint_url.clone().or(endpoint),
            model: descriptor.effective_model_id().to_string(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeout: params.timeout,
        })
    }

    // ------------------------------------------------------------------
    // Retry, metrics, usage
    // ------------------------------------------------------------------

    /// One jittered retry for transient classes on idempotent calls.
    async fn retry_once<F, Fut>(&self, call: F) -> Result<Generation, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Generation, LlmError>>,
    {
        match call().await {
            Err(err) if err.is_retryable() => {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(50..200));
                tracing::warn!(error = %err, delay_ms = jitter.as_millis() as u64, "retrying llm call");
                tokio::time::sleep(jitter).await;
                call().await
            }
            result => result,
        }
    }

    fn record_metric(&self, model: &str, generation: &Generation, opts: &GenerateOptions) {
        let sample = MetricSample::new(
            model,
            &generation.backend,
            generation.latency,
            generation.output_tokens.unwrap_or(0),
        );
        self.push_sample(sample, opts);
    }

    fn push_sample(&self, mut sample: MetricSample, opts: &GenerateOptions) {
        sample.request_id = opts.request_id.clone();
        sample.session_id = opts.session_id.clone();
        sample.intent = opts.intent.clone();
        sample.stage = opts.stage.clone();

        if let Ok(value) = serde_json::to_value(&sample) {
            self.admin.submit_metric(value);
        }
        self.metrics.record(sample);
    }

    async fn finish_cloud_call(
        &self,
        provider: &str,
        model_id: &str,
        result: Result<Generation, LlmError>,
        opts: &GenerateOptions,
        was_fallback: bool,
    ) -> Result<Generation, LlmError> {
        match result {
            Ok(generation) => {
                self.track_cloud_usage(
                    provider,
                    model_id,
                    generation.input_tokens.unwrap_or(0),
                    generation.output_tokens.unwrap_or(0),
                    generation.latency,
                    None,
                    false,
                    opts,
                    was_fallback,
                )
                .await;
                Ok(generation)
            }
            Err(err) => {
                tracing::error!(provider, model = model_id, error = %err, "cloud call failed");
                Err(err)
            }
        }
    }

    async fn finish_cloud_tools(
        &self,
        provider: &str,
        model_id: &str,
        result: Result<ToolGeneration, LlmError>,
        opts: &GenerateOptions,
    ) -> Result<ToolGeneration, LlmError> {
        match result {
            Ok(generation) => {
                self.track_cloud_usage(
                    provider,
                    model_id,
                    0,
                    generation.output_tokens.unwrap_or(0),
                    generation.latency,
                    None,
                    false,
                    opts,
                    false,
                )
                .await;
                Ok(generation)
            }
            Err(err) => {
                tracing::error!(provider, model = model_id, error = %err, "cloud tool call failed");
                Err(err)
            }
        }
    }

    /// Write exactly one usage record for a cloud call that produced
    /// tokens; calls yielding zero output tokens write nothing.
    async fn track_cloud_usage(
        &self,
        provider: &str,
        model_id: &str,
        input_tokens: u32,
        output_tokens: u32,
        latency: Duration,
        ttft: Option<Duration>,
        streaming: bool,
        opts: &GenerateOptions,
        was_fallback: bool,
    ) {
        if output_tokens == 0 {
            return;
        }

        let pricing = self.admin.pricing(provider, model_id).await;
        let mut record = UsageRecord::new(provider, model_id);
        record.input_tokens = input_tokens;
        record.output_tokens = output_tokens;
        record.cost_usd = pricing.cost(input_tokens, output_tokens);
        record.latency_ms = latency.as_millis() as u64;
        record.ttft_ms = ttft.map(|d| d.as_millis() as u64);
        record.streaming = streaming;
        record.request_id = opts.request_id.clone();
        record.session_id = opts.session_id.clone();
        record.intent = opts.intent.clone();
        record.was_fallback = was_fallback;
        if was_fallback {
            record.fallback_reason = Some("circuit_open".to_string());
        }

        tracing::info!(
            provider,
            model = model_id,
            input_tokens,
            output_tokens,
            cost_usd = record.cost_usd,
            "cloud request completed"
        );
        self.usage_sink.submit(record);
    }

    async fn yield_whole(&self, generation: &Generation, tx: &mpsc::Sender<TokenChunk>) {
        if !generation.text.is_empty() {
            let _ = tx
                .send(TokenChunk::token(&generation.text, &generation.backend))
                .await;
        }
        let _ = tx
            .send(TokenChunk::terminal(
                &generation.backend,
                generation.input_tokens,
                generation.output_tokens,
                generation.latency,
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage_sink::testing::RecordingSink;
    use hearth_core::FinishReason;

    fn router_with_sink(sink: Arc<RecordingSink>) -> LlmRouter {
        let admin = Arc::new(AdminClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(60),
        ));
        LlmRouter::new(admin, LlmConfig::default(), sink)
    }

    #[tokio::test]
    async fn test_usage_record_conservation() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with_sink(sink.clone());
        let opts = GenerateOptions::default().with_request_id("req-1");

        // Zero output tokens: no record.
        router
            .track_cloud_usage(
                "openai", "gpt-4o-mini", 100, 0,
                Duration::from_millis(500), None, false, &opts, false,
            )
            .await;
        assert!(sink.records.lock().is_empty());

        // One call producing tokens: exactly one record.
        router
            .track_cloud_usage(
                "openai", "gpt-4o-mini", 100, 50,
                Duration::from_millis(500), None, false, &opts, false,
            )
            .await;
        let records = sink.records.lock();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.output_tokens, 50);
        // 100 × 0.15/1M + 50 × 0.60/1M = 0.000045
        assert_eq!(record.cost_usd, 0.000045);
        assert_eq!(record.request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_fallback_reason_recorded() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with_sink(sink.clone());
        router
            .track_cloud_usage(
                "anthropic", "claude-3-5-haiku-20241022", 10, 5,
                Duration::from_millis(100), None, false,
                &GenerateOptions::default(), true,
            )
            .await;
        let records = sink.records.lock();
        assert!(records[0].was_fallback);
        assert_eq!(records[0].fallback_reason.as_deref(), Some("circuit_open"));
    }

    #[tokio::test]
    async fn test_cloud_without_credentials_is_not_configured() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with_sink(sink);
        // Admin store unreachable, so credentials resolve to None.
        let err = router
            .generate(
                "openai/gpt-4o-mini",
                "hello",
                &GenerateOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_metrics_recorded_per_model() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with_sink(sink);
        let generation = Generation {
            text: "hi".into(),
            input_tokens: Some(4),
            output_tokens: Some(2),
            finish_reason: FinishReason::Stop,
            backend: "ollama".into(),
            latency: Duration::from_millis(80),
        };
        router.record_metric("phi3:mini", &generation, &GenerateOptions::default());

        let report = router.report_metrics();
        assert_eq!(report.total_requests, 1);
        assert!(report.by_model.contains_key("phi3:mini"));
        assert!(report.by_backend.contains_key("ollama"));
    }
}
