//! HTTP surface
//!
//! Route table, health quartet, metrics dump, and the config control
//! plane (current config, forced refresh, push-invalidation of feature
//! flags, cache inspection).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::openai::chat_completions;
use crate::responses_api::responses;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = if state.settings.server.cors_enabled {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        // External API
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/responses", post(responses))
        .route("/v1/models", get(list_models))
        // Health
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/health/startup", get(health_startup))
        // Metrics
        .route("/metrics", get(metrics_dump))
        // Config control plane
        .route("/config", get(get_config))
        .route("/config/refresh", post(refresh_config))
        .route("/admin/invalidate-feature-cache", post(invalidate_feature_cache))
        .route("/debug/feature-flags", get(debug_feature_flags))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn check_ollama(state: &AppState) -> bool {
    let url = format!("{}/api/tags", state.settings.llm.ollama_url);
    reqwest::Client::new()
        .get(url)
        .timeout(Duration::from_secs(3))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

/// Aggregate health: component states plus breaker and limiter status.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ollama = check_ollama(&state).await;
    let breaker = state.breaker.status();
    let degraded = !ollama || breaker.state != hearth_core::CircuitState::Closed;

    Json(json!({
        "status": if degraded { "degraded" } else { "healthy" },
        "service": "gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "ollama": ollama,
        "circuit_breaker": breaker,
        "rate_limiter": state.rate_limiter.status(),
        "sessions": state.sessions.count(),
    }))
}

async fn health_live() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "gateway"}))
}

/// Readiness: 503 when the local inference path is down, since neither
/// the orchestrator nor the fallback can answer without it.
async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ollama = check_ollama(&state).await;
    let body = Json(json!({
        "status": if ollama { "ready" } else { "not_ready" },
        "ready": ollama,
        "components": {"ollama": ollama},
    }));
    if ollama {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

async fn health_startup(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "initialized": true,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus text dump.
async fn metrics_dump(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Current effective configuration: env/file values overlaid with the
/// admin store where present.
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let overrides = state.admin.gateway_overrides().await;
    let from_store = overrides.updated_at.is_some();

    Json(json!({
        "source": if from_store { "store" } else { "environment" },
        "config": {
            "admin_url": state.settings.admin.url,
            "ollama_url": state.settings.llm.ollama_url,
            "mlx_url": state.settings.llm.mlx_url,
            "default_model": state.settings.llm.default_model,
            "intent_model": overrides.intent_model.clone()
                .unwrap_or_else(|| state.settings.llm.intent_model.clone()),
            "rate_limit_enabled": overrides.rate_limit_enabled
                .unwrap_or(state.settings.rate_limit.enabled),
            "rate_limit_requests_per_minute": overrides.rate_limit_requests_per_minute
                .unwrap_or(state.settings.rate_limit.requests_per_minute),
            "circuit_breaker_enabled": overrides.circuit_breaker_enabled
                .unwrap_or(state.settings.circuit_breaker.enabled),
            "circuit_breaker_failure_threshold": overrides.circuit_breaker_failure_threshold
                .unwrap_or(state.settings.circuit_breaker.failure_threshold),
            "circuit_breaker_recovery_timeout_seconds": overrides.circuit_breaker_recovery_timeout_seconds
                .unwrap_or(state.settings.circuit_breaker.recovery_seconds),
            "search_timeout_seconds": state.settings.search.timeout_seconds,
        },
        "updated_at": overrides.updated_at,
    }))
}

/// Force-reload the store-owned config and apply it to the live
/// primitives (breaker thresholds, limiter rate).
async fn refresh_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.admin.invalidate_gateway_overrides();
    state.admin.invalidate_backends();
    state.apply_gateway_overrides().await;

    Json(json!({
        "status": "refreshed",
        "circuit_breaker": state.breaker.status(),
        "rate_limiter": state.rate_limiter.status(),
    }))
}

#[derive(Debug, Deserialize)]
struct InvalidateRequest {
    #[serde(default)]
    flags: Option<Vec<String>>,
}

/// Push invalidation from the admin surface: clear one or all cached
/// feature flags so the next read refills from the store.
async fn invalidate_feature_cache(
    State(state): State<Arc<AppState>>,
    body: Option<Json<InvalidateRequest>>,
) -> impl IntoResponse {
    let flags = body.and_then(|Json(b)| b.flags);
    match flags {
        Some(flags) if !flags.is_empty() => {
            let invalidated = state.admin.flags.invalidate(&flags);
            tracing::info!(?invalidated, "feature cache invalidated");
            Json(json!({"status": "ok", "invalidated": invalidated}))
        }
        _ => {
            let count = state.admin.flags.invalidate_all();
            tracing::info!(count, "feature cache cleared");
            Json(json!({"status": "ok", "invalidated_count": count}))
        }
    }
}

/// Cache inspection for debugging flag propagation.
async fn debug_feature_flags(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.admin.flags.inspect();
    let total = entries.len();
    Json(json!({
        "cache_ttl_seconds": state.admin.flags.ttl().as_secs(),
        "cached_flags": entries,
        "total_cached": total,
    }))
}

/// Virtual aliases plus discovered backend models.
async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut models = vec![
        json!({"id": "gpt-4", "object": "model", "owned_by": "hearth"}),
        json!({"id": "gpt-3.5-turbo", "object": "model", "owned_by": "hearth"}),
    ];
    for backend in state.admin.list_backends().await {
        if backend.enabled {
            models.push(json!({
                "id": backend.model_name,
                "object": "model",
                "owned_by": backend.backend_type.as_str(),
            }));
        }
    }
    Json(json!({"object": "list", "data": models}))
}
