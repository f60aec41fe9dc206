//! Gateway entry point
//!
//! Wires every component together: settings, admin client, LLM router,
//! semantic cache, search engine, smart-home controller, resilience
//! primitives, and the HTTP server. Constructed at startup, closed on
//! shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hearth_cache::SemanticCache;
use hearth_config::{load_settings, AdminClient, Settings};
use hearth_core::{CircuitBreaker, TokenBucket};
use hearth_home::{DeviceApi, HaClient, SmartHomeController};
use hearth_llm::{AdminUsageSink, LlmRouter};
use hearth_search::providers::{
    BraveProvider, DuckDuckGoProvider, EventbriteProvider, SearxngProvider, TicketmasterProvider,
};
use hearth_search::{IntentClassifier, ParallelSearchEngine, ProviderRouter};

use hearth_gateway::http::create_router;
use hearth_gateway::orchestrator::Orchestrator;
use hearth_gateway::rooms::RoomDetector;
use hearth_gateway::session::SessionManager;
use hearth_gateway::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("HEARTH_CONFIG").ok().map(PathBuf::from);
    let settings = load_settings(config_path.as_deref()).context("loading settings")?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("installing metrics recorder: {e}"))?;

    let state = build_state(settings, Some(prometheus)).await?;

    // Pull store-owned knobs once at startup; /config/refresh re-applies.
    state.apply_gateway_overrides().await;

    let cleanup_shutdown = state.sessions.start_cleanup_task();

    let addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = cleanup_shutdown.send(true);
    tracing::info!("gateway stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hearth=debug"));
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_state(
    settings: Settings,
    prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let admin = Arc::new(AdminClient::new(
        settings.admin.url.clone(),
        Duration::from_secs(settings.admin.cache_ttl_seconds),
    ));

    let usage_sink = Arc::new(AdminUsageSink::new(admin.clone()));
    let llm = Arc::new(LlmRouter::new(
        admin.clone(),
        settings.llm.clone(),
        usage_sink,
    ));

    let ha_token = settings.home_assistant.token.clone().unwrap_or_default();
    if ha_token.is_empty() {
        tracing::warn!("HA_TOKEN not set, device control and room detection will fail");
    }
    let device_api: Arc<dyn DeviceApi> = Arc::new(HaClient::new(
        settings.home_assistant.url.clone(),
        ha_token,
    ));

    let home = Arc::new(SmartHomeController::new(
        device_api.clone(),
        Some(llm.clone()),
        Some(admin.clone()),
    ));

    let search = Arc::new(build_search_engine(&settings, admin.clone()).await);
    let cache = SemanticCache::in_memory();

    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        home,
        search,
        llm.clone(),
        settings.llm.default_model.clone(),
        settings.search.limit_per_provider,
    ));

    let rate_limiter = Arc::new(TokenBucket::new(settings.rate_limit.requests_per_minute));
    let breaker = Arc::new(CircuitBreaker::new(
        settings.circuit_breaker.failure_threshold,
        Duration::from_secs(settings.circuit_breaker.recovery_seconds),
    ));
    let sessions = Arc::new(SessionManager::new(settings.session.clone()));
    let rooms = Arc::new(RoomDetector::new(
        device_api,
        admin.clone(),
        settings.home_assistant.default_room.clone(),
    ));

    Ok(Arc::new(AppState {
        settings,
        admin,
        llm,
        orchestrator,
        rate_limiter,
        breaker,
        sessions,
        rooms,
        prometheus,
        started_at: Instant::now(),
    }))
}

/// Register every provider we have credentials for. Key-less providers
/// are always on; keyed ones come from settings (env fallback) or the
/// credential store.
async fn build_search_engine(settings: &Settings, admin: Arc<AdminClient>) -> ParallelSearchEngine {
    let mut router = ProviderRouter::new(Some(admin.clone()));
    router.register(Arc::new(DuckDuckGoProvider::new()));

    if let Some(url) = &settings.search.searxng_url {
        router.register(Arc::new(SearxngProvider::new(url.clone())));
    }

    let brave_key = match &settings.search.brave_api_key {
        Some(key) => Some(key.clone()),
        None => admin.credentials("brave-search").await.and_then(|c| c.api_key),
    };
    if let Some(key) = brave_key {
        router.register(Arc::new(BraveProvider::new(key)));
    }

    let ticketmaster_key = match &settings.search.ticketmaster_api_key {
        Some(key) => Some(key.clone()),
        None => admin
            .credentials("api-ticketmaster")
            .await
            .and_then(|c| c.api_key),
    };
    if let Some(key) = ticketmaster_key {
        router.register(Arc::new(TicketmasterProvider::new(key)));
    }

    let eventbrite_key = match &settings.search.eventbrite_api_key {
        Some(key) => Some(key.clone()),
        None => admin
            .credentials("api-eventbrite")
            .await
            .and_then(|c| c.api_key),
    };
    if let Some(key) = eventbrite_key {
        router.register(Arc::new(EventbriteProvider::new(key)));
    }

    ParallelSearchEngine::new(
        IntentClassifier::new(),
        router,
        Duration::from_secs_f64(settings.search.timeout_seconds),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
