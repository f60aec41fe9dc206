//! Shared application state
//!
//! Constructed once at startup and handed to every handler behind an
//! `Arc`. Singletons from the source design (router, cache client, admin
//! client) are threaded explicitly through here instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusHandle;

use hearth_config::{AdminClient, Settings};
use hearth_core::{CircuitBreaker, TokenBucket};
use hearth_llm::LlmRouter;

use crate::orchestrator::Orchestrator;
use crate::rooms::RoomDetector;
use crate::session::SessionManager;

pub struct AppState {
    pub settings: Settings,
    pub admin: Arc<AdminClient>,
    pub llm: Arc<LlmRouter>,
    pub orchestrator: Arc<Orchestrator>,
    pub rate_limiter: Arc<TokenBucket>,
    pub breaker: Arc<CircuitBreaker>,
    pub sessions: Arc<SessionManager>,
    pub rooms: Arc<RoomDetector>,
    pub prometheus: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    /// Whether admission control applies, considering admin overrides.
    pub async fn rate_limit_enabled(&self) -> bool {
        let overrides = self.admin.gateway_overrides().await;
        overrides
            .rate_limit_enabled
            .unwrap_or(self.settings.rate_limit.enabled)
    }

    pub async fn breaker_enabled(&self) -> bool {
        let overrides = self.admin.gateway_overrides().await;
        overrides
            .circuit_breaker_enabled
            .unwrap_or(self.settings.circuit_breaker.enabled)
    }

    /// Apply freshly fetched admin overrides to the live primitives.
    pub async fn apply_gateway_overrides(&self) {
        let overrides = self.admin.gateway_overrides().await;
        if let Some(rpm) = overrides.rate_limit_requests_per_minute {
            self.rate_limiter.update_config(rpm);
        }
        let threshold = overrides
            .circuit_breaker_failure_threshold
            .unwrap_or(self.settings.circuit_breaker.failure_threshold);
        let recovery = overrides
            .circuit_breaker_recovery_timeout_seconds
            .unwrap_or(self.settings.circuit_breaker.recovery_seconds);
        self.breaker
            .update_config(threshold, Duration::from_secs(recovery));
    }
}
