//! Circuit breaker guarding the orchestrator path
//!
//! State machine: closed → open after `failure_threshold` consecutive
//! failures → half-open once `recovery_timeout` elapses → closed on a
//! successful probe, back to open on a failed one. Exactly one half-open
//! probe is in flight at a time; transitions within one recovery cycle are
//! monotonic.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Snapshot for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

/// Shared circuit breaker. State transitions are guarded by one mutex;
/// no lock is held across I/O.
pub struct CircuitBreaker {
    inner: Mutex<BreakerState>,
    config: Mutex<BreakerConfig>,
}

#[derive(Debug, Clone, Copy)]
struct BreakerConfig {
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            config: Mutex::new(BreakerConfig {
                failure_threshold,
                recovery_timeout,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// In the open state this flips to half-open once the recovery timeout
    /// has elapsed and admits exactly one probe; everything else is
    /// rejected until the probe reports back.
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    fn can_execute_at(&self, now: Instant) -> bool {
        let config = *self.config.lock();
        let mut state = self.inner.lock();

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|t| now.duration_since(t))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= config.recovery_timeout {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    tracing::info!("circuit breaker half-open, admitting probe");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call. Closes the circuit from half-open and
    /// resets the failure count.
    pub fn record_success(&self) {
        let mut state = self.inner.lock();
        if state.state != CircuitState::Closed {
            tracing::info!("circuit breaker closed after successful probe");
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        state.probe_in_flight = false;
    }

    /// Record a failed call. Opens the circuit at the threshold, and
    /// re-opens immediately when a half-open probe fails.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    fn record_failure_at(&self, now: Instant) {
        let config = *self.config.lock();
        let mut state = self.inner.lock();

        match state.state {
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(now);
                state.probe_in_flight = false;
                tracing::warn!("circuit breaker re-opened after failed probe");
            }
            _ => {
                state.failure_count += 1;
                if state.failure_count >= config.failure_threshold
                    && state.state == CircuitState::Closed
                {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(now);
                    tracing::warn!(
                        failures = state.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn update_config(&self, failure_threshold: u32, recovery_timeout: Duration) {
        *self.config.lock() = BreakerConfig {
            failure_threshold,
            recovery_timeout,
        };
        tracing::info!(
            failure_threshold,
            recovery_secs = recovery_timeout.as_secs(),
            "circuit breaker reconfigured"
        );
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let config = *self.config.lock();
        let state = self.inner.lock();
        CircuitBreakerStatus {
            state: state.state,
            failure_count: state.failure_count,
            failure_threshold: config.failure_threshold,
            recovery_timeout_secs: config.recovery_timeout.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        assert!(breaker.can_execute());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        let start = Instant::now();
        breaker.record_failure_at(start);
        assert_eq!(breaker.state(), CircuitState::Open);

        // Before the recovery timeout: rejected.
        assert!(!breaker.can_execute_at(start + Duration::from_secs(5)));

        // After the timeout: exactly one probe admitted.
        let after = start + Duration::from_secs(11);
        assert!(breaker.can_execute_at(after));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.can_execute_at(after));
    }

    #[test]
    fn test_probe_outcome_decides_state() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        let start = Instant::now();

        // Failed probe re-opens.
        breaker.record_failure_at(start);
        assert!(breaker.can_execute_at(start + Duration::from_secs(11)));
        breaker.record_failure_at(start + Duration::from_secs(12));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Successful probe closes.
        assert!(breaker.can_execute_at(start + Duration::from_secs(25)));
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.can_execute());
    }
}
