//! Device session management
//!
//! One session per device/conversation with a bounded turn history.
//! Oldest turns are evicted past `max_turns`; idle sessions expire after
//! the TTL via a periodic cleanup task.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;

use hearth_config::settings::SessionConfig;

/// One conversation turn
#[derive(Debug, Clone)]
pub struct Turn {
    pub query: String,
    pub response: String,
    /// Extracted intent entities, for follow-up context
    pub intent_entities: Option<Value>,
}

/// One device conversation
pub struct Session {
    pub id: String,
    pub room: Option<String>,
    created_at: Instant,
    last_activity: RwLock<Instant>,
    turns: RwLock<VecDeque<Turn>>,
    max_turns: usize,
}

impl Session {
    fn new(id: String, room: Option<String>, max_turns: usize) -> Self {
        Self {
            id,
            room,
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            turns: RwLock::new(VecDeque::new()),
            max_turns,
        }
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.read().elapsed() > ttl
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Record a turn, evicting the oldest past the bound.
    pub fn push_turn(&self, turn: Turn) {
        let mut turns = self.turns.write();
        if turns.len() == self.max_turns {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    pub fn last_turn(&self) -> Option<Turn> {
        self.turns.read().back().cloned()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.read().len()
    }
}

/// Session registry with TTL eviction
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Fetch or create the session for an id.
    pub fn get_or_create(&self, id: &str, room: Option<String>) -> Arc<Session> {
        if let Some(session) = self.sessions.read().get(id) {
            session.touch();
            return session.clone();
        }

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.config.max_sessions {
            self.cleanup_locked(&mut sessions);
        }
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = id, "session created");
                Arc::new(Session::new(
                    id.to_string(),
                    room,
                    self.config.max_turns,
                ))
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_locked(&mut sessions);
    }

    fn cleanup_locked(&self, sessions: &mut HashMap<String, Arc<Session>>) {
        let ttl = Duration::from_secs(self.config.session_ttl_seconds);
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            sessions.remove(&id);
            tracing::info!(session_id = %id, "session expired");
        }
    }

    /// Background eviction loop. Returns a shutdown sender.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = Duration::from_secs(manager.config.cleanup_interval_seconds);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let before = manager.count();
                        manager.cleanup_expired();
                        let after = manager.count();
                        if before != after {
                            tracing::info!(removed = before - after, remaining = after, "session cleanup");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            max_sessions: 4,
            session_ttl_seconds: 1800,
            max_turns: 3,
            cleanup_interval_seconds: 300,
        }
    }

    #[test]
    fn test_get_or_create_reuses_sessions() {
        let manager = SessionManager::new(config());
        let a = manager.get_or_create("device-1", Some("office".into()));
        let b = manager.get_or_create("device-1", None);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_turns_are_bounded() {
        let manager = SessionManager::new(config());
        let session = manager.get_or_create("device-1", None);
        for i in 0..5 {
            session.push_turn(Turn {
                query: format!("q{i}"),
                response: format!("r{i}"),
                intent_entities: None,
            });
        }
        assert_eq!(session.turn_count(), 3);
        assert_eq!(session.last_turn().unwrap().query, "q4");
    }

    #[test]
    fn test_expiry() {
        let mut cfg = config();
        cfg.session_ttl_seconds = 0;
        let manager = SessionManager::new(cfg);
        manager.get_or_create("device-1", None);
        std::thread::sleep(Duration::from_millis(5));
        manager.cleanup_expired();
        assert_eq!(manager.count(), 0);
    }
}
