//! Room detection from voice satellites
//!
//! The conversation API carries no device id, so the speaking room is
//! inferred from the hub's `assist_satellite` entities: prefer one whose
//! state is not idle, else the most recently changed within a short
//! window. Results may be cached per device id for a few seconds when the
//! corresponding feature flag is on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;

use hearth_config::AdminClient;
use hearth_home::DeviceApi;

const ROOM_CACHE_TTL: Duration = Duration::from_secs(3);
const RECENT_WINDOW_SECS: i64 = 10;

static SATELLITE_ROOM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Voice\s*-\s*(.+?)\s*(Assist|$)").unwrap());

const KNOWN_ROOMS: &[&str] = &[
    "office", "kitchen", "living_room", "master_bedroom", "bedroom", "dining_room",
];

pub struct RoomDetector {
    api: Arc<dyn DeviceApi>,
    admin: Arc<AdminClient>,
    default_room: String,
    cache: RwLock<HashMap<String, (Instant, String)>>,
}

impl RoomDetector {
    pub fn new(api: Arc<dyn DeviceApi>, admin: Arc<AdminClient>, default_room: String) -> Self {
        Self {
            api,
            admin,
            default_room,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Detect the speaking room for a device id.
    pub async fn detect(&self, device_id: &str) -> String {
        // A known room name passes straight through.
        let lower = device_id.to_lowercase();
        if KNOWN_ROOMS.contains(&lower.as_str()) {
            return lower;
        }

        let cache_enabled = self
            .admin
            .is_feature_enabled("ha_room_detection_cache", false)
            .await;

        if cache_enabled {
            if let Some((at, room)) = self.cache.read().get(device_id) {
                if at.elapsed() < ROOM_CACHE_TTL {
                    tracing::debug!(device_id, room = %room, "room cache hit");
                    return room.clone();
                }
            }
        }

        let room = self.detect_from_satellites().await.unwrap_or_else(|| {
            tracing::info!("no active satellite found, using default room");
            self.default_room.clone()
        });

        if cache_enabled {
            self.cache
                .write()
                .insert(device_id.to_string(), (Instant::now(), room.clone()));
        }
        room
    }

    async fn detect_from_satellites(&self) -> Option<String> {
        let states = match self.api.get_states().await {
            Ok(states) => states,
            Err(err) => {
                tracing::warn!(error = %err, "satellite state query failed");
                return None;
            }
        };

        let satellites: Vec<&Value> = states
            .iter()
            .filter(|s| {
                s.get("entity_id")
                    .and_then(Value::as_str)
                    .map(|id| id.contains("assist_satellite"))
                    .unwrap_or(false)
            })
            .collect();

        // First pass: any currently active satellite.
        for satellite in &satellites {
            let state = satellite.get("state").and_then(Value::as_str).unwrap_or("idle");
            if state != "idle" {
                if let Some(room) = room_from_satellite(satellite) {
                    tracing::info!(room = %room, state, "active satellite detected");
                    return Some(room);
                }
            }
        }

        // Second pass: most recently changed within the window; handles
        // the race where the satellite already went back to idle.
        let now = Utc::now();
        let mut recent: Vec<(&Value, i64)> = satellites
            .iter()
            .filter_map(|satellite| {
                let changed = satellite.get("last_changed").and_then(Value::as_str)?;
                let changed: DateTime<Utc> = changed.parse().ok()?;
                let age = (now - changed).num_seconds();
                (age >= 0 && age < RECENT_WINDOW_SECS).then_some((*satellite, age))
            })
            .collect();
        recent.sort_by_key(|(_, age)| *age);

        if let Some((satellite, age)) = recent.first() {
            if let Some(room) = room_from_satellite(satellite) {
                tracing::info!(room = %room, age_secs = age, "recently active satellite detected");
                return Some(room);
            }
        }

        None
    }
}

fn room_from_satellite(satellite: &Value) -> Option<String> {
    let friendly = satellite
        .pointer("/attributes/friendly_name")
        .and_then(Value::as_str)?;
    let captures = SATELLITE_ROOM.captures(friendly)?;
    Some(
        captures
            .get(1)?
            .as_str()
            .trim()
            .to_lowercase()
            .replace(' ', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_from_friendly_name() {
        let satellite = json!({
            "entity_id": "assist_satellite.office",
            "state": "listening",
            "attributes": {"friendly_name": "Voice - Office Assist"}
        });
        assert_eq!(room_from_satellite(&satellite).as_deref(), Some("office"));

        let satellite = json!({
            "attributes": {"friendly_name": "Voice - Master Bedroom"}
        });
        assert_eq!(
            room_from_satellite(&satellite).as_deref(),
            Some("master_bedroom")
        );
    }

    #[test]
    fn test_non_satellite_name_is_none() {
        let satellite = json!({"attributes": {"friendly_name": "Kitchen Display"}});
        assert!(room_from_satellite(&satellite).is_none());
    }
}
