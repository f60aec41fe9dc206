//! Home Assistant entity manager
//!
//! Fetches and caches entity states, indexes them by domain, expands
//! room names through a synonym table, and resolves light groups with
//! their member entities.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

use crate::device::DeviceApi;
use crate::HomeError;

const CACHE_DURATION: Duration = Duration::from_secs(300);

/// A light group (or standalone light) with resolved members
#[derive(Debug, Clone)]
pub struct LightGroup {
    pub entity_id: String,
    pub friendly_name: String,
    pub members: Vec<String>,
    pub state: String,
    pub is_group: bool,
}

/// Climate entity snapshot
#[derive(Debug, Clone)]
pub struct ClimateState {
    pub entity_id: String,
    pub state: String,
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub target_temp_high: Option<f64>,
    pub target_temp_low: Option<f64>,
}

const ROOM_SYNONYMS: &[(&str, &[&str])] = &[
    ("hall", &["hallway", "corridor", "entrance", "foyer"]),
    ("hallway", &["hall", "corridor", "entrance", "foyer"]),
    ("living room", &["livingroom", "living_room", "lounge", "family"]),
    ("bedroom", &["bed_room"]),
    ("master bedroom", &["master", "main_bedroom", "primary"]),
    ("bathroom", &["bath", "restroom", "washroom"]),
    ("dining room", &["dining", "diningroom"]),
    ("office", &["study", "home_office"]),
    ("basement", &["cellar"]),
    ("garage", &["carport"]),
    ("porch", &["front_porch", "back_porch", "outdoor", "outside"]),
];

struct EntityCache {
    entities: HashMap<String, Value>,
    by_domain: HashMap<String, Vec<String>>,
    light_groups: HashMap<String, LightGroup>,
    fetched_at: Instant,
}

pub struct HaEntityManager {
    api: Arc<dyn DeviceApi>,
    cache: RwLock<Option<EntityCache>>,
}

impl HaEntityManager {
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self {
            api,
            cache: RwLock::new(None),
        }
    }

    /// Refresh the entity cache from the hub.
    pub async fn refresh(&self) -> Result<(), HomeError> {
        let states = self.api.get_states().await?;

        let mut entities = HashMap::new();
        let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();
        let mut light_groups = HashMap::new();

        for state in states {
            let Some(entity_id) = state.get("entity_id").and_then(Value::as_str) else {
                continue;
            };
            let entity_id = entity_id.to_string();
            let domain = entity_id.split('.').next().unwrap_or("").to_string();
            by_domain.entry(domain.clone()).or_default().push(entity_id.clone());

            if domain == "light" {
                let attrs = state.get("attributes").cloned().unwrap_or_default();
                let members: Vec<String> = attrs
                    .get("entity_id")
                    .and_then(Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let friendly_name = attrs
                    .get("friendly_name")
                    .and_then(Value::as_str)
                    .unwrap_or(&entity_id)
                    .to_string();
                light_groups.insert(
                    entity_id.clone(),
                    LightGroup {
                        entity_id: entity_id.clone(),
                        friendly_name,
                        is_group: !members.is_empty(),
                        members,
                        state: state
                            .get("state")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                    },
                );
            }

            entities.insert(entity_id, state);
        }

        *self.cache.write() = Some(EntityCache {
            entities,
            by_domain,
            light_groups,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    async fn ensure_fresh(&self) -> Result<(), HomeError> {
        let stale = self
            .cache
            .read()
            .as_ref()
            .map(|c| c.fetched_at.elapsed() > CACHE_DURATION)
            .unwrap_or(true);
        if stale {
            self.refresh().await?;
        }
        Ok(())
    }

    fn expand_room_names(room: &str) -> Vec<String> {
        let base = room.to_lowercase().replace('_', " ");
        let mut terms = vec![base.clone(), base.replace(' ', "_")];

        for (key, synonyms) in ROOM_SYNONYMS {
            let key_matches = base == *key;
            let synonym_matches = synonyms.iter().any(|s| base == s.replace('_', " "));
            if key_matches || synonym_matches {
                terms.push(key.replace(' ', "_"));
                terms.push(key.to_string());
                for synonym in *synonyms {
                    terms.push(synonym.to_string());
                    terms.push(synonym.replace('_', " "));
                }
            }
        }
        terms.sort();
        terms.dedup();
        terms
    }

    /// Light groups (or standalone lights) matching a room name.
    pub async fn find_lights_by_room(&self, room: &str) -> Result<Vec<LightGroup>, HomeError> {
        self.ensure_fresh().await?;
        let terms = Self::expand_room_names(room);

        let cache = self.cache.read();
        let Some(cache) = cache.as_ref() else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<LightGroup> = cache
            .light_groups
            .values()
            .filter(|group| {
                let entity_name = group.entity_id.trim_start_matches("light.").to_lowercase();
                let friendly = group.friendly_name.to_lowercase().replace(' ', "_");
                terms
                    .iter()
                    .any(|t| entity_name.contains(t.as_str()) || friendly.contains(t.as_str()))
            })
            .cloned()
            .collect();

        // Largest group first so the primary room group wins.
        matches.sort_by_key(|g| std::cmp::Reverse(g.members.len()));
        Ok(matches)
    }

    /// Every light group in the house, for whole-house commands.
    /// Standalone lights are excluded; groups cover them.
    pub async fn all_light_groups(&self) -> Result<Vec<LightGroup>, HomeError> {
        self.ensure_fresh().await?;
        let cache = self.cache.read();
        let Some(cache) = cache.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(cache
            .light_groups
            .values()
            .filter(|g| g.is_group)
            .cloned()
            .collect())
    }

    /// Entity ids for one domain.
    pub async fn entities_in_domain(&self, domain: &str) -> Result<Vec<String>, HomeError> {
        self.ensure_fresh().await?;
        let cache = self.cache.read();
        Ok(cache
            .as_ref()
            .and_then(|c| c.by_domain.get(domain).cloned())
            .unwrap_or_default())
    }

    /// Raw state for one entity.
    pub async fn entity_state(&self, entity_id: &str) -> Result<Option<Value>, HomeError> {
        self.ensure_fresh().await?;
        let cache = self.cache.read();
        Ok(cache
            .as_ref()
            .and_then(|c| c.entities.get(entity_id).cloned()))
    }

    /// First climate entity's snapshot. Handles both single-setpoint and
    /// dual-setpoint (heat_cool) thermostats.
    pub async fn climate_state(&self) -> Result<Option<ClimateState>, HomeError> {
        self.ensure_fresh().await?;
        let cache = self.cache.read();
        let Some(cache) = cache.as_ref() else {
            return Ok(None);
        };

        let Some(entity_id) = cache
            .by_domain
            .get("climate")
            .and_then(|ids| ids.first())
            .cloned()
        else {
            return Ok(None);
        };
        let Some(entity) = cache.entities.get(&entity_id) else {
            return Ok(None);
        };

        let attrs = entity.get("attributes").cloned().unwrap_or_default();
        let target_temp_high = attrs.get("target_temp_high").and_then(Value::as_f64);
        let target_temp_low = attrs.get("target_temp_low").and_then(Value::as_f64);
        let target_temp = attrs
            .get("temperature")
            .and_then(Value::as_f64)
            .or_else(|| match (target_temp_high, target_temp_low) {
                (Some(high), Some(low)) => Some((high + low) / 2.0),
                _ => None,
            });

        Ok(Some(ClimateState {
            entity_id,
            state: entity
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            current_temp: attrs.get("current_temperature").and_then(Value::as_f64),
            target_temp,
            target_temp_high,
            target_temp_low,
        }))
    }

    /// Count of individual lights reachable in a room, for color cycling.
    pub async fn light_count(&self, room: &str) -> usize {
        match self.find_lights_by_room(room).await {
            Ok(groups) => groups
                .first()
                .map(|g| g.members.len().max(1))
                .unwrap_or(3),
            Err(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingDeviceApi;
    use serde_json::json;

    pub fn sample_states() -> Vec<Value> {
        vec![
            json!({
                "entity_id": "light.office_lights",
                "state": "on",
                "attributes": {
                    "friendly_name": "Office Lights",
                    "entity_id": ["light.office_desk", "light.office_ceiling"]
                }
            }),
            json!({
                "entity_id": "light.bedroom_lights",
                "state": "off",
                "attributes": {
                    "friendly_name": "Bedroom Lights",
                    "entity_id": ["light.bedroom_lamp"]
                }
            }),
            json!({
                "entity_id": "light.porch",
                "state": "off",
                "attributes": {"friendly_name": "Porch Light"}
            }),
            json!({
                "entity_id": "climate.thermostat",
                "state": "heat_cool",
                "attributes": {
                    "friendly_name": "Thermostat",
                    "current_temperature": 70.0,
                    "target_temp_high": 74.0,
                    "target_temp_low": 68.0
                }
            }),
        ]
    }

    #[tokio::test]
    async fn test_light_group_indexing() {
        let api = Arc::new(RecordingDeviceApi::new(sample_states()));
        let manager = HaEntityManager::new(api);

        let office = manager.find_lights_by_room("office").await.unwrap();
        assert_eq!(office.len(), 1);
        assert_eq!(office[0].members.len(), 2);

        let groups = manager.all_light_groups().await.unwrap();
        // The standalone porch light is not a group
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_room_synonyms() {
        let api = Arc::new(RecordingDeviceApi::new(vec![json!({
            "entity_id": "light.study_lamp",
            "state": "off",
            "attributes": {"friendly_name": "Study Lamp"}
        })]));
        let manager = HaEntityManager::new(api);

        // "office" expands to "study"
        let matches = manager.find_lights_by_room("office").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entity_id, "light.study_lamp");
    }

    #[tokio::test]
    async fn test_climate_dual_setpoint_midpoint() {
        let api = Arc::new(RecordingDeviceApi::new(sample_states()));
        let manager = HaEntityManager::new(api);

        let climate = manager.climate_state().await.unwrap().unwrap();
        assert_eq!(climate.target_temp, Some(71.0));
        assert_eq!(climate.current_temp, Some(70.0));
    }
}
