//! The smart-home controller
//!
//! Fast-path rules first, LLM extraction second, heuristic fallback last.
//! Execution fans one device-API call out per target entity in parallel;
//! per-entity failures are logged and the batch summarised by count.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};

use hearth_config::AdminClient;
use hearth_llm::{GenerateOptions, LlmRouter};

use crate::colors::random_colors;
use crate::device::DeviceApi;
use crate::entities::{HaEntityManager, LightGroup};
use crate::intent::{DeviceType, HomeAction, HomeIntent, IntentParams};
use crate::responses::{self, vary};
use crate::rules::{self, ROOM_GROUPS};
use crate::sequence::{self, SequenceIntent};
use crate::HomeError;

const DEFAULT_CONTROL_MODEL: &str = "llama3.1:8b";

/// Previous turn carried into the LLM prompt for follow-up context
#[derive(Debug, Clone, Default)]
pub struct PreviousTurn {
    pub query: String,
    pub response: String,
}

pub struct SmartHomeController {
    entities: Arc<HaEntityManager>,
    api: Arc<dyn DeviceApi>,
    llm: Option<Arc<LlmRouter>>,
    admin: Option<Arc<AdminClient>>,
}

impl SmartHomeController {
    pub fn new(
        api: Arc<dyn DeviceApi>,
        llm: Option<Arc<LlmRouter>>,
        admin: Option<Arc<AdminClient>>,
    ) -> Self {
        Self {
            entities: Arc::new(HaEntityManager::new(api.clone())),
            api,
            llm,
            admin,
        }
    }

    pub fn entities(&self) -> &HaEntityManager {
        &self.entities
    }

    /// Full handling of one control query: sequence detection, intent
    /// extraction, execution, spoken response.
    pub async fn handle(
        &self,
        query: &str,
        device_room: Option<&str>,
        previous: Option<&PreviousTurn>,
    ) -> String {
        if sequence::detect_sequence(query) {
            match self.extract_sequence(query, device_room).await {
                Ok(seq) => return self.execute_sequence(seq).await,
                Err(err) => {
                    tracing::warn!(error = %err, "sequence extraction failed, single intent path");
                }
            }
        }

        let intent = self.extract_intent(query, device_room, previous).await;
        self.execute_intent(&intent, query, device_room).await
    }

    /// Extract a structured intent: fast path, then LLM, then heuristic.
    pub async fn extract_intent(
        &self,
        query: &str,
        device_room: Option<&str>,
        previous: Option<&PreviousTurn>,
    ) -> HomeIntent {
        if let Some(intent) = rules::extract_fast_path(query, device_room) {
            tracing::info!(
                device_type = ?intent.device_type,
                action = ?intent.action,
                room = intent.room.as_deref().unwrap_or(""),
                "fast path intent"
            );
            return intent;
        }

        match self.extract_intent_llm(query, device_room, previous).await {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(error = %err, "llm extraction failed, heuristic fallback");
                heuristic_intent(query, device_room)
            }
        }
    }

    async fn control_model(&self) -> String {
        if let Some(admin) = &self.admin {
            if let Some(assignment) = admin.component_model("smart_home_control").await {
                if assignment.enabled {
                    return assignment.model_name;
                }
            }
        }
        DEFAULT_CONTROL_MODEL.to_string()
    }

    async fn extract_intent_llm(
        &self,
        query: &str,
        device_room: Option<&str>,
        previous: Option<&PreviousTurn>,
    ) -> Result<HomeIntent, HomeError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| HomeError::Extraction("no llm configured".to_string()))?;

        let room = device_room.unwrap_or("unknown");
        let light_count = self.entities.light_count(room).await;
        let previous_block = previous
            .map(|p| format!("Previous query: \"{}\"\nPrevious response: \"{}\"\n", p.query, p.response))
            .unwrap_or_default();

        let prompt = format!(
            r#"Extract a structured smart-home intent from this request.

User request: "{query}"
Current room: {room}
Lights in room: {light_count}
{previous_block}
Respond with ONLY this JSON:
{{
    "device_type": "light|switch|lock|sensor|media_player|fan|cover|scene|climate",
    "room": "room name or null",
    "action": "turn_on|turn_off|set_color|set_brightness|get_status|lock|unlock|open|close",
    "target_scope": "group",
    "parameters": {{"hs_colors": [[hue, saturation], ...] or []}},
    "excluded_rooms": [],
    "color_description": "description or null"
}}

For color requests provide {light_count} hue/saturation pairs. If no room
is named, use "{room}"."#
        );

        let model = self.control_model().await;
        let opts = GenerateOptions::default()
            .with_temperature(0.1)
            .with_max_tokens(500)
            .with_stage("smart_home_extraction");

        let generation = llm
            .generate(&model, &prompt, &opts)
            .await
            .map_err(|e| HomeError::Extraction(e.to_string()))?;

        parse_intent_json(&generation.text)
            .ok_or_else(|| HomeError::Extraction("intent JSON did not parse".to_string()))
    }

    async fn extract_sequence(
        &self,
        query: &str,
        device_room: Option<&str>,
    ) -> Result<SequenceIntent, HomeError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| HomeError::Extraction("no llm configured".to_string()))?;

        let room = device_room.unwrap_or("unknown");
        let prompt = sequence::sequence_prompt(query, room);
        let model = self.control_model().await;
        let opts = GenerateOptions::default()
            .with_temperature(0.2)
            .with_max_tokens(1500)
            .with_stage("sequence_extraction");

        let generation = llm
            .generate(&model, &prompt, &opts)
            .await
            .map_err(|e| HomeError::Extraction(e.to_string()))?;

        let parsed = strip_code_fences(&generation.text);
        Ok(serde_json::from_str(parsed.trim())
            .unwrap_or_else(|_| sequence::fallback_sequence(query, room)))
    }

    async fn execute_sequence(&self, seq: SequenceIntent) -> String {
        let steps = seq.steps.clone();
        let api = self.api.clone();
        let entities = self.entities.clone();

        // Steps run in the background so the acknowledgment returns
        // immediately; the voice round-trip must not wait out the delays.
        tokio::spawn(async move {
            for step in steps {
                let room = step.room.as_deref().unwrap_or("office").to_string();
                let targets = resolve_targets(&entities, &room).await;
                let service = match step.action {
                    HomeAction::TurnOff => "turn_off",
                    _ => "turn_on",
                };
                for (index, entity) in targets.iter().enumerate() {
                    let mut data = json!({ "entity_id": entity });
                    if let Some(brightness) = step.brightness {
                        data["brightness"] = brightness.into();
                    }
                    if !step.hs_colors.is_empty() {
                        let (h, s) = step.hs_colors[index % step.hs_colors.len()];
                        data["hs_color"] = json!([h, s]);
                    }
                    if let Err(err) = api.call_service("light", service, data).await {
                        tracing::warn!(entity, error = %err, "sequence step failed");
                    }
                }
                if step.delay_after > 0 {
                    tokio::time::sleep(std::time::Duration::from_secs(step.delay_after)).await;
                }
            }
        });

        seq.acknowledge
    }

    /// Execute an extracted intent and produce the spoken response.
    pub async fn execute_intent(
        &self,
        intent: &HomeIntent,
        query: &str,
        device_room: Option<&str>,
    ) -> String {
        match intent.device_type {
            DeviceType::Light | DeviceType::Switch => {
                self.execute_light(intent, query, device_room).await
            }
            DeviceType::Lock => self.execute_lock(intent).await,
            DeviceType::Sensor => self.execute_sensor(intent).await,
            DeviceType::MediaPlayer => self.execute_media(intent).await,
            DeviceType::Fan => self.execute_fan(intent).await,
            DeviceType::Cover => self.execute_cover(intent).await,
            DeviceType::Scene => self.execute_scene(intent).await,
            DeviceType::Climate => self.execute_climate(intent).await,
            DeviceType::BedWarmer => self.execute_bed_warmer(intent).await,
            DeviceType::MotionAutomation => self.execute_motion(intent).await,
        }
    }

    async fn execute_light(
        &self,
        intent: &HomeIntent,
        query: &str,
        device_room: Option<&str>,
    ) -> String {
        if intent.is_whole_house() {
            return self.execute_whole_house(intent, query).await;
        }
        if !intent.parameters.rooms.is_empty() {
            return self.execute_multi_room(intent).await;
        }

        let room = intent
            .room
            .clone()
            .or_else(|| device_room.map(str::to_string))
            .unwrap_or_else(|| "office".to_string());

        if let Some((_, members)) = ROOM_GROUPS.iter().find(|(name, _)| *name == room.as_str()) {
            return self.execute_room_group(&room, members, intent).await;
        }

        let targets = resolve_targets(&self.entities, &room).await;
        if targets.is_empty() {
            return format!("I couldn't find any lights for the {}.", room.replace('_', " "));
        }

        let failures = self.dispatch_light_calls(&targets, intent, 0).await;
        let label = format!("{} lights", room.replace('_', " "));
        self.light_response(intent, &label, targets.len(), failures)
    }

    async fn execute_whole_house(&self, intent: &HomeIntent, _query: &str) -> String {
        let groups = match self.entities.all_light_groups().await {
            Ok(groups) if !groups.is_empty() => groups,
            _ => return "I couldn't find any light groups in the house.".to_string(),
        };

        // Exclusion filter: a group is excluded when any excluded room
        // name appears in its friendly name or entity id.
        let excluded: Vec<String> = intent
            .excluded_rooms
            .iter()
            .map(|r| r.to_lowercase().replace('_', " "))
            .collect();
        let kept: Vec<&LightGroup> = groups
            .iter()
            .filter(|group| {
                let name = group.friendly_name.to_lowercase();
                let id = group.entity_id.to_lowercase().replace('_', " ");
                !excluded.iter().any(|e| name.contains(e) || id.contains(e))
            })
            .collect();

        let mut global_index = 0usize;
        let mut failures = 0usize;
        let mut calls = Vec::new();

        for group in &kept {
            let members: Vec<String> = if group.members.is_empty() {
                vec![group.entity_id.clone()]
            } else {
                group.members.clone()
            };
            for entity in members {
                let data = self.light_call_data(&entity, intent, global_index);
                global_index += 1;
                calls.push(data);
            }
        }

        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let results = join_all(
            calls
                .into_iter()
                .map(|data| self.api.call_service("light", service, data)),
        )
        .await;
        for result in results {
            if let Err(err) = result {
                failures += 1;
                tracing::warn!(error = %err, "whole-house call failed");
            }
        }

        let excluded_info = if intent.excluded_rooms.is_empty() {
            String::new()
        } else {
            format!(", except {}", intent.excluded_rooms.join(", "))
        };
        match intent.action {
            HomeAction::TurnOn => {
                format!("Done! I've turned on lights in {} rooms{excluded_info}.", kept.len())
            }
            HomeAction::TurnOff => {
                format!("Done! I've turned off lights in {} rooms{excluded_info}.", kept.len())
            }
            HomeAction::SetColor => {
                let desc = intent.color_description.as_deref().unwrap_or("the colors");
                format!("Done! I've set {desc} across {} rooms{excluded_info}.", kept.len())
            }
            _ => format!("Done! Updated lights in {} rooms{excluded_info}.", kept.len()),
        }
    }

    async fn execute_multi_room(&self, intent: &HomeIntent) -> String {
        let mut names = Vec::new();
        let mut calls = Vec::new();

        for room in &intent.parameters.rooms {
            let targets = resolve_targets(&self.entities, room).await;
            if targets.is_empty() {
                tracing::warn!(room, "no lights found in multi-room command");
                continue;
            }
            names.push(room.replace('_', " "));
            for (index, entity) in targets.iter().enumerate() {
                calls.push(self.light_call_data(entity, intent, index));
            }
        }

        if calls.is_empty() {
            return "I couldn't find lights in those rooms.".to_string();
        }

        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let results = join_all(
            calls
                .into_iter()
                .map(|data| self.api.call_service("light", service, data)),
        )
        .await;
        for result in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, "multi-room call failed");
            }
        }

        let list = names.join(" and ");
        match intent.action {
            HomeAction::TurnOff => format!("Done! I've turned off the {list} lights."),
            _ => format!("Done! I've turned on the {list} lights."),
        }
    }

    async fn execute_room_group(
        &self,
        group_name: &str,
        members: &[&str],
        intent: &HomeIntent,
    ) -> String {
        let mut calls = Vec::new();
        let mut global_index = 0usize;

        for room in members {
            let targets = resolve_targets(&self.entities, room).await;
            for entity in targets {
                calls.push(self.light_call_data(&entity, intent, global_index));
                global_index += 1;
            }
        }

        if calls.is_empty() {
            return format!("The {group_name} has no lights configured.");
        }

        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let results = join_all(
            calls
                .into_iter()
                .map(|data| self.api.call_service("light", service, data)),
        )
        .await;
        for result in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, "room-group call failed");
            }
        }

        match intent.action {
            HomeAction::TurnOff => format!("Done! I've turned off lights on the {group_name}."),
            HomeAction::SetColor => {
                let desc = intent.color_description.as_deref().unwrap_or("the colors");
                format!("Done! I've set {desc} on the {group_name}.")
            }
            _ => format!("Done! I've turned on lights on the {group_name}."),
        }
    }

    /// Service data for one light call, cycling palette colors by index.
    fn light_call_data(&self, entity: &str, intent: &HomeIntent, index: usize) -> Value {
        let mut data = json!({ "entity_id": entity });
        match intent.action {
            HomeAction::SetColor => {
                let palette = if intent.parameters.hs_colors.is_empty() {
                    random_colors(3)
                } else {
                    intent.parameters.hs_colors.clone()
                };
                let (h, s) = palette[index % palette.len()];
                data["hs_color"] = json!([h, s]);
                data["brightness"] = 255.into();
            }
            HomeAction::SetBrightness => {
                if let Some(brightness) = intent.parameters.brightness {
                    data["brightness"] = brightness.into();
                }
            }
            HomeAction::AdjustBrightness => {
                if let Some(step) = intent.parameters.brightness_step_pct {
                    data["brightness_step_pct"] = step.into();
                }
            }
            _ => {}
        }
        data
    }

    async fn dispatch_light_calls(
        &self,
        targets: &[String],
        intent: &HomeIntent,
        start_index: usize,
    ) -> usize {
        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let results = join_all(targets.iter().enumerate().map(|(offset, entity)| {
            let data = self.light_call_data(entity, intent, start_index + offset);
            self.api.call_service("light", service, data)
        }))
        .await;

        let mut failures = 0;
        for (entity, result) in targets.iter().zip(results) {
            if let Err(err) = result {
                failures += 1;
                tracing::warn!(entity, error = %err, "light call failed");
            }
        }
        failures
    }

    fn light_response(
        &self,
        intent: &HomeIntent,
        label: &str,
        total: usize,
        failures: usize,
    ) -> String {
        if failures == total {
            return responses::APOLOGY.to_string();
        }
        match intent.action {
            HomeAction::TurnOff => vary(responses::LIGHT_OFF, label),
            HomeAction::SetColor => {
                let desc = intent.color_description.as_deref().unwrap_or("the colors");
                format!("Done! {label} set to {desc}.")
            }
            HomeAction::SetBrightness | HomeAction::AdjustBrightness => {
                format!("Done! Adjusted the {label}.")
            }
            _ => vary(responses::LIGHT_ON, label),
        }
    }

    async fn execute_lock(&self, intent: &HomeIntent) -> String {
        let room = intent.room.as_deref().unwrap_or("front_door");
        let targets: Vec<String> = if room == "all_doors" {
            self.entities
                .entities_in_domain("lock")
                .await
                .unwrap_or_default()
        } else {
            vec![format!("lock.{room}")]
        };
        if targets.is_empty() {
            return "I couldn't find any locks.".to_string();
        }

        match intent.action {
            HomeAction::GetStatus => {
                let mut locked = 0;
                let mut unlocked = Vec::new();
                for entity in &targets {
                    match self.entities.entity_state(entity).await {
                        Ok(Some(state)) => {
                            if state.get("state").and_then(Value::as_str) == Some("locked") {
                                locked += 1;
                            } else {
                                unlocked.push(entity.trim_start_matches("lock.").replace('_', " "));
                            }
                        }
                        _ => unlocked.push(entity.trim_start_matches("lock.").replace('_', " ")),
                    }
                }
                if unlocked.is_empty() {
                    if locked == 1 {
                        "The door is locked.".to_string()
                    } else {
                        format!("All {locked} doors are locked.")
                    }
                } else {
                    format!("The {} is unlocked.", unlocked.join(" and the "))
                }
            }
            HomeAction::Unlock => {
                let failures = self.dispatch_service("lock", "unlock", &targets).await;
                if failures == targets.len() {
                    responses::APOLOGY.to_string()
                } else if targets.len() == 1 {
                    "Unlocked.".to_string()
                } else {
                    format!("Unlocked {} doors.", targets.len() - failures)
                }
            }
            _ => {
                let failures = self.dispatch_service("lock", "lock", &targets).await;
                if failures == targets.len() {
                    responses::APOLOGY.to_string()
                } else if targets.len() == 1 {
                    "Locked.".to_string()
                } else {
                    format!("Locked {} doors.", targets.len() - failures)
                }
            }
        }
    }

    async fn execute_sensor(&self, intent: &HomeIntent) -> String {
        let sensor_type = intent
            .parameters
            .sensor_type
            .as_deref()
            .unwrap_or("occupancy");
        let sensors = self
            .entities
            .entities_in_domain("binary_sensor")
            .await
            .unwrap_or_default();

        let wanted: Vec<&String> = sensors
            .iter()
            .filter(|id| match sensor_type {
                "window" => id.contains("window"),
                _ => id.contains("motion") || id.contains("occupancy") || id.contains("presence"),
            })
            .collect();

        if wanted.is_empty() {
            return format!("I don't have any {sensor_type} sensors to check.");
        }

        let mut active = Vec::new();
        for entity in &wanted {
            if let Ok(Some(state)) = self.entities.entity_state(entity).await {
                if state.get("state").and_then(Value::as_str) == Some("on") {
                    active.push(room_from_entity(entity));
                }
            }
        }

        match sensor_type {
            "window" => {
                if active.is_empty() {
                    "All windows are closed.".to_string()
                } else {
                    format!("Open windows: {}.", active.join(", "))
                }
            }
            _ => {
                if active.is_empty() {
                    "I'm not seeing motion anywhere right now.".to_string()
                } else {
                    format!("There's recent motion in the {}.", active.join(" and the "))
                }
            }
        }
    }

    async fn execute_media(&self, intent: &HomeIntent) -> String {
        let players = self
            .entities
            .entities_in_domain("media_player")
            .await
            .unwrap_or_default();
        let room = intent.room.as_deref().unwrap_or("living_room");
        let target = players
            .iter()
            .find(|id| id.contains(room))
            .or_else(|| players.first());

        let Some(target) = target else {
            return "I couldn't find a media player.".to_string();
        };
        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        match self
            .api
            .call_service("media_player", service, json!({"entity_id": target}))
            .await
        {
            Ok(()) => {
                if intent.action == HomeAction::TurnOff {
                    "TV off.".to_string()
                } else {
                    "TV on.".to_string()
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "media call failed");
                responses::APOLOGY.to_string()
            }
        }
    }

    async fn execute_fan(&self, intent: &HomeIntent) -> String {
        let fans = self
            .entities
            .entities_in_domain("fan")
            .await
            .unwrap_or_default();
        let targets: Vec<String> = match intent.room.as_deref() {
            Some(room) => fans.iter().filter(|id| id.contains(room)).cloned().collect(),
            None => fans.clone(),
        };
        if targets.is_empty() {
            return "I couldn't find a fan to control.".to_string();
        }

        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let failures = self.dispatch_service("fan", service, &targets).await;
        if failures == targets.len() {
            responses::APOLOGY.to_string()
        } else if intent.action == HomeAction::TurnOff {
            "Fan off.".to_string()
        } else {
            "Fan on.".to_string()
        }
    }

    async fn execute_cover(&self, intent: &HomeIntent) -> String {
        let covers = self
            .entities
            .entities_in_domain("cover")
            .await
            .unwrap_or_default();
        let target = covers
            .iter()
            .find(|id| id.contains("garage"))
            .or_else(|| covers.first());
        let Some(target) = target else {
            return "I couldn't find the garage door.".to_string();
        };

        match intent.action {
            HomeAction::Open => {
                match self
                    .api
                    .call_service("cover", "open_cover", json!({"entity_id": target}))
                    .await
                {
                    Ok(()) => "Opening the garage.".to_string(),
                    Err(_) => responses::APOLOGY.to_string(),
                }
            }
            HomeAction::Close => {
                match self
                    .api
                    .call_service("cover", "close_cover", json!({"entity_id": target}))
                    .await
                {
                    Ok(()) => "Closing the garage.".to_string(),
                    Err(_) => responses::APOLOGY.to_string(),
                }
            }
            _ => match self.entities.entity_state(target).await {
                Ok(Some(state)) => {
                    let s = state.get("state").and_then(Value::as_str).unwrap_or("unknown");
                    format!("The garage door is {s}.")
                }
                _ => "I couldn't check the garage door.".to_string(),
            },
        }
    }

    async fn execute_scene(&self, intent: &HomeIntent) -> String {
        let Some(entity) = intent.parameters.entity_id.as_deref() else {
            return "I don't know that scene.".to_string();
        };
        let domain = entity.split('.').next().unwrap_or("scene");
        match self
            .api
            .call_service(domain, "turn_on", json!({"entity_id": entity}))
            .await
        {
            Ok(()) => match entity {
                "script.good_night" => "Good night!".to_string(),
                "script.good_morning" => "Good morning!".to_string(),
                "script.leaving" => "See you later!".to_string(),
                "script.arriving" => "Welcome home!".to_string(),
                _ => "Done!".to_string(),
            },
            Err(err) => {
                tracing::error!(error = %err, entity, "scene activation failed");
                responses::APOLOGY.to_string()
            }
        }
    }

    async fn execute_climate(&self, intent: &HomeIntent) -> String {
        let climate = match self.entities.climate_state().await {
            Ok(Some(climate)) => climate,
            _ => return "I couldn't reach the thermostat.".to_string(),
        };

        match intent.action {
            HomeAction::GetStatus => {
                let current = climate
                    .current_temp
                    .map(|t| format!("{t:.0}"))
                    .unwrap_or_else(|| "unknown".to_string());
                match climate.target_temp {
                    Some(target) => format!(
                        "It's {current}°F inside, set to {target:.0} and currently {}.",
                        climate.state
                    ),
                    None => format!("It's {current}°F inside."),
                }
            }
            HomeAction::SetTemperature => {
                let Some(target) = intent.parameters.target_temperature else {
                    return "What temperature would you like?".to_string();
                };
                match self
                    .api
                    .call_service(
                        "climate",
                        "set_temperature",
                        json!({"entity_id": climate.entity_id, "temperature": target}),
                    )
                    .await
                {
                    Ok(()) => vary(responses::THERMOSTAT_SET, &format!("{target:.0}")),
                    Err(_) => responses::APOLOGY.to_string(),
                }
            }
            _ => {
                let delta = intent.parameters.temperature_delta.unwrap_or(2) as f64;
                let base = climate.target_temp.unwrap_or(70.0);
                let target = base + delta;
                match self
                    .api
                    .call_service(
                        "climate",
                        "set_temperature",
                        json!({"entity_id": climate.entity_id, "temperature": target}),
                    )
                    .await
                {
                    Ok(()) if delta > 0.0 => vary(responses::THERMOSTAT_UP, ""),
                    Ok(()) => vary(responses::THERMOSTAT_DOWN, ""),
                    Err(_) => responses::APOLOGY.to_string(),
                }
            }
        }
    }

    async fn execute_bed_warmer(&self, intent: &HomeIntent) -> String {
        let params = &intent.parameters;
        let sides: Vec<(&str, Option<u8>)> = match params.bed_side.as_deref() {
            Some("left") => vec![("left", params.bed_level)],
            Some("right") => vec![("right", params.bed_level)],
            Some("both") if params.left_level.is_some() || params.right_level.is_some() => vec![
                ("left", params.left_level),
                ("right", params.right_level),
            ],
            // "my side" defaults to the configured owner side
            Some("my_side") => vec![("left", params.bed_level)],
            _ => vec![("left", params.bed_level), ("right", params.bed_level)],
        };

        match intent.action {
            HomeAction::GetStatus => {
                let mut parts = Vec::new();
                for (side, _) in &sides {
                    let entity = format!("number.bed_warmer_{side}");
                    if let Ok(Some(state)) = self.entities.entity_state(&entity).await {
                        let level = state.get("state").and_then(Value::as_str).unwrap_or("0");
                        parts.push(format!("{side} at level {level}"));
                    }
                }
                if parts.is_empty() {
                    "The bed warmer is off.".to_string()
                } else {
                    format!("Bed warmer: {}.", parts.join(", "))
                }
            }
            HomeAction::TurnOff => {
                let targets: Vec<String> = sides
                    .iter()
                    .map(|(side, _)| format!("switch.bed_warmer_{side}"))
                    .collect();
                let failures = self.dispatch_service("switch", "turn_off", &targets).await;
                if failures == targets.len() {
                    responses::APOLOGY.to_string()
                } else {
                    "Bed warmer off.".to_string()
                }
            }
            _ => {
                let mut ok = 0;
                for (side, level) in &sides {
                    let level = level.unwrap_or(1);
                    let entity = format!("number.bed_warmer_{side}");
                    if self
                        .api
                        .call_service(
                            "number",
                            "set_value",
                            json!({"entity_id": entity, "value": level}),
                        )
                        .await
                        .is_ok()
                    {
                        ok += 1;
                    }
                }
                if ok == 0 {
                    responses::APOLOGY.to_string()
                } else {
                    "Warming up the bed.".to_string()
                }
            }
        }
    }

    async fn execute_motion(&self, intent: &HomeIntent) -> String {
        let automations = self
            .entities
            .entities_in_domain("automation")
            .await
            .unwrap_or_default();
        let targets: Vec<String> = automations
            .into_iter()
            .filter(|id| id.contains("motion"))
            .filter(|id| {
                intent
                    .room
                    .as_deref()
                    .map(|room| id.contains(room))
                    .unwrap_or(true)
            })
            .collect();
        if targets.is_empty() {
            return "I couldn't find motion automations to change.".to_string();
        }

        let service = if intent.action == HomeAction::TurnOff {
            "turn_off"
        } else {
            "turn_on"
        };
        let failures = self.dispatch_service("automation", service, &targets).await;
        if failures == targets.len() {
            responses::APOLOGY.to_string()
        } else if intent.action == HomeAction::TurnOff {
            "Motion lighting paused.".to_string()
        } else {
            "Motion lighting back on.".to_string()
        }
    }

    async fn dispatch_service(&self, domain: &str, service: &str, targets: &[String]) -> usize {
        let results = join_all(
            targets
                .iter()
                .map(|entity| self.api.call_service(domain, service, json!({"entity_id": entity}))),
        )
        .await;
        let mut failures = 0;
        for (entity, result) in targets.iter().zip(results) {
            if let Err(err) = result {
                failures += 1;
                tracing::warn!(entity, error = %err, "service call failed");
            }
        }
        failures
    }
}

/// Members of the primary light group for a room, or the group entity
/// itself when it has none.
async fn resolve_targets(entities: &HaEntityManager, room: &str) -> Vec<String> {
    match entities.find_lights_by_room(room).await {
        Ok(groups) => groups
            .first()
            .map(|group| {
                if group.members.is_empty() {
                    vec![group.entity_id.clone()]
                } else {
                    group.members.clone()
                }
            })
            .unwrap_or_default(),
        Err(err) => {
            tracing::warn!(room, error = %err, "light lookup failed");
            Vec::new()
        }
    }
}

/// Degraded intent when extraction fails outright: plain on/off.
fn heuristic_intent(query: &str, device_room: Option<&str>) -> HomeIntent {
    let action = if query.to_lowercase().contains("off") {
        HomeAction::TurnOff
    } else {
        HomeAction::TurnOn
    };
    HomeIntent {
        device_type: DeviceType::Light,
        room: rules::extract_room(&query.to_lowercase())
            .or_else(|| device_room.map(str::to_string)),
        action,
        parameters: IntentParams::default(),
        ..Default::default()
    }
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        return rest.split("```").next().unwrap_or(rest);
    }
    if let Some(rest) = text.strip_prefix("```") {
        return rest.split("```").next().unwrap_or(rest);
    }
    text
}

fn parse_intent_json(text: &str) -> Option<HomeIntent> {
    let cleaned = strip_code_fences(text).trim();
    // Models sometimes prepend prose; find the first object.
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    serde_json::from_str(&cleaned[start..=end]).ok()
}

fn room_from_entity(entity_id: &str) -> String {
    entity_id
        .trim_start_matches("binary_sensor.")
        .trim_end_matches("_motion")
        .trim_end_matches("_occupancy")
        .trim_end_matches("_presence")
        .trim_end_matches("_window")
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingDeviceApi;
    use serde_json::json;

    fn states() -> Vec<Value> {
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
                "state": "on",
                "attributes": {
                    "friendly_name": "Bedroom Lights",
                    "entity_id": ["light.bedroom_lamp", "light.bedroom_ceiling"]
                }
            }),
            json!({
                "entity_id": "light.kitchen_lights",
                "state": "off",
                "attributes": {
                    "friendly_name": "Kitchen Lights",
                    "entity_id": ["light.kitchen_main"]
                }
            }),
            json!({
                "entity_id": "lock.front_door",
                "state": "locked",
                "attributes": {"friendly_name": "Front Door"}
            }),
            json!({
                "entity_id": "binary_sensor.kitchen_motion",
                "state": "on",
                "attributes": {"friendly_name": "Kitchen Motion"}
            }),
            json!({
                "entity_id": "binary_sensor.office_window",
                "state": "off",
                "attributes": {"friendly_name": "Office Window"}
            }),
        ]
    }

    fn controller(api: Arc<RecordingDeviceApi>) -> SmartHomeController {
        SmartHomeController::new(api, None, None)
    }

    #[tokio::test]
    async fn test_simple_control_end_to_end() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        let response = controller
            .handle("turn off the office lights", None, None)
            .await;

        let entities = api.called_entities();
        assert!(entities.contains(&"light.office_desk".to_string()));
        assert!(entities.contains(&"light.office_ceiling".to_string()));
        assert!(response.to_lowercase().contains("off") || response == "Done!");
        for (_, service, _) in api.calls.lock().iter() {
            assert_eq!(service, "turn_off");
        }
    }

    #[tokio::test]
    async fn test_whole_house_exclusion_never_touches_excluded_room() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        let response = controller
            .handle("turn off all the lights except the bedroom", None, None)
            .await;

        let entities = api.called_entities();
        assert!(!entities.is_empty());
        assert!(
            entities.iter().all(|e| !e.contains("bedroom")),
            "bedroom entity was called: {entities:?}"
        );
        assert!(entities.contains(&"light.office_desk".to_string()));
        assert!(entities.contains(&"light.kitchen_main".to_string()));
        assert!(response.contains("except bedroom"));
    }

    #[tokio::test]
    async fn test_multi_room_command() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        controller
            .handle("turn on the kitchen and office lights", None, None)
            .await;

        let entities = api.called_entities();
        assert!(entities.contains(&"light.kitchen_main".to_string()));
        assert!(entities.contains(&"light.office_desk".to_string()));
        assert!(entities.iter().all(|e| !e.contains("bedroom")));
    }

    #[tokio::test]
    async fn test_lock_status_reads_state() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        let response = controller
            .handle("is the front door locked", None, None)
            .await;
        assert!(response.contains("locked"));
        // Status queries never mutate
        assert!(api.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_occupancy_summary() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        let response = controller.handle("is anyone home", None, None).await;
        assert!(response.contains("kitchen"));
    }

    #[tokio::test]
    async fn test_color_cycling_spreads_palette() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        controller
            .handle("ravens colors in the office", None, None)
            .await;

        let calls = api.calls.lock();
        let hues: Vec<i64> = calls
            .iter()
            .filter_map(|(_, _, data)| data["hs_color"][0].as_i64())
            .collect();
        // Two office lights, two palette colors: both hues appear.
        assert_eq!(hues.len(), 2);
        assert!(hues.contains(&270));
        assert!(hues.contains(&45));
    }

    #[tokio::test]
    async fn test_device_room_fallback() {
        let api = Arc::new(RecordingDeviceApi::new(states()));
        let controller = controller(api.clone());

        controller.handle("turn on the lights", Some("kitchen"), None).await;
        let entities = api.called_entities();
        assert_eq!(entities, vec!["light.kitchen_main".to_string()]);
    }

    #[test]
    fn test_intent_json_parsing_with_fences() {
        let text = "```json\n{\"device_type\": \"light\", \"action\": \"turn_off\", \"room\": \"den\"}\n```";
        let intent = parse_intent_json(text).unwrap();
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.room.as_deref(), Some("den"));
    }

    #[test]
    fn test_heuristic_fallback() {
        let intent = heuristic_intent("please make the lights go off", Some("den"));
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.room.as_deref(), Some("den"));
    }
}
