//! Structured device-control intents
//!
//! The shape the rule engine produces directly and the LLM fallback is
//! asked to emit as JSON; both paths land on the same type.

use serde::{Deserialize, Serialize};

/// Device domains the controller can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Light,
    Switch,
    Lock,
    Sensor,
    MediaPlayer,
    Fan,
    Cover,
    Scene,
    Climate,
    BedWarmer,
    MotionAutomation,
}

impl DeviceType {
    /// Home-automation service domain for this device type.
    pub fn domain(&self) -> &'static str {
        match self {
            DeviceType::Light => "light",
            DeviceType::Switch => "switch",
            DeviceType::Lock => "lock",
            DeviceType::Sensor => "binary_sensor",
            DeviceType::MediaPlayer => "media_player",
            DeviceType::Fan => "fan",
            DeviceType::Cover => "cover",
            DeviceType::Scene => "scene",
            DeviceType::Climate => "climate",
            DeviceType::BedWarmer => "number",
            DeviceType::MotionAutomation => "automation",
        }
    }
}

/// Actions over a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HomeAction {
    #[default]
    TurnOn,
    TurnOff,
    Lock,
    Unlock,
    Open,
    Close,
    GetStatus,
    SetColor,
    SetBrightness,
    AdjustBrightness,
    SetTemperature,
    AdjustTemperature,
    Activate,
    Increase,
    Decrease,
    WarmBed,
}

/// Whether a command targets one entity or a whole group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetScope {
    #[default]
    Group,
    Single,
}

/// Free-form parameters carried by an intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentParams {
    /// Absolute brightness 0-255
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    /// Relative brightness step in percent (negative = dim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_step_pct: Option<i16>,
    /// Hue/saturation pairs; one entry replicates, several cycle
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hs_colors: Vec<(u16, u8)>,
    /// Sensor kind for status queries ("occupancy", "window")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    /// Scene or script entity to activate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Thermostat target in °F
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temperature: Option<f32>,
    /// Relative thermostat change in °F (negative = cooler)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_delta: Option<i8>,
    /// Bed-warmer level 1-10
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_level: Option<u8>,
    /// "left", "right", or "both"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_side: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_level: Option<u8>,
    /// Rooms for multi-room commands joined by "and"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rooms: Vec<String>,
}

/// A structured device-control intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeIntent {
    #[serde(default)]
    pub device_type: DeviceType,
    /// Target room; `whole_house` is a special marker, locks use
    /// `front_door` / `back_door` / `all_doors`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub action: HomeAction,
    #[serde(default)]
    pub target_scope: TargetScope,
    #[serde(default)]
    pub parameters: IntentParams,
    /// Rooms excluded from a whole-house command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_rooms: Vec<String>,
    /// Human description of the requested color scheme
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_description: Option<String>,
}

impl HomeIntent {
    pub fn light(action: HomeAction, room: Option<String>) -> Self {
        Self {
            device_type: DeviceType::Light,
            room,
            action,
            ..Default::default()
        }
    }

    pub fn is_whole_house(&self) -> bool {
        self.room.as_deref() == Some("whole_house")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_deserializes_from_llm_json() {
        let json = r#"{
            "device_type": "light",
            "room": "office",
            "action": "turn_off",
            "target_scope": "group",
            "parameters": {}
        }"#;
        let intent: HomeIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.device_type, DeviceType::Light);
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.room.as_deref(), Some("office"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let intent: HomeIntent = serde_json::from_str(r#"{"action": "turn_on"}"#).unwrap();
        assert_eq!(intent.device_type, DeviceType::Light);
        assert!(intent.excluded_rooms.is_empty());
    }
}
