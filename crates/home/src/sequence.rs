//! Temporal sequence detection and extraction
//!
//! Commands needing multiple timed steps ("flash the lights three times",
//! "turn the porch light on at 6pm") are detected here and unrolled by a
//! second LLM pass into explicit steps.

use serde::{Deserialize, Serialize};

use crate::intent::{DeviceType, HomeAction};

/// One step of an extracted sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
    pub action: HomeAction,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Brightness 0-255
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hs_colors: Vec<(u16, u8)>,
    /// Seconds to wait after this step
    #[serde(default)]
    pub delay_after: u64,
    /// "HH:MM" wall-clock time for scheduled steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
}

/// An extracted sequence: spoken acknowledgment plus ordered steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceIntent {
    pub acknowledge: String,
    pub steps: Vec<SequenceStep>,
}

const SCENE_EXCLUSIONS: &[&str] = &[
    "good morning", "good night", "goodnight", "movie mode", "movie time", "bedtime",
    "night mode", "morning mode", "wake up", "time for bed", "i am leaving", "i'm leaving",
    "im leaving", "goodbye", "i am home", "i'm home", "im home", "i'm back", "im back",
    "romantic mode", "date night", "relax mode", "chill mode", "party mode",
];

const BRIGHTNESS_EXCLUSIONS: &[&str] = &[
    "lights at half", "light at half", "lights to half", "lights at fifty",
    "lights to fifty", "lights at 50", "lights to 50", "at twenty percent",
    "at thirty percent", "at forty percent", "at fifty percent", "at sixty percent",
];

const CASUAL_THEN: &[&str] = &[
    "well then", "ok then", "okay then", "alright then", "fine then", "then please",
];

const EMOTIONAL: &[&str] = &[
    "tomorrow will be better", "will be better tomorrow", "better tomorrow",
    "tomorrow is another day", "will be better right",
];

const DELAY_WORDS: &[&str] = &[
    "wait", "then", "after that", "seconds", "second", "minutes", "minute", "pause", "delay",
];

const LOOP_WORDS: &[&str] = &[
    "times", "repeat", "cycle", "loop", "again", "on and off", "off and on", "flash",
    "blink", "on then off", "off then on",
];

const SCHEDULE_WORDS: &[&str] = &[
    " at ", " pm", " am", "o'clock", "oclock", "tonight", "tomorrow", "morning",
    "evening", "noon", "midnight", "schedule",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whether a query needs sequence execution (delays, loops, scheduling).
/// Scenes, plain brightness commands, filler "then", and emotional
/// reassurance are explicitly excluded.
pub fn detect_sequence(query: &str) -> bool {
    let q = query.to_lowercase();

    if contains_any(&q, SCENE_EXCLUSIONS) || contains_any(&q, BRIGHTNESS_EXCLUSIONS) {
        return false;
    }

    if contains_any(&q, CASUAL_THEN) {
        let action_words = ["turn", "set", "change", "dim", "bright"];
        let action_count = action_words.iter().filter(|w| q.contains(**w)).count();
        if action_count < 2 {
            return false;
        }
    }

    if contains_any(&q, EMOTIONAL) {
        let action_words = ["turn", "set", "schedule", "start", "run"];
        if !contains_any(&q, &action_words) {
            return false;
        }
    }

    contains_any(&q, DELAY_WORDS)
        || contains_any(&q, LOOP_WORDS)
        || contains_any(&q, SCHEDULE_WORDS)
}

/// Prompt for the sequence-extraction LLM pass.
pub fn sequence_prompt(query: &str, room: &str) -> String {
    format!(
        r#"You are a smart home assistant that creates action sequences.

Parse this request and generate a sequence of steps.

User request: "{query}"
Current room: {room}

Generate a JSON response:
{{
    "acknowledge": "Brief spoken acknowledgment",
    "steps": [
        {{
            "action": "turn_on|turn_off|set_color|set_brightness",
            "device_type": "light|switch|climate|lock|media_player",
            "room": "room name",
            "brightness": null,
            "hs_colors": [],
            "delay_after": 0,
            "at_time": null
        }}
    ]
}}

Rules:
1. Unroll loops into explicit steps ("3 times" = 3 separate on/off pairs)
2. For "on and off" patterns, alternate turn_on and turn_off actions
3. For "different colors each time", use distinct hues: red 0, orange 30, yellow 60, green 120, cyan 180, blue 240, purple 280, pink 330
4. Use delay_after for relative waits ("wait 3 seconds" means delay_after: 3)
5. Use at_time "HH:MM" for scheduled actions ("at 6pm" means "18:00")
6. If no room specified, use: {room}
7. Keep acknowledge brief, it will be spoken aloud

Return ONLY valid JSON."#
    )
}

/// Minimal single-step fallback when the LLM output fails to parse.
pub fn fallback_sequence(query: &str, room: &str) -> SequenceIntent {
    let action = if query.to_lowercase().contains("off") {
        HomeAction::TurnOff
    } else {
        HomeAction::TurnOn
    };
    SequenceIntent {
        acknowledge: "Let me try that.".to_string(),
        steps: vec![SequenceStep {
            action,
            device_type: DeviceType::Light,
            room: Some(room.to_string()),
            brightness: None,
            hs_colors: Vec::new(),
            delay_after: 0,
            at_time: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loops_and_delays_detected() {
        assert!(detect_sequence("flash the lights 3 times"));
        assert!(detect_sequence("turn on the lights, wait 5 seconds, then turn them off"));
        assert!(detect_sequence("porch light on at 6pm"));
    }

    #[test]
    fn test_scene_commands_are_not_sequences() {
        assert!(!detect_sequence("good night"));
        assert!(!detect_sequence("movie time"));
    }

    #[test]
    fn test_plain_brightness_is_not_a_sequence() {
        assert!(!detect_sequence("all lights at fifty percent"));
        assert!(!detect_sequence("lights at half"));
    }

    #[test]
    fn test_casual_then_is_not_a_sequence() {
        assert!(!detect_sequence("ok then turn on the lights"));
    }

    #[test]
    fn test_emotional_tomorrow_is_not_a_sequence() {
        assert!(!detect_sequence("tomorrow will be better right"));
    }

    #[test]
    fn test_sequence_json_parses() {
        let json = r#"{
            "acknowledge": "Flashing the lights.",
            "steps": [
                {"action": "turn_on", "device_type": "light", "room": "office", "delay_after": 2},
                {"action": "turn_off", "device_type": "light", "room": "office", "delay_after": 0}
            ]
        }"#;
        let seq: SequenceIntent = serde_json::from_str(json).unwrap();
        assert_eq!(seq.steps.len(), 2);
        assert_eq!(seq.steps[0].delay_after, 2);
    }
}
