//! Fast-path intent rules
//!
//! A prioritised rule engine covering the common command families so the
//! LLM is only consulted for genuinely ambiguous requests. Order matters:
//! locks before generic on/off (they share "lock" wording with nothing
//! else), occupancy before sensors, exclusion phrasing defers whole-house
//! matching to the exclusion path.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::colors::{
    ambient_palette, color_name_to_hs, random_colors, team_palette, AMBIENT_THEMES, BASIC_COLORS,
    TEAMS,
};
use crate::intent::{DeviceType, HomeAction, HomeIntent, IntentParams};

const KNOWN_ROOMS: &[&str] = &[
    "office", "kitchen", "living room", "livingroom", "bathroom", "master bedroom",
    "master bath", "bedroom", "guest room", "hallway", "hall", "basement", "attic",
    "garage", "porch", "deck", "patio", "dining room", "den", "family room", "study",
    "library", "laundry room",
];

/// Logical room groups → member rooms
pub const ROOM_GROUPS: &[(&str, &[&str])] = &[
    ("downstairs", &["living room", "dining room", "kitchen"]),
    ("first floor", &["living room", "dining room", "kitchen"]),
    ("main floor", &["living room", "dining room", "kitchen"]),
    ("upstairs", &["master bedroom", "bedroom", "office", "bathroom"]),
    ("second floor", &["master bedroom", "bedroom", "office", "bathroom"]),
];

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(?:%|percent)").unwrap());
static EVERYTHING_BUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(everything|all\s+(?:the\s+)?lights?)\s+but\s+").unwrap());
static EXCEPT_ROOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:except|but\s+not|excluding|but)\s+(?:the\s+|in\s+the\s+|for\s+the\s+)?([a-z\s]+?)(?:\s+lights?)?(?:[?!.]|$)").unwrap()
});
static BED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bbed\b").unwrap());
static DUAL_SIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"left\s+(?:side\s+)?(?:to|at)\s+(\d+).+right\s+(?:side\s+)?(?:to|at)\s+(\d+)")
        .unwrap()
});
static MULTI_ROOM_AND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([a-z]+(?:\s+room)?)\s+and\s+(?:the\s+)?([a-z]+(?:\s+room)?)\b").unwrap()
});

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Common voice-transcription typos, fixed before matching.
fn normalize(query: &str) -> String {
    let mut q = query.to_lowercase();
    for (typo, fix) in [
        ("lihgts", "lights"), ("ligths", "lights"), ("lighst", "lights"),
        ("lites", "lights"), ("lite", "light"), ("ligth", "light"),
        ("turn of ", "turn off "), ("trun ", "turn "), ("tunr ", "turn "),
        ("offf", "off"), ("onn", "on"),
        ("swtich", "switch"), ("swich", "switch"),
        ("theromstat", "thermostat"), ("thermstat", "thermostat"),
        ("temprature", "temperature"), ("tempature", "temperature"),
        ("dorr", "door"), ("locl", "lock"),
    ] {
        if q.contains(typo) {
            q = q.replace(typo, fix);
        }
    }
    q
}

/// Try every fast path in priority order. `None` means the LLM decides.
pub fn extract_fast_path(query: &str, device_room: Option<&str>) -> Option<HomeIntent> {
    let q = normalize(query);

    lock_command(&q)
        .or_else(|| occupancy_query(&q))
        .or_else(|| window_status(&q))
        .or_else(|| media_command(&q))
        .or_else(|| fan_command(&q))
        .or_else(|| garage_command(&q))
        .or_else(|| scene_command(&q))
        .or_else(|| motion_override(&q))
        .or_else(|| bed_warmer(&q))
        .or_else(|| thermostat(&q))
        .or_else(|| exclusion_command(&q))
        .or_else(|| whole_house(&q))
        .or_else(|| multi_room(&q))
        .or_else(|| room_group(&q))
        .or_else(|| brightness(&q, device_room))
        .or_else(|| color_command(&q, device_room))
        .or_else(|| simple_on_off(&q, device_room))
}

fn is_turn_on(q: &str) -> bool {
    contains_any(q, &["turn on", "switch on", "lights on", "light on"])
        || (q.contains("lit") && !is_turn_off(q))
}

fn is_turn_off(q: &str) -> bool {
    contains_any(
        q,
        &[
            "turn off", "switch off", "lights off", "light off", "kill the lights",
            "kill all", "cut the lights", "lights out", "shut off", "shut it off",
            "no more lights",
        ],
    )
}

fn lock_command(q: &str) -> Option<HomeIntent> {
    let lock_words = [
        "lock the", "unlock the", "lock up", "lock all", "unlock all", "lock everything",
        "lock it down", "lock down", "is the door locked", "is the front door", "is the back door",
        "are the doors", "are all doors", "are my doors", "did i lock", "have i locked",
        "door status", "check the lock", "check the locks", "status of the lock",
        "any doors unlocked", "doors unlocked", "everything locked", "door good", "door okay",
    ];
    if !contains_any(q, &lock_words) {
        return None;
    }

    let status_cues = [
        "is the", "are the", "are all", "are my", "did i", "have i", "check", "status",
        "door good", "door okay", "door open", "everything locked", "unlocked?",
        "doors unlocked", "left the door", "left any doors",
    ];
    let past_tense_check = ["did i lock", "have i locked", "did i already lock"];
    let action = if (contains_any(q, &status_cues)
        && contains_any(q, &["locked", "unlocked", "status", "check", "good", "okay", "open"]))
        || contains_any(q, &past_tense_check)
    {
        HomeAction::GetStatus
    } else if q.contains("unlock") {
        HomeAction::Unlock
    } else {
        HomeAction::Lock
    };

    let room = if q.contains("back") {
        "back_door"
    } else if q.contains("front") {
        "front_door"
    } else if contains_any(q, &["all", "the doors", "my doors", "the locks", "everything", "house"]) {
        "all_doors"
    } else {
        "front_door"
    };

    Some(HomeIntent {
        device_type: DeviceType::Lock,
        room: Some(room.to_string()),
        action,
        ..Default::default()
    })
}

fn occupancy_query(q: &str) -> Option<HomeIntent> {
    let patterns = [
        "anybody in", "anyone in", "someone in", "somebody in", "is there anybody",
        "is there anyone", "anybody home", "anyone home", "someone home", "who is home",
        "who's home", "whos home", "occupied", "occupancy",
    ];
    if !contains_any(q, &patterns) {
        return None;
    }
    Some(HomeIntent {
        device_type: DeviceType::Sensor,
        room: None,
        action: HomeAction::GetStatus,
        parameters: IntentParams {
            sensor_type: Some("occupancy".to_string()),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn window_status(q: &str) -> Option<HomeIntent> {
    let patterns = [
        "window open", "windows open", "any windows", "check the windows", "check windows",
        "window status", "windows closed", "are the windows",
    ];
    if !contains_any(q, &patterns) {
        return None;
    }
    Some(HomeIntent {
        device_type: DeviceType::Sensor,
        room: None,
        action: HomeAction::GetStatus,
        parameters: IntentParams {
            sensor_type: Some("window".to_string()),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn media_command(q: &str) -> Option<HomeIntent> {
    if !contains_any(q, &["tv", "television", "media player", "shield"]) {
        return None;
    }
    if !(is_turn_on(q) || is_turn_off(q)) {
        return None;
    }
    Some(HomeIntent {
        device_type: DeviceType::MediaPlayer,
        room: Some("living_room".to_string()),
        action: if is_turn_off(q) {
            HomeAction::TurnOff
        } else {
            HomeAction::TurnOn
        },
        ..Default::default()
    })
}

fn fan_command(q: &str) -> Option<HomeIntent> {
    let fan_words = ["ceiling fan", "the fan", "a fan", "fans", "air moving", "air circulation", "some air"];
    if !contains_any(q, &fan_words) {
        return None;
    }
    let wants_air = contains_any(q, &["air moving", "air circulation", "some air"]);
    if !(is_turn_on(q) || is_turn_off(q) || wants_air) {
        return None;
    }

    let room = if q.contains("living") {
        Some("living_room".to_string())
    } else if q.contains("bedroom") || q.contains("master") {
        Some("master_bedroom".to_string())
    } else if q.contains("office") {
        Some("office".to_string())
    } else {
        None
    };

    Some(HomeIntent {
        device_type: DeviceType::Fan,
        room,
        action: if is_turn_off(q) && !wants_air {
            HomeAction::TurnOff
        } else {
            HomeAction::TurnOn
        },
        ..Default::default()
    })
}

fn garage_command(q: &str) -> Option<HomeIntent> {
    if !q.contains("garage") {
        return None;
    }
    let action = if q.contains("open") {
        HomeAction::Open
    } else if contains_any(q, &["close", "shut"]) {
        HomeAction::Close
    } else {
        HomeAction::GetStatus
    };
    Some(HomeIntent {
        device_type: DeviceType::Cover,
        room: Some("garage".to_string()),
        action,
        ..Default::default()
    })
}

fn scene_command(q: &str) -> Option<HomeIntent> {
    const SCENES: &[(&str, &str)] = &[
        ("movie mode", "scene.movie_mode"),
        ("movie time", "scene.movie_mode"),
        ("watch a movie", "scene.movie_mode"),
        ("good night", "script.good_night"),
        ("goodnight", "script.good_night"),
        ("bedtime", "script.good_night"),
        ("time for bed", "script.good_night"),
        ("night mode", "script.good_night"),
        ("good morning", "script.good_morning"),
        ("morning mode", "script.good_morning"),
        ("wake up", "script.good_morning"),
        ("i'm leaving", "script.leaving"),
        ("im leaving", "script.leaving"),
        ("i am leaving", "script.leaving"),
        ("heading out", "script.leaving"),
        ("goodbye", "script.leaving"),
        ("i'm home", "script.arriving"),
        ("im home", "script.arriving"),
        ("i am home", "script.arriving"),
        ("i'm back", "script.arriving"),
        ("romantic mode", "scene.romantic"),
        ("date night", "scene.romantic"),
        ("set the mood", "scene.romantic"),
        ("make it romantic", "scene.romantic"),
        ("relax mode", "scene.relax"),
        ("chill mode", "scene.relax"),
        ("party mode", "scene.party"),
        ("party time", "scene.party"),
        ("party vibes", "scene.party"),
    ];
    for (pattern, entity) in SCENES {
        if q.contains(pattern) {
            return Some(HomeIntent {
                device_type: DeviceType::Scene,
                room: None,
                action: HomeAction::Activate,
                parameters: IntentParams {
                    entity_id: Some(entity.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            });
        }
    }
    None
}

fn motion_override(q: &str) -> Option<HomeIntent> {
    let disable = [
        "disable motion", "turn off motion", "stop the motion", "stop turning the lights",
        "stop turning lights", "don't turn the lights on automatically", "motion lights off",
    ];
    let enable = ["enable motion", "turn on motion", "motion lights back on", "resume motion"];
    if contains_any(q, &disable) {
        return Some(HomeIntent {
            device_type: DeviceType::MotionAutomation,
            room: extract_room(q),
            action: HomeAction::TurnOff,
            ..Default::default()
        });
    }
    if contains_any(q, &enable) {
        return Some(HomeIntent {
            device_type: DeviceType::MotionAutomation,
            room: extract_room(q),
            action: HomeAction::TurnOn,
            ..Default::default()
        });
    }
    None
}

fn bed_warmer(q: &str) -> Option<HomeIntent> {
    let patterns = [
        "warm up the bed", "warm the bed", "preheat the bed", "heat the bed", "warm my bed",
        "heat my bed", "warm the mattress", "heat the mattress", "mattress pad", "bed warmer",
        "warm my side", "heat my side", "warm up my side", "heat up my side", "warm the left",
        "warm the right", "turn on the bed", "turn off the bed", "set the bed to", "set bed to",
        "make the bed warm", "heat up the bed",
    ];
    if !contains_any(q, &patterns) {
        return None;
    }
    // "bedroom" must not trigger bed warming; require a standalone bed,
    // mattress, or side reference.
    let has_target = BED_WORD.is_match(&q.replace("bedroom", ""))
        || q.contains("mattress")
        || contains_any(q, &["my side", "left side", "right side"]);
    if !has_target {
        return None;
    }

    if q.contains('?')
        || contains_any(q, &["is the bed", "is my bed", "what level", "how warm", "bed status", "check the bed"])
    {
        return Some(HomeIntent {
            device_type: DeviceType::BedWarmer,
            room: Some("master_bedroom".to_string()),
            action: HomeAction::GetStatus,
            ..Default::default()
        });
    }

    let action = if contains_any(q, &["turn off", "off", "stop"]) {
        HomeAction::TurnOff
    } else if contains_any(q, &["warmer", "hotter", "turn up", "increase", "higher"]) {
        HomeAction::Increase
    } else if contains_any(q, &["cooler", "less", "turn down", "decrease", "lower"]) {
        HomeAction::Decrease
    } else {
        HomeAction::WarmBed
    };

    let mut params = IntentParams::default();
    if let Some(caps) = DUAL_SIDE.captures(q) {
        params.left_level = caps[1].parse().ok().map(percent_to_level);
        params.right_level = caps[2].parse().ok().map(percent_to_level);
        params.bed_side = Some("both".to_string());
    } else {
        if let Some(caps) = PERCENT.captures(q) {
            params.bed_level = caps[1].parse().ok().map(percent_to_level);
        } else {
            params.bed_level = Some(1);
        }
        params.bed_side = Some(
            if q.contains("left") {
                "left"
            } else if q.contains("right") {
                "right"
            } else if q.contains("my side") {
                "my_side"
            } else {
                "both"
            }
            .to_string(),
        );
    }

    Some(HomeIntent {
        device_type: DeviceType::BedWarmer,
        room: Some("master_bedroom".to_string()),
        action,
        parameters: params,
        ..Default::default()
    })
}

fn percent_to_level(pct: u32) -> u8 {
    ((pct as f64 / 10.0).round() as u8).clamp(1, 10)
}

fn thermostat(q: &str) -> Option<HomeIntent> {
    let climate_words = [
        "thermostat", "hvac", "heat", "heating", "cooling", "the ac",
        "temperature inside", "indoor temperature", "temp inside",
        "make it warmer", "make it cooler", "make it hotter", "make it colder",
        "drop the temperature", "drop that temp", "mad cold", "mad hot", "temp we at",
    ];
    if !contains_any(q, &climate_words) {
        return None;
    }
    // Outdoor weather questions are not climate commands.
    if contains_any(q, &["outside", "forecast", "weather"]) {
        return None;
    }

    if contains_any(q, &["what", "how", "temp we at", "?"])
        && !contains_any(q, &["set", "make", "turn", "drop", "raise"])
    {
        return Some(HomeIntent {
            device_type: DeviceType::Climate,
            room: None,
            action: HomeAction::GetStatus,
            ..Default::default()
        });
    }

    static SET_TEMP: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:to|at)\s+(\d{2})\s*(?:degrees|°|f\b)?").unwrap());
    if let Some(caps) = SET_TEMP.captures(q) {
        if let Ok(temp) = caps[1].parse::<f32>() {
            return Some(HomeIntent {
                device_type: DeviceType::Climate,
                room: None,
                action: HomeAction::SetTemperature,
                parameters: IntentParams {
                    target_temperature: Some(temp),
                    ..Default::default()
                },
                ..Default::default()
            });
        }
    }

    let delta: i8 = if contains_any(q, &["warmer", "hotter", "up", "raise", "mad cold"]) {
        2
    } else {
        -2
    };
    Some(HomeIntent {
        device_type: DeviceType::Climate,
        room: None,
        action: HomeAction::AdjustTemperature,
        parameters: IntentParams {
            temperature_delta: Some(delta),
            ..Default::default()
        },
        ..Default::default()
    })
}

fn has_exclusion(q: &str) -> bool {
    contains_any(q, &["except", "but not", "excluding"]) || EVERYTHING_BUT.is_match(q)
}

/// Whole-house command with excluded rooms ("all lights off except the
/// bedroom", "everything but the office").
fn exclusion_command(q: &str) -> Option<HomeIntent> {
    if !has_exclusion(q) {
        return None;
    }
    let mentions_lights = contains_any(q, &["light", "lights", "everything", "all"]);
    if !mentions_lights {
        return None;
    }

    let action = if is_turn_on(q) && !is_turn_off(q) {
        HomeAction::TurnOn
    } else {
        HomeAction::TurnOff
    };

    let mut excluded = Vec::new();
    if let Some(caps) = EXCEPT_ROOM.captures(q) {
        let candidate = caps[1].trim().trim_start_matches("the ").trim().to_string();
        if !candidate.is_empty() {
            excluded.push(candidate);
        }
    }
    if excluded.is_empty() {
        // Exclusion phrasing without a resolvable room: let the LLM parse.
        return None;
    }

    Some(HomeIntent {
        device_type: DeviceType::Light,
        room: Some("whole_house".to_string()),
        action,
        excluded_rooms: excluded,
        ..Default::default()
    })
}

fn whole_house(q: &str) -> Option<HomeIntent> {
    if has_exclusion(q) {
        return None;
    }
    const PATTERNS: &[(&str, HomeAction)] = &[
        ("all lights on", HomeAction::TurnOn),
        ("all the lights on", HomeAction::TurnOn),
        ("turn on all lights", HomeAction::TurnOn),
        ("turn on all the lights", HomeAction::TurnOn),
        ("turn on every light", HomeAction::TurnOn),
        ("every light on", HomeAction::TurnOn),
        ("turn everything on", HomeAction::TurnOn),
        ("lights on everywhere", HomeAction::TurnOn),
        ("all lights off", HomeAction::TurnOff),
        ("all the lights off", HomeAction::TurnOff),
        ("turn off all lights", HomeAction::TurnOff),
        ("turn off all the lights", HomeAction::TurnOff),
        ("turn everything off", HomeAction::TurnOff),
        ("everything off", HomeAction::TurnOff),
        ("every light off", HomeAction::TurnOff),
        ("lights off everywhere", HomeAction::TurnOff),
        ("kill all the lights", HomeAction::TurnOff),
        ("kill all lights", HomeAction::TurnOff),
    ];
    for (pattern, action) in PATTERNS {
        if q.contains(pattern) {
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room: Some("whole_house".to_string()),
                action: *action,
                ..Default::default()
            });
        }
    }
    None
}

/// "turn on the kitchen and living room lights"
fn multi_room(q: &str) -> Option<HomeIntent> {
    if !q.contains(" and ") || !contains_any(q, &["light", "lights", "turn", "switch"]) {
        return None;
    }

    let mut rooms = Vec::new();
    for caps in MULTI_ROOM_AND.captures_iter(q) {
        for idx in 1..=2 {
            let candidate = caps[idx].trim().to_string();
            if KNOWN_ROOMS.contains(&candidate.as_str()) && !rooms.contains(&candidate) {
                rooms.push(candidate);
            }
        }
    }
    if rooms.len() < 2 {
        return None;
    }

    let action = if is_turn_off(q) {
        HomeAction::TurnOff
    } else {
        HomeAction::TurnOn
    };

    Some(HomeIntent {
        device_type: DeviceType::Light,
        room: None,
        action,
        parameters: IntentParams {
            rooms,
            ..Default::default()
        },
        ..Default::default()
    })
}

fn room_group(q: &str) -> Option<HomeIntent> {
    if !contains_any(q, &["light", "lights"]) {
        return None;
    }
    for (group, _) in ROOM_GROUPS {
        if q.contains(group) && (is_turn_on(q) || is_turn_off(q)) {
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room: Some(group.to_string()),
                action: if is_turn_off(q) {
                    HomeAction::TurnOff
                } else {
                    HomeAction::TurnOn
                },
                ..Default::default()
            });
        }
    }
    None
}

fn brightness(q: &str, device_room: Option<&str>) -> Option<HomeIntent> {
    let room = extract_room(q).or_else(|| device_room.map(str::to_string));

    // Absolute percent: "set the lights to 40%", "all lights at half"
    if contains_any(q, &["light", "lights"]) {
        if let Some(caps) = PERCENT.captures(q) {
            if let Ok(pct) = caps[1].parse::<u16>() {
                return Some(HomeIntent {
                    device_type: DeviceType::Light,
                    room,
                    action: HomeAction::SetBrightness,
                    parameters: IntentParams {
                        brightness: Some(((pct.min(100) as u32 * 255) / 100) as u8),
                        ..Default::default()
                    },
                    ..Default::default()
                });
            }
        }
        if contains_any(q, &["at half", "to half", "at fifty", "to fifty"]) {
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room,
                action: HomeAction::SetBrightness,
                parameters: IntentParams {
                    brightness: Some(128),
                    ..Default::default()
                },
                ..Default::default()
            });
        }
    }

    // Relative and implicit cues
    let brighter = [
        "brighter", "brighten", "more light", "too dark", "can't see", "cant see",
        "hard to see", "bring them back up", "bring it back up", "super bright", "kinda dim",
        "looking dim", "weak af",
    ];
    let dimmer = [
        "dimmer", "dim the", "less light", "too bright", "not so bright", "tone down",
        "darken it up", "easy on my eyes", "too much light",
    ];
    if contains_any(q, &brighter) {
        let step = if q.contains("super bright") { 100 } else { 25 };
        return Some(HomeIntent {
            device_type: DeviceType::Light,
            room,
            action: HomeAction::AdjustBrightness,
            parameters: IntentParams {
                brightness_step_pct: Some(step),
                ..Default::default()
            },
            ..Default::default()
        });
    }
    if contains_any(q, &dimmer) {
        return Some(HomeIntent {
            device_type: DeviceType::Light,
            room,
            action: HomeAction::AdjustBrightness,
            parameters: IntentParams {
                brightness_step_pct: Some(-25),
                ..Default::default()
            },
            ..Default::default()
        });
    }
    None
}

fn color_command(q: &str, device_room: Option<&str>) -> Option<HomeIntent> {
    let mentions_lights = contains_any(
        q,
        &["light", "lights", "room", "in here", "make it", "make the", "color", "colors"],
    );
    if !mentions_lights {
        return None;
    }
    let room = extract_room(q).or_else(|| device_room.map(str::to_string));

    for team in TEAMS {
        if q.contains(team) {
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room,
                action: HomeAction::SetColor,
                parameters: IntentParams {
                    hs_colors: team_palette(team).unwrap_or_default(),
                    ..Default::default()
                },
                color_description: Some(format!("{team} colors")),
                ..Default::default()
            });
        }
    }

    for theme in AMBIENT_THEMES {
        if q.contains(theme) {
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room,
                action: HomeAction::SetColor,
                parameters: IntentParams {
                    hs_colors: ambient_palette(theme).unwrap_or_default(),
                    ..Default::default()
                },
                color_description: Some(theme.to_string()),
                ..Default::default()
            });
        }
    }

    if contains_any(q, &["random colors", "random color", "different colors", "all different"]) {
        return Some(HomeIntent {
            device_type: DeviceType::Light,
            room,
            action: HomeAction::SetColor,
            parameters: IntentParams {
                hs_colors: random_colors(6),
                ..Default::default()
            },
            color_description: Some("random colors".to_string()),
            ..Default::default()
        });
    }

    for color in BASIC_COLORS {
        if q.contains(color) {
            let hs = color_name_to_hs(color)?;
            return Some(HomeIntent {
                device_type: DeviceType::Light,
                room,
                action: HomeAction::SetColor,
                parameters: IntentParams {
                    hs_colors: vec![hs],
                    ..Default::default()
                },
                color_description: Some(color.to_string()),
                ..Default::default()
            });
        }
    }
    None
}

fn simple_on_off(q: &str, device_room: Option<&str>) -> Option<HomeIntent> {
    let on = is_turn_on(q);
    let off = is_turn_off(q);
    if !(on || off) {
        return None;
    }
    if !contains_any(q, &["light", "lights", "lamp", "switch"]) {
        return None;
    }

    let room = extract_room(q).or_else(|| device_room.map(str::to_string));
    Some(HomeIntent::light(
        if off { HomeAction::TurnOff } else { HomeAction::TurnOn },
        room,
    ))
}

/// Fallback room extraction. Whole-house markers win, then known room
/// names, then loose "the <word> lights" shapes.
pub fn extract_room(q: &str) -> Option<String> {
    const WHOLE_HOUSE: &[&str] = &[
        "whole house", "entire house", "every room", "all rooms", "everywhere",
        "throughout the house", "all the lights", "all lights", "every light",
    ];
    for pattern in WHOLE_HOUSE {
        if q.contains(pattern) {
            return Some("whole_house".to_string());
        }
    }

    for room in KNOWN_ROOMS {
        if q.contains(room) {
            return Some(room.replace(' ', "_"));
        }
    }

    static ROOM_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
        [
            r"the\s+([a-z]+(?:\s+[a-z]+)?)\s+lights?",
            r"set\s+(?:the\s+)?([a-z]+(?:\s+[a-z]+)?)\s+to",
            r"make\s+(?:the\s+)?([a-z]+(?:\s+[a-z]+)?)\s+",
            r"(?:in|for)\s+the\s+([a-z]+(?:\s+[a-z]+)?)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    });

    const NON_ROOMS: &[&str] = &[
        "lights", "light", "on", "off", "all", "the", "red", "blue", "green", "yellow",
        "orange", "purple", "pink", "white", "cyan", "magenta", "random", "different",
        "colors", "color", "change", "set", "make", "turn", "it", "them", "to",
        "christmas", "sunset", "ocean", "rainbow", "morning", "house",
    ];

    for shape in ROOM_SHAPES.iter() {
        if let Some(caps) = shape.captures(q) {
            let candidate = caps[1].trim();
            if !NON_ROOMS.contains(&candidate) {
                return Some(candidate.replace(' ', "_"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_control() {
        let intent = extract_fast_path("turn off the office lights", None).unwrap();
        assert_eq!(intent.device_type, DeviceType::Light);
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.room.as_deref(), Some("office"));
    }

    #[test]
    fn test_typo_correction() {
        let intent = extract_fast_path("turn of the lihgts", Some("kitchen")).unwrap();
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.room.as_deref(), Some("kitchen"));
    }

    #[test]
    fn test_whole_house_exclusion() {
        let intent =
            extract_fast_path("turn off all the lights except the bedroom", None).unwrap();
        assert!(intent.is_whole_house());
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert_eq!(intent.excluded_rooms, vec!["bedroom".to_string()]);
    }

    #[test]
    fn test_whole_house_plain() {
        let intent = extract_fast_path("turn everything off", None).unwrap();
        assert!(intent.is_whole_house());
        assert_eq!(intent.action, HomeAction::TurnOff);
        assert!(intent.excluded_rooms.is_empty());
    }

    #[test]
    fn test_lock_status_vs_command() {
        let status = extract_fast_path("did i lock the front door", None).unwrap();
        assert_eq!(status.device_type, DeviceType::Lock);
        assert_eq!(status.action, HomeAction::GetStatus);

        let command = extract_fast_path("lock the back door", None).unwrap();
        assert_eq!(command.action, HomeAction::Lock);
        assert_eq!(command.room.as_deref(), Some("back_door"));

        let all = extract_fast_path("lock all the doors", None).unwrap();
        assert_eq!(all.room.as_deref(), Some("all_doors"));
    }

    #[test]
    fn test_occupancy_and_windows() {
        let occ = extract_fast_path("is there anybody in the basement", None).unwrap();
        assert_eq!(occ.device_type, DeviceType::Sensor);
        assert_eq!(occ.parameters.sensor_type.as_deref(), Some("occupancy"));

        let win = extract_fast_path("are any windows open", None).unwrap();
        assert_eq!(win.parameters.sensor_type.as_deref(), Some("window"));
    }

    #[test]
    fn test_media_fan_garage() {
        let tv = extract_fast_path("turn off the tv", None).unwrap();
        assert_eq!(tv.device_type, DeviceType::MediaPlayer);
        assert_eq!(tv.action, HomeAction::TurnOff);

        let fan = extract_fast_path("get some air moving in the office", None).unwrap();
        assert_eq!(fan.device_type, DeviceType::Fan);
        assert_eq!(fan.action, HomeAction::TurnOn);
        assert_eq!(fan.room.as_deref(), Some("office"));

        let garage = extract_fast_path("close the garage", None).unwrap();
        assert_eq!(garage.device_type, DeviceType::Cover);
        assert_eq!(garage.action, HomeAction::Close);
    }

    #[test]
    fn test_scenes() {
        let scene = extract_fast_path("good night", None).unwrap();
        assert_eq!(scene.device_type, DeviceType::Scene);
        assert_eq!(
            scene.parameters.entity_id.as_deref(),
            Some("script.good_night")
        );
    }

    #[test]
    fn test_bed_warmer_levels_and_sides() {
        let warm = extract_fast_path("warm up my side of the bed at 70 percent", None).unwrap();
        assert_eq!(warm.device_type, DeviceType::BedWarmer);
        assert_eq!(warm.parameters.bed_level, Some(7));
        assert_eq!(warm.parameters.bed_side.as_deref(), Some("my_side"));

        let dual = extract_fast_path("set the bed to left at 30 and right at 50", None).unwrap();
        assert_eq!(dual.parameters.left_level, Some(3));
        assert_eq!(dual.parameters.right_level, Some(5));

        // "bedroom" alone must not trigger bed warming
        assert!(extract_fast_path("warm the bedroom", None)
            .map(|i| i.device_type != DeviceType::BedWarmer)
            .unwrap_or(true));
    }

    #[test]
    fn test_thermostat() {
        let set = extract_fast_path("set the heat to 72 degrees", None).unwrap();
        assert_eq!(set.device_type, DeviceType::Climate);
        assert_eq!(set.parameters.target_temperature, Some(72.0));

        let up = extract_fast_path("make it warmer in here", None).unwrap();
        assert_eq!(up.action, HomeAction::AdjustTemperature);
        assert_eq!(up.parameters.temperature_delta, Some(2));

        let query = extract_fast_path("what temp we at", None).unwrap();
        assert_eq!(query.action, HomeAction::GetStatus);
    }

    #[test]
    fn test_multi_room_and_groups() {
        let multi = extract_fast_path("turn on the kitchen and office lights", None).unwrap();
        assert_eq!(multi.parameters.rooms, vec!["kitchen", "office"]);

        let group = extract_fast_path("turn off the downstairs lights", None).unwrap();
        assert_eq!(group.room.as_deref(), Some("downstairs"));
    }

    #[test]
    fn test_brightness_paths() {
        let pct = extract_fast_path("set the lights to 40%", Some("den")).unwrap();
        assert_eq!(pct.action, HomeAction::SetBrightness);
        assert_eq!(pct.parameters.brightness, Some(102));

        let implicit = extract_fast_path("it's too dark in here", Some("office")).unwrap();
        assert_eq!(implicit.action, HomeAction::AdjustBrightness);
        assert_eq!(implicit.parameters.brightness_step_pct, Some(25));
        assert_eq!(implicit.room.as_deref(), Some("office"));

        let dim = extract_fast_path("not so bright please", Some("office")).unwrap();
        assert_eq!(dim.parameters.brightness_step_pct, Some(-25));
    }

    #[test]
    fn test_colors() {
        let basic = extract_fast_path("make the office lights blue", None).unwrap();
        assert_eq!(basic.action, HomeAction::SetColor);
        assert_eq!(basic.parameters.hs_colors, vec![(240, 100)]);

        let team = extract_fast_path("ravens colors in the living room", None).unwrap();
        assert_eq!(team.parameters.hs_colors.len(), 2);
        assert_eq!(team.parameters.hs_colors[0].0, 270);

        let theme = extract_fast_path("sunset lights in here", Some("den")).unwrap();
        assert_eq!(theme.color_description.as_deref(), Some("sunset"));
        assert!(theme.parameters.hs_colors.len() > 2);
    }

    #[test]
    fn test_unmatched_goes_to_llm() {
        assert!(extract_fast_path("make the house feel like a cozy cabin", None).is_none());
    }
}
