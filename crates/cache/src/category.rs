//! Cache category extraction
//!
//! Priority-ordered keyword tests map a raw query to a category plus a
//! normalised query string used in the cache key. Order matters: recipes
//! are checked before dining so "make dinner with chicken" does not match
//! "dinner", sports before news, and so on.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::location::normalize_location;

/// Cache categories; each carries its own TTL. A TTL of zero means the
/// category is never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Weather,
    Dining,
    News,
    Stocks,
    Sports,
    Events,
    Flights,
    Recipes,
    General,
    Streaming,
    Directions,
    Time,
    Control,
    Memory,
    Conversation,
    Calendar,
    DeviceState,
}

impl CacheCategory {
    /// Per-category TTL in seconds; zero = never cache.
    pub fn ttl_seconds(&self) -> u64 {
        match self {
            CacheCategory::Weather => 300,
            CacheCategory::Dining => 1800,
            CacheCategory::News => 900,
            CacheCategory::Stocks => 60,
            CacheCategory::Sports => 300,
            CacheCategory::Events => 3600,
            CacheCategory::Flights => 300,
            CacheCategory::Recipes => 86_400,
            CacheCategory::General => 3600,
            CacheCategory::Streaming => 1800,
            CacheCategory::Directions => 300,
            CacheCategory::Time
            | CacheCategory::Control
            | CacheCategory::Memory
            | CacheCategory::Conversation
            | CacheCategory::Calendar
            | CacheCategory::DeviceState => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Weather => "weather",
            CacheCategory::Dining => "dining",
            CacheCategory::News => "news",
            CacheCategory::Stocks => "stocks",
            CacheCategory::Sports => "sports",
            CacheCategory::Events => "events",
            CacheCategory::Flights => "flights",
            CacheCategory::Recipes => "recipes",
            CacheCategory::General => "general",
            CacheCategory::Streaming => "streaming",
            CacheCategory::Directions => "directions",
            CacheCategory::Time => "time",
            CacheCategory::Control => "control",
            CacheCategory::Memory => "memory",
            CacheCategory::Conversation => "conversation",
            CacheCategory::Calendar => "calendar",
            CacheCategory::DeviceState => "device_state",
        }
    }
}

const RECIPE_PATTERNS: &[&str] = &[
    "recipe",
    "how to make",
    "how to cook",
    "ingredients for",
    "what can i make with",
    "make dinner with",
    "make lunch with",
    "cook something with",
    "prepare dinner",
    "prepare lunch",
    "i want to make",
    "want to cook",
    "need to cook",
    "should i cook",
];

const WEATHER_WORDS: &[&str] = &[
    "weather", "temperature", "forecast", "rain", "sunny", "cold", "hot",
];

const DINING_PATTERNS: &[&str] = &[
    "restaurant",
    "where to eat",
    "food near",
    "dinner",
    "lunch",
    "breakfast",
    "dining",
    "place to eat",
    "eat tonight",
    "eat today",
    "good place",
    "recommend a",
    "recommendation",
    "somewhere to eat",
    "grab a bite",
    "get food",
    "hungry",
    "cuisine",
];

/// Cuisines double as dining triggers ("good Greek place") and as the
/// cuisine sub-dimension of the key.
pub const CUISINES: &[&str] = &[
    "greek", "italian", "mexican", "chinese", "japanese", "thai", "indian",
    "american", "sushi", "pizza", "burger", "korean", "vietnamese", "french",
    "mediterranean", "seafood", "steakhouse", "bbq", "barbecue", "jamaican",
    "irish", "spanish", "cuban", "brazilian", "peruvian", "ethiopian",
    "moroccan", "turkish", "lebanese", "german", "southern", "cajun",
    "vegan", "vegetarian", "ramen", "pho", "dim sum", "tapas",
];

const DINING_CONTEXT: &[&str] = &["place", "spot", "eat", "food", "tonight", "today", "near"];

const SPORTS_WORDS: &[&str] = &[
    "game", "score", "ravens", "orioles", "nfl", "mlb", "nba", "nhl", "match",
    "playoff", "standings", "bracket", "season", "championship", "super bowl",
];

const LEAGUES: &[&str] = &["nfl", "nba", "mlb", "nhl", "ncaa", "mls"];

const TEAMS: &[&str] = &[
    "ravens", "orioles", "commanders", "nationals", "wizards", "capitals",
    "eagles", "cowboys", "giants", "steelers", "chiefs", "bills", "49ers",
];

static TICKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2,5})\b").unwrap());
static RECIPE_DISH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:recipe for|how to (?:make|cook)|make (?:dinner|lunch) with|with) (.+?)(?:\?|$)")
        .unwrap()
});
static DIRECTIONS_DEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:to|get to|reach|navigate to)\s+(.+?)(?:\?|$|from)").unwrap()
});

fn hash16(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Extract the cache category and normalised query from a raw query.
///
/// The normalised query is what goes into the key; two phrasings of the
/// same question normalise identically ("what's the weather" and "how's
/// the weather" both become `weather_baltimore_md`).
pub fn extract_semantic_intent(query: &str) -> (CacheCategory, String) {
    let q = query.to_lowercase().trim().to_string();

    if contains_any(&q, RECIPE_PATTERNS) {
        let dish = RECIPE_DISH
            .captures(&q)
            .and_then(|c| c.get(1))
            .map(|m| {
                let mut d = m.as_str().trim().replace(' ', "_");
                d.truncate(30);
                d
            })
            .unwrap_or_else(|| "general".to_string());
        return (CacheCategory::Recipes, format!("recipe_{dish}"));
    }

    if contains_any(&q, WEATHER_WORDS) {
        let location = normalize_location(&q);
        return (CacheCategory::Weather, format!("weather_{location}"));
    }

    let mut is_dining = contains_any(&q, DINING_PATTERNS);
    if !is_dining {
        is_dining = CUISINES
            .iter()
            .any(|c| q.contains(c) && contains_any(&q, DINING_CONTEXT));
    }
    if is_dining {
        let location = normalize_location(&q);
        let cuisine = CUISINES
            .iter()
            .find(|c| q.contains(**c))
            .copied()
            .unwrap_or("general")
            .replace(' ', "_");
        return (CacheCategory::Dining, format!("dining_{location}_{cuisine}"));
    }

    if contains_any(&q, SPORTS_WORDS) {
        let league = LEAGUES.iter().find(|l| q.contains(**l)).copied().unwrap_or("general");

        let query_type = if contains_any(&q, &["playoff", "bracket", "picture", "wild card", "seed"]) {
            "playoff"
        } else if contains_any(&q, &["standing", "rank", "division", "conference", "record"]) {
            "standings"
        } else if contains_any(&q, &["schedule", "upcoming", "next game", "when do"]) {
            "schedule"
        } else if contains_any(&q, &["latest", "recent", "last game", "yesterday"]) {
            "recent"
        } else {
            "scores"
        };

        let team = TEAMS.iter().find(|t| q.contains(**t)).copied().unwrap_or("all");
        return (
            CacheCategory::Sports,
            format!("sports_{league}_{query_type}_{team}"),
        );
    }

    if contains_any(&q, &["news", "headline", "what's happening"]) {
        return (CacheCategory::News, "news_current".to_string());
    }

    if contains_any(&q, &["stock", "market", "price of", "nasdaq", "dow"]) {
        // Ticker extraction runs on the original casing
        let ticker = TICKER
            .captures(query)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "market".to_string());
        return (CacheCategory::Stocks, format!("stocks_{ticker}"));
    }

    if contains_any(&q, &["what time", "the date", "day is it", "current time"]) {
        return (CacheCategory::Time, String::new());
    }

    if contains_any(&q, &["turn ", "set temperature", "lights", "thermostat", "lock", "unlock"]) {
        return (CacheCategory::Control, String::new());
    }

    if contains_any(&q, &["events", "happening", "concerts", "shows", "tickets"]) {
        let location = normalize_location(&q);
        return (CacheCategory::Events, format!("events_{location}"));
    }

    if contains_any(&q, &["flight", "airport", "departures", "arrivals", "bwi"]) {
        return (CacheCategory::Flights, "flights_bwi".to_string());
    }

    if contains_any(&q, &["watch", "netflix", "hulu", "streaming", "movie", "show"]) {
        return (CacheCategory::Streaming, "streaming_general".to_string());
    }

    let directions_patterns = [
        "directions", "how do i get to", "how to get to", "navigate to",
        "route to", "drive to", "driving to", "fastest route", "how far",
        "how long to get", "trip to",
    ];
    if contains_any(&q, &directions_patterns) {
        let dest = DIRECTIONS_DEST
            .captures(&q)
            .and_then(|c| c.get(1))
            .map(|m| {
                let mut d = m.as_str().trim().replace(' ', "_");
                d.truncate(30);
                d
            })
            .unwrap_or_else(|| "unknown".to_string());
        return (CacheCategory::Directions, format!("directions_to_{dest}"));
    }

    (CacheCategory::General, hash16(&q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipes_before_dining() {
        let (category, key) = extract_semantic_intent("make dinner with chicken");
        assert_eq!(category, CacheCategory::Recipes);
        assert!(key.starts_with("recipe_"));
    }

    #[test]
    fn test_weather_normalises_phrasings() {
        let (c1, k1) = extract_semantic_intent("what's the weather?");
        let (c2, k2) = extract_semantic_intent("how's the weather");
        assert_eq!(c1, CacheCategory::Weather);
        assert_eq!(c1, c2);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_dining_carries_cuisine_and_location() {
        let (category, key) = extract_semantic_intent("good greek place in philly");
        assert_eq!(category, CacheCategory::Dining);
        assert_eq!(key, "dining_philly_greek");
    }

    #[test]
    fn test_sports_subdimensions() {
        let (category, key) = extract_semantic_intent("when do the ravens play next game");
        assert_eq!(category, CacheCategory::Sports);
        assert_eq!(key, "sports_general_schedule_ravens");

        let (_, key) = extract_semantic_intent("nfl playoff picture");
        assert_eq!(key, "sports_nfl_playoff_all");
    }

    #[test]
    fn test_stocks_extracts_ticker() {
        let (category, key) = extract_semantic_intent("what's the stock price of AAPL");
        assert_eq!(category, CacheCategory::Stocks);
        assert_eq!(key, "stocks_aapl");
    }

    #[test]
    fn test_control_and_time_have_empty_keys() {
        assert_eq!(
            extract_semantic_intent("turn off the lights").0,
            CacheCategory::Control
        );
        assert_eq!(extract_semantic_intent("what time is it").0, CacheCategory::Time);
    }

    #[test]
    fn test_general_hashes_deterministically() {
        let (c1, k1) = extract_semantic_intent("why is the sky blue");
        let (c2, k2) = extract_semantic_intent("why is the sky blue");
        assert_eq!(c1, CacheCategory::General);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);
    }
}
