//! Intent pre-routing
//!
//! Decides whether a query goes to the orchestrator (which owns tools,
//! RAG, and device control) or straight to the LLM. Keyword matching is
//! the default; an LLM classifier can be enabled by feature flag, with
//! keywords as its failure fallback.

use std::sync::Arc;

use hearth_config::AdminClient;
use hearth_llm::{GenerateOptions, LlmRouter};

/// Domain-specific patterns: control verbs, weather, airports, sports
/// leagues and teams, cuisines, news terms, entertainment.
const ASSISTANT_PATTERNS: &[&str] = &[
    // Home control
    "turn on", "turn off", "set", "dim", "brighten", "lights", "switch",
    "temperature", "thermostat", "lock", "unlock",
    // Weather
    "weather", "forecast", "rain", "snow", "temperature outside",
    // Airports and flights
    "airport", "flight", "delay", "departure", "arrival",
    "bwi", "dca", "iad", "phl", "jfk", "lga", "ewr",
    // Sports - general
    "game", "score", "team", "schedule", "match", "playoff", "championship",
    "tournament", "season", "league",
    // Sports - types and leagues
    "football", "soccer", "basketball", "baseball", "hockey",
    "nfl", "nba", "mlb", "nhl", "mls", "ncaa", "fifa", "ufc", "pga",
    // NFL teams
    "ravens", "steelers", "browns", "bengals", "cowboys", "eagles", "giants",
    "commanders", "packers", "bears", "vikings", "lions", "saints", "falcons",
    "panthers", "buccaneers", "49ers", "seahawks", "rams", "patriots", "bills",
    "dolphins", "jets", "chiefs", "broncos", "raiders", "chargers", "colts",
    "texans", "jaguars", "titans",
    // MLB teams
    "orioles", "yankees", "red sox", "blue jays", "rays", "guardians",
    "tigers", "royals", "twins", "astros", "angels", "athletics", "mariners",
    "rangers", "braves", "marlins", "mets", "phillies", "nationals", "cubs",
    "reds", "brewers", "pirates", "cardinals", "dodgers", "padres",
    // NBA teams
    "celtics", "nets", "knicks", "76ers", "raptors", "bulls", "cavaliers",
    "pistons", "pacers", "bucks", "hawks", "hornets", "heat", "magic",
    "wizards", "nuggets", "timberwolves", "thunder", "jazz", "warriors",
    "clippers", "lakers", "suns", "kings", "mavericks", "rockets",
    "grizzlies", "pelicans", "spurs",
    // NHL teams
    "bruins", "sabres", "red wings", "canadiens", "senators", "lightning",
    "maple leafs", "hurricanes", "blue jackets", "devils", "islanders",
    "flyers", "penguins", "capitals", "blackhawks", "avalanche", "stars",
    "wild", "predators", "blues", "ducks", "flames", "oilers", "sharks",
    "kraken", "canucks", "golden knights",
    // Location context
    "baltimore", "home", "office", "bedroom", "kitchen",
    // Recipes and cooking
    "recipe", "cook", "how to make", "ingredients", "cooking",
    // Dining
    "restaurant", "restaurants", "dining", "eat", "food", "cuisine",
    "pizza", "burger", "sushi", "chinese", "italian", "mexican", "indian",
    "thai", "japanese", "korean", "vietnamese", "mediterranean", "greek",
    "french", "spanish", "seafood", "steakhouse", "bbq", "breakfast",
    "lunch", "dinner", "brunch", "cafe", "coffee", "bar", "brewery",
    "takeout", "delivery", "reservation", "menu", "vegetarian", "vegan",
    "near me", "nearby", "best", "top rated", "recommend",
    // News and current events
    "news", "headline", "breaking", "latest", "current events", "happening",
    // Entertainment and events
    "concert", "perform", "tour", "show", "event", "when does",
    "who is", "what is", "tell me about",
];

/// Keyword-based routing decision: fast path, zero added latency.
pub fn is_assistant_query_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    ASSISTANT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// The main routing decision. Uses the LLM classifier when the
/// `llm_based_routing` flag is on; keyword matching otherwise and as the
/// fallback when the classifier fails.
pub async fn is_assistant_query(
    text: &str,
    admin: &Arc<AdminClient>,
    llm: &Arc<LlmRouter>,
    intent_model: &str,
) -> bool {
    let use_llm = admin.is_feature_enabled("llm_based_routing", false).await;
    if !use_llm {
        return is_assistant_query_keywords(text);
    }

    match classify_with_llm(text, admin, llm, intent_model).await {
        Ok(is_assistant) => is_assistant,
        Err(err) => {
            tracing::warn!(error = %err, "llm classification failed, keyword fallback");
            is_assistant_query_keywords(text)
        }
    }
}

async fn classify_with_llm(
    text: &str,
    admin: &Arc<AdminClient>,
    llm: &Arc<LlmRouter>,
    default_model: &str,
) -> Result<bool, hearth_core::Error> {
    let model = admin
        .component_model("intent_classifier")
        .await
        .filter(|a| a.enabled)
        .map(|a| a.model_name)
        .unwrap_or_else(|| default_model.to_string());

    let prompt = format!(
        r#"Classify this query into ONE category:

Query: "{text}"

Categories:
- assistant: Home control, weather, SPORTS (games/scores/schedules/teams), airports, local info
- general: General knowledge, math, coding, explanations

Examples of assistant queries:
- "turn on the lights"
- "what's the weather?"
- "when do the Ravens play?"
- "BWI flight delays?"

Respond with ONLY the category name (assistant or general)."#
    );

    let opts = GenerateOptions::default()
        .with_temperature(0.1)
        .with_max_tokens(10)
        .with_stage("classify");

    let generation = llm.generate(&model, &prompt, &opts).await?;
    let classification = generation.text.trim().to_lowercase();
    let is_assistant = classification.contains("assistant");
    tracing::info!(model, is_assistant, "llm classified query");
    Ok(is_assistant)
}

/// Whether the query is a device-control command (routed to the
/// smart-home controller inside the orchestrator).
pub fn is_control_query(text: &str) -> bool {
    let lower = text.to_lowercase();
    const CONTROL: &[&str] = &[
        "turn on", "turn off", "switch on", "switch off", "lights", "light",
        "dim", "brighten", "brightness", "thermostat", "lock", "unlock",
        "garage", "fan", "bed warmer", "warm the bed", "warm up the bed",
        "movie mode", "good night", "goodnight", "good morning", "anyone home",
        "anybody home", "windows open", "window open", "too dark", "too bright",
        "set the mood", "party mode",
    ];
    CONTROL.iter().any(|p| lower.contains(p))
        && !lower.contains("weather")
        && !lower.contains("outside")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_routing() {
        assert!(is_assistant_query_keywords("turn on the office lights"));
        assert!(is_assistant_query_keywords("when do the Ravens play?"));
        assert!(is_assistant_query_keywords("good greek place near me"));
        assert!(!is_assistant_query_keywords("explain the borrow checker"));
    }

    #[test]
    fn test_control_detection() {
        assert!(is_control_query("turn off the lights"));
        assert!(is_control_query("lock the front door"));
        assert!(is_control_query("it's too dark in here"));
        assert!(!is_control_query("what's the weather"));
        assert!(!is_control_query("what's the temperature outside"));
    }
}
