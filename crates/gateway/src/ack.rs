//! Acknowledgment tokens
//!
//! A short, context-aware filler emitted as the first stream chunk so the
//! speaker can start talking before the real answer arrives. Chosen by
//! keyword heuristic over the user's last message; always ends with a
//! period for a clean TTS sentence boundary.

use rand::seq::SliceRandom;

const CUISINES: &[&str] = &[
    "italian", "mexican", "chinese", "japanese", "thai", "indian", "greek", "french",
    "korean", "vietnamese", "jamaican", "american", "sushi", "pizza", "cajun",
];

fn pick(choices: &[&str]) -> String {
    choices
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("One moment.")
        .to_string()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Pick the acknowledgment for a query.
pub fn pick_acknowledgment(query: &str) -> String {
    let q = query.to_lowercase();

    if contains_any(&q, &["weather", "temperature", "forecast", "rain"]) {
        return pick(&["Checking the weather.", "Looking up the forecast."]);
    }
    if contains_any(&q, &["restaurant", "food", "eat", "dining"]) {
        for cuisine in CUISINES {
            if q.contains(cuisine) {
                return format!("Looking up {cuisine} restaurants.");
            }
        }
        return pick(&["Finding restaurants.", "Looking up dining options."]);
    }
    if contains_any(&q, &["score", "game", "sports", "ravens", "orioles"]) {
        return pick(&["Checking the scores.", "Looking up the game."]);
    }
    if contains_any(&q, &["flight", "airport", "plane"]) {
        return pick(&["Checking flight status.", "Looking up flights."]);
    }
    if contains_any(&q, &["news", "headline"]) {
        return pick(&["Checking the news.", "Looking up headlines."]);
    }
    if contains_any(&q, &["stock", "market", "price"]) {
        return pick(&["Checking the markets.", "Looking up prices."]);
    }
    if contains_any(&q, &["recipe", "cook", "make"]) {
        return pick(&["Looking up recipes.", "Finding that recipe."]);
    }
    if contains_any(&q, &["light", "turn on", "turn off", "switch"]) {
        return pick(&["Right away.", "On it."]);
    }

    pick(&[
        "One moment.",
        "Let me check.",
        "Looking into it.",
        "Just a moment.",
        "Checking now.",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_ack() {
        let ack = pick_acknowledgment("what's the weather like");
        assert!(ack == "Checking the weather." || ack == "Looking up the forecast.");
    }

    #[test]
    fn test_cuisine_specific_ack() {
        let ack = pick_acknowledgment("any good thai food nearby");
        assert_eq!(ack, "Looking up thai restaurants.");
    }

    #[test]
    fn test_acks_end_with_period() {
        for query in ["weather", "ravens score", "bwi flights", "random question"] {
            assert!(pick_acknowledgment(query).ends_with('.'));
        }
    }
}
