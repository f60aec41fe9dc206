//! Search intent classification
//!
//! Separate from the cache categories: this set routes to provider
//! groups. Scores come from compiled regex groups plus keyword bonuses;
//! three or more matches count as full confidence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed intent set for provider routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    EventSearch,
    News,
    Weather,
    Sports,
    LocalBusiness,
    General,
}

impl SearchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchIntent::EventSearch => "event_search",
            SearchIntent::News => "news",
            SearchIntent::Weather => "weather",
            SearchIntent::Sports => "sports",
            SearchIntent::LocalBusiness => "local_business",
            SearchIntent::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "event_search" => Some(SearchIntent::EventSearch),
            "news" => Some(SearchIntent::News),
            "weather" => Some(SearchIntent::Weather),
            "sports" => Some(SearchIntent::Sports),
            "local_business" => Some(SearchIntent::LocalBusiness),
            "general" => Some(SearchIntent::General),
            _ => None,
        }
    }
}

struct IntentPatterns {
    intent: SearchIntent,
    patterns: Vec<Regex>,
    keywords: &'static [&'static str],
}

static PATTERNS: Lazy<Vec<IntentPatterns>> = Lazy::new(|| {
    fn compile(patterns: &[&str]) -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("intent regex"))
            .collect()
    }

    vec![
        IntentPatterns {
            intent: SearchIntent::EventSearch,
            patterns: compile(&[
                r"\b(concert|show|event|performance|tour|festival)\b",
                r"\b(tickets|venue|live|appearing|playing|performing)\b",
                r"\b(music|band|artist|singer|comedian|theater)\b",
            ]),
            keywords: &["concert", "show", "event", "tour", "festival", "tickets", "live"],
        },
        IntentPatterns {
            intent: SearchIntent::News,
            patterns: compile(&[
                r"\b(news|breaking|latest|today|current|recent)\b",
                r"\b(headline|report|update|article)\b",
            ]),
            keywords: &["news", "breaking", "latest", "today", "current"],
        },
        IntentPatterns {
            intent: SearchIntent::Weather,
            patterns: compile(&[
                r"\b(weather|temperature|forecast|rain|snow|sunny|cloudy)\b",
                r"\b(degrees|fahrenheit|celsius|humidity)\b",
                r"\b(storm|hurricane|wind|precipitation)\b",
            ]),
            keywords: &["weather", "temperature", "forecast", "rain"],
        },
        IntentPatterns {
            intent: SearchIntent::Sports,
            patterns: compile(&[
                r"\b(ravens|orioles|score|game|team|win|loss|playoff)\b",
                r"\b(championship|season|league|match|tournament)\b",
                r"\b(nfl|mlb|nba|nhl|soccer|football|baseball|basketball)\b",
            ]),
            keywords: &["ravens", "orioles", "score", "game", "team"],
        },
        IntentPatterns {
            intent: SearchIntent::LocalBusiness,
            patterns: compile(&[
                r"\b(restaurant|coffee|cafe|store|shop|near me)\b",
                r"\b(best|top|good|recommended)\s+(food|pizza|burger|sushi|chinese)\b",
                r"\b(open now|hours|location|address)\b",
            ]),
            keywords: &["restaurant", "coffee", "near me", "best"],
        },
    ]
});

/// Keyword-pattern intent classifier
#[derive(Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify with a confidence score in [0, 1].
    pub fn classify_with_confidence(&self, query: &str) -> (SearchIntent, f64) {
        let lower = query.to_lowercase();

        let mut best: Option<(SearchIntent, f64)> = None;
        for group in PATTERNS.iter() {
            let mut score = 0.0;
            for pattern in &group.patterns {
                if pattern.is_match(&lower) {
                    score += 1.0;
                }
            }
            for keyword in group.keywords {
                if lower.contains(keyword) {
                    score += 0.5;
                }
            }
            if score > 0.0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((group.intent, score));
            }
        }

        match best {
            Some((intent, score)) => {
                let confidence = (score / 3.0).min(1.0);
                tracing::info!(
                    intent = intent.as_str(),
                    score,
                    confidence,
                    "classified search intent"
                );
                (intent, confidence)
            }
            None => (SearchIntent::General, 0.5),
        }
    }

    pub fn classify(&self, query: &str) -> SearchIntent {
        self.classify_with_confidence(query).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queries() {
        let classifier = IntentClassifier::new();
        let (intent, confidence) =
            classifier.classify_with_confidence("concerts in baltimore this weekend");
        assert_eq!(intent, SearchIntent::EventSearch);
        assert!(confidence > 0.3);
    }

    #[test]
    fn test_weather_and_sports() {
        let classifier = IntentClassifier::new();
        assert_eq!(
            classifier.classify("what's the forecast for tomorrow"),
            SearchIntent::Weather
        );
        assert_eq!(classifier.classify("ravens score"), SearchIntent::Sports);
    }

    #[test]
    fn test_unmatched_defaults_to_general() {
        let classifier = IntentClassifier::new();
        let (intent, confidence) = classifier.classify_with_confidence("explain quicksort");
        assert_eq!(intent, SearchIntent::General);
        assert_eq!(confidence, 0.5);
    }
}
