//! Canonical location derivation for cache keys
//!
//! Different effective locations MUST produce different cache keys, so a
//! cached Baltimore answer is never served for a Philadelphia question.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default token when no location is specified at all
pub const DEFAULT_LOCATION: &str = "baltimore_md";

/// Token for "near me" style queries; distinct from explicit mentions of
/// the default metro so the two never share entries.
pub const USER_LOCATION: &str = "user_location";

/// Metro-area synonyms collapsing to one canonical token
const SYNONYMS: &[(&str, &str)] = &[
    ("baltimore", DEFAULT_LOCATION),
    ("bmore", DEFAULT_LOCATION),
    ("charm city", DEFAULT_LOCATION),
    ("maryland", DEFAULT_LOCATION),
    (" md", DEFAULT_LOCATION),
    ("owings mills", DEFAULT_LOCATION),
    ("towson", DEFAULT_LOCATION),
    ("downtown", DEFAULT_LOCATION),
];

/// Phrases signalling an explicit, different location. Trailing
/// punctuation is absorbed so "in Philly?" still extracts "philly".
static INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bin\s+([a-zA-Z\s]+?)[?!.;]*(?:\s*,|\s*$|\s+(?:for|near|around|today|tonight|tomorrow))",
        r"\bnear\s+([a-zA-Z\s]+?)[?!.;]*(?:\s*,|\s*$|\s+(?:for|today|tonight|tomorrow))",
        r"\baround\s+([a-zA-Z\s]+?)[?!.;]*(?:\s*,|\s*$|\s+(?:for|today|tonight|tomorrow))",
        r"\bat\s+([a-zA-Z\s]+?)[?!.;]*(?:\s*,|\s*$|\s+(?:for|today|tonight|tomorrow))",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location indicator regex"))
    .collect()
});

const NEARBY_PHRASES: &[&str] = &[
    "around me",
    "near me",
    "nearby",
    "close by",
    "in my area",
    "local",
];

/// Derive the canonical location token for a query.
///
/// Order matters: known synonyms win, then an explicitly mentioned place,
/// then "near me" phrasing, then the default.
pub fn normalize_location(text: &str) -> String {
    let lower = text.to_lowercase();

    for (pattern, canonical) in SYNONYMS {
        if lower.contains(pattern) {
            return (*canonical).to_string();
        }
    }

    for indicator in INDICATORS.iter() {
        if let Some(captures) = indicator.captures(&lower) {
            let place = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if place.len() > 2 {
                let safe: String = place
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect::<String>()
                    .split('_')
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("_");
                if !safe.is_empty() {
                    return safe;
                }
            }
        }
    }

    if NEARBY_PHRASES.iter().any(|p| lower.contains(p)) {
        return USER_LOCATION.to_string();
    }

    DEFAULT_LOCATION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms_collapse() {
        assert_eq!(normalize_location("weather in bmore"), DEFAULT_LOCATION);
        assert_eq!(normalize_location("towson forecast"), DEFAULT_LOCATION);
    }

    #[test]
    fn test_explicit_location_extracted() {
        assert_eq!(normalize_location("good greek place in philly"), "philly");
        assert_eq!(normalize_location("restaurants in new york city"), "new_york_city");
        // Trailing punctuation is absorbed
        assert_eq!(normalize_location("what's happening in philly?"), "philly");
    }

    #[test]
    fn test_near_me_is_distinct() {
        assert_eq!(normalize_location("good greek place near me"), USER_LOCATION);
        assert_eq!(normalize_location("pizza nearby"), USER_LOCATION);
    }

    #[test]
    fn test_default_when_nothing_specified() {
        assert_eq!(normalize_location("best sushi tonight"), DEFAULT_LOCATION);
    }
}
