//! Result fusion and ranking
//!
//! Post-step over the raw fan-out output: dedup by textual similarity,
//! boost facts confirmed by multiple sources, weight by provider
//! authority for the intent, filter and sort.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::intent::SearchIntent;
use crate::result::SearchResult;

/// Authority weight for one (provider, intent) cell. Encodes editorial
/// preference: ticketing APIs are canonical for events and useless for
/// general queries.
fn authority_weight(source: &str, intent: SearchIntent) -> f64 {
    use SearchIntent::*;
    match (source, intent) {
        ("ticketmaster", EventSearch) => 1.0,
        ("ticketmaster", Sports) => 1.0,
        ("ticketmaster", LocalBusiness) => 0.2,
        ("ticketmaster", _) => 0.0,

        ("eventbrite", EventSearch) => 0.9,
        ("eventbrite", LocalBusiness) => 0.6,
        ("eventbrite", _) => 0.0,

        ("duckduckgo", General) => 0.8,
        ("duckduckgo", EventSearch) => 0.5,
        ("duckduckgo", News) => 0.9,
        ("duckduckgo", LocalBusiness) => 0.7,
        ("duckduckgo", _) => 0.7,

        ("brave", General) => 0.9,
        ("brave", EventSearch) => 0.6,
        ("brave", News) => 0.95,
        ("brave", LocalBusiness) => 0.8,
        ("brave", _) => 0.8,

        ("searxng", General) => 0.75,
        ("searxng", EventSearch) => 0.55,
        ("searxng", News) => 0.8,
        ("searxng", LocalBusiness) => 0.7,
        ("searxng", _) => 0.7,

        _ => 0.7,
    }
}

pub struct ResultFusion {
    similarity_threshold: f64,
    min_confidence: f64,
}

impl Default for ResultFusion {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            min_confidence: 0.5,
        }
    }
}

impl ResultFusion {
    pub fn new(similarity_threshold: f64, min_confidence: f64) -> Self {
        Self {
            similarity_threshold,
            min_confidence,
        }
    }

    /// Dedup, cross-validate, weight, filter, and rank.
    pub fn fuse(&self, results: Vec<SearchResult>, intent: SearchIntent) -> Vec<SearchResult> {
        if results.is_empty() {
            return results;
        }

        let deduplicated = self.deduplicate(results);
        let validated = self.cross_validate(deduplicated);

        let mut scored: Vec<SearchResult> = validated
            .into_iter()
            .map(|mut r| {
                r.confidence = (r.confidence * authority_weight(&r.source, intent)).min(1.0);
                r
            })
            .filter(|r| r.confidence >= self.min_confidence)
            .collect();

        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }

    /// Top N after fusion.
    pub fn top(&self, results: Vec<SearchResult>, intent: SearchIntent, limit: usize) -> Vec<SearchResult> {
        let mut fused = self.fuse(results, intent);
        fused.truncate(limit);
        fused
    }

    /// Collapse near-duplicate results, keeping the higher-confidence
    /// member of each pair.
    fn deduplicate(&self, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        // Higher confidence first, so the member kept is the stronger one.
        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut unique: Vec<SearchResult> = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        for result in results {
            let content = format!(
                "{} {}",
                result.title.to_lowercase(),
                result.snippet.to_lowercase()
            );
            let duplicate = seen
                .iter()
                .any(|existing| text_similarity(&content, existing) >= self.similarity_threshold);
            if !duplicate {
                seen.push(content);
                unique.push(result);
            }
        }
        unique
    }

    /// Boost confidence when two or more distinct providers agree on the
    /// same (normalised) title: +0.2 per additional source, capped at 0.3.
    fn cross_validate(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut groups: HashMap<String, Vec<SearchResult>> = HashMap::new();
        for result in results {
            groups
                .entry(normalize_text(&result.title))
                .or_default()
                .push(result);
        }

        let mut validated = Vec::new();
        for (title, mut group) in groups {
            let sources: HashSet<&str> = group.iter().map(|r| r.source.as_str()).collect();
            if sources.len() > 1 {
                let boost = (0.2 * (sources.len() as f64 - 1.0)).min(0.3);
                let preview: String = title.chars().take(50).collect();
                tracing::info!(
                    title = %preview,
                    sources = sources.len(),
                    boost,
                    "cross-validated result"
                );
                for result in &mut group {
                    result.confidence = (result.confidence + boost).min(1.0);
                }
            }
            validated.append(&mut group);
        }
        validated
    }
}

/// Similarity ratio in [0, 1] over character bigrams (Dice coefficient).
fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let bigrams = |s: &str| -> HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let (set_a, set_b) = (bigrams(a), bigrams(b));
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let shared = set_a.intersection(&set_b).count();
    (2.0 * shared as f64) / (set_a.len() + set_b.len()) as f64
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(source: &str, title: &str, snippet: &str, confidence: f64) -> SearchResult {
        SearchResult::new(source, title, snippet, confidence)
    }

    #[test]
    fn test_near_duplicates_collapse_to_higher_confidence() {
        let fusion = ResultFusion::default();
        let results = vec![
            result("duckduckgo", "Orchestra Night at the Meyerhoff", "Symphony concert Saturday evening", 0.6),
            result("ticketmaster", "Orchestra Night at the Meyerhoff", "Symphony concert Saturday evening.", 0.95),
        ];
        let fused = fusion.fuse(results, SearchIntent::EventSearch);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, "ticketmaster");
    }

    #[test]
    fn test_cross_validation_boosts_agreeing_sources() {
        let fusion = ResultFusion::new(0.99, 0.0);
        let results = vec![
            result("brave", "Harborplace redevelopment approved", "City council vote", 0.6),
            result("duckduckgo", "Harborplace redevelopment approved", "Council approves plan for the waterfront", 0.6),
        ];
        let fused = fusion.fuse(results, SearchIntent::News);
        // Both kept (similarity threshold set above their overlap), both boosted.
        assert_eq!(fused.len(), 2);
        for r in &fused {
            assert!(r.confidence > 0.6);
        }
    }

    #[test]
    fn test_authority_matrix_zeroes_offtopic_providers() {
        let fusion = ResultFusion::default();
        let results = vec![
            result("ticketmaster", "Some general fact", "Not an event", 0.9),
            result("duckduckgo", "Some general fact two", "An answer", 0.9),
        ];
        let fused = fusion.fuse(results, SearchIntent::General);
        // Ticketmaster weighs 0.0 on general queries and is filtered out.
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, "duckduckgo");
    }

    #[test]
    fn test_sorted_descending() {
        let fusion = ResultFusion::new(0.99, 0.0);
        let results = vec![
            result("duckduckgo", "aaa", "one", 0.6),
            result("brave", "bbb", "two", 0.9),
        ];
        let fused = fusion.fuse(results, SearchIntent::General);
        assert!(fused[0].confidence >= fused[1].confidence);
    }

    #[test]
    fn test_similarity_measure() {
        assert_eq!(text_similarity("abc", "abc"), 1.0);
        assert!(text_similarity("concert tickets baltimore", "concert tickets baltimore md") > 0.7);
        assert!(text_similarity("weather forecast", "garage door") < 0.3);
    }
}
