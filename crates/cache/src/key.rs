//! Cache key construction
//!
//! Keys are deterministic: same category, sub-dimensions, and effective
//! location always compose the same key; a different effective location
//! always composes a different key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Explicit geographic override supplied by the caller (device location)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl LocationOverride {
    fn segment(&self) -> Option<String> {
        if let Some(address) = self.address.as_deref().filter(|a| !a.is_empty()) {
            let digest = Sha256::digest(address.as_bytes());
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            return Some(format!("loc_{}", &hex[..8]));
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            // Two decimal places ≈ 1 km grid
            return Some(format!("loc_{:.2}_{:.2}", lat, lon));
        }
        None
    }
}

/// Compose the final cache key from the normalised query plus an optional
/// location-override segment.
pub fn cache_key(normalized_query: &str, location_override: Option<&LocationOverride>) -> String {
    let mut parts = vec!["semantic".to_string(), normalized_query.to_string()];
    if let Some(segment) = location_override.and_then(LocationOverride::segment) {
        parts.push(segment);
    }
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::extract_semantic_intent;

    #[test]
    fn test_key_determinism() {
        // Two canonicalising passes over the same input give the same key.
        let (_, n1) = extract_semantic_intent("Good Greek place in Philly?");
        let (_, n2) = extract_semantic_intent("good greek place in philly");
        assert_eq!(cache_key(&n1, None), cache_key(&n2, None));
    }

    #[test]
    fn test_location_isolation() {
        let (_, baltimore) = extract_semantic_intent("good greek place near me");
        let (_, philly) = extract_semantic_intent("good greek place in philly");
        assert_ne!(cache_key(&baltimore, None), cache_key(&philly, None));
    }

    #[test]
    fn test_override_separates_origins() {
        let here = LocationOverride {
            address: Some("123 Main St, Baltimore".into()),
            ..Default::default()
        };
        let there = LocationOverride {
            address: Some("456 Market St, Philadelphia".into()),
            ..Default::default()
        };
        let base = "directions_to_the_airport";
        let k1 = cache_key(base, Some(&here));
        let k2 = cache_key(base, Some(&there));
        assert_ne!(k1, k2);
        assert!(k1.contains(":loc_"));
    }

    #[test]
    fn test_coordinate_override_rounds_to_grid() {
        let coarse = LocationOverride {
            latitude: Some(39.2904),
            longitude: Some(-76.6122),
            ..Default::default()
        };
        let key = cache_key("dining_user_location_greek", Some(&coarse));
        assert!(key.ends_with(":loc_39.29_-76.61"));
    }

    #[test]
    fn test_empty_override_adds_nothing() {
        let key = cache_key("weather_baltimore_md", Some(&LocationOverride::default()));
        assert_eq!(key, "semantic:weather_baltimore_md");
    }
}
