//! Cloud provider pricing
//!
//! Loaded from the admin store when available, with hardcoded per-provider
//! fallbacks so cost accounting keeps working when the store is down.

use serde::{Deserialize, Serialize};

/// Price per one million tokens, USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub const fn new(input_per_1m: f64, output_per_1m: f64) -> Self {
        Self {
            input_per_1m,
            output_per_1m,
        }
    }

    /// Cost of one call in USD, rounded to six decimals.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let cost = (input_tokens as f64 / 1_000_000.0) * self.input_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_1m;
        (cost * 1_000_000.0).round() / 1_000_000.0
    }
}

/// Fallback pricing table used when the admin store has no entry.
pub fn default_pricing(provider: &str, model: &str) -> ModelPricing {
    match provider {
        "openai" => match model {
            "gpt-4o" => ModelPricing::new(2.50, 10.00),
            "gpt-4o-mini" => ModelPricing::new(0.15, 0.60),
            _ => ModelPricing::new(0.50, 2.00),
        },
        "anthropic" => match model {
            "claude-sonnet-4-20250514" => ModelPricing::new(3.00, 15.00),
            "claude-opus-4-20250514" => ModelPricing::new(15.00, 75.00),
            "claude-3-5-sonnet-20241022" => ModelPricing::new(3.00, 15.00),
            "claude-3-5-haiku-20241022" => ModelPricing::new(0.80, 4.00),
            _ => ModelPricing::new(3.00, 15.00),
        },
        "google" => match model {
            "gemini-2.0-flash" => ModelPricing::new(0.075, 0.30),
            "gemini-1.5-pro" => ModelPricing::new(1.25, 5.00),
            "gemini-1.5-flash" => ModelPricing::new(0.075, 0.30),
            _ => ModelPricing::new(0.10, 0.40),
        },
        _ => ModelPricing::new(1.0, 3.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_rounds_to_six_decimals() {
        let pricing = ModelPricing::new(3.00, 15.00);
        // 1234 in + 567 out = 0.000003702 + 0.000008505 = 0.012207 USD
        let cost = pricing.cost(1234, 567);
        assert_eq!(cost, 0.012207);
    }

    #[test]
    fn test_zero_tokens_cost_nothing() {
        let pricing = default_pricing("openai", "gpt-4o-mini");
        assert_eq!(pricing.cost(0, 0), 0.0);
    }

    #[test]
    fn test_fallback_table() {
        assert_eq!(
            default_pricing("anthropic", "claude-3-5-haiku-20241022"),
            ModelPricing::new(0.80, 4.00)
        );
        // Unknown model falls to the provider default
        assert_eq!(
            default_pricing("google", "gemini-99"),
            ModelPricing::new(0.10, 0.40)
        );
        // Unknown provider falls to the global default
        assert_eq!(default_pricing("acme", "x"), ModelPricing::new(1.0, 3.0));
    }
}
