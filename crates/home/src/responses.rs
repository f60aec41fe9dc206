//! Spoken response templates
//!
//! Short, varied phrasings so the assistant doesn't repeat itself word
//! for word. Templates use `{}` slots filled positionally.

use rand::seq::SliceRandom;

pub const LIGHT_ON: &[&str] = &[
    "Done! {} on.",
    "{} turned on.",
    "Got it, {} on.",
    "Done!",
    "Turned on {}.",
];

pub const LIGHT_OFF: &[&str] = &[
    "Done! {} off.",
    "{} turned off.",
    "Got it, {} off.",
    "Done!",
    "Turned off {}.",
];

pub const THERMOSTAT_SET: &[&str] = &[
    "Done! Thermostat set to {}°F.",
    "Got it, {} degrees.",
    "Set to {}°F.",
    "Done! {} degrees it is.",
];

pub const THERMOSTAT_UP: &[&str] = &[
    "Turned up the heat.",
    "Done! Heat's up.",
    "Warmed it up a couple degrees.",
];

pub const THERMOSTAT_DOWN: &[&str] = &[
    "Cooled it down.",
    "Done! Temperature lowered.",
    "Brought it down a couple degrees.",
];

/// Fixed speech-safe apology when every path fails.
pub const APOLOGY: &str = "Sorry, I'm having trouble with that right now. Please try again in a moment.";

/// Pick a template and substitute the single `{}` slot.
pub fn vary(templates: &[&str], value: &str) -> String {
    let template = templates
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Done!");
    template.replace("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vary_substitutes() {
        let out = vary(&["Done! {} off."], "office lights");
        assert_eq!(out, "Done! office lights off.");
    }

    #[test]
    fn test_vary_handles_slotless_templates() {
        let out = vary(&["Done!"], "anything");
        assert_eq!(out, "Done!");
    }
}
