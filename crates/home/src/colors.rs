//! Color semantics
//!
//! Hue/saturation tables for named colors, ambient themes, and sports
//! teams. Single colors replicate across targets; themed palettes cycle.

use rand::seq::SliceRandom;
use rand::Rng;

/// Basic color name → (hue, saturation)
pub fn color_name_to_hs(name: &str) -> Option<(u16, u8)> {
    let hs = match name.to_lowercase().as_str() {
        "red" => (0, 100),
        "orange" => (30, 100),
        "yellow" => (60, 100),
        "green" => (120, 100),
        "cyan" => (180, 100),
        "blue" => (240, 100),
        "purple" => (280, 100),
        "magenta" => (300, 100),
        "pink" => (330, 100),
        "white" => (0, 0),
        "warm" => (35, 60),
        "cool" => (210, 30),
        _ => return None,
    };
    Some(hs)
}

pub const BASIC_COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "cyan", "blue", "purple", "magenta", "pink", "white",
];

/// Ambient themes: a fixed palette cycled across the target lights
pub fn ambient_palette(name: &str) -> Option<Vec<(u16, u8)>> {
    let palette = match name.to_lowercase().as_str() {
        "sunset" => vec![(10, 100), (25, 95), (340, 80), (45, 90)],
        "sunrise" => vec![(30, 90), (45, 75), (55, 60), (15, 95)],
        "ocean" => vec![(200, 90), (180, 80), (220, 95), (190, 60)],
        "christmas" => vec![(0, 100), (120, 100)],
        "rainbow" => vec![(0, 100), (30, 100), (60, 100), (120, 100), (240, 100), (280, 100)],
        "forest" => vec![(120, 90), (100, 70), (140, 85), (80, 60)],
        "fire" => vec![(0, 100), (15, 100), (30, 95), (45, 90)],
        _ => return None,
    };
    Some(palette)
}

pub const AMBIENT_THEMES: &[&str] = &[
    "sunset", "sunrise", "ocean", "christmas", "rainbow", "forest", "fire",
];

/// Team palettes alternate two primary colors
pub fn team_palette(name: &str) -> Option<Vec<(u16, u8)>> {
    let palette = match name.to_lowercase().as_str() {
        // Purple and gold
        "ravens" => vec![(270, 90), (45, 95)],
        // Orange and black (black rendered as dim warm white)
        "orioles" => vec![(25, 100), (30, 10)],
        // Black and gold
        "steelers" => vec![(50, 95), (30, 10)],
        // Midnight green and silver
        "eagles" => vec![(170, 80), (0, 0)],
        // Navy and silver
        "cowboys" => vec![(220, 90), (0, 0)],
        // Red and gold
        "chiefs" => vec![(355, 95), (45, 90)],
        _ => return None,
    };
    Some(palette)
}

pub const TEAMS: &[&str] = &["ravens", "orioles", "steelers", "eagles", "cowboys", "chiefs"];

/// N distinct vibrant colors, hues spread evenly around the wheel
pub fn random_colors(count: usize) -> Vec<(u16, u8)> {
    let mut rng = rand::thread_rng();
    let step = 360.0 / count.max(1) as f64;
    let mut colors: Vec<(u16, u8)> = (0..count)
        .map(|i| {
            let hue = ((i as f64 * step) % 360.0) as u16;
            let saturation = rng.gen_range(80..=100);
            (hue, saturation)
        })
        .collect();
    colors.shuffle(&mut rng);
    colors
}

/// N shades of one hue, saturation swept light to vibrant
pub fn color_shades(base_hue: u16, count: usize) -> Vec<(u16, u8)> {
    let mut rng = rand::thread_rng();
    let (sat_min, sat_max) = (40f64, 100f64);
    let step = (sat_max - sat_min) / (count.max(2) - 1) as f64;
    let mut colors: Vec<(u16, u8)> = (0..count)
        .map(|i| {
            let saturation = (sat_min + i as f64 * step) as u8;
            let jitter: i32 = rng.gen_range(-15..=15);
            let hue = ((base_hue as i32 + jitter).rem_euclid(360)) as u16;
            (hue, saturation)
        })
        .collect();
    colors.shuffle(&mut rng);
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_colors() {
        assert_eq!(color_name_to_hs("blue"), Some((240, 100)));
        assert_eq!(color_name_to_hs("White"), Some((0, 0)));
        assert_eq!(color_name_to_hs("chartreuse"), None);
    }

    #[test]
    fn test_ambient_palettes_exist() {
        for theme in AMBIENT_THEMES {
            assert!(ambient_palette(theme).is_some(), "missing theme {theme}");
        }
        assert_eq!(ambient_palette("christmas").unwrap().len(), 2);
    }

    #[test]
    fn test_team_palettes_alternate_two_colors() {
        let ravens = team_palette("ravens").unwrap();
        assert_eq!(ravens.len(), 2);
        assert_eq!(ravens[0].0, 270);
    }

    #[test]
    fn test_random_colors_spread_hues() {
        let colors = random_colors(6);
        assert_eq!(colors.len(), 6);
        let hues: std::collections::HashSet<u16> = colors.iter().map(|c| c.0).collect();
        assert_eq!(hues.len(), 6);
        for (_, sat) in colors {
            assert!((80..=100).contains(&sat));
        }
    }

    #[test]
    fn test_shades_count() {
        assert_eq!(color_shades(240, 4).len(), 4);
    }
}
