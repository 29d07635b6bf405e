/// User settings persisted under the `settings` key
use serde::{Deserialize, Serialize};

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 5;
pub const DEFAULT_INTENSITY: u8 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub blur_enabled: bool,
    pub blur_intensity: u8,
    pub auto_blur: bool,
    pub show_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            blur_enabled: true,
            blur_intensity: DEFAULT_INTENSITY,
            auto_blur: true,
            show_notifications: true,
        }
    }
}

impl Settings {
    /// Settings with the intensity forced into range.
    pub fn normalized(mut self) -> Self {
        self.blur_intensity = clamp_intensity(self.blur_intensity);
        self
    }
}

/// Clamp a raw intensity (slider value, imported file, ...) to 1..=5.
pub fn clamp_intensity(value: u8) -> u8 {
    value.clamp(MIN_INTENSITY, MAX_INTENSITY)
}

/// Parse a slider value, falling back to the default for garbage input.
pub fn parse_intensity(raw: &str) -> u8 {
    raw.trim()
        .parse::<i64>()
        .map(|v| v.clamp(MIN_INTENSITY as i64, MAX_INTENSITY as i64) as u8)
        .unwrap_or(DEFAULT_INTENSITY)
}
