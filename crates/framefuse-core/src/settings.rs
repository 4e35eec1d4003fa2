// crates/framefuse-core/src/settings.rs
//
// Fully resolved export settings. Preset resolution happens in the caller;
// by the time a settings record reaches the engine every field is concrete.

use serde::{Deserialize, Serialize};

use crate::helpers::color::Color;

/// Sample rates the AAC path accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8_000, 16_000, 22_050, 44_100, 48_000];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    /// Nominal canvas size in pixels, before the resolution multiplier.
    pub width: u32,
    pub height: u32,
    /// Uniform output scale, 0.25–4. The effective surface is
    /// `round(width · r) × round(height · r)`.
    #[serde(default = "default_multiplier")]
    pub resolution_multiplier: f32,
    pub fps: u32,
    /// H.264 target bitrate in bits per second.
    pub video_bitrate: u32,
    pub sample_rate: u32,
    /// Output channel count, 1–8.
    pub channels: u16,
    /// AAC target bitrate in bits per second.
    pub audio_bitrate: u32,
    pub background: Color,
    /// Prefer a hardware H.264 encoder when one is available. Falls back to
    /// software silently (logged) when not.
    #[serde(default = "default_true")]
    pub hardware_accel: bool,
    pub file_name: String,
}

fn default_multiplier() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            width: 1920,
            height: 1080,
            resolution_multiplier: 1.0,
            fps: 30,
            video_bitrate: 8_000_000,
            sample_rate: 48_000,
            channels: 2,
            audio_bitrate: 128_000,
            background: Color::BLACK,
            hardware_accel: true,
            file_name: "export.mp4".into(),
        }
    }
}

impl ExportSettings {
    /// Effective raster surface size after applying the multiplier.
    pub fn effective_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.resolution_multiplier as f64).round() as u32,
            (self.height as f64 * self.resolution_multiplier as f64).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_presets() {
        let s = ExportSettings::default();
        assert_eq!((s.width, s.height, s.fps), (1920, 1080, 30));
        assert_eq!((s.sample_rate, s.channels), (48_000, 2));
        assert_eq!(s.background, Color::BLACK);
        assert!(s.hardware_accel);
    }

    #[test]
    fn effective_size_rounds() {
        let s = ExportSettings { resolution_multiplier: 0.5, ..Default::default() };
        assert_eq!(s.effective_size(), (960, 540));
        let s = ExportSettings {
            width: 641,
            resolution_multiplier: 0.5,
            ..Default::default()
        };
        // 320.5 rounds half-up
        assert_eq!(s.effective_size().0, 321);
    }
}
