// crates/framefuse-core/src/helpers/color.rs
//
// sRGB color type plus the HSL conversions used by the color-filter effect.
// Plain u8 component storage; conversion to f32 happens at the call sites
// that need it (raster paints, per-pixel filters).

use serde::{Deserialize, Serialize};

/// Opaque sRGB color. Alpha lives on elements (opacity), not on colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    /// Neutral grey used as the structural fallback for failed overlay images.
    pub const FALLBACK_GREY: Color = Color { r: 128, g: 128, b: 128 };

    /// Parse `#RRGGBB` (leading `#` optional). Returns None on malformed input.
    ///
    /// ```
    /// use framefuse_core::helpers::color::Color;
    /// assert_eq!(Color::from_hex("#FF8000"), Some(Color { r: 255, g: 128, b: 0 }));
    /// assert_eq!(Color::from_hex("000000"),  Some(Color::BLACK));
    /// assert_eq!(Color::from_hex("#12345"),  None);
    /// ```
    pub fn from_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color { r, g, b })
    }
}

// ── HSL conversions ───────────────────────────────────────────────────────────
//
// Used by the color-filter effect for hue rotation and saturation scaling.
// h ∈ [0, 360), s ∈ [0, 1], l ∈ [0, 1].

/// Convert 8-bit RGB to HSL.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l); // achromatic
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        60.0 * (((g - b) / d) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    (h.rem_euclid(360.0), s, l)
}

/// Convert HSL back to 8-bit RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r1, g1, b1) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parse_roundtrip() {
        let c = Color::from_hex("#3A7F00").unwrap();
        assert_eq!((c.r, c.g, c.b), (0x3A, 0x7F, 0x00));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(Color::from_hex("#GGGGGG"), None);
        assert_eq!(Color::from_hex(""), None);
        assert_eq!(Color::from_hex("#FFF"), None);
    }

    #[test]
    fn hsl_roundtrip_primaries() {
        for (r, g, b) in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (128, 128, 128)] {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let (r2, g2, b2) = hsl_to_rgb(h, s, l);
            assert!((r as i32 - r2 as i32).abs() <= 1);
            assert!((g as i32 - g2 as i32).abs() <= 1);
            assert!((b as i32 - b2 as i32).abs() <= 1);
        }
    }

    #[test]
    fn hue_rotation_180_inverts_red_to_cyan() {
        let (h, s, l) = rgb_to_hsl(255, 0, 0);
        let (r, g, b) = hsl_to_rgb(h + 180.0, s, l);
        assert!(r < 10 && g > 245 && b > 245);
    }
}
