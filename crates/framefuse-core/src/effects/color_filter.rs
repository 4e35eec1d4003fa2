// crates/framefuse-core/src/effects/color_filter.rs
//
// Combined hue / saturation / brightness grade. Works in HSL space per
// pixel, so it is the most expensive of the built-ins; rows are processed
// in parallel.

use rayon::prelude::*;

use crate::effects::{FrameProcessor, ProcessError, ProcessorKind};
use crate::helpers::color::{hsl_to_rgb, rgb_to_hsl};
use crate::settings::ExportSettings;
use crate::surface::Surface;

pub struct ColorFilter {
    /// Hue rotation in degrees, any value (wrapped mod 360).
    pub hue_shift: f32,
    /// Saturation scale; 1.0 identity, 0.0 grayscale.
    pub saturation: f32,
    /// Lightness scale; 1.0 identity.
    pub brightness: f32,
}

impl Default for ColorFilter {
    fn default() -> Self {
        ColorFilter { hue_shift: 0.0, saturation: 1.0, brightness: 1.0 }
    }
}

impl ColorFilter {
    pub fn new(hue_shift: f32, saturation: f32, brightness: f32) -> ColorFilter {
        ColorFilter {
            hue_shift,
            saturation: saturation.max(0.0),
            brightness: brightness.max(0.0),
        }
    }

    fn is_identity(&self) -> bool {
        self.hue_shift.rem_euclid(360.0) == 0.0
            && (self.saturation - 1.0).abs() < f32::EPSILON
            && (self.brightness - 1.0).abs() < f32::EPSILON
    }
}

impl FrameProcessor for ColorFilter {
    fn id(&self) -> &'static str {
        "color-filter"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Effect
    }

    fn process(
        &self,
        surface: &mut Surface,
        _settings: &ExportSettings,
        _t: f64,
    ) -> Result<(), ProcessError> {
        if !(self.hue_shift.is_finite() && self.saturation.is_finite() && self.brightness.is_finite()) {
            return Err(ProcessError::new("color-filter", "non-finite parameter"));
        }
        if self.is_identity() {
            return Ok(());
        }

        let w = surface.width() as usize;
        surface
            .data_mut()
            .par_chunks_exact_mut(w * 4)
            .for_each(|row| {
                for px in row.chunks_exact_mut(4) {
                    let (h, s, l) = rgb_to_hsl(px[0], px[1], px[2]);
                    let (r, g, b) = hsl_to_rgb(
                        h + self.hue_shift,
                        (s * self.saturation).clamp(0.0, 1.0),
                        (l * self.brightness).clamp(0.0, 1.0),
                    );
                    px[0] = r;
                    px[1] = g;
                    px[2] = b;
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;

    #[test]
    fn identity_parameters_change_nothing() {
        let mut s = Surface::new(4, 2);
        s.clear(Color { r: 200, g: 60, b: 30 });
        let before = s.data().to_vec();
        ColorFilter::default().process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn zero_saturation_produces_grayscale() {
        let mut s = Surface::new(2, 2);
        s.clear(Color { r: 255, g: 0, b: 0 });
        ColorFilter::new(0.0, 0.0, 1.0).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        let [r, g, b, _] = s.pixel(0, 0);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn hue_shift_moves_red_toward_cyan() {
        let mut s = Surface::new(2, 2);
        s.clear(Color { r: 255, g: 0, b: 0 });
        ColorFilter::new(180.0, 1.0, 1.0).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        let [r, g, b, _] = s.pixel(0, 0);
        assert!(r < 10 && g > 245 && b > 245, "got {r},{g},{b}");
    }
}
