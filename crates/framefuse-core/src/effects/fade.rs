// crates/framefuse-core/src/effects/fade.rs
//
// Fade transition: scales the frame toward black over a timeline window.
//
//   In    — black at the window start, full image at the end.
//   Out   — full image at the start, black at the end.
//   Cross — dip to black: fade out over the first half of the window, back
//           in over the second half. A single-surface pipeline has no second
//           frame to blend with, so the dip stands in for a true crossfade
//           at the element boundary underneath it.

use crate::effects::{window_progress, FrameProcessor, ProcessError, ProcessorKind};
use crate::settings::ExportSettings;
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeMode {
    In,
    Out,
    Cross,
}

pub struct Fade {
    pub mode: FadeMode,
    /// Timeline second the window opens.
    pub start: f64,
    /// Window length in seconds.
    pub duration: f64,
}

impl Default for Fade {
    fn default() -> Self {
        Fade { mode: FadeMode::In, start: 0.0, duration: 1.0 }
    }
}

impl Fade {
    pub fn new(mode: FadeMode, start: f64, duration: f64) -> Fade {
        Fade { mode, start, duration }
    }

    /// Image retention at time `t`: 1.0 leaves the frame alone, 0.0 is black.
    fn level(&self, t: f64) -> f32 {
        let p = window_progress(t, self.start, self.duration);
        match self.mode {
            FadeMode::In => p,
            FadeMode::Out => 1.0 - p,
            FadeMode::Cross => {
                // out over [0, 0.5), in over [0.5, 1]
                if p < 0.5 { 1.0 - p * 2.0 } else { (p - 0.5) * 2.0 }
            }
        }
    }
}

impl FrameProcessor for Fade {
    fn id(&self) -> &'static str {
        "fade"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Transition
    }

    fn process(
        &self,
        surface: &mut Surface,
        _settings: &ExportSettings,
        t: f64,
    ) -> Result<(), ProcessError> {
        if self.duration < 0.0 || !self.duration.is_finite() {
            return Err(ProcessError::new("fade", "invalid duration"));
        }

        let level = self.level(t);
        if level >= 1.0 {
            return Ok(());
        }

        let mut lut = [0u8; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            *slot = (v as f32 * level).round() as u8;
        }
        for px in surface.data_mut().chunks_exact_mut(4) {
            px[0] = lut[px[0] as usize];
            px[1] = lut[px[1] as usize];
            px[2] = lut[px[2] as usize];
        }
        Ok(())
    }
}
