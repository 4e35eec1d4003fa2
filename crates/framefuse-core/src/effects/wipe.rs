// crates/framefuse-core/src/effects/wipe.rs
//
// Wipe transition: reveals the frame behind an advancing straight edge.
// Horizontal wipes sweep left→right, vertical top→bottom. Pixels the edge
// has not reached yet are black. Hard edge; the feathered variant belongs
// to a future processor if anyone asks for it.

use crate::effects::{window_progress, FrameProcessor, ProcessError, ProcessorKind};
use crate::settings::ExportSettings;
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WipeAxis {
    Horizontal,
    Vertical,
}

pub struct Wipe {
    pub axis: WipeAxis,
    pub start: f64,
    pub duration: f64,
}

impl Default for Wipe {
    fn default() -> Self {
        Wipe { axis: WipeAxis::Horizontal, start: 0.0, duration: 1.0 }
    }
}

impl Wipe {
    pub fn new(axis: WipeAxis, start: f64, duration: f64) -> Wipe {
        Wipe { axis, start, duration }
    }
}

impl FrameProcessor for Wipe {
    fn id(&self) -> &'static str {
        "wipe"
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
            return Err(ProcessError::new("wipe", "invalid duration"));
        }

        let p = window_progress(t, self.start, self.duration);
        if p >= 1.0 {
            return Ok(());
        }

        let w = surface.width() as usize;
        let h = surface.height() as usize;
        let data = surface.data_mut();

        match self.axis {
            WipeAxis::Horizontal => {
                // columns at and beyond the edge are still hidden
                let edge = (p * w as f32).round() as usize;
                for y in 0..h {
                    let row = &mut data[y * w * 4..(y + 1) * w * 4];
                    for px in row[edge * 4..].chunks_exact_mut(4) {
                        px[0] = 0;
                        px[1] = 0;
                        px[2] = 0;
                        px[3] = 255;
                    }
                }
            }
            WipeAxis::Vertical => {
                let edge = (p * h as f32).round() as usize;
                for px in data[edge * w * 4..].chunks_exact_mut(4) {
                    px[0] = 0;
                    px[1] = 0;
                    px[2] = 0;
                    px[3] = 255;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;

    fn white(w: u32, h: u32) -> Surface {
        let mut s = Surface::new(w, h);
        s.clear(Color::WHITE);
        s
    }

    #[test]
    fn complete_wipe_is_identity() {
        let mut s = white(4, 4);
        let before = s.data().to_vec();
        Wipe::new(WipeAxis::Horizontal, 0.0, 1.0)
            .process(&mut s, &ExportSettings::default(), 2.0)
            .unwrap();
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn horizontal_midpoint_reveals_left_half() {
        let mut s = white(4, 2);
        Wipe::new(WipeAxis::Horizontal, 0.0, 1.0)
            .process(&mut s, &ExportSettings::default(), 0.5)
            .unwrap();
        assert_eq!(s.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(s.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(s.pixel(2, 0), [0, 0, 0, 255]);
        assert_eq!(s.pixel(3, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn vertical_midpoint_reveals_top_half() {
        let mut s = white(2, 4);
        Wipe::new(WipeAxis::Vertical, 0.0, 1.0)
            .process(&mut s, &ExportSettings::default(), 0.5)
            .unwrap();
        assert_eq!(s.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(s.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(s.pixel(0, 2), [0, 0, 0, 255]);
        assert_eq!(s.pixel(1, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn zero_progress_hides_everything() {
        let mut s = white(3, 3);
        Wipe::new(WipeAxis::Horizontal, 1.0, 1.0)
            .process(&mut s, &ExportSettings::default(), 0.5)
            .unwrap();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(s.pixel(x, y), [0, 0, 0, 255]);
            }
        }
    }
}
