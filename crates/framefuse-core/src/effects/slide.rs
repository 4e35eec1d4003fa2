// crates/framefuse-core/src/effects/slide.rs
//
// Slide transition: the frame content enters from one edge, translating to
// rest over the window. Vacated pixels are black. Offsets are whole pixels;
// sub-pixel interpolation is not worth the cost at video frame rates.

use crate::effects::{window_progress, FrameProcessor, ProcessError, ProcessorKind};
use crate::settings::ExportSettings;
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideDirection {
    /// Content enters from the right edge, moving left into place.
    Left,
    /// Content enters from the left edge, moving right into place.
    Right,
    /// Content enters from the bottom edge, moving up into place.
    Up,
    /// Content enters from the top edge, moving down into place.
    Down,
}

pub struct Slide {
    pub direction: SlideDirection,
    pub start: f64,
    pub duration: f64,
}

impl Default for Slide {
    fn default() -> Self {
        Slide { direction: SlideDirection::Left, start: 0.0, duration: 1.0 }
    }
}

impl Slide {
    pub fn new(direction: SlideDirection, start: f64, duration: f64) -> Slide {
        Slide { direction, start, duration }
    }

    /// Pixel offset (dx, dy) of the content at time `t`. (0, 0) at rest.
    fn offset(&self, t: f64, w: u32, h: u32) -> (i64, i64) {
        let remaining = 1.0 - window_progress(t, self.start, self.duration);
        let ox = (remaining * w as f32).round() as i64;
        let oy = (remaining * h as f32).round() as i64;
        match self.direction {
            SlideDirection::Left => (ox, 0),
            SlideDirection::Right => (-ox, 0),
            SlideDirection::Up => (0, oy),
            SlideDirection::Down => (0, -oy),
        }
    }
}

impl FrameProcessor for Slide {
    fn id(&self) -> &'static str {
        "slide"
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
            return Err(ProcessError::new("slide", "invalid duration"));
        }

        let w = surface.width();
        let h = surface.height();
        let (dx, dy) = self.offset(t, w, h);
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        // Destination pixel (x, y) shows source pixel (x - dx, y - dy);
        // out-of-range sources are black. Built off-surface, then swapped in.
        let src = surface.data().to_vec();
        let mut dst = vec![0u8; src.len()];
        // keep alpha opaque everywhere
        for px in dst.chunks_exact_mut(4) {
            px[3] = 255;
        }

        for y in 0..h as i64 {
            let sy = y - dy;
            if sy < 0 || sy >= h as i64 {
                continue;
            }
            for x in 0..w as i64 {
                let sx = x - dx;
                if sx < 0 || sx >= w as i64 {
                    continue;
                }
                let di = ((y * w as i64 + x) * 4) as usize;
                let si = ((sy * w as i64 + sx) * 4) as usize;
                dst[di..di + 4].copy_from_slice(&src[si..si + 4]);
            }
        }

        surface.replace_data(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;

    fn marked_surface() -> Surface {
        // 4x4 white with a red pixel at (0, 0)
        let mut s = Surface::new(4, 4);
        s.clear(Color::WHITE);
        s.put_pixel(0, 0, [255, 0, 0, 255]);
        s
    }

    #[test]
    fn at_rest_after_window_is_identity() {
        let slide = Slide::new(SlideDirection::Left, 0.0, 1.0);
        let mut s = marked_surface();
        let before = s.data().to_vec();
        slide.process(&mut s, &ExportSettings::default(), 5.0).unwrap();
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn midway_from_the_right_shifts_content_right() {
        // Left-entering content at progress 0.5 sits half a frame to the right.
        let slide = Slide::new(SlideDirection::Left, 0.0, 1.0);
        let mut s = marked_surface();
        slide.process(&mut s, &ExportSettings::default(), 0.5).unwrap();
        // the red (0,0) marker moved to (2,0); the vacated left half is black
        assert_eq!(s.pixel(2, 0), [255, 0, 0, 255]);
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(s.pixel(1, 2), [0, 0, 0, 255]);
        assert_eq!(s.pixel(3, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn vertical_slide_shifts_rows() {
        let slide = Slide::new(SlideDirection::Up, 0.0, 1.0);
        let mut s = marked_surface();
        slide.process(&mut s, &ExportSettings::default(), 0.5).unwrap();
        // content sits half a frame down; top rows vacated
        assert_eq!(s.pixel(0, 2), [255, 0, 0, 255]);
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn before_window_whole_frame_is_offscreen() {
        let slide = Slide::new(SlideDirection::Left, 1.0, 1.0);
        let mut s = marked_surface();
        slide.process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(s.pixel(x, y), [0, 0, 0, 255]);
            }
        }
    }
}
