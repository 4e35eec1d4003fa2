// crates/framefuse-core/src/effects/blur.rs
//
// Box blur, two separable passes (horizontal then vertical) over the RGB
// channels. Alpha is left alone: the surface is opaque after composition.
//
// A box blur is not a gaussian, but two passes of it read close enough for
// a video effect and keep the cost linear in radius-independent terms: each
// pass is a sliding-window sum, O(w·h) regardless of radius. Rows (then
// columns) are independent, so both passes parallelize with rayon.

use rayon::prelude::*;

use crate::effects::{FrameProcessor, ProcessError, ProcessorKind};
use crate::settings::ExportSettings;
use crate::surface::Surface;

pub struct Blur {
    /// Blur radius in output pixels. Zero is an identity pass.
    pub radius: u32,
}

impl Default for Blur {
    fn default() -> Self {
        Blur { radius: 4 }
    }
}

impl Blur {
    pub fn new(radius: u32) -> Blur {
        Blur { radius }
    }
}

/// One sliding-window pass along a line of `len` pixels.
/// `get(i)` reads pixel i of the line, `set(i, rgb)` writes it.
fn blur_line(len: usize, radius: usize, src: &[[u8; 3]], dst: &mut [[u8; 3]]) {
    let mut sum = [0u32; 3];
    let window = |i: isize| -> [u8; 3] {
        src[i.clamp(0, len as isize - 1) as usize]
    };

    // Prime the window centered on pixel 0.
    for i in -(radius as isize)..=(radius as isize) {
        let px = window(i);
        sum[0] += px[0] as u32;
        sum[1] += px[1] as u32;
        sum[2] += px[2] as u32;
    }
    let denom = (2 * radius + 1) as u32;

    for i in 0..len {
        dst[i] = [
            (sum[0] / denom) as u8,
            (sum[1] / denom) as u8,
            (sum[2] / denom) as u8,
        ];
        // Slide: drop the trailing edge, add the leading edge.
        let out = window(i as isize - radius as isize);
        let inc = window(i as isize + radius as isize + 1);
        for c in 0..3 {
            sum[c] = sum[c] - out[c] as u32 + inc[c] as u32;
        }
    }
}

impl FrameProcessor for Blur {
    fn id(&self) -> &'static str {
        "blur"
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
        let radius = self.radius as usize;
        if radius == 0 {
            return Ok(());
        }

        let w = surface.width() as usize;
        let h = surface.height() as usize;
        if w == 0 || h == 0 {
            return Err(ProcessError::new("blur", "empty surface"));
        }

        // ── Horizontal pass ───────────────────────────────────────────────────
        let data = surface.data_mut();
        let mut rows: Vec<Vec<[u8; 3]>> = (0..h)
            .map(|y| {
                (0..w)
                    .map(|x| {
                        let i = (y * w + x) * 4;
                        [data[i], data[i + 1], data[i + 2]]
                    })
                    .collect()
            })
            .collect();

        rows.par_iter_mut().for_each(|row| {
            let src = row.clone();
            blur_line(w, radius, &src, row);
        });

        // ── Vertical pass ─────────────────────────────────────────────────────
        let mut cols: Vec<Vec<[u8; 3]>> = (0..w)
            .map(|x| (0..h).map(|y| rows[y][x]).collect())
            .collect();

        cols.par_iter_mut().for_each(|col| {
            let src = col.clone();
            blur_line(h, radius, &src, col);
        });

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 4;
                let px = cols[x][y];
                data[i] = px[0];
                data[i + 1] = px[1];
                data[i + 2] = px[2];
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;

    #[test]
    fn zero_radius_is_identity() {
        let mut s = Surface::new(8, 8);
        s.clear(Color { r: 50, g: 100, b: 150 });
        s.put_pixel(4, 4, [255, 255, 255, 255]);
        let before = s.data().to_vec();
        Blur::new(0).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn uniform_surface_stays_uniform() {
        let mut s = Surface::new(16, 16);
        s.clear(Color { r: 80, g: 90, b: 100 });
        Blur::new(3).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let [r, g, b, a] = s.pixel(x, y);
                assert_eq!((r, g, b, a), (80, 90, 100, 255));
            }
        }
    }

    #[test]
    fn spike_spreads_to_neighbors() {
        let mut s = Surface::new(9, 9);
        s.clear(Color::BLACK);
        s.put_pixel(4, 4, [255, 255, 255, 255]);
        Blur::new(1).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        // the center loses energy, direct neighbors gain some
        assert!(s.pixel(4, 4)[0] < 255);
        assert!(s.pixel(3, 4)[0] > 0);
        assert!(s.pixel(4, 5)[0] > 0);
        // far corner stays black
        assert_eq!(s.pixel(0, 0)[0], 0);
    }

    #[test]
    fn dimensions_preserved() {
        let mut s = Surface::new(7, 5);
        s.clear(Color::WHITE);
        Blur::new(2).process(&mut s, &ExportSettings::default(), 0.0).unwrap();
        assert_eq!((s.width(), s.height()), (7, 5));
        assert_eq!(s.data().len(), 7 * 5 * 4);
    }
}
