// crates/framefuse-engine/src/renderers/overlay.rs
//
// Overlay element renderer. Every overlay is a `width × height` box whose
// CENTER sits at canvas pixel (x, y), rotated about that center, then
// scaled by the resolution multiplier.
//
// Shape fills a solid rectangle. Image loads through the media cache and
// substitutes a neutral grey rectangle on failure so the frame keeps its
// structure. Patterns are procedural, deterministic in (width, height,
// kind), and rebuilt only when that key changes.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tiny_skia::{Pixmap, Transform};

use framefuse_core::helpers::color::Color;
use framefuse_core::timeline::{OverlayContent, OverlayElement, PatternKind};
use framefuse_media::MediaCache;

use crate::context::{pixmap_from_straight_rgba, DrawState, RenderContext};

/// Two-tone palette shared by all procedural patterns.
const PATTERN_LIGHT: [u8; 3] = [222, 222, 222];
const PATTERN_DARK: [u8; 3] = [58, 58, 58];

#[derive(Default)]
pub struct OverlayRenderer {
    /// Prepared overlay-image pixmaps by media id.
    prepared: HashMap<String, Pixmap>,
    /// Pattern tiles by (width, height, kind).
    patterns: HashMap<(u32, u32, PatternKind), Pixmap>,
}

impl OverlayRenderer {
    pub fn new() -> OverlayRenderer {
        OverlayRenderer::default()
    }

    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        cache: &mut MediaCache,
        overlay: &OverlayElement,
        state: &DrawState,
    ) -> Result<()> {
        if overlay.width <= 0.0 || overlay.height <= 0.0 {
            return Err(anyhow!("overlay with non-positive size"));
        }

        // Box space (0..w, 0..h) → canvas: center on (x, y), rotate about
        // the center, then apply the output scale.
        let transform = Transform::from_translate(
            overlay.x - overlay.width / 2.0,
            overlay.y - overlay.height / 2.0,
        )
        .post_concat(Transform::from_rotate_at(overlay.rotation, overlay.x, overlay.y))
        .post_scale(state.scale, state.scale);

        match &overlay.content {
            OverlayContent::Shape { color } => {
                ctx.fill_rect(0.0, 0.0, overlay.width, overlay.height, *color, transform, state);
            }
            OverlayContent::Pattern { pattern } => {
                let w = overlay.width.round().max(1.0) as u32;
                let h = overlay.height.round().max(1.0) as u32;
                let key = (w, h, *pattern);
                if !self.patterns.contains_key(&key) {
                    let tile = pattern_pixmap(w, h, *pattern)
                        .ok_or_else(|| anyhow!("pattern allocation failed"))?;
                    self.patterns.insert(key, tile);
                }
                ctx.draw_pixmap(self.patterns[&key].as_ref(), transform, state);
            }
            OverlayContent::Image { media_id, source } => {
                if !self.prepared.contains_key(media_id) {
                    match cache.image(media_id, source) {
                        Some(img) => {
                            let pixmap = pixmap_from_straight_rgba(&img.data, img.width, img.height)
                                .ok_or_else(|| anyhow!("overlay image '{media_id}' is degenerate"))?;
                            self.prepared.insert(media_id.clone(), pixmap);
                        }
                        None => {
                            // Structural fallback: keep the box, lose the art.
                            ctx.fill_rect(
                                0.0,
                                0.0,
                                overlay.width,
                                overlay.height,
                                Color::FALLBACK_GREY,
                                transform,
                                state,
                            );
                            return Ok(());
                        }
                    }
                }
                let pixmap = &self.prepared[media_id];
                let fit = Transform::from_scale(
                    overlay.width / pixmap.width() as f32,
                    overlay.height / pixmap.height() as f32,
                )
                .post_concat(transform);
                ctx.draw_pixmap(pixmap.as_ref(), fit, state);
            }
        }
        Ok(())
    }
}

/// Build one procedural pattern tile. Pure in its inputs; the same
/// (width, height, kind) always yields identical pixels.
pub fn pattern_pixmap(width: u32, height: u32, kind: PatternKind) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    let data = pixmap.data_mut();

    let write = |data: &mut [u8], i: usize, rgb: [u8; 3]| {
        data[i] = rgb[0];
        data[i + 1] = rgb[1];
        data[i + 2] = rgb[2];
        data[i + 3] = 255;
    };

    for y in 0..height {
        for x in 0..width {
            let i = ((y * width + x) * 4) as usize;
            let rgb = match kind {
                PatternKind::Solid => PATTERN_LIGHT,
                PatternKind::Checkerboard => {
                    if (x / 16 + y / 16) % 2 == 0 { PATTERN_LIGHT } else { PATTERN_DARK }
                }
                PatternKind::Stripes => {
                    if ((x + y) / 8) % 2 == 0 { PATTERN_LIGHT } else { PATTERN_DARK }
                }
                PatternKind::Dots => {
                    // 12 px cells, dark disc of radius 3 at each cell center
                    let cx = (x % 12) as i32 - 6;
                    let cy = (y % 12) as i32 - 6;
                    if cx * cx + cy * cy <= 9 { PATTERN_DARK } else { PATTERN_LIGHT }
                }
            };
            write(data, i, rgb);
        }
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(p: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * p.width() + x) * 4) as usize;
        let d = p.data();
        [d[i], d[i + 1], d[i + 2], d[i + 3]]
    }

    #[test]
    fn patterns_are_deterministic() {
        let a = pattern_pixmap(48, 48, PatternKind::Dots).unwrap();
        let b = pattern_pixmap(48, 48, PatternKind::Dots).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let p = pattern_pixmap(64, 64, PatternKind::Checkerboard).unwrap();
        let first = px(&p, 0, 0);
        let second = px(&p, 16, 0);
        assert_ne!(first, second);
        assert_eq!(first, px(&p, 32, 0));
        assert_eq!(first, px(&p, 16, 16));
    }

    #[test]
    fn solid_is_uniform_and_opaque() {
        let p = pattern_pixmap(10, 10, PatternKind::Solid).unwrap();
        let expected = px(&p, 0, 0);
        assert_eq!(expected[3], 255);
        for y in 0..10 {
            for x in 0..10 {
                assert_eq!(px(&p, x, y), expected);
            }
        }
    }

    #[test]
    fn dots_have_ink_at_cell_centers_only() {
        let p = pattern_pixmap(24, 24, PatternKind::Dots).unwrap();
        assert_eq!(px(&p, 6, 6)[0], PATTERN_DARK[0]);
        assert_eq!(px(&p, 0, 0)[0], PATTERN_LIGHT[0]);
    }
}
