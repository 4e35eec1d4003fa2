// crates/framefuse-engine/src/renderers/media.rs
//
// Media element renderer: draws the asset over the full canvas-filling
// rectangle (0, 0, W_eff, H_eff).
//
// Images are decoded once by the media cache and prepared (premultiplied)
// once here; the per-frame cost is a single scaled composite. Video frames
// arrive from the cache already scaled to the effective surface size, so
// they composite under the identity transform. Audio-kind media contributes
// to the mixer only and renders nothing.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tiny_skia::{PixmapRef, Transform};

use framefuse_core::timeline::{Element, MediaElement, MediaKind};
use framefuse_media::MediaCache;

use crate::context::{pixmap_from_straight_rgba, DrawState, RenderContext};

#[derive(Default)]
pub struct MediaRenderer {
    /// Premultiplied pixmaps by media id, built on first draw.
    prepared: HashMap<String, tiny_skia::Pixmap>,
}

impl MediaRenderer {
    pub fn new() -> MediaRenderer {
        MediaRenderer { prepared: HashMap::new() }
    }

    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        cache: &mut MediaCache,
        element: &Element,
        media: &MediaElement,
        state: &DrawState,
        t: f64,
        fps_out: u32,
    ) -> Result<()> {
        match media.kind {
            MediaKind::Audio => Ok(()),
            MediaKind::Image => self.render_image(ctx, cache, media, state),
            MediaKind::Video => {
                let tau = element.local_time(t);
                self.render_video(ctx, cache, media, state, tau, fps_out)
            }
        }
    }

    fn render_image(
        &mut self,
        ctx: &mut RenderContext,
        cache: &mut MediaCache,
        media: &MediaElement,
        state: &DrawState,
    ) -> Result<()> {
        if !self.prepared.contains_key(&media.media_id) {
            // None means the cache excluded the asset (failure or timeout)
            // and already logged it; the element simply does not draw.
            let Some(img) = cache.image(&media.media_id, &media.source) else {
                return Ok(());
            };
            let pixmap = pixmap_from_straight_rgba(&img.data, img.width, img.height)
                .ok_or_else(|| anyhow!("image '{}' has degenerate dimensions", media.media_id))?;
            self.prepared.insert(media.media_id.clone(), pixmap);
        }

        let pixmap = &self.prepared[&media.media_id];
        let sx = ctx.width() as f32 / pixmap.width() as f32;
        let sy = ctx.height() as f32 / pixmap.height() as f32;
        ctx.draw_pixmap(pixmap.as_ref(), Transform::from_scale(sx, sy), state);
        Ok(())
    }

    fn render_video(
        &mut self,
        ctx: &mut RenderContext,
        cache: &mut MediaCache,
        media: &MediaElement,
        state: &DrawState,
        tau: f64,
        fps_out: u32,
    ) -> Result<()> {
        let (w, h) = (ctx.width(), ctx.height());
        // Skips (load failure, seek timeout) were logged by the cache.
        let Some(frame) = cache.video_frame(&media.media_id, &media.source, tau, fps_out) else {
            return Ok(());
        };
        let source = PixmapRef::from_bytes(frame, w, h)
            .ok_or_else(|| anyhow!("video frame size mismatch for '{}'", media.media_id))?;
        ctx.draw_pixmap(source, Transform::identity(), state);
        Ok(())
    }
}
