// crates/framefuse-engine/src/frame.rs
//
// The frame renderer: one fully composited surface per timestamp.
//
// Per frame:
//   1. clear with the background color
//   2. collect the active set (muted tracks skipped, half-open intervals)
//   3. sort into render order: text tracks above everything, then track
//      index, then element index (stable sort keeps the ternary order)
//   4. draw each element inside its own DrawState
//   5. run the effect pipeline over the surface
//
// Failure policy: an element that errors is logged and skipped, the frame
// is still produced. Nothing here panics on bad model data; the driver
// additionally guards the whole call for the background-filled fallback.

use framefuse_core::effects::EffectPipeline;
use framefuse_core::timeline::{render_order_key, BlendMode, ElementKind, TimelineModel};
use framefuse_core::{ExportSettings, Surface};
use framefuse_media::MediaCache;

use crate::context::{DrawState, RenderContext};
use crate::renderers::{subtitle, text as text_renderer, MediaRenderer, OverlayRenderer};
use crate::text::FontLibrary;

pub struct FrameRenderer {
    ctx: RenderContext,
    fonts: FontLibrary,
    media: MediaRenderer,
    overlay: OverlayRenderer,
    canvas_w: u32,
    canvas_h: u32,
    scale: f32,
    fps: u32,
    background: framefuse_core::Color,
}

impl FrameRenderer {
    pub fn new(settings: &ExportSettings, fonts: FontLibrary) -> FrameRenderer {
        let (w, h) = settings.effective_size();
        FrameRenderer {
            ctx: RenderContext::new(w, h),
            fonts,
            media: MediaRenderer::new(),
            overlay: OverlayRenderer::new(),
            canvas_w: settings.width,
            canvas_h: settings.height,
            scale: settings.resolution_multiplier,
            fps: settings.fps,
            background: settings.background,
        }
    }

    pub fn surface(&self) -> &Surface {
        self.ctx.surface()
    }

    pub fn effective_size(&self) -> (u32, u32) {
        (self.ctx.width(), self.ctx.height())
    }

    /// Clear to background only; the driver's fallback for a frame whose
    /// composition failed wholesale.
    pub fn render_fallback(&mut self) -> &Surface {
        self.ctx.clear(self.background);
        self.ctx.surface()
    }

    /// Compose the frame at timeline time `t`.
    pub fn render(
        &mut self,
        model: &TimelineModel,
        settings: &ExportSettings,
        cache: &mut MediaCache,
        pipeline: &EffectPipeline,
        t: f64,
    ) -> &Surface {
        self.ctx.clear(self.background);

        // Active set with deterministic render-order keys. Indices are
        // collected first so the draw loop borrows the model afresh.
        let mut active: Vec<((u8, usize, usize), usize, usize)> = Vec::new();
        for (ti, track) in model.tracks.iter().enumerate() {
            if track.muted {
                continue;
            }
            for (ei, element) in track.elements.iter().enumerate() {
                if element.is_active_at(t) {
                    active.push((render_order_key(track.kind, ti, ei), ti, ei));
                }
            }
        }
        active.sort_by_key(|(key, _, _)| *key);

        for (_, ti, ei) in active {
            let track = &model.tracks[ti];
            let element = &track.elements[ei];

            let alpha = element.opacity * track.opacity.unwrap_or(1.0);
            // The element's own blend wins; an untouched (SourceOver)
            // element inherits the track's mode when one is set.
            let blend = if element.blend != BlendMode::SourceOver {
                element.blend
            } else {
                track.blend.unwrap_or(element.blend)
            };
            let state = DrawState::new(alpha, blend, self.scale);

            let result = match &element.kind {
                ElementKind::Media(m) => self.media.render(
                    &mut self.ctx,
                    cache,
                    element,
                    m,
                    &state,
                    t,
                    self.fps,
                ),
                ElementKind::Overlay(o) => self.overlay.render(&mut self.ctx, cache, o, &state),
                ElementKind::Text(te) => text_renderer::render(
                    &mut self.ctx,
                    &self.fonts,
                    self.canvas_w,
                    self.canvas_h,
                    te,
                    &state,
                ),
                ElementKind::Subtitle(s) => subtitle::render(
                    &mut self.ctx,
                    &self.fonts,
                    self.canvas_w,
                    self.canvas_h,
                    s,
                    &state,
                ),
            };
            if let Err(e) = result {
                eprintln!("[render] element {} skipped at t={t:.3}: {e}", element.id);
            }
        }

        pipeline.run(self.ctx.surface_mut(), settings, t);
        self.ctx.surface()
    }
}
