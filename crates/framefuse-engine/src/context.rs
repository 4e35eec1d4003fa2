// crates/framefuse-engine/src/context.rs
//
// RenderContext: the composition context value owned by the frame renderer.
//
// It wraps the run's single raster surface and performs every draw through
// tiny-skia, which is stateless: there is no save/restore stack to manage.
// What the original canvas model expressed as save → set alpha/blend/scale →
// draw → restore becomes constructing a `DrawState` for the element and
// passing it into one draw call. The state dies with the call; nothing
// leaks into the next element.

use framefuse_core::helpers::color::Color;
use framefuse_core::timeline::BlendMode;
use framefuse_core::Surface;

use tiny_skia::{
    FilterQuality, Paint, PixmapMut, PixmapPaint, PixmapRef, Rect, Shader, Transform,
};

/// Per-element draw parameters, applied for the duration of one element
/// render and then dropped.
#[derive(Clone, Copy, Debug)]
pub struct DrawState {
    /// Element opacity × track opacity, 0..=1.
    pub alpha: f32,
    pub blend: BlendMode,
    /// Resolution multiplier; canvas-space geometry is scaled by this.
    pub scale: f32,
}

impl DrawState {
    pub fn new(alpha: f32, blend: BlendMode, scale: f32) -> DrawState {
        DrawState { alpha: alpha.clamp(0.0, 1.0), blend, scale }
    }
}

pub(crate) fn to_skia_blend(blend: BlendMode) -> tiny_skia::BlendMode {
    match blend {
        BlendMode::SourceOver => tiny_skia::BlendMode::SourceOver,
        BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
        BlendMode::Screen => tiny_skia::BlendMode::Screen,
        BlendMode::Overlay => tiny_skia::BlendMode::Overlay,
        BlendMode::Darken => tiny_skia::BlendMode::Darken,
        BlendMode::Lighten => tiny_skia::BlendMode::Lighten,
    }
}

/// Multiply RGB by alpha in place: straight-alpha RGBA (image decoders, the
/// glyph rasterizer) → the premultiplied form tiny-skia composites with.
pub(crate) fn premultiply_rgba(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * a) / 255) as u8;
        px[1] = ((px[1] as u16 * a) / 255) as u8;
        px[2] = ((px[2] as u16 * a) / 255) as u8;
    }
}

/// Build an owned tiny-skia pixmap from straight-alpha RGBA bytes.
pub(crate) fn pixmap_from_straight_rgba(
    data: &[u8],
    width: u32,
    height: u32,
) -> Option<tiny_skia::Pixmap> {
    let mut premultiplied = data.to_vec();
    premultiply_rgba(&mut premultiplied);
    let mut pixmap = tiny_skia::Pixmap::new(width, height)?;
    pixmap.data_mut().copy_from_slice(&premultiplied);
    Some(pixmap)
}

pub struct RenderContext {
    surface: Surface,
    width: u32,
    height: u32,
}

impl RenderContext {
    /// Allocate the surface once at the effective output size.
    pub fn new(width: u32, height: u32) -> RenderContext {
        RenderContext { surface: Surface::new(width, height), width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn clear(&mut self, color: Color) {
        self.surface.clear(color);
    }

    fn pixmap_mut(&mut self) -> PixmapMut<'_> {
        let w = self.width;
        let h = self.height;
        // The surface is always w*h*4 bytes; from_bytes only fails on a
        // size mismatch, which would be a construction bug.
        PixmapMut::from_bytes(self.surface.data_mut(), w, h)
            .expect("surface buffer matches its dimensions")
    }

    /// Composite a premultiplied pixmap under `transform` with the element's
    /// alpha and blend mode.
    pub fn draw_pixmap(&mut self, source: PixmapRef<'_>, transform: Transform, state: &DrawState) {
        let paint = PixmapPaint {
            opacity: state.alpha,
            blend_mode: to_skia_blend(state.blend),
            quality: FilterQuality::Bilinear,
        };
        self.pixmap_mut().draw_pixmap(0, 0, source, &paint, transform, None);
    }

    /// Fill an axis-aligned rect (pre-transform coordinates) with a solid
    /// color under the element draw state.
    pub fn fill_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
        transform: Transform,
        state: &DrawState,
    ) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else { return };
        let alpha = (state.alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        let paint = Paint {
            shader: Shader::SolidColor(tiny_skia::Color::from_rgba8(
                color.r, color.g, color.b, alpha,
            )),
            blend_mode: to_skia_blend(state.blend),
            anti_alias: true,
            ..Paint::default()
        };
        self.pixmap_mut().fill_rect(rect, &paint, transform, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_leaves_opaque_alone() {
        let mut px = [200, 100, 50, 255];
        premultiply_rgba(&mut px);
        assert_eq!(px, [200, 100, 50, 255]);
    }

    #[test]
    fn premultiply_scales_by_alpha() {
        let mut px = [200, 100, 50, 128];
        premultiply_rgba(&mut px);
        assert_eq!(px[3], 128);
        assert!(px[0] <= 101 && px[0] >= 99);
    }

    #[test]
    fn fill_rect_writes_into_the_surface() {
        let mut ctx = RenderContext::new(8, 8);
        ctx.clear(Color::BLACK);
        let state = DrawState::new(1.0, BlendMode::SourceOver, 1.0);
        ctx.fill_rect(2.0, 2.0, 4.0, 4.0, Color::WHITE, Transform::identity(), &state);
        assert_eq!(ctx.surface().pixel(4, 4), [255, 255, 255, 255]);
        assert_eq!(ctx.surface().pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn draw_state_clamps_alpha() {
        let s = DrawState::new(4.2, BlendMode::SourceOver, 1.0);
        assert_eq!(s.alpha, 1.0);
    }
}
