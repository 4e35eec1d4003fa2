// crates/framefuse-engine/src/renderers/text.rs
//
// Text element renderer.
//
// Coordinates are canvas-center-relative: the anchor lands at
// (W/2 + x, H/2 + y) in nominal canvas space, and the whole draw is scaled
// by the resolution multiplier. The text block rasterizes once per call
// (content changes every frame for animated captions far more often than it
// repeats, so a cache would mostly miss) and composites with the element's
// rotation, alpha, and blend mode like any other pixmap.

use anyhow::{anyhow, Result};
use fontdue::Font;
use tiny_skia::Transform;

use framefuse_core::timeline::{FontStyle, FontWeight, TextElement};

use crate::context::{DrawState, RenderContext};
use crate::text::{aligned_block_x, rasterize_block, FontLibrary, RasterBlock, TextStyle};

/// Resolve a family + weight + style to a registered face: the most
/// specific candidate name first, then the plain family, then the library
/// fallback.
pub fn resolve_styled<'a>(
    fonts: &'a FontLibrary,
    family: &str,
    weight: FontWeight,
    style: FontStyle,
) -> Option<&'a Font> {
    let mut candidates: Vec<String> = Vec::new();
    match (weight, style) {
        (FontWeight::Bold, FontStyle::Italic) => {
            candidates.push(format!("{family} bold italic"));
            candidates.push(format!("{family} bold"));
        }
        (FontWeight::Bold, FontStyle::Normal) => candidates.push(format!("{family} bold")),
        (FontWeight::Normal, FontStyle::Italic) => candidates.push(format!("{family} italic")),
        (FontWeight::Normal, FontStyle::Normal) => {}
    }
    candidates.push(family.to_string());
    candidates.iter().find_map(|name| fonts.resolve(name))
}

pub fn render(
    ctx: &mut RenderContext,
    fonts: &FontLibrary,
    canvas_w: u32,
    canvas_h: u32,
    text: &TextElement,
    state: &DrawState,
) -> Result<()> {
    let font = resolve_styled(fonts, &text.font_family, text.weight, text.style)
        .ok_or_else(|| anyhow!("no font available for family '{}'", text.font_family))?;

    let style = TextStyle {
        size: text.font_size,
        color: text.color,
        background: text.background,
        align: text.align,
        decoration: text.decoration,
        padding: 0.0,
    };
    let Some(block) = rasterize_block(font, &text.content, &style) else {
        return Ok(()); // nothing to draw for empty content
    };

    let anchor_x = canvas_w as f32 / 2.0 + text.x;
    let anchor_y = canvas_h as f32 / 2.0 + text.y;
    draw_block(ctx, &block, anchor_x, anchor_y, text.align, text.rotation, state)
}

/// Composite a rasterized block: horizontally placed by align relative to
/// the anchor, vertically centered on it (baseline-middle convention),
/// rotated about the anchor, scaled to output space.
pub(crate) fn draw_block(
    ctx: &mut RenderContext,
    block: &RasterBlock,
    anchor_x: f32,
    anchor_y: f32,
    align: framefuse_core::timeline::TextAlign,
    rotation: f32,
    state: &DrawState,
) -> Result<()> {
    let mut pixmap = tiny_skia::Pixmap::new(block.width, block.height)
        .ok_or_else(|| anyhow!("text block allocation failed"))?;
    pixmap.data_mut().copy_from_slice(&block.data);

    let block_x = aligned_block_x(anchor_x, block.width as f32, align);
    let block_y = anchor_y - block.height as f32 / 2.0;

    let transform = Transform::from_translate(block_x, block_y)
        .post_concat(Transform::from_rotate_at(rotation, anchor_x, anchor_y))
        .post_scale(state.scale, state.scale);

    ctx.draw_pixmap(pixmap.as_ref(), transform, state);
    Ok(())
}
