// crates/framefuse-engine/src/renderers/subtitle.rs
//
// Subtitle element renderer: text with a preset (or custom) position and an
// 8 px padded background box. Subtitles never rotate.

use anyhow::{anyhow, Result};

use framefuse_core::timeline::{FontStyle, FontWeight, SubtitleElement};

use crate::context::{DrawState, RenderContext};
use crate::renderers::text::{draw_block, resolve_styled};
use crate::text::{rasterize_block, FontLibrary, TextStyle};

/// Padding around the subtitle text box when a background is drawn.
const BACKGROUND_PADDING: f32 = 8.0;

pub fn render(
    ctx: &mut RenderContext,
    fonts: &FontLibrary,
    canvas_w: u32,
    canvas_h: u32,
    subtitle: &SubtitleElement,
    state: &DrawState,
) -> Result<()> {
    let font = resolve_styled(fonts, &subtitle.font_family, FontWeight::Normal, FontStyle::Normal)
        .ok_or_else(|| anyhow!("no font available for family '{}'", subtitle.font_family))?;

    let style = TextStyle {
        size: subtitle.font_size,
        color: subtitle.color,
        background: subtitle.background,
        align: subtitle.align,
        decoration: framefuse_core::timeline::TextDecoration::None,
        padding: BACKGROUND_PADDING,
    };
    let Some(block) = rasterize_block(font, &subtitle.content, &style) else {
        return Ok(());
    };

    let (anchor_x, anchor_y) = subtitle.resolved_position(canvas_w, canvas_h);
    draw_block(ctx, &block, anchor_x, anchor_y, subtitle.align, 0.0, state)
}
