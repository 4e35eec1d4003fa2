// crates/framefuse-engine/src/text.rs
//
// Font loading and text-block rasterization on top of fontdue.
//
// The text and subtitle renderers both funnel through `rasterize_block`:
// lay the lines out, optionally fill a background box (flush to the
// measured text bounds plus the caller's padding), blit glyph coverage,
// stroke decoration lines. The result is a premultiplied RGBA block the
// render context composites like any other pixmap, so rotation and blend
// modes need no text-specific code.
//
// Font discovery is deliberately simple: explicit registration by family
// name first, then a scan of the usual system font directories for a usable
// sans face. Editors embed or ship their fonts; the scan is the headless
// fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use fontdue::{Font, FontSettings};

use framefuse_core::helpers::color::Color;
use framefuse_core::timeline::{TextAlign, TextDecoration};

// ── Font library ──────────────────────────────────────────────────────────────

const SYSTEM_FONT_DIRS: [&str; 6] = [
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
    "/usr/share/fonts/truetype",
];

/// File names tried, in order, when no registered family matches.
const FALLBACK_FILES: [&str; 6] = [
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
    "FreeSans.ttf",
];

pub struct FontLibrary {
    fonts: HashMap<String, Arc<Font>>,
    fallback: Option<Arc<Font>>,
}

impl FontLibrary {
    pub fn new() -> FontLibrary {
        FontLibrary { fonts: HashMap::new(), fallback: None }
    }

    /// Register a font under a family name. The first registered font also
    /// becomes the fallback unless one was already set.
    pub fn load_font_bytes(&mut self, family: &str, bytes: &[u8]) -> Result<()> {
        let font = Arc::new(
            Font::from_bytes(bytes, FontSettings::default())
                .map_err(|e| anyhow!("parse font '{family}': {e}"))?,
        );
        if self.fallback.is_none() {
            self.fallback = Some(Arc::clone(&font));
        }
        self.fonts.insert(family.to_lowercase(), font);
        Ok(())
    }

    /// Library with the system fallback face loaded, when one can be found.
    pub fn with_system_fonts() -> FontLibrary {
        let mut lib = FontLibrary::new();
        for name in FALLBACK_FILES {
            if let Some(path) = Self::find_font_file(name) {
                if let Ok(bytes) = std::fs::read(&path) {
                    if lib.load_font_bytes("sans-serif", &bytes).is_ok() {
                        eprintln!("[text] fallback font {}", path.display());
                        break;
                    }
                }
            }
        }
        if lib.fallback.is_none() {
            eprintln!("[text] no system font found; text elements will not render");
        }
        lib
    }

    /// Search the system font directories (two levels deep) for `file_name`.
    pub fn find_font_file(file_name: &str) -> Option<PathBuf> {
        for dir in SYSTEM_FONT_DIRS {
            let root = Path::new(dir);
            if !root.is_dir() {
                continue;
            }
            let direct = root.join(file_name);
            if direct.is_file() {
                return Some(direct);
            }
            if let Ok(entries) = std::fs::read_dir(root) {
                for entry in entries.flatten() {
                    let sub = entry.path();
                    if sub.is_dir() {
                        let nested = sub.join(file_name);
                        if nested.is_file() {
                            return Some(nested);
                        }
                    }
                }
            }
        }
        None
    }

    /// Font for `family`, falling back to the default face.
    pub fn resolve(&self, family: &str) -> Option<&Font> {
        self.fonts
            .get(&family.to_lowercase())
            .or(self.fallback.as_ref())
            .map(Arc::as_ref)
    }
}

impl Default for FontLibrary {
    fn default() -> Self {
        FontLibrary::new()
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

pub struct TextMetricsBlock {
    pub line_widths: Vec<f32>,
    pub max_width: f32,
    pub line_height: f32,
    pub ascent: f32,
    pub height: f32,
}

/// Measure `text` (newline-separated lines) at `size` px.
pub fn measure(font: &Font, text: &str, size: f32) -> TextMetricsBlock {
    let line_metrics = font.horizontal_line_metrics(size);
    let (ascent, line_height) = match line_metrics {
        Some(m) => (m.ascent, m.new_line_size.max(size)),
        None => (size * 0.8, size * 1.2),
    };

    let line_widths: Vec<f32> = text
        .split('\n')
        .map(|line| line.chars().map(|c| font.metrics(c, size).advance_width).sum())
        .collect();
    let max_width = line_widths.iter().copied().fold(0.0_f32, f32::max);
    let height = line_height * line_widths.len() as f32;

    TextMetricsBlock { line_widths, max_width, line_height, ascent, height }
}

// ── Rasterization ─────────────────────────────────────────────────────────────

pub struct TextStyle {
    pub size: f32,
    pub color: Color,
    pub background: Option<Color>,
    pub align: TextAlign,
    pub decoration: TextDecoration,
    /// Padding around the text box, included only when a background exists.
    pub padding: f32,
}

/// A rasterized text block: premultiplied RGBA, ready for compositing.
pub struct RasterBlock {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Rasterize a text block. Returns None for empty or degenerate input.
pub fn rasterize_block(font: &Font, text: &str, style: &TextStyle) -> Option<RasterBlock> {
    if text.trim().is_empty() || style.size <= 0.0 {
        return None;
    }

    let metrics = measure(font, text, style.size);
    let pad = if style.background.is_some() { style.padding.max(0.0) } else { 0.0 };
    let width = (metrics.max_width + pad * 2.0).ceil().max(1.0) as u32;
    let height = (metrics.height + pad * 2.0).ceil().max(1.0) as u32;

    let mut data = vec![0u8; width as usize * height as usize * 4];

    if let Some(bg) = style.background {
        for px in data.chunks_exact_mut(4) {
            px[0] = bg.r;
            px[1] = bg.g;
            px[2] = bg.b;
            px[3] = 255;
        }
    }

    for (li, line) in text.split('\n').enumerate() {
        let line_width = metrics.line_widths[li];
        let line_x = pad
            + match style.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (metrics.max_width - line_width) / 2.0,
                TextAlign::Right => metrics.max_width - line_width,
            };
        let baseline = pad + metrics.line_height * li as f32 + metrics.ascent;

        let mut pen_x = line_x;
        for ch in line.chars() {
            let (gm, coverage) = font.rasterize(ch, style.size);
            let gx = pen_x as i32 + gm.xmin;
            let gy = baseline as i32 - gm.height as i32 - gm.ymin;
            blit_glyph(&mut data, width, height, gx, gy, gm.width, gm.height, &coverage, style.color);
            pen_x += gm.advance_width;
        }

        // Decoration strokes span the laid-out line, not the whole block.
        let thickness = (style.size / 20.0).max(1.0);
        match style.decoration {
            TextDecoration::None => {}
            TextDecoration::Underline => {
                let y = baseline + style.size * 0.08;
                fill_hline(&mut data, width, height, line_x, line_width, y, thickness, style.color);
            }
            TextDecoration::Strikethrough => {
                let y = baseline - metrics.ascent * 0.35;
                fill_hline(&mut data, width, height, line_x, line_width, y, thickness, style.color);
            }
        }
    }

    Some(RasterBlock { width, height, data })
}

/// Source-over one glyph's coverage bitmap, writing premultiplied output.
#[allow(clippy::too_many_arguments)]
fn blit_glyph(
    data: &mut [u8],
    block_w: u32,
    block_h: u32,
    gx: i32,
    gy: i32,
    gw: usize,
    gh: usize,
    coverage: &[u8],
    color: Color,
) {
    for row in 0..gh {
        let y = gy + row as i32;
        if y < 0 || y >= block_h as i32 {
            continue;
        }
        for col in 0..gw {
            let x = gx + col as i32;
            if x < 0 || x >= block_w as i32 {
                continue;
            }
            let cov = coverage[row * gw + col];
            if cov == 0 {
                continue;
            }
            let a = cov as f32 / 255.0;
            let i = (y as usize * block_w as usize + x as usize) * 4;
            let inv = 1.0 - a;
            data[i] = (color.r as f32 * a + data[i] as f32 * inv).round() as u8;
            data[i + 1] = (color.g as f32 * a + data[i + 1] as f32 * inv).round() as u8;
            data[i + 2] = (color.b as f32 * a + data[i + 2] as f32 * inv).round() as u8;
            data[i + 3] = (cov as f32 + data[i + 3] as f32 * inv).round().min(255.0) as u8;
        }
    }
}

/// Opaque horizontal stroke for underline / strikethrough.
#[allow(clippy::too_many_arguments)]
fn fill_hline(
    data: &mut [u8],
    block_w: u32,
    block_h: u32,
    x: f32,
    width: f32,
    y: f32,
    thickness: f32,
    color: Color,
) {
    let x0 = x.floor().max(0.0) as usize;
    let x1 = ((x + width).ceil() as usize).min(block_w as usize);
    let y0 = y.floor().max(0.0) as usize;
    let y1 = ((y + thickness).ceil() as usize).min(block_h as usize);
    for yy in y0..y1 {
        for xx in x0..x1 {
            let i = (yy * block_w as usize + xx) * 4;
            data[i] = color.r;
            data[i + 1] = color.g;
            data[i + 2] = color.b;
            data[i + 3] = 255;
        }
    }
}

/// Horizontal offset of a block anchored at `anchor_x` under `align`.
pub fn aligned_block_x(anchor_x: f32, block_w: f32, align: TextAlign) -> f32 {
    match align {
        TextAlign::Left => anchor_x,
        TextAlign::Center => anchor_x - block_w / 2.0,
        TextAlign::Right => anchor_x - block_w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_library_resolves_nothing() {
        let lib = FontLibrary::new();
        assert!(lib.resolve("Inter").is_none());
    }

    #[test]
    fn alignment_offsets_anchor() {
        assert_eq!(aligned_block_x(100.0, 40.0, TextAlign::Left), 100.0);
        assert_eq!(aligned_block_x(100.0, 40.0, TextAlign::Center), 80.0);
        assert_eq!(aligned_block_x(100.0, 40.0, TextAlign::Right), 60.0);
    }

    #[test]
    fn decoration_thickness_scales_with_size() {
        assert_eq!((40.0_f32 / 20.0).max(1.0), 2.0);
        assert_eq!((10.0_f32 / 20.0).max(1.0), 1.0);
    }

    // Glyph-level assertions only run where a system font exists; headless
    // CI without fonts still exercises the load/lookup paths above.
    #[test]
    fn block_raster_with_any_system_font() {
        let lib = FontLibrary::with_system_fonts();
        let Some(font) = lib.resolve("whatever") else { return };

        let style = TextStyle {
            size: 32.0,
            color: Color::WHITE,
            background: None,
            align: TextAlign::Center,
            decoration: TextDecoration::None,
            padding: 0.0,
        };
        let block = rasterize_block(font, "HELLO", &style).expect("non-empty text rasterizes");
        assert!(block.width > 0 && block.height > 0);
        // some ink must have landed
        assert!(block.data.chunks_exact(4).any(|px| px[3] > 0));

        // background makes every pixel opaque and grows the box by padding
        let padded = TextStyle {
            background: Some(Color::BLACK),
            padding: 8.0,
            ..style
        };
        let bg_block = rasterize_block(font, "HELLO", &padded).unwrap();
        assert!(bg_block.width >= block.width + 16);
        assert!(bg_block.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn measure_is_monotonic_in_text_length() {
        let lib = FontLibrary::with_system_fonts();
        let Some(font) = lib.resolve("whatever") else { return };
        let short = measure(font, "HI", 24.0);
        let long = measure(font, "HIHIHI", 24.0);
        assert!(long.max_width > short.max_width);
        let two_lines = measure(font, "HI\nHI", 24.0);
        assert!(two_lines.height > short.height);
    }
}
