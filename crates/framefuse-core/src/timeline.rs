// crates/framefuse-core/src/timeline.rs
//
// The timeline model: pure serde data, no ffmpeg, no raster types.
//
// Produced by an adapter from the editor's native shapes, validated once
// (see validate.rs), then pinned immutable for the whole export run. Nothing
// in the render path mutates it.
//
// Time semantics that everything downstream relies on:
//
//   visible duration   = duration − trim_start − trim_end
//   active interval    = [start_time, start_time + visible duration)
//   element-local time = t − start_time + trim_start
//
// The active interval is half-open: an element is active at its start instant
// and inactive at its end instant. The final boundary instant intentionally
// renders background.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::helpers::color::Color;

// ── Blend modes ───────────────────────────────────────────────────────────────

/// Compositing operator applied when an element (or whole track) is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    SourceOver,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

// ── Tracks ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Media,
    Text,
    Audio,
    Effect,
    Overlay,
    Subtitle,
}

impl TrackKind {
    /// Render-order promotion class. Text tracks sort strictly above every
    /// non-text track regardless of their position in the sequence, so that
    /// captions are never occluded by later media tracks.
    pub fn promotion(self) -> u8 {
        match self {
            TrackKind::Text => 1,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub muted: bool,
    /// Track-level opacity multiplied into every element's own opacity.
    #[serde(default)]
    pub opacity: Option<f32>,
    /// Track-level blend mode; an element's own mode wins when both are set.
    #[serde(default)]
    pub blend: Option<BlendMode>,
    pub elements: Vec<Element>,
    /// Ordered ids into the effect-processor registry. Resolved by the driver
    /// when assembling the run's effect pipeline.
    #[serde(default)]
    pub effect_ids: Vec<String>,
}

// ── Elements ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Element {
    pub id: Uuid,
    /// Timeline placement in seconds.
    pub start_time: f64,
    /// Full source duration in seconds, before trimming.
    pub duration: f64,
    #[serde(default)]
    pub trim_start: f64,
    #[serde(default)]
    pub trim_end: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub blend: BlendMode,
    pub kind: ElementKind,
}

fn default_opacity() -> f32 {
    1.0
}

impl Element {
    /// Seconds this element actually occupies on the timeline.
    pub fn visible_duration(&self) -> f64 {
        self.duration - self.trim_start - self.trim_end
    }

    /// Exclusive end of the active interval.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.visible_duration()
    }

    /// Whether the element contributes at timeline time `t`.
    ///
    /// Half-open: `t == start_time` is active, `t == end_time()` is not.
    pub fn is_active_at(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time()
    }

    /// Translate timeline time into the source asset's own time base,
    /// accounting for placement and the leading trim.
    pub fn local_time(&self, t: f64) -> f64 {
        t - self.start_time + self.trim_start
    }

    /// Whether this element feeds the audio mixer.
    pub fn bears_audio(&self) -> bool {
        matches!(
            &self.kind,
            ElementKind::Media(m) if matches!(m.kind, MediaKind::Video | MediaKind::Audio)
        )
    }
}

/// Tagged element variant dispatched by the frame renderer. Dispatch cost is
/// per element per frame, never per pixel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ElementKind {
    Media(MediaElement),
    Text(TextElement),
    Overlay(OverlayElement),
    Subtitle(SubtitleElement),
}

// ── Media ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

/// Where a media asset's bytes come from. Local paths are used directly;
/// URLs are fetched once into a temp file by the media cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteSource {
    Path(PathBuf),
    Url(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaElement {
    /// Stable cache key. All elements sharing a media id share one decoder.
    pub media_id: String,
    pub kind: MediaKind,
    pub source: ByteSource,
    #[serde(default)]
    pub natural_width: Option<u32>,
    #[serde(default)]
    pub natural_height: Option<u32>,
}

// ── Text ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    Strikethrough,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Text element. Coordinates are offsets from the CANVAS CENTER; the text
/// renderer translates to pixel origin. This differs from overlays, which use
/// top-left pixel coordinates; the asymmetry is inherited from the editor's
/// stored data and kept for compatibility.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextElement {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    #[serde(default)]
    pub weight: FontWeight,
    #[serde(default)]
    pub style: FontStyle,
    #[serde(default)]
    pub decoration: TextDecoration,
    pub color: Color,
    /// None renders no background box.
    #[serde(default)]
    pub background: Option<Color>,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Degrees, clockwise.
    #[serde(default)]
    pub rotation: f32,
}

// ── Overlays ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Dots,
    Stripes,
    Checkerboard,
    Solid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OverlayContent {
    /// Filled rectangle in the given color.
    Shape { color: Color },
    /// Raster image, loaded and cached like media images. On load failure the
    /// renderer substitutes a neutral grey rectangle so the frame keeps its
    /// structure.
    Image { media_id: String, source: ByteSource },
    /// Procedural pattern, deterministic in (width, height, kind).
    Pattern { pattern: PatternKind },
}

/// Overlay element. (x, y) are CANVAS pixel coordinates of the overlay's
/// center; the box is `width × height` and rotated by `rotation` degrees
/// about its center.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverlayElement {
    pub content: OverlayContent,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
}

// ── Subtitles ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SubtitlePosition {
    Top,
    Center,
    Bottom,
    Custom { x: f32, y: f32 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtitleElement {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    #[serde(default)]
    pub background: Option<Color>,
    pub position: SubtitlePosition,
    #[serde(default)]
    pub align: TextAlign,
}

impl SubtitleElement {
    /// Resolve the preset into canvas pixel coordinates of the text anchor.
    ///
    /// Presets compute y from the font size: top sits at 2·font_size, bottom
    /// at H − 2·font_size. X is the horizontal canvas center except for
    /// custom placement.
    pub fn resolved_position(&self, canvas_w: u32, canvas_h: u32) -> (f32, f32) {
        let cx = canvas_w as f32 / 2.0;
        match self.position {
            SubtitlePosition::Top => (cx, 2.0 * self.font_size),
            SubtitlePosition::Center => (cx, canvas_h as f32 / 2.0),
            SubtitlePosition::Bottom => (cx, canvas_h as f32 - 2.0 * self.font_size),
            SubtitlePosition::Custom { x, y } => (x, y),
        }
    }
}

// ── Timeline ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineModel {
    pub tracks: Vec<Track>,
    /// Total duration in seconds. The adapter computes this as the max
    /// element end time; `computed_duration()` re-derives it.
    pub duration: f64,
    /// Project nominal canvas size (pre-multiplier) and frame rate.
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub fps: u32,
}

impl TimelineModel {
    /// Max over all elements of `start_time + visible duration`.
    pub fn computed_duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .map(|e| e.end_time())
            .fold(0.0_f64, f64::max)
    }

    /// Whether any non-muted track carries an audio-bearing element. Decides
    /// if the output MP4 gets an audio stream at all.
    pub fn has_audio(&self) -> bool {
        self.tracks
            .iter()
            .filter(|t| !t.muted)
            .flat_map(|t| t.elements.iter())
            .any(|e| e.bears_audio())
    }
}

/// Deterministic render-order key for an active element: text promotion
/// first, then track position in the sequence, then element position within
/// the track. Independent of decode timing, wall clock, or map iteration
/// order, so two runs over the same model always composite identically.
pub fn render_order_key(track_kind: TrackKind, track_idx: usize, elem_idx: usize) -> (u8, usize, usize) {
    (track_kind.promotion(), track_idx, elem_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(start: f64, duration: f64, trim_start: f64, trim_end: f64) -> Element {
        Element {
            id: Uuid::new_v4(),
            start_time: start,
            duration,
            trim_start,
            trim_end,
            opacity: 1.0,
            blend: BlendMode::SourceOver,
            kind: ElementKind::Overlay(OverlayElement {
                content: OverlayContent::Shape { color: Color::WHITE },
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                rotation: 0.0,
            }),
        }
    }

    #[test]
    fn active_interval_is_half_open() {
        let e = element(1.0, 3.0, 0.0, 0.0);
        assert!(e.is_active_at(1.0), "start instant is active");
        assert!(e.is_active_at(3.999));
        assert!(!e.is_active_at(4.0), "end instant is not active");
        assert!(!e.is_active_at(0.999));
    }

    #[test]
    fn trims_shorten_the_active_interval() {
        let e = element(1.0, 3.0, 2.0, 0.0);
        assert_eq!(e.visible_duration(), 1.0);
        assert_eq!(e.end_time(), 2.0);
        assert!(e.is_active_at(1.5));
        assert!(!e.is_active_at(2.0));
    }

    #[test]
    fn zero_trim_keeps_full_source_duration() {
        let e = element(0.0, 5.0, 0.0, 0.0);
        assert_eq!(e.visible_duration(), 5.0);
    }

    #[test]
    fn local_time_accounts_for_leading_trim() {
        // placed at 1.0 with trim_start 2.0: timeline 1.0 → source 2.0,
        // timeline 3.999 → source 4.999
        let e = element(1.0, 10.0, 2.0, 0.0);
        assert!((e.local_time(1.0) - 2.0).abs() < 1e-9);
        assert!((e.local_time(3.999) - 4.999).abs() < 1e-9);
    }

    #[test]
    fn text_tracks_promote_above_later_media() {
        let text = render_order_key(TrackKind::Text, 0, 0);
        let media = render_order_key(TrackKind::Media, 5, 3);
        assert!(text > media, "text draws above media from any track index");
    }

    #[test]
    fn order_within_class_follows_track_then_element() {
        let a = render_order_key(TrackKind::Media, 0, 1);
        let b = render_order_key(TrackKind::Media, 1, 0);
        assert!(a < b);
        let c = render_order_key(TrackKind::Media, 1, 2);
        assert!(b < c);
    }

    #[test]
    fn duration_is_max_element_end() {
        let mut model = TimelineModel {
            tracks: vec![Track {
                id: Uuid::new_v4(),
                name: "v1".into(),
                kind: TrackKind::Media,
                muted: false,
                opacity: None,
                blend: None,
                elements: vec![element(0.0, 2.0, 0.0, 0.0), element(1.0, 4.0, 0.0, 1.0)],
                effect_ids: Vec::new(),
            }],
            duration: 0.0,
            canvas_width: 1920,
            canvas_height: 1080,
            fps: 30,
        };
        model.duration = model.computed_duration();
        assert_eq!(model.duration, 4.0); // 1.0 + (4.0 − 1.0)
    }

    #[test]
    fn subtitle_presets_position_from_font_size() {
        let sub = SubtitleElement {
            content: "hi".into(),
            font_family: "Sans".into(),
            font_size: 40.0,
            color: Color::WHITE,
            background: None,
            position: SubtitlePosition::Top,
            align: TextAlign::Center,
        };
        assert_eq!(sub.resolved_position(640, 360), (320.0, 80.0));

        let bottom = SubtitleElement { position: SubtitlePosition::Bottom, ..sub.clone() };
        assert_eq!(bottom.resolved_position(640, 360), (320.0, 280.0));

        let custom = SubtitleElement {
            position: SubtitlePosition::Custom { x: 12.0, y: 34.0 },
            ..sub
        };
        assert_eq!(custom.resolved_position(640, 360), (12.0, 34.0));
    }

    #[test]
    fn model_round_trips_through_json() {
        let mut m = TimelineModel {
            tracks: vec![Track {
                id: Uuid::new_v4(),
                name: "v1".into(),
                kind: TrackKind::Media,
                muted: false,
                opacity: Some(0.9),
                blend: Some(BlendMode::Multiply),
                elements: vec![element(0.5, 3.0, 0.25, 0.0)],
                effect_ids: vec!["blur".into()],
            }],
            duration: 0.0,
            canvas_width: 1280,
            canvas_height: 720,
            fps: 25,
        };
        m.duration = m.computed_duration();

        let json = serde_json::to_string(&m).expect("model serializes");
        let back: TimelineModel = serde_json::from_str(&json).expect("model deserializes");
        assert_eq!(back.duration, m.duration);
        assert_eq!(back.tracks.len(), 1);
        assert_eq!(back.tracks[0].effect_ids, vec!["blur".to_string()]);
        assert_eq!(back.tracks[0].elements[0].trim_start, 0.25);
    }

    #[test]
    fn audio_bearing_detection() {
        let media = |kind| {
            ElementKind::Media(MediaElement {
                media_id: "m".into(),
                kind,
                source: ByteSource::Path("a.mp4".into()),
                natural_width: None,
                natural_height: None,
            })
        };
        let mut e = element(0.0, 1.0, 0.0, 0.0);
        e.kind = media(MediaKind::Video);
        assert!(e.bears_audio());
        e.kind = media(MediaKind::Audio);
        assert!(e.bears_audio());
        e.kind = media(MediaKind::Image);
        assert!(!e.bears_audio());
    }
}
