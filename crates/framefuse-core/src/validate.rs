// crates/framefuse-core/src/validate.rs
//
// One-shot structural validation of a timeline + settings pair before the
// run is pinned. Collects EVERY offense instead of stopping at the first,
// so the caller can surface a complete report. Never mutates its inputs.

use uuid::Uuid;

use crate::settings::{ExportSettings, SUPPORTED_SAMPLE_RATES};
use crate::timeline::{ByteSource, ElementKind, TimelineModel};

pub const CANVAS_MIN: u32 = 64;
pub const CANVAS_MAX_W: u32 = 7_680;
pub const CANVAS_MAX_H: u32 = 4_320;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ValidationError {
    #[error("timeline has no tracks")]
    EmptyTimeline,

    #[error("timeline duration must be positive (got {0})")]
    NonPositiveDuration(f64),

    #[error("element {id}: time fields must be non-negative")]
    NegativeTime { id: Uuid },

    #[error("element {id}: trims ({trim:.3}s) consume the whole duration ({duration:.3}s)")]
    TrimExceedsDuration { id: Uuid, trim: f64, duration: f64 },

    #[error("element {id}: media id '{media_id}' has no byte source")]
    UnresolvedMedia { id: Uuid, media_id: String },

    #[error("canvas {width}x{height} outside supported range {min}..{max_w}x{min}..{max_h}",
        min = CANVAS_MIN, max_w = CANVAS_MAX_W, max_h = CANVAS_MAX_H)]
    CanvasOutOfRange { width: u32, height: u32 },

    #[error("unsupported audio sample rate {0}")]
    UnsupportedSampleRate(u32),

    #[error("frame rate {0} outside supported range 1..=120")]
    FpsOutOfRange(u32),

    #[error("resolution multiplier {0} outside supported range 0.25..=4")]
    MultiplierOutOfRange(f32),

    #[error("track {track}: unknown effect id '{effect_id}'")]
    UnknownEffect { track: Uuid, effect_id: String },
}

/// Validate without checking track effect ids against a registry.
pub fn validate(model: &TimelineModel, settings: &ExportSettings) -> Vec<ValidationError> {
    validate_with_effects(model, settings, None)
}

/// Full validation. When `known_effects` is given, every effect id referenced
/// by a track must appear in it.
pub fn validate_with_effects(
    model: &TimelineModel,
    settings: &ExportSettings,
    known_effects: Option<&[&str]>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if model.tracks.is_empty() {
        errors.push(ValidationError::EmptyTimeline);
    }

    if model.duration <= 0.0 {
        errors.push(ValidationError::NonPositiveDuration(model.duration));
    }

    for track in &model.tracks {
        for element in &track.elements {
            if element.start_time < 0.0
                || element.duration < 0.0
                || element.trim_start < 0.0
                || element.trim_end < 0.0
            {
                errors.push(ValidationError::NegativeTime { id: element.id });
            }

            let trim = element.trim_start + element.trim_end;
            if trim >= element.duration {
                errors.push(ValidationError::TrimExceedsDuration {
                    id: element.id,
                    trim,
                    duration: element.duration,
                });
            }

            // Every media reference must already carry a concrete byte
            // source; the adapter filters unresolvable ids, so hitting this
            // means the adapter contract was broken.
            if let ElementKind::Media(m) = &element.kind {
                let unresolved = m.media_id.trim().is_empty()
                    || match &m.source {
                        ByteSource::Path(p) => p.as_os_str().is_empty(),
                        ByteSource::Url(u) => u.trim().is_empty(),
                    };
                if unresolved {
                    errors.push(ValidationError::UnresolvedMedia {
                        id: element.id,
                        media_id: m.media_id.clone(),
                    });
                }
            }
        }

        if let Some(known) = known_effects {
            for effect_id in &track.effect_ids {
                if !known.contains(&effect_id.as_str()) {
                    errors.push(ValidationError::UnknownEffect {
                        track: track.id,
                        effect_id: effect_id.clone(),
                    });
                }
            }
        }
    }

    let out_of_range = |v: u32, lo: u32, hi: u32| v < lo || v > hi;
    if out_of_range(settings.width, CANVAS_MIN, CANVAS_MAX_W)
        || out_of_range(settings.height, CANVAS_MIN, CANVAS_MAX_H)
    {
        errors.push(ValidationError::CanvasOutOfRange {
            width: settings.width,
            height: settings.height,
        });
    }

    if !SUPPORTED_SAMPLE_RATES.contains(&settings.sample_rate) {
        errors.push(ValidationError::UnsupportedSampleRate(settings.sample_rate));
    }

    if settings.fps < 1 || settings.fps > 120 {
        errors.push(ValidationError::FpsOutOfRange(settings.fps));
    }

    if !(0.25..=4.0).contains(&settings.resolution_multiplier) {
        errors.push(ValidationError::MultiplierOutOfRange(settings.resolution_multiplier));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;
    use crate::timeline::*;

    fn shape_element(start: f64, duration: f64, trim_start: f64, trim_end: f64) -> Element {
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
                width: 8.0,
                height: 8.0,
                rotation: 0.0,
            }),
        }
    }

    fn track(elements: Vec<Element>) -> Track {
        Track {
            id: Uuid::new_v4(),
            name: "t".into(),
            kind: TrackKind::Overlay,
            muted: false,
            opacity: None,
            blend: None,
            elements,
            effect_ids: Vec::new(),
        }
    }

    fn model(tracks: Vec<Track>) -> TimelineModel {
        let mut m = TimelineModel {
            tracks,
            duration: 0.0,
            canvas_width: 1920,
            canvas_height: 1080,
            fps: 30,
        };
        m.duration = m.computed_duration();
        m
    }

    #[test]
    fn valid_model_passes_clean() {
        let m = model(vec![track(vec![shape_element(0.0, 2.0, 0.0, 0.0)])]);
        assert!(validate(&m, &ExportSettings::default()).is_empty());
    }

    #[test]
    fn all_offenses_are_collected() {
        // empty timeline + bad canvas + bad rate + bad fps: four errors at once
        let m = model(vec![]);
        let s = ExportSettings {
            width: 10,
            sample_rate: 11_025,
            fps: 0,
            ..Default::default()
        };
        let errors = validate(&m, &s);
        assert!(errors.contains(&ValidationError::EmptyTimeline));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::CanvasOutOfRange { .. })));
        assert!(errors.contains(&ValidationError::UnsupportedSampleRate(11_025)));
        assert!(errors.contains(&ValidationError::FpsOutOfRange(0)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NonPositiveDuration(_))));
    }

    #[test]
    fn trim_consuming_duration_is_rejected() {
        let m = model(vec![track(vec![shape_element(0.0, 2.0, 1.5, 0.5)])]);
        let errors = validate(&m, &ExportSettings::default());
        assert!(errors.iter().any(|e| matches!(e, ValidationError::TrimExceedsDuration { .. })));
    }

    #[test]
    fn negative_times_are_rejected() {
        let m = model(vec![track(vec![shape_element(-1.0, 2.0, 0.0, 0.0)])]);
        let errors = validate(&m, &ExportSettings::default());
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NegativeTime { .. })));
    }

    #[test]
    fn empty_media_source_is_unresolved() {
        let mut e = shape_element(0.0, 2.0, 0.0, 0.0);
        e.kind = ElementKind::Media(MediaElement {
            media_id: "clip1".into(),
            kind: MediaKind::Video,
            source: ByteSource::Url(String::new()),
            natural_width: None,
            natural_height: None,
        });
        let m = model(vec![track(vec![e])]);
        let errors = validate(&m, &ExportSettings::default());
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnresolvedMedia { .. })));
    }

    #[test]
    fn unknown_effect_id_flagged_only_with_registry() {
        let mut t = track(vec![shape_element(0.0, 1.0, 0.0, 0.0)]);
        t.effect_ids = vec!["blur".into(), "nope".into()];
        let m = model(vec![t]);
        let s = ExportSettings::default();

        assert!(validate(&m, &s).is_empty());

        let errors = validate_with_effects(&m, &s, Some(&["blur", "wipe"]));
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ValidationError::UnknownEffect { effect_id, .. } if effect_id == "nope"));
    }

    #[test]
    fn multiplier_bounds() {
        let m = model(vec![track(vec![shape_element(0.0, 1.0, 0.0, 0.0)])]);
        let s = ExportSettings { resolution_multiplier: 8.0, ..Default::default() };
        let errors = validate(&m, &s);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MultiplierOutOfRange(_))));
    }
}
