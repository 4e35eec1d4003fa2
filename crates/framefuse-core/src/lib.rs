// crates/framefuse-core/src/lib.rs

pub mod effects;
pub mod error;
pub mod helpers;
pub mod progress;
pub mod settings;
pub mod surface;
pub mod timeline;
pub mod validate;

pub use error::ExportError;
pub use helpers::color::Color;
pub use progress::{ProgressEvent, Stage};
pub use settings::ExportSettings;
pub use surface::Surface;
pub use timeline::{
    BlendMode, ByteSource, Element, ElementKind, FontStyle, FontWeight, MediaElement, MediaKind,
    OverlayContent, OverlayElement, PatternKind, SubtitleElement, SubtitlePosition, TextAlign,
    TextDecoration, TextElement, Track, TrackKind, TimelineModel,
};
pub use validate::{validate, validate_with_effects, ValidationError};
