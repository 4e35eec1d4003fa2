// crates/framefuse-engine/src/adapter.rs
//
// Adapter contract between an editor's native timeline shapes and the
// model the engine renders. The editor side is opaque to this crate; an
// adapter owns whatever stores, libraries and canvas descriptions it needs
// and produces a TimelineModel:
//
//   - elements whose media id does not resolve to a byte source are
//     filtered out (the validator treats a leaked one as an offense),
//   - the model duration is the max element end time,
//   - z-order is implied by the track sequence it emits.
//
// Validation is re-exported from the core so adapter authors can check
// their output without depending on framefuse-core directly.

use framefuse_core::TimelineModel;

pub use framefuse_core::validate::{validate, validate_with_effects, ValidationError};

#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    /// The editor project contains nothing renderable.
    #[error("adapter produced an empty timeline: {0}")]
    Empty(String),

    /// The editor shapes could not be translated.
    #[error("timeline adaptation failed: {0}")]
    Translation(String),
}

pub trait TimelineAdapter {
    /// Translate the adapter's editor-side state into a timeline model.
    fn adapt(&self) -> Result<TimelineModel, AdapterError>;
}
