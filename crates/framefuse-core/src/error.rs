// crates/framefuse-core/src/error.rs
//
// The export error taxonomy. Fatal conditions only; per-element and
// per-processor failures during the frame loop are logged and skipped, never
// surfaced through this type.

use crate::validate::ValidationError;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// No acceptable H.264 encoder configuration exists in this environment.
    #[error("no usable H.264 encoder configuration")]
    Unsupported,

    /// Structural problems in the timeline or settings. Reported up-front;
    /// nothing was rendered.
    #[error("timeline validation failed with {} offense(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The encoder failed mid-run. Terminal; the partial output is discarded.
    #[error("encoder failure: {0}")]
    Encoder(String),

    /// The run was cancelled through the control bus. Distinct from timeout
    /// and failure; no output is delivered.
    #[error("export cancelled")]
    Cancelled,

    /// The byte-sink rejected the finished MP4.
    #[error("byte sink failure: {0}")]
    Sink(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_counts_offenses() {
        let err = ExportError::Validation(vec![ValidationError::EmptyTimeline]);
        assert_eq!(err.to_string(), "timeline validation failed with 1 offense(s)");
    }

    #[test]
    fn cancellation_is_its_own_variant() {
        assert!(matches!(ExportError::Cancelled, ExportError::Cancelled));
        assert_ne!(ExportError::Cancelled.to_string(), ExportError::Unsupported.to_string());
    }
}
