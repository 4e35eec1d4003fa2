// crates/framefuse-core/src/progress.rs
//
// Types that flow over the progress channel from the export driver to its
// consumers. Plain data, fire-and-forget delivery; a slow consumer must
// never be able to stall the driver.

use serde::{Deserialize, Serialize};

/// Export lifecycle stage. Transitions only move forward:
/// Initializing → Processing → Finalizing → Complete, with Error reachable
/// from any of the first three.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Initializing,
    Processing,
    Finalizing,
    Complete,
    Error,
}

impl Stage {
    /// Ordering rank used to assert forward-only transitions.
    pub fn rank(self) -> u8 {
        match self {
            Stage::Initializing => 0,
            Stage::Processing => 1,
            Stage::Finalizing => 2,
            Stage::Complete => 3,
            Stage::Error => 4,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if next == Stage::Error {
            // Error is terminal and reachable from anywhere except Complete.
            return self != Stage::Complete;
        }
        next.rank() >= self.rank()
    }
}

/// Periodic progress report. Emitted at least every 10 frames during
/// processing and at every stage transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current_frame: u64,
    pub total_frames: u64,
    /// 0.0–100.0, non-decreasing over a run.
    pub percentage: f32,
    pub stage: Stage,
    /// Seconds, `elapsed / k · (N − k)`. Absent before the first frame lands.
    pub estimated_remaining: Option<f64>,
    /// Frames per second of wall time.
    pub render_speed: Option<f32>,
    /// Human-readable detail; set on Error and on warnings worth surfacing.
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Stage-transition event with no frame statistics attached.
    pub fn stage(stage: Stage, total_frames: u64) -> ProgressEvent {
        ProgressEvent {
            current_frame: 0,
            total_frames,
            percentage: match stage {
                Stage::Complete => 100.0,
                _ => 0.0,
            },
            stage,
            estimated_remaining: None,
            render_speed: None,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_move_forward() {
        assert!(Stage::Initializing.can_advance_to(Stage::Processing));
        assert!(Stage::Processing.can_advance_to(Stage::Finalizing));
        assert!(Stage::Finalizing.can_advance_to(Stage::Complete));
        assert!(!Stage::Processing.can_advance_to(Stage::Initializing));
        assert!(!Stage::Complete.can_advance_to(Stage::Processing));
    }

    #[test]
    fn error_reachable_from_live_stages_only() {
        assert!(Stage::Initializing.can_advance_to(Stage::Error));
        assert!(Stage::Processing.can_advance_to(Stage::Error));
        assert!(Stage::Finalizing.can_advance_to(Stage::Error));
        assert!(!Stage::Complete.can_advance_to(Stage::Error));
    }

    #[test]
    fn complete_event_reads_one_hundred_percent() {
        let ev = ProgressEvent::stage(Stage::Complete, 61);
        assert_eq!(ev.percentage, 100.0);
    }
}
