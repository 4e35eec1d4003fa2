// crates/framefuse-core/src/effects/mod.rs
//
// Frame post-processing pipeline.
//
// Three layers live here:
//
//   1. `FrameProcessor` trait — the algorithm contract. A processor receives
//      the composited surface by mutable reference and transforms it in
//      place. Processors are either parameterized, time-independent EFFECTS
//      (blur, brightness, color filter) or duration/progress-driven
//      TRANSITIONS (fade, slide, wipe).
//
//   2. `EffectPipeline` — the ordered list the frame renderer runs after
//      composition. Add / remove / reorder / list are NOT thread-safe; the
//      driver must be quiescent while the list is mutated.
//
//   3. Registry — `registry()` maps stable processor ids to default-parameter
//      factories. Track effect-id lists are resolved against it. Internal
//      and user processors share the same contract; extension is adding an
//      impl and registering it, nothing more.
//
// Failure policy: a processor that returns Err is skipped and logged; the
// surface passes through unchanged. A processor must preserve the surface
// dimensions and leave it well-defined on success.
//
// Adding a new built-in:
//   1. Create `my_effect.rs` in this folder, impl `FrameProcessor`.
//   2. Add `mod my_effect;` below and one line to `registry()`.
//   Done; validation and track resolution pick it up automatically.

mod blur;
mod brightness;
mod color_filter;
mod fade;
mod slide;
mod wipe;

pub use blur::Blur;
pub use brightness::Brightness;
pub use color_filter::ColorFilter;
pub use fade::{Fade, FadeMode};
pub use slide::{Slide, SlideDirection};
pub use wipe::{Wipe, WipeAxis};

use std::collections::HashMap;

use crate::settings::ExportSettings;
use crate::surface::Surface;

// ── Contract ──────────────────────────────────────────────────────────────────

/// Whether a processor is parameter-driven or progress-driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Time-independent, configured once (blur, brightness, color filter).
    Effect,
    /// Driven by a `[start, start + duration)` window on the timeline
    /// (fade, slide, wipe).
    Transition,
}

#[derive(thiserror::Error, Debug)]
#[error("processor '{id}': {reason}")]
pub struct ProcessError {
    pub id: String,
    pub reason: String,
}

impl ProcessError {
    pub fn new(id: &str, reason: impl Into<String>) -> ProcessError {
        ProcessError { id: id.into(), reason: reason.into() }
    }
}

/// Algorithm contract for all surface post-processors.
///
/// `process` runs once per frame, after element composition, at timeline
/// time `t`. It mutates the surface in place and must not change its
/// dimensions. All inner loops belong inside the impl; no per-pixel calls
/// back through the trait.
pub trait FrameProcessor: Send {
    /// Stable identifier used by track effect lists and the registry.
    fn id(&self) -> &'static str;

    fn kind(&self) -> ProcessorKind;

    fn process(
        &self,
        surface: &mut Surface,
        settings: &ExportSettings,
        t: f64,
    ) -> Result<(), ProcessError>;
}

// ── Shared transition math ────────────────────────────────────────────────────

/// Normalized progress of a transition window at time `t`: 0 before `start`,
/// 1 after `start + duration`, linear in between. A zero or negative
/// duration snaps to 1 at the start instant.
#[inline]
pub fn window_progress(t: f64, start: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        return if t >= start { 1.0 } else { 0.0 };
    }
    (((t - start) / duration).clamp(0.0, 1.0)) as f32
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Ordered list of processors run over the surface each frame.
#[derive(Default)]
pub struct EffectPipeline {
    processors: Vec<Box<dyn FrameProcessor>>,
}

impl EffectPipeline {
    pub fn new() -> EffectPipeline {
        EffectPipeline { processors: Vec::new() }
    }

    pub fn add(&mut self, processor: Box<dyn FrameProcessor>) {
        self.processors.push(processor);
    }

    /// Remove the first processor with the given id. Returns whether one was
    /// removed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.processors.iter().position(|p| p.id() == id) {
            Some(i) => {
                self.processors.remove(i);
                true
            }
            None => false,
        }
    }

    /// Move the first processor with the given id to `index` (clamped).
    /// Returns whether the processor was found.
    pub fn reorder(&mut self, id: &str, index: usize) -> bool {
        match self.processors.iter().position(|p| p.id() == id) {
            Some(from) => {
                let p = self.processors.remove(from);
                let to = index.min(self.processors.len());
                self.processors.insert(to, p);
                true
            }
            None => false,
        }
    }

    /// Processor ids in run order.
    pub fn list(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor in order. A failing processor is skipped and its
    /// error logged; the surface proceeds unchanged into the next stage.
    /// Returns the number of processors skipped this frame.
    pub fn run(&self, surface: &mut Surface, settings: &ExportSettings, t: f64) -> usize {
        let mut skipped = 0;
        for p in &self.processors {
            if let Err(e) = p.process(surface, settings, t) {
                eprintln!("[fx] skipped at t={t:.3}: {e}");
                skipped += 1;
            }
        }
        skipped
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Default-parameter factories for the built-in processor set, keyed by
/// stable id. Cheap to build; call sites that only need the id list use
/// `builtin_ids()`.
pub fn registry() -> HashMap<&'static str, fn() -> Box<dyn FrameProcessor>> {
    let entries: Vec<(&'static str, fn() -> Box<dyn FrameProcessor>)> = vec![
        ("blur", || Box::new(Blur::default())),
        ("brightness", || Box::new(Brightness::default())),
        ("color-filter", || Box::new(ColorFilter::default())),
        ("fade", || Box::new(Fade::default())),
        ("slide", || Box::new(Slide::default())),
        ("wipe", || Box::new(Wipe::default())),
    ];
    entries.into_iter().collect()
}

/// Ids of every built-in processor, for validation of track effect lists.
pub fn builtin_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = registry().into_keys().collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::color::Color;

    struct Tag(&'static str);

    impl FrameProcessor for Tag {
        fn id(&self) -> &'static str {
            self.0
        }
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Effect
        }
        fn process(&self, _: &mut Surface, _: &ExportSettings, _: f64) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    struct Failing;

    impl FrameProcessor for Failing {
        fn id(&self) -> &'static str {
            "failing"
        }
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Effect
        }
        fn process(&self, _: &mut Surface, _: &ExportSettings, _: f64) -> Result<(), ProcessError> {
            Err(ProcessError::new("failing", "always fails"))
        }
    }

    #[test]
    fn empty_pipeline_leaves_surface_untouched() {
        let mut s = Surface::new(4, 4);
        s.clear(Color { r: 7, g: 8, b: 9 });
        let before = s.data().to_vec();
        EffectPipeline::new().run(&mut s, &ExportSettings::default(), 0.5);
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn failing_processor_is_skipped_surface_unchanged() {
        let mut pipeline = EffectPipeline::new();
        pipeline.add(Box::new(Failing));

        let mut s = Surface::new(4, 4);
        s.clear(Color::WHITE);
        let before = s.data().to_vec();
        let skipped = pipeline.run(&mut s, &ExportSettings::default(), 0.0);
        assert_eq!(skipped, 1);
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn reorder_and_remove_by_id() {
        let mut p = EffectPipeline::new();
        p.add(Box::new(Tag("a")));
        p.add(Box::new(Tag("b")));
        p.add(Box::new(Tag("c")));
        assert_eq!(p.list(), vec!["a", "b", "c"]);

        assert!(p.reorder("c", 0));
        assert_eq!(p.list(), vec!["c", "a", "b"]);

        assert!(p.remove("a"));
        assert_eq!(p.list(), vec!["c", "b"]);

        assert!(!p.remove("nope"));
        assert!(!p.reorder("nope", 0));
    }

    #[test]
    fn registry_covers_the_closed_builtin_set() {
        let ids = builtin_ids();
        for id in ["blur", "brightness", "color-filter", "fade", "slide", "wipe"] {
            assert!(ids.contains(&id), "missing builtin '{id}'");
        }
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn window_progress_clamps_and_snaps() {
        assert_eq!(window_progress(0.0, 1.0, 2.0), 0.0);
        assert_eq!(window_progress(2.0, 1.0, 2.0), 0.5);
        assert_eq!(window_progress(9.0, 1.0, 2.0), 1.0);
        // degenerate window snaps at the start instant
        assert_eq!(window_progress(1.0, 1.0, 0.0), 1.0);
        assert_eq!(window_progress(0.9, 1.0, 0.0), 0.0);
    }
}
