// crates/framefuse-engine/src/lib.rs

pub mod adapter;
pub mod context;
pub mod export;
pub mod frame;
pub mod mixer;
pub mod renderers;
pub mod sink;
pub mod text;
pub mod worker;

pub use adapter::{AdapterError, TimelineAdapter};
pub use export::{run_export, ExportOutcome};
pub use frame::FrameRenderer;
pub use mixer::{mix_into, mix_timeline};
pub use sink::{ByteSink, FastStart, FileSink};
pub use worker::ExportWorker;

pub use framefuse_core::{validate, validate_with_effects, ExportError, ExportSettings, TimelineModel};
