// crates/framefuse-media/src/lib.rs

pub mod audio;
pub mod cache;
pub mod decode;
pub mod encode;
pub mod probe;
mod helpers;   // internal — not pub, not re-exported

pub use audio::{decode_pcm, resample_pcm, PcmBuffer};
pub use cache::{CachedImage, MediaCache};
pub use decode::{plan_seek, SeekPlan, SeekTimeout, VideoSource};
pub use encode::{EncodedStats, Mp4Encoder};
