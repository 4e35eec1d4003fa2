// crates/framefuse-engine/src/sink.rs
//
// Byte-sink contract: where the finished MP4 goes is not this crate's
// business. The driver consults `fast_start` before encoding (the muxer
// must know up front) and hands the final bytes to `save_buffer` exactly
// once per successful run.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Whether the sink wants a fast-start MP4 (moov box leading the file).
/// In-memory sinks and progressive-download targets do; plain file sinks
/// may skip the rewrite pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastStart {
    InMemory,
    Off,
}

pub trait ByteSink: Send {
    fn fast_start(&self) -> FastStart;

    /// Commit the finished MP4. Returns a human-readable location string
    /// (a path, a URL, a download id) for progress/result reporting.
    fn save_buffer(&mut self, bytes: &[u8]) -> Result<String>;
}

/// Reference sink: write the MP4 to a filesystem path.
pub struct FileSink {
    path: PathBuf,
    fast_start: FastStart,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> FileSink {
        FileSink { path: path.into(), fast_start: FastStart::Off }
    }

    pub fn with_fast_start(mut self) -> FileSink {
        self.fast_start = FastStart::InMemory;
        self
    }
}

impl ByteSink for FileSink {
    fn fast_start(&self) -> FastStart {
        self.fast_start
    }

    fn save_buffer(&mut self, bytes: &[u8]) -> Result<String> {
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("write {} bytes to {}", bytes.len(), self.path.display()))?;
        Ok(self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_round_trips_bytes() {
        let path = std::env::temp_dir().join(format!("framefuse_sink_test_{}.bin", uuid::Uuid::new_v4()));
        let mut sink = FileSink::new(&path);
        assert_eq!(sink.fast_start(), FastStart::Off);

        let location = sink.save_buffer(&[1, 2, 3, 4]).unwrap();
        assert_eq!(location, path.display().to_string());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fast_start_flag_is_opt_in() {
        let sink = FileSink::new("out.mp4").with_fast_start();
        assert_eq!(sink.fast_start(), FastStart::InMemory);
    }
}
