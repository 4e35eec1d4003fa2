// crates/framefuse-engine/src/worker.rs
//
// ExportWorker: owns the export job threads and the progress/result
// channels, the control bus the embedding application talks to.
//
// One job runs at a time from a typical caller's perspective, but nothing
// here assumes that: each job gets its own cancel flag keyed by job id,
// registered BEFORE the thread spawns so a cancel arriving immediately
// after start_export can never miss its flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use uuid::Uuid;

use framefuse_core::effects::FrameProcessor;
use framefuse_core::{ExportError, ExportSettings, ProgressEvent, TimelineModel};

use crate::export::{run_export, ExportOutcome};
use crate::sink::ByteSink;

/// Terminal report for one export job.
pub struct ExportResult {
    pub job_id: Uuid,
    pub outcome: Result<ExportOutcome, ExportError>,
}

pub struct ExportWorker {
    /// Progress events from every running job. Fire-and-forget on the
    /// sending side: consumers that fall behind lose ticks, never stall
    /// the driver.
    pub progress_rx: Receiver<ProgressEvent>,
    progress_tx: Sender<ProgressEvent>,

    /// Terminal results, one per started job.
    pub results_rx: Receiver<ExportResult>,
    results_tx: Sender<ExportResult>,

    /// Per-job cancel flags. Entries are inserted by start_export and
    /// removed when the job thread finishes.
    cancels: Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl ExportWorker {
    pub fn new() -> ExportWorker {
        let (progress_tx, progress_rx) = bounded(512);
        let (results_tx, results_rx) = bounded(16);
        ExportWorker {
            progress_rx,
            progress_tx,
            results_rx,
            results_tx,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a background thread running the full export. The returned job
    /// id keys progress correlation and cancellation.
    pub fn start_export(
        &self,
        model: TimelineModel,
        settings: ExportSettings,
        mut sink: Box<dyn ByteSink>,
        extra_effects: Vec<Box<dyn FrameProcessor>>,
    ) -> Uuid {
        let job_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));

        // Register before spawning: no window where cancel_export can race
        // the thread's startup.
        self.cancels.lock().unwrap().insert(job_id, Arc::clone(&cancel));

        let progress_tx = self.progress_tx.clone();
        let results_tx = self.results_tx.clone();
        let cancels = Arc::clone(&self.cancels);

        thread::spawn(move || {
            let outcome = run_export(
                &model,
                &settings,
                sink.as_mut(),
                extra_effects,
                Arc::clone(&cancel),
                progress_tx,
            );
            cancels.lock().unwrap().remove(&job_id);
            let _ = results_tx.send(ExportResult { job_id, outcome });
        });

        job_id
    }

    /// Signal the job to stop at its next suspension point. The job thread
    /// reports `ExportError::Cancelled` through the results channel.
    pub fn cancel_export(&self, job_id: Uuid) {
        if let Some(flag) = self.cancels.lock().unwrap().get(&job_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Flip every active job's cancel flag (shutdown path).
    pub fn cancel_all(&self) {
        for flag in self.cancels.lock().unwrap().values() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

impl Default for ExportWorker {
    fn default() -> Self {
        ExportWorker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FastStart;
    use anyhow::Result;
    use framefuse_core::Stage;

    /// Sink that records whether anything was ever delivered.
    struct RecordingSink {
        delivered: Arc<AtomicBool>,
    }

    impl ByteSink for RecordingSink {
        fn fast_start(&self) -> FastStart {
            FastStart::Off
        }
        fn save_buffer(&mut self, _bytes: &[u8]) -> Result<String> {
            self.delivered.store(true, Ordering::Relaxed);
            Ok("recorded".into())
        }
    }

    fn empty_model() -> TimelineModel {
        TimelineModel {
            tracks: Vec::new(),
            duration: 1.0,
            canvas_width: 640,
            canvas_height: 360,
            fps: 30,
        }
    }

    #[test]
    fn invalid_timeline_fails_before_any_frame_and_delivers_nothing() {
        // empty track list is a validation offense: the job must end in a
        // Validation error without touching the sink
        let worker = ExportWorker::new();
        let delivered = Arc::new(AtomicBool::new(false));
        let job_id = worker.start_export(
            empty_model(),
            ExportSettings::default(),
            Box::new(RecordingSink { delivered: Arc::clone(&delivered) }),
            Vec::new(),
        );

        let result = worker
            .results_rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("job must report a result");
        assert_eq!(result.job_id, job_id);
        assert!(matches!(result.outcome, Err(ExportError::Validation(_))));
        assert!(!delivered.load(Ordering::Relaxed), "sink must not receive bytes");

        // the progress stream ends in an Error stage
        let mut saw_error = false;
        while let Ok(ev) = worker.progress_rx.try_recv() {
            if ev.stage == Stage::Error {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn cancel_unknown_job_is_a_no_op() {
        let worker = ExportWorker::new();
        worker.cancel_export(Uuid::new_v4());
        worker.cancel_all();
    }
}
