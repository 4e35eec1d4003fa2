// crates/framefuse-engine/src/export.rs
//
// The encoder driver: the loop that turns a pinned timeline + settings into
// one MP4 handed to the byte-sink.
//
// Shape of a run:
//
//   validate → pick encoders → spawn the encoder thread → for k in 0..=N:
//   render, queue frame → mix audio, queue bed → finish → deliver bytes.
//
// The driver itself is single-threaded and cooperative. The one helper
// thread consumes rendered frames from a BOUNDED channel of capacity 5;
// when the encoder falls behind, the driver's send blocks, which is the
// whole backpressure story (the channel is the rate limiter). Frames enter
// the queue in index order and are encoded in arrival order, so encoded
// packets leave in strictly increasing PTS.
//
// Cancellation is observed before every frame, while blocked on the queue,
// and before every mixer decode. A cancelled run closes the encoders,
// removes the partial output and reports Cancelled; nothing reaches the
// sink.
//
// Frame fallback: if a frame's composition panics, the driver substitutes
// a background-filled surface with the same timestamp, so every index in
// 0..=N is emitted exactly once no matter what a renderer does.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use uuid::Uuid;

use framefuse_core::effects::{builtin_ids, registry, EffectPipeline, FrameProcessor};
use framefuse_core::helpers::time::{frame_count, frame_time, is_keyframe};
use framefuse_core::{
    validate_with_effects, ExportError, ExportSettings, ProgressEvent, Stage, TimelineModel,
};
use framefuse_media::{EncodedStats, MediaCache, Mp4Encoder, PcmBuffer};

use crate::frame::FrameRenderer;
use crate::mixer::mix_timeline;
use crate::sink::{ByteSink, FastStart};
use crate::text::FontLibrary;

/// Encoder queue depth: how many rendered frames may be in flight before
/// the renderer blocks.
const ENCODER_QUEUE: usize = 5;

/// Poll interval while blocked on the encoder queue; cancellation is
/// re-checked every tick.
const QUEUE_POLL: Duration = Duration::from_millis(50);

/// Progress cadence in frames.
const PROGRESS_INTERVAL: u64 = 10;

pub struct ExportOutcome {
    /// Human-readable location returned by the byte-sink.
    pub location: String,
    /// Frames rendered and queued (always N + 1 on success).
    pub frames: u64,
    pub stats: EncodedStats,
}

enum EncMsg {
    Frame { data: Vec<u8>, width: u32, height: u32, idx: i64, key: bool },
    Audio(PcmBuffer),
    Finish,
}

/// Run a full export. Blocking; call from a worker thread (see
/// `ExportWorker`). Progress delivery is fire-and-forget: a full channel
/// drops events rather than stalling the run.
pub fn run_export(
    model: &TimelineModel,
    settings: &ExportSettings,
    sink: &mut dyn ByteSink,
    extra_effects: Vec<Box<dyn FrameProcessor>>,
    cancel: Arc<AtomicBool>,
    progress: Sender<ProgressEvent>,
) -> Result<ExportOutcome, ExportError> {
    let total_frames = frame_count(model.duration, settings.fps) + 1;
    let emit = |ev: ProgressEvent| {
        let _ = progress.try_send(ev);
    };
    emit(ProgressEvent::stage(Stage::Initializing, total_frames));

    // ── Validation, up-front and fatal ────────────────────────────────────────
    let mut known: Vec<&str> = builtin_ids();
    let extra_ids: Vec<&'static str> = extra_effects.iter().map(|p| p.id()).collect();
    known.extend(&extra_ids);
    let offenses = validate_with_effects(model, settings, Some(&known));
    if !offenses.is_empty() {
        emit(error_event(total_frames, 0.0, format!("validation failed: {} offense(s)", offenses.len())));
        return Err(ExportError::Validation(offenses));
    }

    if !framefuse_media::encode::h264_available() {
        emit(error_event(total_frames, 0.0, "no usable H.264 encoder".into()));
        return Err(ExportError::Unsupported);
    }

    // ── Effect pipeline: track-referenced processors, then caller extras ──────
    let factories = registry();
    let mut pipeline = EffectPipeline::new();
    for track in &model.tracks {
        for id in &track.effect_ids {
            if let Some(make) = factories.get(id.as_str()) {
                pipeline.add(make());
            }
        }
    }
    for processor in extra_effects {
        pipeline.add(processor);
    }

    // ── Renderer, cache, encoder thread ───────────────────────────────────────
    let mut renderer = FrameRenderer::new(settings, FontLibrary::with_system_fonts());
    let (eff_w, eff_h) = renderer.effective_size();
    let mut cache = MediaCache::new(eff_w, eff_h);

    let with_audio = model.has_audio();
    let fast_start = sink.fast_start() == FastStart::InMemory;
    let out_path = std::env::temp_dir().join(format!("framefuse_{}.mp4", Uuid::new_v4()));

    let (frame_tx, frame_rx) = bounded::<EncMsg>(ENCODER_QUEUE);
    let (result_tx, result_rx) = bounded::<Result<EncodedStats, String>>(1);
    let enc_settings = settings.clone();
    let enc_path = out_path.clone();
    let encoder_thread = thread::spawn(move || {
        let mut encoder = match Mp4Encoder::new(&enc_path, &enc_settings, with_audio, fast_start) {
            Ok(enc) => enc,
            Err(e) => {
                let _ = result_tx.send(Err(format!("encoder setup: {e}")));
                return;
            }
        };
        loop {
            match frame_rx.recv() {
                Ok(EncMsg::Frame { data, width, height, idx, key }) => {
                    if let Err(e) = encoder.write_frame(&data, width, height, idx, key) {
                        let _ = result_tx.send(Err(format!("encode frame {idx}: {e}")));
                        return;
                    }
                }
                Ok(EncMsg::Audio(bed)) => {
                    if let Err(e) = encoder.encode_audio(&bed) {
                        let _ = result_tx.send(Err(format!("encode audio: {e}")));
                        return;
                    }
                }
                Ok(EncMsg::Finish) => break,
                Err(_) => {
                    // Driver dropped the channel without Finish: cancelled
                    // or failed upstream. Abandon the partial output.
                    encoder.abort();
                    let _ = result_tx.send(Err("encoder aborted".into()));
                    return;
                }
            }
        }
        match encoder.finish() {
            Ok(stats) => {
                let _ = result_tx.send(Ok(stats));
            }
            Err(e) => {
                let _ = result_tx.send(Err(format!("finalize: {e}")));
            }
        }
    });

    // ── Frame loop ────────────────────────────────────────────────────────────
    let n = total_frames - 1; // loop runs 0..=n
    let started = Instant::now();
    let mut last_pct = 0.0f32;
    emit(ProgressEvent::stage(Stage::Processing, total_frames));

    for k in 0..=n {
        if cancel.load(Ordering::Relaxed) {
            drop(frame_tx);
            let _ = encoder_thread.join();
            discard_run(&out_path, cache, &progress, total_frames, last_pct, "export cancelled");
            return Err(ExportError::Cancelled);
        }

        let t = frame_time(k, settings.fps);

        // A panicking renderer must not cost the frame: fall back to a
        // background-filled surface at the same timestamp.
        let data = {
            let composed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                renderer.render(model, settings, &mut cache, &pipeline, t).data().to_vec()
            }));
            match composed {
                Ok(d) => d,
                Err(_) => {
                    eprintln!("[export] frame {k} composition panicked, emitting background frame");
                    renderer.render_fallback().data().to_vec()
                }
            }
        };

        let mut msg = EncMsg::Frame {
            data,
            width: eff_w,
            height: eff_h,
            idx: k as i64,
            key: is_keyframe(k, settings.fps),
        };
        // Blocking send with a cancellation-aware poll: waiting here IS the
        // backpressure on the encoder queue.
        loop {
            match frame_tx.send_timeout(msg, QUEUE_POLL) {
                Ok(()) => break,
                Err(crossbeam_channel::SendTimeoutError::Timeout(returned)) => {
                    if cancel.load(Ordering::Relaxed) {
                        drop(returned);
                        drop(frame_tx);
                        let _ = encoder_thread.join();
                        discard_run(&out_path, cache, &progress, total_frames, last_pct, "export cancelled");
                        return Err(ExportError::Cancelled);
                    }
                    msg = returned;
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    // Encoder thread died; surface its reported error.
                    let detail = result_rx
                        .recv_timeout(Duration::from_secs(5))
                        .map(|r| r.err().unwrap_or_else(|| "unknown encoder failure".into()))
                        .unwrap_or_else(|_| "encoder thread vanished".into());
                    let _ = encoder_thread.join();
                    discard_run(&out_path, cache, &progress, total_frames, last_pct, &detail);
                    return Err(ExportError::Encoder(detail));
                }
            }
        }

        if k % PROGRESS_INTERVAL == 0 || k == n {
            let elapsed = started.elapsed().as_secs_f64();
            let (eta, speed) = if k > 0 && elapsed > 0.0 {
                (
                    Some(elapsed / k as f64 * (n - k) as f64),
                    Some((k as f64 / elapsed) as f32),
                )
            } else {
                (None, None)
            };
            last_pct = (k as f32 / n.max(1) as f32) * 100.0;
            emit(ProgressEvent {
                current_frame: k,
                total_frames,
                percentage: last_pct,
                stage: Stage::Processing,
                estimated_remaining: eta,
                render_speed: speed,
                message: None,
            });
        }
    }

    // ── Audio pass + finalize ─────────────────────────────────────────────────
    emit(ProgressEvent::stage(Stage::Finalizing, total_frames));

    if with_audio {
        match mix_timeline(model, settings, &mut cache, &cancel) {
            Ok(Some(bed)) => {
                if frame_tx.send(EncMsg::Audio(bed)).is_err() {
                    let detail = "encoder thread died before audio".to_string();
                    let _ = encoder_thread.join();
                    discard_run(&out_path, cache, &progress, total_frames, last_pct, &detail);
                    return Err(ExportError::Encoder(detail));
                }
            }
            Ok(None) => {}
            Err(e) => {
                drop(frame_tx);
                let _ = encoder_thread.join();
                discard_run(&out_path, cache, &progress, total_frames, last_pct, "export cancelled");
                return Err(e);
            }
        }
    }

    let _ = frame_tx.send(EncMsg::Finish);
    drop(frame_tx);

    let stats = match result_rx.recv_timeout(Duration::from_secs(300)) {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            let _ = encoder_thread.join();
            discard_run(&out_path, cache, &progress, total_frames, last_pct, &e);
            return Err(ExportError::Encoder(e));
        }
        Err(_) => {
            let detail = "encoder finalize timed out".to_string();
            let _ = encoder_thread.join();
            discard_run(&out_path, cache, &progress, total_frames, last_pct, &detail);
            return Err(ExportError::Encoder(detail));
        }
    };
    let _ = encoder_thread.join();

    // Completeness check: recorded, never fatal; finalize already ran.
    if stats.video_packets != total_frames {
        let note = format!(
            "encoded chunk count {} does not match expected {total_frames}",
            stats.video_packets
        );
        eprintln!("[export] {note}");
        emit(ProgressEvent {
            current_frame: n,
            total_frames,
            percentage: 100.0,
            stage: Stage::Finalizing,
            estimated_remaining: None,
            render_speed: None,
            message: Some(note),
        });
    }

    // ── Deliver to the byte-sink ──────────────────────────────────────────────
    let bytes = match std::fs::read(&out_path) {
        Ok(b) => b,
        Err(e) => {
            let detail = format!("read encoded output: {e}");
            discard_run(&out_path, cache, &progress, total_frames, last_pct, &detail);
            return Err(ExportError::Encoder(detail));
        }
    };
    let _ = std::fs::remove_file(&out_path);

    let location = match sink.save_buffer(&bytes) {
        Ok(location) => location,
        Err(e) => {
            emit(error_event(total_frames, last_pct, format!("sink: {e}")));
            cache.dispose();
            return Err(ExportError::Sink(e.to_string()));
        }
    };

    cache.dispose();
    emit(ProgressEvent::stage(Stage::Complete, total_frames));
    eprintln!("[export] {} frame(s) → {location} ({} bytes)", total_frames, bytes.len());

    Ok(ExportOutcome { location, frames: total_frames, stats })
}

/// Teardown for every unsuccessful exit after the encoder thread started:
/// discard the partial file, release the cache, report the error stage.
fn discard_run(
    out_path: &Path,
    cache: MediaCache,
    progress: &Sender<ProgressEvent>,
    total_frames: u64,
    last_pct: f32,
    reason: &str,
) {
    let _ = std::fs::remove_file(out_path);
    cache.dispose();
    let _ = progress.try_send(error_event(total_frames, last_pct, reason.into()));
}

/// Error-stage event carrying the last reported percentage so progress
/// stays non-decreasing even on the failure path.
fn error_event(total_frames: u64, last_pct: f32, message: String) -> ProgressEvent {
    ProgressEvent {
        current_frame: 0,
        total_frames,
        percentage: last_pct,
        stage: Stage::Error,
        estimated_remaining: None,
        render_speed: None,
        message: Some(message),
    }
}
