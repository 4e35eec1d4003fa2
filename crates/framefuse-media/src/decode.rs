// crates/framefuse-media/src/decode.rs
//
// VideoSource: stateful per-media-id video decoder.
//
// One VideoSource lives in the media cache per media id and survives the
// whole export run. Opening and seeking dominate decode cost; per-element
// or per-frame reopen causes catastrophic slowdown on long clips, so the
// decoder trades resident memory for longevity.
//
// Presentation contract: `frame_at(τ, fps_out)` returns the RGBA pixels of
// the source frame whose presentation interval covers τ, scaled to the
// output surface size. Three paths, picked by `plan_seek`:
//
//   Reuse         — the current frame's PTS is within one output-frame
//                   period of τ; present it again.
//   DecodeForward — τ is slightly ahead; decode forward from the current
//                   position (the same frames a keyframe-aligned seek would
//                   visit, minus the seek).
//   Reseek        — backward motion or a large forward jump; backward-seek
//                   to the keyframe at or before τ, flush the decoder, then
//                   decode forward to τ.
//
// Any single positioning call is bounded by SEEK_DEADLINE wall time. On
// timeout the caller skips the element for this frame and the decoder is
// left where it stopped; the next frame's call re-plans from there.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};

/// Wall-time budget for one seek+decode-forward cycle.
pub const SEEK_DEADLINE: Duration = Duration::from_millis(1000);

/// Forward gap beyond which re-seeking beats decoding through the gap.
const FORWARD_WINDOW_SECS: f64 = 2.0;

/// Marker error for a positioning cycle that exceeded its deadline.
/// Callers downgrade it to a per-frame skip rather than a run failure.
#[derive(Debug)]
pub struct SeekTimeout {
    pub target_secs: f64,
}

impl std::fmt::Display for SeekTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seek to {:.3}s exceeded {}ms", self.target_secs, SEEK_DEADLINE.as_millis())
    }
}

impl std::error::Error for SeekTimeout {}

// ── Seek planning ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekPlan {
    Reuse,
    DecodeForward,
    Reseek,
}

/// Decide how to reach source time `tau` given the currently decoded frame's
/// time. Pure so the policy is testable without a decoder.
pub fn plan_seek(current_secs: Option<f64>, tau: f64, fps_out: u32) -> SeekPlan {
    let period = 1.0 / fps_out.max(1) as f64;
    match current_secs {
        None => SeekPlan::Reseek,
        Some(cur) if (tau - cur).abs() <= period => SeekPlan::Reuse,
        Some(cur) if tau < cur => SeekPlan::Reseek,
        Some(cur) if tau - cur > FORWARD_WINDOW_SECS => SeekPlan::Reseek,
        Some(_) => SeekPlan::DecodeForward,
    }
}

// ── VideoSource ───────────────────────────────────────────────────────────────

pub struct VideoSource {
    pub path: PathBuf,
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::video::Video,
    video_idx: usize,
    tb_num: i32,
    tb_den: i32,
    out_w: u32,
    out_h: u32,
    scaler: SwsContext,
    /// PTS (stream time base) of `current`, if a frame has been decoded.
    current_pts: Option<i64>,
    /// Destriped RGBA pixels of the most recently decoded frame.
    current: Option<Vec<u8>>,
}

impl VideoSource {
    /// Open `path` and configure scaling straight to the output surface size,
    /// so presentation is a plain copy with no per-frame resampling beyond
    /// the one swscale pass.
    pub fn open(path: &Path, out_w: u32, out_h: u32) -> Result<VideoSource> {
        let ictx = input(path)?;
        let video_idx = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| anyhow!("no video stream in '{}'", path.display()))?
            .index();

        let (tb_num, tb_den) = {
            let stream = ictx.stream(video_idx).ok_or_else(|| anyhow!("stream vanished"))?;
            let tb = stream.time_base();
            (tb.numerator(), tb.denominator())
        };

        // Second context for decoder construction: Parameters borrows from
        // the stream, which borrows ictx.
        let ictx2 = input(path)?;
        let stream2 = ictx2.stream(video_idx).ok_or_else(|| anyhow!("stream vanished"))?;
        let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
        let decoder = dec_ctx.decoder().video()?;

        let scaler = SwsContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGBA,
            out_w.max(2),
            out_h.max(2),
            Flags::BILINEAR,
        )?;

        Ok(VideoSource {
            path: path.to_path_buf(),
            ictx,
            decoder,
            video_idx,
            tb_num,
            tb_den,
            out_w: out_w.max(2),
            out_h: out_h.max(2),
            scaler,
            current_pts: None,
            current: None,
        })
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.out_w, self.out_h)
    }

    pub fn pts_to_secs(&self, pts: i64) -> f64 {
        pts as f64 * self.tb_num as f64 / self.tb_den as f64
    }

    fn current_secs(&self) -> Option<f64> {
        self.current_pts.map(|p| self.pts_to_secs(p))
    }

    /// Position the decoder on the frame covering source time `tau`; the
    /// pixels are then available through `current_frame()`.
    ///
    /// Fails with `SeekTimeout` inside the error chain when the positioning
    /// cycle blows its wall-time budget.
    pub fn position_at(&mut self, tau: f64, fps_out: u32) -> Result<()> {
        match plan_seek(self.current_secs(), tau, fps_out) {
            SeekPlan::Reuse => {}
            SeekPlan::DecodeForward => {
                self.decode_until(tau, fps_out, Instant::now() + SEEK_DEADLINE)?;
            }
            SeekPlan::Reseek => {
                crate::helpers::seek::seek_to_secs(&mut self.ictx, tau, "position_at");
                self.decoder.flush();
                self.current_pts = None;
                self.decode_until(tau, fps_out, Instant::now() + SEEK_DEADLINE)?;
            }
        }
        if self.current.is_none() {
            return Err(anyhow!("no frame decoded at {tau:.3}s in '{}'", self.path.display()));
        }
        Ok(())
    }

    /// Destriped RGBA pixels (`out_w × out_h × 4`) of the frame the decoder
    /// currently presents, if any.
    pub fn current_frame(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }

    /// Decode forward until a frame at or past `tau` (minus one output-frame
    /// period of tolerance) is in hand, or EOF, or the deadline passes.
    ///
    /// Pre-roll frames after a backward keyframe seek are decoded and
    /// discarded here; the last one seen is kept so an EOF before the target
    /// (asking for the final frame of a clip) still presents something.
    ///
    /// Only disjoint fields are touched inside the packet loop; the demuxer
    /// iterator holds `self.ictx` for its whole extent.
    fn decode_until(&mut self, tau: f64, fps_out: u32, deadline: Instant) -> Result<()> {
        let tolerance = 1.0 / fps_out.max(1) as f64;
        let tick = self.tb_num as f64 / self.tb_den as f64;
        let video_idx = self.video_idx;
        let (out_w, out_h) = (self.out_w as usize, self.out_h as usize);

        for item in self.ictx.packets() {
            if Instant::now() > deadline {
                return Err(anyhow::Error::new(SeekTimeout { target_secs: tau }));
            }
            let (stream, packet) = match item {
                Ok(pair) => pair,
                Err(_) => break, // demux error → treat as EOF, fall back to last frame
            };
            if stream.index() != video_idx {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or_else(|| self.current_pts.unwrap_or(0) + 1);

                // Scale and destripe into the presentation slot.
                let mut out = ffmpeg::util::frame::video::Video::empty();
                if self.scaler.run(&decoded, &mut out).is_err() {
                    continue;
                }
                let stride = out.stride(0);
                let raw = out.data(0);
                let row_bytes = out_w * 4;
                let data: Vec<u8> = (0..out_h)
                    .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
                    .copied()
                    .collect();
                self.current = Some(data);
                self.current_pts = Some(pts);

                if pts as f64 * tick >= tau - tolerance {
                    return Ok(());
                }
            }
        }

        // EOF before reaching tau: current holds the last decoded frame.
        if self.current.is_some() {
            Ok(())
        } else {
            Err(anyhow!("EOF with no decodable frame before {tau:.3}s"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_current_frame_forces_reseek() {
        assert_eq!(plan_seek(None, 3.0, 30), SeekPlan::Reseek);
    }

    #[test]
    fn within_one_period_reuses() {
        // 30 fps → period 33.3 ms
        assert_eq!(plan_seek(Some(2.000), 2.010, 30), SeekPlan::Reuse);
        assert_eq!(plan_seek(Some(2.010), 2.000, 30), SeekPlan::Reuse);
        assert_eq!(plan_seek(Some(2.0), 2.0, 30), SeekPlan::Reuse);
    }

    #[test]
    fn backward_motion_reseeks() {
        assert_eq!(plan_seek(Some(5.0), 1.0, 30), SeekPlan::Reseek);
    }

    #[test]
    fn short_forward_gap_decodes_through() {
        assert_eq!(plan_seek(Some(2.0), 2.5, 30), SeekPlan::DecodeForward);
        assert_eq!(plan_seek(Some(2.0), 3.9, 30), SeekPlan::DecodeForward);
    }

    #[test]
    fn long_forward_jump_reseeks() {
        assert_eq!(plan_seek(Some(2.0), 10.0, 30), SeekPlan::Reseek);
    }

    #[test]
    fn period_scales_with_output_rate() {
        // at 10 fps a 60 ms gap is still within one period
        assert_eq!(plan_seek(Some(2.0), 2.06, 10), SeekPlan::Reuse);
        // at 60 fps the same gap needs decoding
        assert_eq!(plan_seek(Some(2.0), 2.06, 60), SeekPlan::DecodeForward);
    }
}
