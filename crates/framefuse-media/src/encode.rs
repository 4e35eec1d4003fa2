// crates/framefuse-media/src/encode.rs
//
// H.264 + AAC MP4 encoder/muxer.
//
// Stream layout:
//   Stream 0 — H.264 video (YUV420P, bitrate from settings, preset fast)
//   Stream 1 — AAC audio (FLTP, rate/channels from settings), only present
//              when the timeline carries audio.
//
// PTS strategy:
//   Video: the driver's frame index in a 1/fps time base; the muxer rescales
//   to the stream time base. Keyframes are forced per frame via the frame's
//   picture type, which the encoder honors over its own GOP placement.
//   Audio: running sample counter in 1/sample_rate.
//
// Encoder selection: with hardware acceleration preferred, the well-known
// hardware H.264 encoder names are tried first and the software encoder is
// the silent (logged) fallback. Opening can fail even when the codec exists
// (no device, headless CI); that failure also falls back.
//
// Fast-start: when requested, the `movflags +faststart` muxer option makes
// libavformat rewrite the file on trailer write so the moov box leads.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Codec, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{output, Pixel, Sample};
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use framefuse_core::settings::ExportSettings;

use crate::audio::{layout_for, mask_for, PcmBuffer};

/// Hardware H.264 encoder names, in preference order.
const HW_ENCODERS: [&str; 3] = ["h264_videotoolbox", "h264_nvenc", "h264_qsv"];

/// Whether any H.264 encoder exists in this build at all.
pub fn h264_available() -> bool {
    encoder::find(CodecId::H264).is_some()
}

/// Counts of packets the muxer actually received, for the post-run
/// completeness check against the expected frame count.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodedStats {
    pub video_packets: u64,
    pub audio_packets: u64,
}

struct AudioEncState {
    encoder: ffmpeg::encoder::Audio,
    /// AAC frame size in samples (typically 1024).
    frame_size: usize,
    /// Next frame's PTS in samples.
    sample_idx: i64,
    audio_tb: Rational,
    ost_tb: Rational,
    channels: u16,
    rate: u32,
    packets: u64,
}

pub struct Mp4Encoder {
    path: PathBuf,
    octx: ffmpeg::format::context::Output,
    video: ffmpeg::encoder::video::Video,
    scaler: SwsContext,
    width: u32,
    height: u32,
    frame_tb: Rational,
    ost_video_tb: Rational,
    audio: Option<AudioEncState>,
    video_packets: u64,
}

impl Mp4Encoder {
    /// Set up the output container and encoders. `with_audio` controls
    /// whether stream 1 exists at all; a silent audio track is never
    /// written. `fast_start` asks the muxer to relocate the moov box to the
    /// front of the file on finalize.
    pub fn new(
        path: &Path,
        settings: &ExportSettings,
        with_audio: bool,
        fast_start: bool,
    ) -> Result<Mp4Encoder> {
        let (width, height) = settings.effective_size();
        // x264 requires even dimensions
        let width = (width & !1).max(2);
        let height = (height & !1).max(2);

        let mut octx = output(path)
            .map_err(|e| anyhow!("could not open output '{}': {e}", path.display()))?;

        // ── Video encoder (stream 0) ──────────────────────────────────────────
        let frame_tb = Rational::new(1, settings.fps as i32);
        let codec = pick_h264(settings.hardware_accel)?;

        let mut ost_video = octx.add_stream(codec).map_err(|e| anyhow!("add video stream: {e}"))?;
        ost_video.set_time_base(frame_tb);

        let video = open_video_encoder(codec, width, height, settings, frame_tb).or_else(|e| {
            // A hardware codec can exist but refuse to open (no device).
            // Retry once on the software encoder before giving up.
            let sw = encoder::find(CodecId::H264)
                .ok_or_else(|| anyhow!("no usable H.264 encoder configuration"))?;
            if codec.name() == sw.name() {
                return Err(e);
            }
            eprintln!("[export] {} failed to open ({e}), falling back to {}", codec.name(), sw.name());
            open_video_encoder(sw, width, height, settings, frame_tb)
        })?;

        // Copy encoder params into the stream's codecpar so the muxer knows
        // resolution, format and codec private data. encoder::Video does not
        // satisfy the parameter-copy trait bound, so this goes through FFI.
        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
                video.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(anyhow!("avcodec_parameters_from_context (video) failed: {ret}"));
            }
        }

        // ── Audio encoder (stream 1, optional) ────────────────────────────────
        let audio = if with_audio {
            let audio_tb = Rational::new(1, settings.sample_rate as i32);
            let aac = encoder::find(CodecId::AAC).ok_or_else(|| anyhow!("AAC encoder not found"))?;

            let mut ost_audio = octx.add_stream(aac).map_err(|e| anyhow!("add audio stream: {e}"))?;
            ost_audio.set_time_base(audio_tb);

            let enc_ctx = codec::context::Context::new_with_codec(aac);
            let mut enc = enc_ctx
                .encoder()
                .audio()
                .map_err(|e| anyhow!("create audio encoder context: {e}"))?;
            enc.set_rate(settings.sample_rate as i32);
            enc.set_ch_layout(layout_for(settings.channels));
            enc.set_format(Sample::F32(SampleType::Planar));
            enc.set_bit_rate(settings.audio_bitrate as usize);

            let opened = enc
                .open_as_with(aac, ffmpeg::Dictionary::new())
                .map_err(|e| anyhow!("open AAC encoder: {e}"))?;
            let frame_size = (opened.frame_size() as usize).max(1024);

            let ost_tb = octx.stream(1).ok_or_else(|| anyhow!("audio stream vanished"))?.time_base();

            unsafe {
                let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                    (**(*octx.as_mut_ptr()).streams.add(1)).codecpar,
                    opened.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
                );
                if ret < 0 {
                    return Err(anyhow!("avcodec_parameters_from_context (audio) failed: {ret}"));
                }
            }

            Some(AudioEncState {
                encoder: opened,
                frame_size,
                sample_idx: 0,
                audio_tb,
                ost_tb,
                channels: settings.channels,
                rate: settings.sample_rate,
                packets: 0,
            })
        } else {
            None
        };

        // RGBA surface bytes → YUV420P encoder frames, same dimensions.
        let scaler = SwsContext::get(
            Pixel::RGBA,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            Flags::BILINEAR,
        )?;

        // The movflags option lives on the muxer's private context; the
        // bindings expose no setter for it, so this goes through FFI like
        // the codecpar copies above.
        if fast_start {
            unsafe {
                let priv_data = (*octx.as_mut_ptr()).priv_data;
                if !priv_data.is_null() {
                    let ret = ffmpeg::ffi::av_opt_set(
                        priv_data,
                        c"movflags".as_ptr(),
                        c"+faststart".as_ptr(),
                        0,
                    );
                    if ret < 0 {
                        eprintln!("[export] faststart not applied (av_opt_set: {ret})");
                    }
                }
            }
        }

        octx.write_header().map_err(|e| anyhow!("write output header: {e}"))?;

        let ost_video_tb = octx.stream(0).ok_or_else(|| anyhow!("video stream vanished"))?.time_base();

        Ok(Mp4Encoder {
            path: path.to_path_buf(),
            octx,
            video,
            scaler,
            width,
            height,
            frame_tb,
            ost_video_tb,
            audio,
            video_packets: 0,
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.path
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode one rendered surface. `rgba` is packed `width × height × 4`;
    /// surfaces at the unrounded effective size are cropped by row copy.
    pub fn write_frame(&mut self, rgba: &[u8], src_w: u32, src_h: u32, frame_idx: i64, force_key: bool) -> Result<()> {
        if src_w < self.width || src_h < self.height {
            return Err(anyhow!("surface {src_w}x{src_h} smaller than output {}x{}", self.width, self.height));
        }

        let mut src = VideoFrame::new(Pixel::RGBA, self.width, self.height);
        {
            let stride = src.stride(0);
            let data = src.data_mut(0);
            let src_row = src_w as usize * 4;
            let row_bytes = self.width as usize * 4;
            for row in 0..self.height as usize {
                data[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&rgba[row * src_row..row * src_row + row_bytes]);
            }
        }

        let mut yuv = VideoFrame::empty();
        self.scaler.run(&src, &mut yuv).map_err(|e| anyhow!("scale frame {frame_idx}: {e}"))?;
        yuv.set_pts(Some(frame_idx));
        if force_key {
            yuv.set_kind(ffmpeg::picture::Type::I);
        }
        unsafe {
            (*yuv.as_mut_ptr()).sample_aspect_ratio = ffmpeg::ffi::AVRational { num: 1, den: 1 };
        }

        self.video
            .send_frame(&yuv)
            .map_err(|e| anyhow!("send frame {frame_idx} to encoder: {e}"))?;
        self.drain_video_packets()
    }

    fn drain_video_packets(&mut self) -> Result<()> {
        let mut pkt = Packet::empty();
        while self.video.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(self.frame_tb, self.ost_video_tb);
            pkt.write_interleaved(&mut self.octx)
                .map_err(|e| anyhow!("write video packet: {e}"))?;
            self.video_packets += 1;
        }
        Ok(())
    }

    /// Encode the whole mixed PCM bed in one pass: fixed-size AAC frames,
    /// final frame zero-padded, then the encoder flushed.
    pub fn encode_audio(&mut self, bed: &PcmBuffer) -> Result<()> {
        let state = self
            .audio
            .as_mut()
            .ok_or_else(|| anyhow!("encoder was opened without an audio stream"))?;
        if bed.rate != state.rate || bed.channel_count() != state.channels {
            return Err(anyhow!(
                "mix bed {}Hz/{}ch does not match encoder {}Hz/{}ch",
                bed.rate,
                bed.channel_count(),
                state.rate,
                state.channels
            ));
        }

        let total = bed.len();
        let n = state.frame_size;
        let mut pos = 0;
        while pos < total {
            let available = (total - pos).min(n);

            let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, mask_for(state.channels));
            frame.set_rate(state.rate);
            frame.set_pts(Some(state.sample_idx));
            unsafe {
                for c in 0..state.channels as usize {
                    let data = frame.data_mut(c);
                    let dst = std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut f32, n);
                    dst[..available].copy_from_slice(&bed.channels[c][pos..pos + available]);
                    if available < n {
                        dst[available..].fill(0.0);
                    }
                }
            }

            state
                .encoder
                .send_frame(&frame)
                .map_err(|e| anyhow!("send audio frame to encoder: {e}"))?;
            Self::drain_audio_packets(state, &mut self.octx)?;

            state.sample_idx += n as i64;
            pos += available;
        }

        state.encoder.send_eof().map_err(|e| anyhow!("send EOF to audio encoder: {e}"))?;
        Self::drain_audio_packets(state, &mut self.octx)
    }

    fn drain_audio_packets(
        state: &mut AudioEncState,
        octx: &mut ffmpeg::format::context::Output,
    ) -> Result<()> {
        let mut pkt = Packet::empty();
        while state.encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(1);
            pkt.rescale_ts(state.audio_tb, state.ost_tb);
            pkt.write_interleaved(octx)
                .map_err(|e| anyhow!("write audio packet: {e}"))?;
            state.packets += 1;
        }
        Ok(())
    }

    /// Flush the video encoder and finalize the container.
    pub fn finish(mut self) -> Result<EncodedStats> {
        self.video.send_eof().map_err(|e| anyhow!("send EOF to video encoder: {e}"))?;
        self.drain_video_packets()?;

        self.octx.write_trailer().map_err(|e| anyhow!("write trailer: {e}"))?;

        Ok(EncodedStats {
            video_packets: self.video_packets,
            audio_packets: self.audio.as_ref().map(|a| a.packets).unwrap_or(0),
        })
    }

    /// Abandon the output without writing a trailer. The partial file at
    /// `output_path()` is the caller's to remove.
    pub fn abort(self) {
        drop(self);
    }
}

/// Pick the H.264 encoder honoring the hardware preference.
fn pick_h264(hardware_accel: bool) -> Result<Codec> {
    if hardware_accel {
        for name in HW_ENCODERS {
            if let Some(c) = encoder::find_by_name(name) {
                eprintln!("[export] using hardware encoder {name}");
                return Ok(c);
            }
        }
        // Preference not satisfiable here; fall back without failing the run.
        eprintln!("[export] no hardware H.264 encoder available, falling back to software");
    }
    encoder::find(CodecId::H264).ok_or_else(|| anyhow!("no usable H.264 encoder configuration"))
}

fn open_video_encoder(
    codec: Codec,
    width: u32,
    height: u32,
    settings: &ExportSettings,
    frame_tb: Rational,
) -> Result<ffmpeg::encoder::video::Video> {
    let enc_ctx = codec::context::Context::new_with_codec(codec);
    let mut enc = enc_ctx
        .encoder()
        .video()
        .map_err(|e| anyhow!("create video encoder context: {e}"))?;

    enc.set_width(width);
    enc.set_height(height);
    enc.set_format(Pixel::YUV420P);
    enc.set_time_base(frame_tb);
    enc.set_frame_rate(Some(Rational::new(settings.fps as i32, 1)));
    enc.set_bit_rate(settings.video_bitrate as usize);

    let mut opts = ffmpeg::Dictionary::new();
    opts.set("preset", "fast");
    opts.set("profile", "high");

    let mut opened = enc
        .open_as_with(codec, opts)
        .map_err(|e| anyhow!("open {}: {e}", codec.name()))?;

    // Square pixels. Must be set on the OPENED context: libavcodec resets
    // sample_aspect_ratio during codec init, clobbering anything set before
    // the open, and the muxer reads it from the post-open context.
    opened.set_aspect_ratio(Rational::new(1, 1));
    Ok(opened)
}
