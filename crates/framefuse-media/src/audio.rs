// crates/framefuse-media/src/audio.rs
//
// Full-file audio decode and resampling for the mixer.
//
// Every audio-bearing source is decoded ONCE into a planar f32 buffer at its
// native sample rate; the mixer then resamples to the output rate when the
// rates differ and accumulates into the timeline bed. Planar storage keeps
// the mixer's per-channel accumulation loop branch-free.

use std::path::Path;

use anyhow::{anyhow, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::media::Type;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;

/// Planar f32 PCM. `channels[c][i]` is sample i of channel c; all channel
/// vectors have equal length.
#[derive(Clone, Debug, Default)]
pub struct PcmBuffer {
    pub rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Allocate a zeroed (silent) buffer.
    pub fn silent(rate: u32, channels: u16, samples: usize) -> PcmBuffer {
        PcmBuffer {
            rate,
            channels: vec![vec![0.0; samples]; channels as usize],
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn duration_secs(&self) -> f64 {
        if self.rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.rate as f64
    }
}

/// Standard layout for a plain channel count.
pub(crate) fn layout_for(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        n => ChannelLayout::default_for_channels(n as u32),
    }
}

/// Standard layout mask for a plain channel count (frame construction).
pub(crate) fn mask_for(channels: u16) -> ChannelLayoutMask {
    match channels {
        1 => ChannelLayoutMask::MONO,
        2 => ChannelLayoutMask::STEREO,
        3 => ChannelLayoutMask::SURROUND,
        4 => ChannelLayoutMask::QUAD,
        5 => ChannelLayoutMask::_5POINT0,
        6 => ChannelLayoutMask::_5POINT1,
        7 => ChannelLayoutMask::_6POINT1,
        _ => ChannelLayoutMask::_7POINT1,
    }
}

/// Append one FLTP frame's planes onto the buffer.
fn push_planar(buf: &mut PcmBuffer, frame: &AudioFrame) {
    let n = frame.samples();
    if n == 0 {
        return;
    }
    let ch = buf.channels.len();
    unsafe {
        for c in 0..ch {
            let bytes = frame.data(c);
            let samples = std::slice::from_raw_parts(bytes.as_ptr() as *const f32, n);
            buf.channels[c].extend_from_slice(samples);
        }
    }
}

/// Decode the whole best audio stream of `path` into planar f32 at the
/// source's native sample rate and channel count.
pub fn decode_pcm(path: &Path) -> Result<PcmBuffer> {
    let mut ictx = input(path)?;
    let audio_idx = ictx
        .streams()
        .best(Type::Audio)
        .ok_or_else(|| anyhow!("no audio stream in '{}'", path.display()))?
        .index();

    let ictx2 = input(path)?;
    let stream2 = ictx2.stream(audio_idx).ok_or_else(|| anyhow!("stream vanished"))?;
    let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
    let mut decoder = dec_ctx.decoder().audio()?;

    let target_fmt = Sample::F32(SampleType::Planar);
    let mut resampler: Option<resampling::Context> = None;
    let mut out = PcmBuffer { rate: 0, channels: Vec::new() };

    let ingest = |raw: &AudioFrame,
                      resampler: &mut Option<resampling::Context>,
                      out: &mut PcmBuffer|
     -> Result<()> {
        if out.channels.is_empty() {
            let ch = raw.ch_layout().channels().max(1) as usize;
            out.rate = raw.rate();
            out.channels = vec![Vec::new(); ch];
        }

        if raw.format() == target_fmt {
            push_planar(out, raw);
            return Ok(());
        }

        // Format conversion only: same rate, same channel count. Built
        // lazily because the real input format is unknown until the first
        // decoded frame.
        let ch = out.channel_count();
        let rs = match resampler {
            Some(rs) => rs,
            None => {
                let src_layout = if raw.ch_layout().channels() >= 2 {
                    raw.ch_layout()
                } else {
                    ChannelLayout::MONO
                };
                *resampler = Some(resampling::Context::get2(
                    raw.format(),
                    src_layout,
                    raw.rate(),
                    target_fmt,
                    layout_for(ch),
                    raw.rate(),
                )?);
                resampler.as_mut().unwrap()
            }
        };
        let mut converted = AudioFrame::empty();
        if rs.run(raw, &mut converted).is_ok() && converted.samples() > 0 {
            push_planar(out, &converted);
        }
        Ok(())
    };

    for item in ictx.packets() {
        let (stream, packet) = item.map_err(|e| anyhow!("read packet: {e}"))?;
        if stream.index() != audio_idx {
            continue;
        }
        // A bad packet should not abort the whole decode.
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut raw = AudioFrame::empty();
        while decoder.receive_frame(&mut raw).is_ok() {
            ingest(&raw, &mut resampler, &mut out)?;
        }
    }

    // Drain frames the codec held back.
    let _ = decoder.send_eof();
    let mut raw = AudioFrame::empty();
    while decoder.receive_frame(&mut raw).is_ok() {
        ingest(&raw, &mut resampler, &mut out)?;
    }

    if out.is_empty() {
        return Err(anyhow!("'{}' decoded to zero audio samples", path.display()));
    }
    Ok(out)
}

/// Resample `src` to `out_rate`, preserving the channel count.
///
/// The output length is pinned to `ceil(duration · out_rate)` exactly:
/// resampler tails are flushed and the result padded or truncated to that
/// count, so mixer offset math never drifts with swresample's internal
/// buffering.
pub fn resample_pcm(src: &PcmBuffer, out_rate: u32) -> Result<PcmBuffer> {
    if src.rate == out_rate {
        return Ok(src.clone());
    }
    if src.is_empty() {
        return Ok(PcmBuffer { rate: out_rate, channels: vec![Vec::new(); src.channels.len()] });
    }

    let ch = src.channel_count();
    let fmt = Sample::F32(SampleType::Planar);
    let mut rs = resampling::Context::get2(
        fmt,
        layout_for(ch),
        src.rate,
        fmt,
        layout_for(ch),
        out_rate,
    )?;

    let expected = (src.duration_secs() * out_rate as f64).ceil() as usize;
    let mut out = PcmBuffer { rate: out_rate, channels: vec![Vec::new(); ch as usize] };

    const CHUNK: usize = 4096;
    let total = src.len();
    let mut pos = 0;
    while pos < total {
        let n = CHUNK.min(total - pos);
        let mut frame = AudioFrame::new(fmt, n, mask_for(ch));
        frame.set_rate(src.rate);
        unsafe {
            for c in 0..ch as usize {
                let data = frame.data_mut(c);
                let dst = std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut f32, n);
                dst.copy_from_slice(&src.channels[c][pos..pos + n]);
            }
        }

        let mut converted = AudioFrame::empty();
        rs.run(&frame, &mut converted)?;
        if converted.samples() > 0 {
            push_planar(&mut out, &converted);
        }
        pos += n;
    }

    // Flush the resampler's tail until it runs dry.
    loop {
        let mut tail = AudioFrame::empty();
        rs.flush(&mut tail)?;
        if tail.samples() == 0 {
            break;
        }
        push_planar(&mut out, &tail);
    }

    for plane in &mut out.channels {
        plane.resize(expected, 0.0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_buffer_shape() {
        let b = PcmBuffer::silent(48_000, 2, 1000);
        assert_eq!(b.channel_count(), 2);
        assert_eq!(b.len(), 1000);
        assert!(b.channels.iter().all(|c| c.iter().all(|&s| s == 0.0)));
    }

    #[test]
    fn duration_from_rate_and_length() {
        let b = PcmBuffer::silent(44_100, 1, 44_100);
        assert!((b.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_rate_resample_is_a_copy() {
        let mut b = PcmBuffer::silent(48_000, 2, 64);
        b.channels[0][10] = 0.5;
        let r = resample_pcm(&b, 48_000).unwrap();
        assert_eq!(r.channels[0][10], 0.5);
        assert_eq!(r.len(), 64);
    }
}
