// crates/framefuse-media/src/probe.rs
//
// In-process FFmpeg probing: duration, video dimensions, audio presence.
// Used by adapters filling in unknown source lengths and by the export
// driver when deciding whether the output MP4 carries an audio stream.

use std::path::Path;

use anyhow::{anyhow, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::media::Type;

/// Duration of the container in seconds, falling back to the best stream's
/// own duration when the container header does not carry one.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let ctx = input(path)?;

    let dur = ctx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
    if dur > 0.0 {
        return Ok(dur);
    }

    if let Some(stream) = ctx
        .streams()
        .best(Type::Video)
        .or_else(|| ctx.streams().best(Type::Audio))
    {
        let tb = stream.time_base();
        let d = stream.duration() as f64 * tb.numerator() as f64 / tb.denominator() as f64;
        if d > 0.0 {
            return Ok(d);
        }
    }

    Err(anyhow!("duration unknown for '{}'", path.display()))
}

/// Native width × height of the best video stream.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let ctx = input(path)?;
    let stream = ctx
        .streams()
        .best(Type::Video)
        .ok_or_else(|| anyhow!("no video stream in '{}'", path.display()))?;

    let (w, h) = unsafe {
        let p = stream.parameters().as_ptr();
        ((*p).width as u32, (*p).height as u32)
    };
    if w == 0 || h == 0 {
        return Err(anyhow!("video stream reports zero dimensions"));
    }
    Ok((w, h))
}

/// Whether `path` carries any audio stream at all.
pub fn probe_has_audio(path: &Path) -> Result<bool> {
    let ctx = input(path)?;
    Ok(ctx.streams().best(Type::Audio).is_some())
}
