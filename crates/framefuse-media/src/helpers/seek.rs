// crates/framefuse-media/src/helpers/seek.rs
//
// Demuxer seek wrapper with consistent soft-fail behaviour.
//
// Background:
//   On Windows, `avformat_seek_file` returns EPERM in certain conditions,
//   notably when called with max_ts=0 on a freshly-opened context, and on
//   container formats without random access. Rather than duplicating the
//   guard + log pattern at every call site, all demuxer seeks route through
//   here. The caller decides whether a failed seek is fatal; usually it is
//   not, because the PTS filter downstream discards pre-roll frames anyway.
//
// The seek is BACKWARD (`..=ts`): it lands on the keyframe at or before the
// target. A forward seek would land on the keyframe after the target, and
// every source frame between the target and that keyframe would be missing
// from the decode stream. Pre-roll frames from the backward landing point
// are decoded and discarded by the caller's PTS filter, so the first frame
// presented is still the one covering the target.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to `target_secs` from the start of the file.
///
/// Returns `true` when the seek succeeded or was skipped because the target
/// is 0 (the demuxer already sits at the start, and seeking to 0 is the
/// EPERM case). Returns `false` on failure; the demuxer then decodes from
/// its current position.
pub fn seek_to_secs(
    ictx: &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label: &str,
) -> bool {
    if target_secs <= 0.0 {
        return true;
    }

    let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            eprintln!(
                "[seek] soft-fail in {label} at {target_secs:.3}s: {e} \
                 — decoding from current position"
            );
            false
        }
    }
}
