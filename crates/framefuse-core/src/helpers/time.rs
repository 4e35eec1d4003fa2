// crates/framefuse-core/src/helpers/time.rs
//
// Frame and sample arithmetic shared by the frame renderer, the audio mixer
// and the encoder driver.
//
// All conversions from continuous seconds to discrete indices are fixed here
// so that every consumer agrees on rounding. The rules:
//
//   frame k      →  t_k = k / fps            (exact, f64)
//   PTS of k     →  floor(k · 1e6 / fps) µs  (integer floor)
//   frame count  →  N = ceil(duration · fps); the driver emits frames 0..=N
//   sample index →  floor(t · rate)          (offsets, trims)
//   sample count →  ceil(duration · rate)    (buffer lengths)

/// Presentation timestamp of frame `k` in microseconds.
///
/// ```
/// use framefuse_core::helpers::time::frame_pts_us;
/// assert_eq!(frame_pts_us(0, 30),  0);
/// assert_eq!(frame_pts_us(1, 30),  33_333);
/// assert_eq!(frame_pts_us(30, 30), 1_000_000);
/// ```
#[inline]
pub fn frame_pts_us(k: u64, fps: u32) -> i64 {
    (k as i64 * 1_000_000) / fps as i64
}

/// Duration of one output frame in microseconds.
#[inline]
pub fn frame_duration_us(fps: u32) -> i64 {
    1_000_000 / fps as i64
}

/// Timeline timestamp of frame `k` in seconds.
#[inline]
pub fn frame_time(k: u64, fps: u32) -> f64 {
    k as f64 / fps as f64
}

/// Last frame index for a timeline of `duration` seconds.
///
/// The driver loop runs `0..=frame_count(..)`, so the emitted frame total is
/// `frame_count(..) + 1`. A timeline shorter than one frame period still
/// yields two frames (k = 0 and k = 1).
///
/// ```
/// use framefuse_core::helpers::time::frame_count;
/// assert_eq!(frame_count(2.0, 30),  60);
/// assert_eq!(frame_count(0.01, 30), 1);
/// ```
#[inline]
pub fn frame_count(duration: f64, fps: u32) -> u64 {
    (duration * fps as f64).ceil() as u64
}

/// Whether frame `k` must be encoded as a forced keyframe.
///
/// Cadence is one IDR every 3 seconds, giving sub-3-second seek points and
/// bounded error propagation in the output stream.
#[inline]
pub fn is_keyframe(k: u64, fps: u32) -> bool {
    k % (3 * fps as u64) == 0
}

/// Sample index corresponding to timeline (or source) time `t`.
#[inline]
pub fn sample_offset(t: f64, rate: u32) -> usize {
    (t * rate as f64).floor().max(0.0) as usize
}

/// Number of samples covering `duration` seconds at `rate`.
#[inline]
pub fn sample_count(duration: f64, rate: u32) -> usize {
    (duration * rate as f64).ceil().max(0.0) as usize
}
