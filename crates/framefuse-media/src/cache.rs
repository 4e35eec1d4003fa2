// crates/framefuse-media/src/cache.rs
//
// MediaCache: one slot per media id, living for the whole export run.
//
//   image  — decoded RGBA at natural size (scaling happens at draw time)
//   video  — an open VideoSource, borrowed &mut for one seek+present cycle
//   pcm    — the fully decoded audio buffer consumed by the mixer
//
// Entries are created on first demand and never evicted; reopening or
// re-decoding mid-run costs far more than the memory the entries hold.
// URL byte sources are fetched once into a temp file that lives (and is
// deleted) with the cache.
//
// Load failures follow two policies:
//   asset load failure / load timeout → the id goes on a failed list and is
//     excluded for the REST OF THE RUN (one warning, no retry storm);
//   seek timeout inside frame_at      → the element is skipped for THIS
//     FRAME only; the decoder stays usable.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::NamedTempFile;

use framefuse_core::timeline::ByteSource;

use crate::audio::{decode_pcm, PcmBuffer};
use crate::decode::{SeekTimeout, VideoSource};
use crate::helpers::timeout::{run_with_deadline, Deadline};

/// Wall-time budget for opening a video asset (first touch).
pub const VIDEO_OPEN_DEADLINE: Duration = Duration::from_secs(15);
/// Wall-time budget for decoding an image asset.
pub const IMAGE_LOAD_DEADLINE: Duration = Duration::from_secs(5);

/// Decoded raster asset, straight-alpha RGBA8 at natural size.
#[derive(Clone)]
pub struct CachedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub struct MediaCache {
    /// Effective surface size; video decoders scale straight to it.
    out_w: u32,
    out_h: u32,
    images: HashMap<String, CachedImage>,
    videos: HashMap<String, VideoSource>,
    pcm: HashMap<String, PcmBuffer>,
    /// URL sources fetched to disk, keyed by media id. Temp files are
    /// removed when the cache drops.
    fetched: HashMap<String, NamedTempFile>,
    /// Visual assets excluded for the run.
    failed: HashSet<String>,
    /// Audio decode failures, tracked separately so a clip with broken audio
    /// still renders its video.
    failed_pcm: HashSet<String>,
}

impl MediaCache {
    pub fn new(out_w: u32, out_h: u32) -> MediaCache {
        MediaCache {
            out_w,
            out_h,
            images: HashMap::new(),
            videos: HashMap::new(),
            pcm: HashMap::new(),
            fetched: HashMap::new(),
            failed: HashSet::new(),
            failed_pcm: HashSet::new(),
        }
    }

    /// Pre-populate an image slot. Adapters with already-decoded assets (and
    /// tests) inject through here and skip the byte-source round trip.
    pub fn insert_image(&mut self, media_id: &str, image: CachedImage) {
        self.images.insert(media_id.into(), image);
    }

    /// Resolve a byte source to a local path, fetching URLs once.
    fn resolve_path(&mut self, media_id: &str, source: &ByteSource) -> Result<PathBuf> {
        match source {
            ByteSource::Path(p) => Ok(p.clone()),
            ByteSource::Url(url) => {
                if let Some(f) = self.fetched.get(media_id) {
                    return Ok(f.path().to_path_buf());
                }
                let response = ureq::get(url)
                    .call()
                    .map_err(|e| anyhow!("fetch '{url}': {e}"))?;
                let mut file = NamedTempFile::new()?;
                let mut reader = response.into_reader();
                std::io::copy(&mut reader, &mut file)?;
                file.flush()?;
                eprintln!("[cache] fetched {url} → {}", file.path().display());
                let path = file.path().to_path_buf();
                self.fetched.insert(media_id.into(), file);
                Ok(path)
            }
        }
    }

    /// Decoded image for `media_id`, loading on first demand with a 5 s
    /// deadline. None when the asset failed earlier in the run.
    pub fn image(&mut self, media_id: &str, source: &ByteSource) -> Option<&CachedImage> {
        if self.failed.contains(media_id) {
            return None;
        }
        if !self.images.contains_key(media_id) {
            let path = match self.resolve_path(media_id, source) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("[cache] image '{media_id}': {e} — excluded for this run");
                    self.failed.insert(media_id.into());
                    return None;
                }
            };
            let loaded = run_with_deadline(IMAGE_LOAD_DEADLINE, move || {
                image::open(&path).map(|img| {
                    let rgba = img.to_rgba8();
                    CachedImage {
                        width: rgba.width(),
                        height: rgba.height(),
                        data: rgba.into_raw(),
                    }
                })
            });
            match loaded {
                Deadline::Done(Ok(img)) => {
                    self.images.insert(media_id.into(), img);
                }
                Deadline::Done(Err(e)) => {
                    eprintln!("[cache] image '{media_id}' decode failed: {e} — excluded for this run");
                    self.failed.insert(media_id.into());
                    return None;
                }
                Deadline::TimedOut => {
                    eprintln!(
                        "[cache] image '{media_id}' load exceeded {}s — excluded for this run",
                        IMAGE_LOAD_DEADLINE.as_secs()
                    );
                    self.failed.insert(media_id.into());
                    return None;
                }
            }
        }
        self.images.get(media_id)
    }

    /// RGBA pixels of the source frame covering element-local time `tau`,
    /// scaled to the effective surface. None skips the element: for the run
    /// on load failure, for this frame only on seek timeout.
    pub fn video_frame(
        &mut self,
        media_id: &str,
        source: &ByteSource,
        tau: f64,
        fps_out: u32,
    ) -> Option<&[u8]> {
        if self.failed.contains(media_id) {
            return None;
        }

        if !self.videos.contains_key(media_id) {
            let path = match self.resolve_path(media_id, source) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("[cache] video '{media_id}': {e} — excluded for this run");
                    self.failed.insert(media_id.into());
                    return None;
                }
            };

            // Deadline gate on first touch: a cheap header probe on a worker
            // thread. The real open below stays on this thread (decoder
            // state is not moved across threads); a source that parses its
            // header in time opens in time.
            let gate_path = path.clone();
            let gate = run_with_deadline(VIDEO_OPEN_DEADLINE, move || {
                crate::probe::probe_dimensions(&gate_path).map(|_| ())
            });
            match gate {
                Deadline::Done(Ok(())) => {}
                Deadline::Done(Err(e)) => {
                    eprintln!("[cache] video '{media_id}' unreadable: {e} — excluded for this run");
                    self.failed.insert(media_id.into());
                    return None;
                }
                Deadline::TimedOut => {
                    eprintln!(
                        "[cache] video '{media_id}' open exceeded {}s — excluded for this run",
                        VIDEO_OPEN_DEADLINE.as_secs()
                    );
                    self.failed.insert(media_id.into());
                    return None;
                }
            }

            match VideoSource::open(&path, self.out_w, self.out_h) {
                Ok(vs) => {
                    self.videos.insert(media_id.into(), vs);
                }
                Err(e) => {
                    eprintln!("[cache] video '{media_id}' open failed: {e} — excluded for this run");
                    self.failed.insert(media_id.into());
                    return None;
                }
            }
        }

        let vs = self.videos.get_mut(media_id)?;
        match vs.position_at(tau, fps_out) {
            Ok(()) => self.videos.get(media_id).and_then(VideoSource::current_frame),
            Err(e) if e.is::<SeekTimeout>() => {
                eprintln!("[cache] video '{media_id}': {e} — skipping this frame");
                None
            }
            Err(e) => {
                eprintln!("[cache] video '{media_id}' decode failed: {e} — excluded for this run");
                self.failed.insert(media_id.into());
                None
            }
        }
    }

    /// Fully decoded PCM for `media_id`, decoding on first demand.
    pub fn pcm(&mut self, media_id: &str, source: &ByteSource) -> Option<&PcmBuffer> {
        if self.failed_pcm.contains(media_id) {
            return None;
        }
        if !self.pcm.contains_key(media_id) {
            let path = match self.resolve_path(media_id, source) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("[cache] audio '{media_id}': {e} — excluded from the mix");
                    self.failed_pcm.insert(media_id.into());
                    return None;
                }
            };
            match decode_pcm(&path) {
                Ok(buffer) => {
                    self.pcm.insert(media_id.into(), buffer);
                }
                Err(e) => {
                    eprintln!("[cache] audio '{media_id}' decode failed: {e} — excluded from the mix");
                    self.failed_pcm.insert(media_id.into());
                    return None;
                }
            }
        }
        self.pcm.get(media_id)
    }

    /// Pre-populate a PCM slot (tests, adapters with synthetic audio).
    pub fn insert_pcm(&mut self, media_id: &str, buffer: PcmBuffer) {
        self.pcm.insert(media_id.into(), buffer);
    }

    /// Release everything: images dropped, decoders closed, fetched temp
    /// files deleted. Dropping the cache does the same; this exists for the
    /// explicit teardown path (and its log line).
    pub fn dispose(self) {
        let videos = self.videos.len();
        let fetched = self.fetched.len();
        drop(self);
        eprintln!("[cache] disposed ({videos} decoder(s) closed, {fetched} temp file(s) removed)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_image_is_served_without_a_source() {
        let mut cache = MediaCache::new(640, 360);
        cache.insert_image(
            "img1",
            CachedImage { width: 2, height: 2, data: vec![255; 16] },
        );
        let img = cache
            .image("img1", &ByteSource::Path("unused.png".into()))
            .expect("injected image should be served");
        assert_eq!((img.width, img.height), (2, 2));
    }

    #[test]
    fn missing_file_marks_asset_failed_once() {
        let mut cache = MediaCache::new(64, 64);
        let source = ByteSource::Path("/nonexistent/definitely-missing.png".into());
        assert!(cache.image("gone", &source).is_none());
        // second lookup hits the failed list, not the filesystem
        assert!(cache.image("gone", &source).is_none());
        assert!(cache.failed.contains("gone"));
    }

    #[test]
    fn pcm_injection_feeds_the_mixer_path() {
        let mut cache = MediaCache::new(64, 64);
        cache.insert_pcm("tone", PcmBuffer::silent(48_000, 2, 480));
        let pcm = cache.pcm("tone", &ByteSource::Path("unused.wav".into())).unwrap();
        assert_eq!(pcm.len(), 480);
    }
}
