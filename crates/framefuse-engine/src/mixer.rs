// crates/framefuse-engine/src/mixer.rs
//
// The audio mixer: one planar f32 PCM bed covering the whole timeline at
// the output rate and channel count.
//
// Per audio-bearing element: decode the source fully at its native rate
// (cached by media id), resample when the rates differ, then accumulate
// into the bed at the element's sample offset with the leading/trailing
// trims applied. Every addition hard-clamps to [−1, 1]: deterministic
// clipping, no limiter.
//
// Channel discipline: source channel c feeds output channel c for
// c < min(src, out). Output channels beyond the source's count are left
// untouched by that element (they still receive other elements' sums).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framefuse_core::helpers::time::{sample_count, sample_offset};
use framefuse_core::timeline::{ElementKind, TimelineModel};
use framefuse_core::{ExportError, ExportSettings};
use framefuse_media::{resample_pcm, MediaCache, PcmBuffer};

/// Accumulate `src` into `bed` in timeline sample space.
///
/// `start_time` positions the element on the timeline; `trim_start` and
/// `trim_end` are seconds cut from the source's own ends. All offsets floor
/// to sample indices at the bed's rate; writes past the bed's end are
/// dropped.
pub fn mix_into(bed: &mut PcmBuffer, src: &PcmBuffer, start_time: f64, trim_start: f64, trim_end: f64) {
    let rate = bed.rate;
    let offset = sample_offset(start_time, rate);
    let trim_start_s = sample_offset(trim_start, rate);
    let trim_end_s = sample_offset(trim_end, rate);

    let src_len = src.len();
    let effective = src_len.saturating_sub(trim_start_s + trim_end_s);
    let bed_len = bed.len();
    let channels = (src.channel_count().min(bed.channel_count())) as usize;

    for c in 0..channels {
        let src_plane = &src.channels[c];
        let bed_plane = &mut bed.channels[c];
        for i in 0..effective {
            let out_idx = offset + i;
            if out_idx >= bed_len {
                break;
            }
            let sum = bed_plane[out_idx] + src_plane[trim_start_s + i];
            bed_plane[out_idx] = sum.clamp(-1.0, 1.0);
        }
    }
}

/// Build the mixed bed for the timeline, or None when no audio-bearing
/// element exists. Cancellation is observed before each element's decode.
pub fn mix_timeline(
    model: &TimelineModel,
    settings: &ExportSettings,
    cache: &mut MediaCache,
    cancel: &Arc<AtomicBool>,
) -> Result<Option<PcmBuffer>, ExportError> {
    if !model.has_audio() {
        return Ok(None);
    }

    let rate = settings.sample_rate;
    let total = sample_count(model.duration, rate);
    let mut bed = PcmBuffer::silent(rate, settings.channels, total);

    for track in model.tracks.iter().filter(|t| !t.muted) {
        for element in &track.elements {
            if !element.bears_audio() {
                continue;
            }
            if cancel.load(Ordering::Relaxed) {
                return Err(ExportError::Cancelled);
            }

            let ElementKind::Media(media) = &element.kind else { continue };
            // Decode failures were logged by the cache; the element is
            // simply absent from the mix.
            let Some(pcm) = cache.pcm(&media.media_id, &media.source) else {
                continue;
            };

            if pcm.rate == rate {
                mix_into(&mut bed, pcm, element.start_time, element.trim_start, element.trim_end);
            } else {
                match resample_pcm(pcm, rate) {
                    Ok(resampled) => mix_into(
                        &mut bed,
                        &resampled,
                        element.start_time,
                        element.trim_start,
                        element.trim_end,
                    ),
                    Err(e) => {
                        eprintln!("[mix] '{}' resample failed: {e} — excluded from the mix", media.media_id);
                    }
                }
            }
        }
    }

    Ok(Some(bed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use framefuse_core::timeline::{
        BlendMode, ByteSource, Element, MediaElement, MediaKind, Track, TrackKind,
    };
    use uuid::Uuid;

    fn sine(rate: u32, channels: u16, duration: f64, freq: f64, amplitude: f32) -> PcmBuffer {
        let n = (duration * rate as f64).ceil() as usize;
        let plane: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f64 / rate as f64;
                (amplitude as f64 * (std::f64::consts::TAU * freq * t).sin()) as f32
            })
            .collect();
        PcmBuffer { rate, channels: vec![plane; channels as usize] }
    }

    fn audio_element(media_id: &str, start: f64, duration: f64) -> Element {
        Element {
            id: Uuid::new_v4(),
            start_time: start,
            duration,
            trim_start: 0.0,
            trim_end: 0.0,
            opacity: 1.0,
            blend: BlendMode::SourceOver,
            kind: ElementKind::Media(MediaElement {
                media_id: media_id.into(),
                kind: MediaKind::Audio,
                source: ByteSource::Path("unused.wav".into()),
                natural_width: None,
                natural_height: None,
            }),
        }
    }

    fn audio_model(elements: Vec<Element>) -> TimelineModel {
        let mut m = TimelineModel {
            tracks: vec![Track {
                id: Uuid::new_v4(),
                name: "a1".into(),
                kind: TrackKind::Audio,
                muted: false,
                opacity: None,
                blend: None,
                elements,
                effect_ids: Vec::new(),
            }],
            duration: 0.0,
            canvas_width: 640,
            canvas_height: 360,
            fps: 30,
        };
        m.duration = m.computed_duration();
        m
    }

    #[test]
    fn overlapping_sines_sum_and_stay_in_range() {
        // clip A at 0.0, clip B at 0.5, both 1 s of 1 kHz sine at 48 kHz:
        // bed is 72000 samples; [24000, 48000) carries the summed region
        let mut cache = MediaCache::new(64, 64);
        cache.insert_pcm("a", sine(48_000, 2, 1.0, 1000.0, 0.8));
        cache.insert_pcm("b", sine(48_000, 2, 1.0, 1000.0, 0.8));

        let model = audio_model(vec![
            audio_element("a", 0.0, 1.0),
            audio_element("b", 0.5, 1.0),
        ]);
        let settings = ExportSettings {
            sample_rate: 48_000,
            channels: 2,
            ..Default::default()
        };
        let cancel = Arc::new(AtomicBool::new(false));

        let bed = mix_timeline(&model, &settings, &mut cache, &cancel)
            .unwrap()
            .expect("model has audio");
        assert_eq!(bed.len(), 72_000);
        assert_eq!(bed.channel_count(), 2);

        // every sample clamped
        for plane in &bed.channels {
            assert!(plane.iter().all(|s| (-1.0..=1.0).contains(s)));
        }

        // in-phase overlap region sums (and clips where 1.6 > 1.0)
        let a = sine(48_000, 1, 1.0, 1000.0, 0.8);
        let mut clipped = 0usize;
        for i in 0..24_000 {
            let expected = (a.channels[0][24_000 + i] + a.channels[0][i]).clamp(-1.0, 1.0);
            let got = bed.channels[0][24_000 + i];
            assert!((got - expected).abs() < 1e-6, "mismatch at {i}: {got} vs {expected}");
            if expected.abs() == 1.0 {
                clipped += 1;
            }
        }
        assert!(clipped > 0, "0.8 + 0.8 sine overlap must clip somewhere");

        // tail region is clip B alone
        for i in 60_000..72_000 {
            let expected = a.channels[0][i - 24_000];
            assert!((bed.channels[0][i] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn bed_length_is_ceil_duration_times_rate() {
        let mut cache = MediaCache::new(64, 64);
        cache.insert_pcm("a", sine(48_000, 1, 0.25, 440.0, 0.5));
        let model = audio_model(vec![audio_element("a", 0.0, 0.25)]);
        let settings = ExportSettings { sample_rate: 44_100, channels: 2, ..Default::default() };
        let cancel = Arc::new(AtomicBool::new(false));
        let bed = mix_timeline(&model, &settings, &mut cache, &cancel).unwrap().unwrap();
        assert_eq!(bed.len(), (0.25_f64 * 44_100.0).ceil() as usize);
    }

    #[test]
    fn trims_shift_the_source_window() {
        let mut bed = PcmBuffer::silent(10, 1, 20);
        let src = PcmBuffer { rate: 10, channels: vec![(0..10).map(|i| i as f32 / 10.0).collect()] };
        // trim 0.2 s (2 samples) off the front, 0.1 s (1 sample) off the back
        mix_into(&mut bed, &src, 0.5, 0.2, 0.1);
        // offset = 5, effective = 10 − 2 − 1 = 7, source window starts at 2
        assert_eq!(bed.channels[0][5], 0.2);
        assert_eq!(bed.channels[0][11], 0.8);
        assert_eq!(bed.channels[0][12], 0.0, "trimmed tail does not land");
        assert_eq!(bed.channels[0][4], 0.0);
    }

    #[test]
    fn mono_source_leaves_second_channel_untouched() {
        let mut bed = PcmBuffer::silent(10, 2, 10);
        let src = PcmBuffer { rate: 10, channels: vec![vec![0.5; 5]] };
        mix_into(&mut bed, &src, 0.0, 0.0, 0.0);
        assert!(bed.channels[0][..5].iter().all(|&s| s == 0.5));
        assert!(bed.channels[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn writes_past_the_bed_end_are_dropped() {
        let mut bed = PcmBuffer::silent(10, 1, 10);
        let src = PcmBuffer { rate: 10, channels: vec![vec![0.25; 10]] };
        mix_into(&mut bed, &src, 0.7, 0.0, 0.0);
        // offset 7: only 3 samples land
        assert_eq!(bed.channels[0][7], 0.25);
        assert_eq!(bed.channels[0][9], 0.25);
        assert_eq!(bed.len(), 10);
    }

    #[test]
    fn no_audio_elements_means_no_bed() {
        let model = audio_model(vec![]);
        let settings = ExportSettings::default();
        let mut cache = MediaCache::new(64, 64);
        let cancel = Arc::new(AtomicBool::new(false));
        assert!(mix_timeline(&model, &settings, &mut cache, &cancel).unwrap().is_none());
    }

    #[test]
    fn cancellation_is_observed_before_decode() {
        let mut cache = MediaCache::new(64, 64);
        cache.insert_pcm("a", sine(48_000, 2, 1.0, 440.0, 0.5));
        let model = audio_model(vec![audio_element("a", 0.0, 1.0)]);
        let settings = ExportSettings::default();
        let cancel = Arc::new(AtomicBool::new(true));
        assert!(matches!(
            mix_timeline(&model, &settings, &mut cache, &cancel),
            Err(ExportError::Cancelled)
        ));
    }
}
