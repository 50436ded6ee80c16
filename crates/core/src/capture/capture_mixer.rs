use crate::audio::domain::audio_router::AudioTap;
use crate::shared::constants::STALE_REPEAT_WARN_THRESHOLD;
use crate::shared::frame_surface::SurfaceHandle;

/// One sample on the composite stream, in presentation order.
#[derive(Clone, Debug)]
pub enum StreamSample {
    Video {
        /// Tight RGB24 pixel data.
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        timestamp: f64,
    },
    Audio {
        samples: Vec<f32>,
        timestamp: f64,
    },
}

impl StreamSample {
    pub fn timestamp(&self) -> f64 {
        match self {
            StreamSample::Video { timestamp, .. } => *timestamp,
            StreamSample::Audio { timestamp, .. } => *timestamp,
        }
    }
}

/// What the composite stream will carry, used for encoder negotiation.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSpec {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// `None` for a video-only capture.
    pub audio_sample_rate: Option<u32>,
}

/// A single media stream combining the upscaled destination surface with
/// the source's audio tap.
///
/// The stream is pulled, not pushed: the driver advances the playback
/// clock and calls `drain_until`, which emits video frames on a fixed
/// 1/fps cadence together with the audio covering each frame interval.
/// A destination whose generation has not advanced since the last sample
/// is captured again anyway (the capture never stalls on a slow renderer),
/// but a long run of repeats is logged once.
pub struct CompositeStream {
    destination: SurfaceHandle,
    tap: Option<AudioTap>,
    target_fps: f64,
    frames_emitted: u64,
    audio_position: f64,
    last_generation: u64,
    stale_repeats: u32,
    warned_stale: bool,
}

impl CompositeStream {
    /// Timestamp of the next video frame due. Computed from the frame
    /// index, not accumulated, so it matches `index / fps` exactly.
    fn next_video_ts(&self) -> f64 {
        self.frames_emitted as f64 / self.target_fps
    }

    /// Spec of the stream, once the destination is sized. `None` before.
    pub fn spec(&self) -> Option<StreamSpec> {
        let surface = self.destination.lock().unwrap();
        if !surface.is_sized() {
            return None;
        }
        Some(StreamSpec {
            width: surface.width(),
            height: surface.height(),
            frame_rate: self.target_fps,
            audio_sample_rate: self.tap.as_ref().map(|t| t.sample_rate),
        })
    }

    /// Emit every sample due up to and including `position` seconds of
    /// playback. Returns an empty vec while the destination is unsized.
    pub fn drain_until(&mut self, position: f64) -> Vec<StreamSample> {
        let mut samples = Vec::new();

        while self.next_video_ts() <= position {
            let frame_ts = self.next_video_ts();
            let (pixels, width, height, generation) = {
                let surface = self.destination.lock().unwrap();
                if !surface.is_sized() {
                    return samples;
                }
                (
                    surface.data().to_vec(),
                    surface.width(),
                    surface.height(),
                    surface.generation(),
                )
            };

            if generation == self.last_generation {
                self.stale_repeats += 1;
                if self.stale_repeats >= STALE_REPEAT_WARN_THRESHOLD && !self.warned_stale {
                    log::warn!(
                        "destination surface unchanged for {} captured frames",
                        self.stale_repeats
                    );
                    self.warned_stale = true;
                }
            } else {
                self.stale_repeats = 0;
                self.last_generation = generation;
            }

            if let Some(tap) = &self.tap {
                let block = tap.slice_between(self.audio_position, frame_ts);
                if !block.is_empty() {
                    samples.push(StreamSample::Audio {
                        samples: block.to_vec(),
                        timestamp: self.audio_position,
                    });
                }
                self.audio_position = frame_ts;
            }

            samples.push(StreamSample::Video {
                pixels,
                width,
                height,
                timestamp: frame_ts,
            });
            self.frames_emitted += 1;
        }

        samples
    }

    /// Emit the audio left between the last drained video frame and
    /// `position`, as one final block. Called once when the capture ends
    /// so the audio track covers the last frame's display interval.
    /// Returns nothing for a video-only stream or an already-drained tap.
    pub fn drain_tail(&mut self, position: f64) -> Vec<StreamSample> {
        let Some(tap) = &self.tap else {
            return Vec::new();
        };
        let block = tap.slice_between(self.audio_position, position);
        if block.is_empty() {
            return Vec::new();
        }
        let sample = StreamSample::Audio {
            samples: block.to_vec(),
            timestamp: self.audio_position,
        };
        self.audio_position = position;
        vec![sample]
    }
}

/// Composes capture streams from a destination surface and an audio tap.
pub struct CaptureMixer;

impl CaptureMixer {
    /// Combine the destination surface and the audio tap (when present)
    /// into one composite stream captured at `target_fps`.
    pub fn compose(
        destination: SurfaceHandle,
        tap: Option<AudioTap>,
        target_fps: f64,
    ) -> CompositeStream {
        CompositeStream {
            destination,
            tap,
            target_fps,
            frames_emitted: 0,
            audio_position: 0.0,
            last_generation: 0,
            stale_repeats: 0,
            warned_stale: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame_surface::surface_handle;

    fn sized_destination(width: u32, height: u32) -> SurfaceHandle {
        let handle = surface_handle();
        handle.lock().unwrap().size_once(width, height).unwrap();
        handle
    }

    fn video_count(samples: &[StreamSample]) -> usize {
        samples
            .iter()
            .filter(|s| matches!(s, StreamSample::Video { .. }))
            .count()
    }

    #[test]
    fn test_spec_none_before_sizing() {
        let stream = CaptureMixer::compose(surface_handle(), None, 30.0);
        assert!(stream.spec().is_none());
    }

    #[test]
    fn test_spec_reflects_surface_and_tap() {
        let dest = sized_destination(8, 4);
        let tap = AudioTap::new(vec![0.0; 480], 48_000);
        let stream = CaptureMixer::compose(dest, Some(tap), 24.0);
        assert_eq!(
            stream.spec(),
            Some(StreamSpec {
                width: 8,
                height: 4,
                frame_rate: 24.0,
                audio_sample_rate: Some(48_000),
            })
        );
    }

    #[test]
    fn test_drain_on_unsized_surface_emits_nothing() {
        let mut stream = CaptureMixer::compose(surface_handle(), None, 30.0);
        assert!(stream.drain_until(1.0).is_empty());
    }

    #[test]
    fn test_video_cadence_matches_target_fps() {
        let dest = sized_destination(2, 2);
        let mut stream = CaptureMixer::compose(dest, None, 10.0);
        // One second of playback at 10 fps: frames at 0.0, 0.1, ..., 1.0
        let samples = stream.drain_until(1.0);
        assert_eq!(video_count(&samples), 11);
        // Nothing more is due until the clock advances
        assert!(stream.drain_until(1.05).is_empty());
        assert_eq!(video_count(&stream.drain_until(1.15)), 1);
    }

    #[test]
    fn test_incremental_drains_do_not_duplicate_frames() {
        let dest = sized_destination(2, 2);
        let mut stream = CaptureMixer::compose(dest, None, 30.0);
        let mut total = 0;
        for step in 1..=30 {
            // Mid-interval positions keep the boundary comparisons unambiguous
            total += video_count(&stream.drain_until((step as f64 + 0.5) / 30.0));
        }
        // Frame 0.0 plus one per 1/30 step
        assert_eq!(total, 31);
    }

    #[test]
    fn test_audio_precedes_its_video_frame() {
        let dest = sized_destination(2, 2);
        let tap = AudioTap::new((0..1000).map(|i| i as f32).collect(), 100);
        let mut stream = CaptureMixer::compose(dest, Some(tap), 10.0);

        let samples = stream.drain_until(0.2);
        // t=0.0 has no audio window yet; t=0.1 and t=0.2 each get one block
        let kinds: Vec<bool> = samples
            .iter()
            .map(|s| matches!(s, StreamSample::Video { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false, true, false, true]);

        let blocks: Vec<usize> = samples
            .iter()
            .filter_map(|s| match s {
                StreamSample::Audio { samples, .. } => Some(samples.len()),
                _ => None,
            })
            .collect();
        assert_eq!(blocks, vec![10, 10]);
    }

    #[test]
    fn test_audio_blocks_tile_without_gap_or_overlap() {
        let dest = sized_destination(2, 2);
        let tap = AudioTap::new((0..300).map(|i| i as f32).collect(), 100);
        let mut stream = CaptureMixer::compose(dest, Some(tap), 10.0);

        let mut collected: Vec<f32> = Vec::new();
        for step in 0..=30 {
            for sample in stream.drain_until(step as f64 / 10.0) {
                if let StreamSample::Audio { samples, .. } = sample {
                    collected.extend_from_slice(&samples);
                }
            }
        }
        assert_eq!(collected.len(), 300);
        assert_eq!(collected[0], 0.0);
        assert_eq!(collected[299], 299.0);
    }

    #[test]
    fn test_drain_tail_emits_residual_audio_once() {
        let dest = sized_destination(2, 2);
        let tap = AudioTap::new((0..300).map(|i| i as f32).collect(), 100);
        let mut stream = CaptureMixer::compose(dest, Some(tap), 10.0);

        // Frames drained through t=0.2; their audio stops at 0.2
        stream.drain_until(0.2);
        let tail = stream.drain_tail(0.3);
        assert_eq!(tail.len(), 1);
        match &tail[0] {
            StreamSample::Audio { samples, timestamp } => {
                assert_eq!(samples.len(), 10);
                assert_eq!(samples[0], 20.0);
                assert_eq!(*timestamp, 0.2);
            }
            other => panic!("expected audio sample, got {other:?}"),
        }
        // The window is consumed; a second drain yields nothing
        assert!(stream.drain_tail(0.3).is_empty());
    }

    #[test]
    fn test_drain_tail_clamps_to_tap_and_skips_video_only() {
        let dest = sized_destination(2, 2);
        let mut video_only = CaptureMixer::compose(dest.clone(), None, 10.0);
        video_only.drain_until(0.5);
        assert!(video_only.drain_tail(0.6).is_empty());

        // 0.25 s of audio; a tail window past the buffer is clamped
        let tap = AudioTap::new((0..25).map(|i| i as f32).collect(), 100);
        let mut stream = CaptureMixer::compose(dest, Some(tap), 10.0);
        stream.drain_until(0.2);
        let tail = stream.drain_tail(0.3);
        match &tail[0] {
            StreamSample::Audio { samples, .. } => assert_eq!(samples.len(), 5),
            other => panic!("expected audio sample, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_surface_still_captures_and_counts_repeats() {
        let dest = sized_destination(2, 2);
        let mut stream = CaptureMixer::compose(dest.clone(), None, 10.0);

        let samples = stream.drain_until(0.5);
        assert_eq!(video_count(&samples), 6);
        assert!(stream.stale_repeats > 0);

        // A fresh write resets the repeat counter
        dest.lock().unwrap().write_pixels(&[1; 12]).unwrap();
        stream.drain_until(0.6);
        assert_eq!(stream.stale_repeats, 0);
    }

    #[test]
    fn test_captured_pixels_match_surface_contents() {
        let dest = sized_destination(2, 1);
        dest.lock().unwrap().write_pixels(&[9, 8, 7, 6, 5, 4]).unwrap();
        let mut stream = CaptureMixer::compose(dest, None, 30.0);

        let samples = stream.drain_until(0.0);
        match &samples[0] {
            StreamSample::Video {
                pixels,
                width,
                height,
                timestamp,
            } => {
                assert_eq!(pixels, &vec![9, 8, 7, 6, 5, 4]);
                assert_eq!((*width, *height), (2, 1));
                assert_eq!(*timestamp, 0.0);
            }
            other => panic!("expected video sample, got {other:?}"),
        }
    }
}
