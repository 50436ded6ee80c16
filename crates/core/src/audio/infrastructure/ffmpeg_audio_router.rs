use std::path::PathBuf;

use crate::audio::domain::audio_router::{AudioRouter, AudioTap};

/// Decodes the source's audio track with ffmpeg-next on first use.
///
/// The whole track is resampled to mono f32 at the target rate and held
/// as one tap, so the capture mixer can slice arbitrary playback windows
/// without seeking.
pub struct FfmpegAudioRouter {
    path: PathBuf,
    target_sample_rate: u32,
    tap: Option<AudioTap>,
    decoded: bool,
}

impl FfmpegAudioRouter {
    pub fn new(path: PathBuf, target_sample_rate: u32) -> Self {
        Self {
            path,
            target_sample_rate,
            tap: None,
            decoded: false,
        }
    }

    fn decode(&self) -> Result<Option<AudioTap>, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(&self.path)?;

        let audio_stream = match ictx.streams().best(ffmpeg_next::media::Type::Audio) {
            Some(stream) => stream,
            None => return Ok(None),
        };
        let audio_stream_index = audio_stream.index();

        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())?;
        let mut decoder = codec_ctx.decoder().audio()?;

        let mut resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Planar),
            ffmpeg_next::ChannelLayout::MONO,
            self.target_sample_rate,
        )?;

        let mut all_samples: Vec<f32> = Vec::new();
        let mut decoded_frame = ffmpeg_next::util::frame::audio::Audio::empty();
        let mut resampled_frame = ffmpeg_next::util::frame::audio::Audio::empty();

        for (stream, packet) in ictx.packets() {
            if stream.index() != audio_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                resampler.run(&decoded_frame, &mut resampled_frame)?;
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        // Flush the decoder
        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler.run(&decoded_frame, &mut resampled_frame)?;
            extract_f32_samples(&resampled_frame, &mut all_samples);
        }

        // Flush the resampler (may have buffered samples)
        if let Ok(Some(delay)) = resampler.flush(&mut resampled_frame) {
            if delay.output > 0 {
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        log::debug!(
            "decoded {} audio samples at {} Hz from {}",
            all_samples.len(),
            self.target_sample_rate,
            self.path.display()
        );
        Ok(Some(AudioTap::new(all_samples, self.target_sample_rate)))
    }
}

impl AudioRouter for FfmpegAudioRouter {
    fn tap(&mut self) -> Result<Option<&AudioTap>, Box<dyn std::error::Error>> {
        if !self.decoded {
            self.tap = self.decode()?;
            self.decoded = true;
        }
        Ok(self.tap.as_ref())
    }

    fn dispose(&mut self) {
        self.tap = None;
        self.decoded = true;
    }
}

/// Extract f32 samples from a planar mono resampled frame.
fn extract_f32_samples(frame: &ffmpeg_next::util::frame::audio::Audio, out: &mut Vec<f32>) {
    let num_samples = frame.samples();
    if num_samples == 0 {
        return;
    }
    let data = frame.data(0);
    let floats = unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, num_samples) };
    out.extend_from_slice(floats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::infrastructure::ffmpeg_video_source::test_support::create_test_video;

    #[test]
    fn test_tap_nonexistent_file_fails() {
        let mut router = FfmpegAudioRouter::new(PathBuf::from("/nonexistent/clip.mp4"), 48_000);
        assert!(router.tap().is_err());
    }

    #[test]
    fn test_tap_video_only_source_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.mp4");
        create_test_video(&path, 3, 160, 120, 30.0);

        let mut router = FfmpegAudioRouter::new(path, 48_000);
        assert!(router.tap().unwrap().is_none());
        // Second call returns the same answer without re-decoding
        assert!(router.tap().unwrap().is_none());
    }

    #[test]
    fn test_dispose_is_idempotent_and_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.mp4");
        create_test_video(&path, 3, 160, 120, 30.0);

        let mut router = FfmpegAudioRouter::new(path, 48_000);
        router.dispose();
        router.dispose();
        assert!(router.tap().unwrap().is_none());
    }
}
