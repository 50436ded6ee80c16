use crate::capture::capture_mixer::{StreamSample, StreamSpec};
use crate::encode::domain::encoder_session::{
    Artifact, Container, EncoderError, EncoderSession, EncodingFormat, SessionState, VideoCodec,
};

fn codec_id(codec: VideoCodec) -> ffmpeg_next::codec::Id {
    match codec {
        VideoCodec::H264 => ffmpeg_next::codec::Id::H264,
        VideoCodec::Vp9 => ffmpeg_next::codec::Id::VP9,
        VideoCodec::Mpeg4 => ffmpeg_next::codec::Id::MPEG4,
    }
}

struct AudioLane {
    encoder: ffmpeg_next::codec::encoder::audio::Encoder,
    stream_index: usize,
    sample_rate: u32,
    time_base: ffmpeg_next::Rational,
    frame_size: usize,
    /// Mono f32 samples waiting for a full encoder frame.
    fifo: Vec<f32>,
    samples_sent: i64,
}

/// Encodes a composite stream to a scratch file with ffmpeg-next.
///
/// Video arrives as RGB24 and is converted to YUV420P; audio arrives as
/// mono f32 blocks, is batched to the encoder's frame size, and muxed
/// interleaved with the video. The finished file is read back into memory
/// on `finalize`.
pub struct FfmpegEncoderSession {
    state: SessionState,
    scratch: Option<tempfile::TempPath>,
    octx: Option<ffmpeg_next::format::context::Output>,
    video_encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    audio: Option<AudioLane>,
    container: Container,
    width: u32,
    height: u32,
    fps: f64,
    frames_written: usize,
    bytes_muxed: usize,
}

// Safety: FfmpegEncoderSession is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegEncoderSession {}

impl FfmpegEncoderSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            scratch: None,
            octx: None,
            video_encoder: None,
            scaler: None,
            audio: None,
            container: Container::Mp4,
            width: 0,
            height: 0,
            fps: 0.0,
            frames_written: 0,
            bytes_muxed: 0,
        }
    }

    fn require_state(&self, expected: SessionState) -> Result<(), EncoderError> {
        if self.state != expected {
            return Err(EncoderError::InvalidSessionState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn fps_i(&self) -> i32 {
        let fps_i = self.fps.round() as i32;
        if fps_i <= 0 { 30 } else { fps_i }
    }

    fn open_output(
        &mut self,
        spec: &StreamSpec,
        format: EncodingFormat,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let scratch = tempfile::Builder::new()
            .prefix("clearscale-")
            .suffix(&format!(".{}", format.container.extension()))
            .tempfile()?
            .into_temp_path();

        let mut octx = ffmpeg_next::format::output(&scratch)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(codec_id(format.codec))
            .ok_or_else(|| format!("{} encoder not found", format.codec.name()))?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(spec.width);
        encoder_ctx.set_height(spec.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);

        let fps_i = {
            let rounded = spec.frame_rate.round() as i32;
            if rounded <= 0 { 30 } else { rounded }
        };
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps_i));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps_i, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let video_encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&video_encoder);

        let audio = match spec.audio_sample_rate {
            Some(rate) => Some(open_audio_lane(&mut octx, format.container, rate, global_header)?),
            None => None,
        };

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            spec.width,
            spec.height,
            ffmpeg_next::format::Pixel::YUV420P,
            spec.width,
            spec.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.scratch = Some(scratch);
        self.octx = Some(octx);
        self.video_encoder = Some(video_encoder);
        self.scaler = Some(scaler);
        self.audio = audio;
        self.container = format.container;
        self.width = spec.width;
        self.height = spec.height;
        self.fps = spec.frame_rate;
        self.frames_written = 0;
        self.bytes_muxed = 0;
        Ok(())
    }

    fn encode_video(&mut self, pixels: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let expected = (self.width as usize) * (self.height as usize) * 3;
        if pixels.len() != expected {
            return Err(format!(
                "video sample has {} bytes, session expects {expected}",
                pixels.len()
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        let row_bytes = self.width as usize * 3;
        for row in 0..self.height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&pixels[src_start..src_start + row_bytes]);
        }

        let scaler = self.scaler.as_mut().unwrap();
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frames_written as i64));

        let encoder = self.video_encoder.as_mut().unwrap();
        encoder.send_frame(&yuv_frame)?;
        self.frames_written += 1;
        self.drain_video_packets()
    }

    fn drain_video_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let fps_i = self.fps_i();
        let encoder = self.video_encoder.as_mut().unwrap();
        let octx = self.octx.as_mut().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut bytes = 0;
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            bytes += encoded.size();
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps_i), ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        self.bytes_muxed += bytes;
        Ok(())
    }

    fn encode_audio(&mut self, samples: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(lane) = self.audio.as_mut() else {
            // Spec declared no audio; silently drop stray blocks
            return Ok(());
        };
        lane.fifo.extend_from_slice(samples);
        self.flush_full_audio_frames()
    }

    fn flush_full_audio_frames(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let Some(lane) = self.audio.as_mut() else {
                return Ok(());
            };
            if lane.fifo.len() < lane.frame_size {
                return Ok(());
            }
            let chunk: Vec<f32> = lane.fifo.drain(..lane.frame_size).collect();
            self.send_audio_frame(&chunk)?;
        }
    }

    fn send_audio_frame(&mut self, chunk: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
        let lane = self.audio.as_mut().unwrap();

        let mut frame = ffmpeg_next::util::frame::audio::Audio::new(
            lane.encoder.format(),
            chunk.len(),
            ffmpeg_next::ChannelLayout::MONO,
        );
        frame.set_rate(lane.sample_rate);
        frame.set_pts(Some(lane.samples_sent));
        {
            let data = frame.data_mut(0);
            let bytes = unsafe {
                std::slice::from_raw_parts(chunk.as_ptr() as *const u8, chunk.len() * 4)
            };
            data[..bytes.len()].copy_from_slice(bytes);
        }
        lane.samples_sent += chunk.len() as i64;
        lane.encoder.send_frame(&frame)?;
        self.drain_audio_packets()
    }

    fn drain_audio_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let lane = self.audio.as_mut().unwrap();
        let octx = self.octx.as_mut().unwrap();
        let stream_index = lane.stream_index;
        let ost_time_base = octx.stream(stream_index).unwrap().time_base();
        let src_time_base = lane.time_base;

        let mut bytes = 0;
        let mut encoded = ffmpeg_next::Packet::empty();
        while lane.encoder.receive_packet(&mut encoded).is_ok() {
            bytes += encoded.size();
            encoded.set_stream(stream_index);
            encoded.rescale_ts(src_time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        self.bytes_muxed += bytes;
        Ok(())
    }

    fn finish_streams(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Flush the audio lane; a short final frame is allowed
        if let Some(lane) = self.audio.as_mut() {
            if !lane.fifo.is_empty() {
                let tail: Vec<f32> = lane.fifo.drain(..).collect();
                self.send_audio_frame(&tail)?;
            }
            let lane = self.audio.as_mut().unwrap();
            lane.encoder.send_eof()?;
            self.drain_audio_packets()?;
        }

        let encoder = self.video_encoder.as_mut().unwrap();
        encoder.send_eof()?;
        self.drain_video_packets()?;

        self.octx.as_mut().unwrap().write_trailer()?;
        Ok(())
    }

    fn release(&mut self) {
        self.octx = None;
        self.video_encoder = None;
        self.scaler = None;
        self.audio = None;
    }
}

impl Default for FfmpegEncoderSession {
    fn default() -> Self {
        Self::new()
    }
}

fn open_audio_lane(
    octx: &mut ffmpeg_next::format::context::Output,
    container: Container,
    sample_rate: u32,
    global_header: bool,
) -> Result<AudioLane, Box<dyn std::error::Error>> {
    // WebM takes Opus; everything else takes AAC. Mono float frames work
    // for both: for a single channel, packed and planar layouts coincide.
    let (id, format) = match container {
        Container::WebM => (
            ffmpeg_next::codec::Id::OPUS,
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
        ),
        Container::Mp4 | Container::Matroska => (
            ffmpeg_next::codec::Id::AAC,
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Planar),
        ),
    };
    if id == ffmpeg_next::codec::Id::OPUS && sample_rate != 48_000 {
        return Err(format!("opus requires a 48 kHz stream, got {sample_rate} Hz").into());
    }

    let codec = ffmpeg_next::encoder::find(id).ok_or_else(|| format!("{id:?} encoder not found"))?;
    let stream_index = octx.nb_streams() as usize;
    let mut ost = octx.add_stream(Some(codec))?;

    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .audio()?;
    encoder_ctx.set_rate(sample_rate as i32);
    encoder_ctx.set_channel_layout(ffmpeg_next::ChannelLayout::MONO);
    encoder_ctx.set_format(format);
    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }

    let encoder = encoder_ctx.open_as(codec)?;
    ost.set_parameters(&encoder);

    let time_base = encoder.time_base();
    let frame_size = {
        let reported = encoder.frame_size() as usize;
        if reported == 0 { 1024 } else { reported }
    };

    Ok(AudioLane {
        encoder,
        stream_index,
        sample_rate,
        time_base,
        frame_size,
        fifo: Vec::new(),
        samples_sent: 0,
    })
}

impl EncoderSession for FfmpegEncoderSession {
    fn negotiate(&mut self, candidates: &[EncodingFormat]) -> Result<EncodingFormat, EncoderError> {
        self.require_state(SessionState::Idle)?;
        ffmpeg_next::init().map_err(|e| EncoderError::Backend(e.to_string()))?;

        for candidate in candidates {
            if !candidate.compatible() {
                log::debug!("rejecting {candidate}: codec not allowed in container");
                continue;
            }
            if ffmpeg_next::encoder::find(codec_id(candidate.codec)).is_none() {
                log::debug!("rejecting {candidate}: encoder not built in");
                continue;
            }
            log::info!("negotiated encoding format {candidate}");
            return Ok(*candidate);
        }
        Err(EncoderError::NoSupportedFormat(candidates.len()))
    }

    fn start(&mut self, spec: &StreamSpec, format: EncodingFormat) -> Result<(), EncoderError> {
        self.require_state(SessionState::Idle)?;
        self.open_output(spec, format).map_err(|e| {
            self.state = SessionState::Failed;
            EncoderError::Backend(e.to_string())
        })?;
        log::info!(
            "recording started: {}x{} @ {:.2} fps, {format}",
            spec.width,
            spec.height,
            spec.frame_rate
        );
        self.state = SessionState::Recording;
        Ok(())
    }

    fn write_sample(&mut self, sample: &StreamSample) -> Result<(), EncoderError> {
        self.require_state(SessionState::Recording)?;
        let result = match sample {
            StreamSample::Video { pixels, .. } => self.encode_video(pixels),
            StreamSample::Audio { samples, .. } => self.encode_audio(samples),
        };
        result.map_err(|e| {
            self.state = SessionState::Failed;
            EncoderError::Backend(e.to_string())
        })
    }

    fn finalize(&mut self) -> Result<Artifact, EncoderError> {
        self.require_state(SessionState::Recording)?;
        self.state = SessionState::Finalizing;

        let finished = self.finish_streams().map_err(|e| {
            self.state = SessionState::Failed;
            EncoderError::Backend(e.to_string())
        });
        self.release();
        finished?;

        let scratch = self.scratch.take().ok_or_else(|| {
            self.state = SessionState::Failed;
            EncoderError::Backend("scratch file missing".to_string())
        })?;
        let data = std::fs::read(&scratch).map_err(|e| {
            self.state = SessionState::Failed;
            EncoderError::Backend(e.to_string())
        })?;

        let duration = if self.fps > 0.0 {
            self.frames_written as f64 / self.fps
        } else {
            0.0
        };
        log::info!(
            "recording finalized: {} frames, {} bytes muxed, {:.2} s",
            self.frames_written,
            data.len(),
            duration
        );
        self.state = SessionState::Complete;
        Ok(Artifact {
            data,
            extension: self.container.extension(),
            duration,
        })
    }

    fn abort(&mut self) {
        if self.state == SessionState::Failed {
            return;
        }
        log::info!("recording aborted in state {}", self.state);
        self.release();
        // Dropping the TempPath deletes the scratch file
        self.scratch = None;
        self.state = SessionState::Failed;
    }

    fn state(&self) -> SessionState {
        self.state
    }
}
