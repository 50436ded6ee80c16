use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::shared::video_metadata::VideoMetadata;
use crate::source::domain::video_source::{SourceFrame, VideoSource};

const CHANNEL_CAPACITY: usize = 4;

/// ffmpeg-backed playback handle.
///
/// `open` probes metadata only; `begin_playback` spawns a decode worker
/// that re-opens the file, converts each frame to RGB24, and feeds it
/// through a bounded channel so decode never runs ahead of the consumer by
/// more than a few frames. All ffmpeg objects live on the worker thread.
pub struct FfmpegVideoSource {
    path: Option<PathBuf>,
    metadata: Option<VideoMetadata>,
    rx: Option<crossbeam_channel::Receiver<Result<SourceFrame, String>>>,
    worker: Option<JoinHandle<()>>,
    muted: bool,
    realtime: bool,
}

impl FfmpegVideoSource {
    pub fn new() -> Self {
        Self {
            path: None,
            metadata: None,
            rx: None,
            worker: None,
            muted: false,
            realtime: false,
        }
    }

    /// Pace the decode worker at the source's real-time frame interval
    /// instead of decoding as fast as possible.
    pub fn with_realtime_pacing(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Probe the file and record its metadata.
    pub fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let time_base = stream.time_base();
        let duration = if stream.duration() > 0 && time_base.denominator() != 0 {
            stream.duration() as f64 * time_base.numerator() as f64
                / time_base.denominator() as f64
        } else if stream.frames() > 0 && fps > 0.0 {
            stream.frames() as f64 / fps
        } else {
            0.0
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            duration,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.path = Some(path.to_path_buf());
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }
}

impl Default for FfmpegVideoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for FfmpegVideoSource {
    fn begin_playback(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let path = self
            .path
            .clone()
            .ok_or("FfmpegVideoSource: not opened")?;
        if self.rx.is_some() {
            return Err("FfmpegVideoSource: playback already started".into());
        }

        let fps = self.metadata.as_ref().map(|m| m.fps).unwrap_or(0.0);
        let realtime = self.realtime;
        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);

        self.worker = Some(std::thread::spawn(move || {
            decode_loop(&path, fps, realtime, &tx);
        }));
        self.rx = Some(rx);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn native_dimensions(&self) -> Option<(u32, u32)> {
        self.metadata.as_ref().map(|m| (m.width, m.height))
    }

    fn duration(&self) -> f64 {
        self.metadata.as_ref().map(|m| m.duration).unwrap_or(0.0)
    }

    fn frame_rate(&self) -> f64 {
        self.metadata.as_ref().map(|m| m.fps).unwrap_or(0.0)
    }

    fn next_frame(&mut self) -> Result<Option<SourceFrame>, Box<dyn std::error::Error>> {
        let Some(rx) = self.rx.as_ref() else {
            return Err("FfmpegVideoSource: playback not started".into());
        };
        match rx.recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(message)) => Err(message.into()),
            // Worker finished and dropped its sender: end of media
            Err(crossbeam_channel::RecvError) => Ok(None),
        }
    }

    fn close(&mut self) {
        // Dropping the receiver unblocks the worker's next send
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.metadata = None;
        self.path = None;
    }
}

/// Sequential decode on the worker thread: demux, decode, convert to
/// RGB24, send. Exits when the file is exhausted or the receiver is gone.
fn decode_loop(
    path: &Path,
    fps: f64,
    realtime: bool,
    tx: &crossbeam_channel::Sender<Result<SourceFrame, String>>,
) {
    if let Err(e) = run_decode(path, fps, realtime, tx) {
        let _ = tx.send(Err(e));
    }
}

fn run_decode(
    path: &Path,
    fps: f64,
    realtime: bool,
    tx: &crossbeam_channel::Sender<Result<SourceFrame, String>>,
) -> Result<(), String> {
    ffmpeg_next::init().map_err(|e| e.to_string())?;

    let mut ictx = ffmpeg_next::format::input(path).map_err(|e| e.to_string())?;
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("no video stream found")?;
    let stream_index = stream.index();

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| e.to_string())?;
    let mut decoder = codec_ctx.decoder().video().map_err(|e| e.to_string())?;

    let width = decoder.width();
    let height = decoder.height();

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| e.to_string())?;

    let frame_interval = if fps > 0.0 { 1.0 / fps } else { 0.0 };
    let mut index: usize = 0;

    let mut deliver = |decoded: &ffmpeg_next::util::frame::video::Video,
                       scaler: &mut ffmpeg_next::software::scaling::Context,
                       index: &mut usize|
     -> Result<bool, String> {
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(decoded, &mut rgb_frame).map_err(|e| e.to_string())?;

        let frame = SourceFrame {
            pixels: extract_rgb_pixels(&rgb_frame, width, height),
            width,
            height,
            timestamp: *index as f64 * frame_interval,
        };
        *index += 1;

        if tx.send(Ok(frame)).is_err() {
            return Ok(false); // consumer gone
        }
        if realtime && frame_interval > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(frame_interval));
        }
        Ok(true)
    };

    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            if !deliver(&decoded, &mut scaler, &mut index)? {
                return Ok(());
            }
        }
    }

    let _ = decoder.send_eof();
    while decoder.receive_frame(&mut decoded).is_ok() {
        if !deliver(&decoded, &mut scaler, &mut index)? {
            return Ok(());
        }
    }

    Ok(())
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// stripping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
