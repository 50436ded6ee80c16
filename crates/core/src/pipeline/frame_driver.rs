use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::domain::audio_router::AudioRouter;
use crate::capture::capture_mixer::{CaptureMixer, CompositeStream};
use crate::encode::domain::encoder_session::{Artifact, EncoderSession, EncodingFormat};
use crate::pipeline::job_error::JobError;
use crate::pipeline::progress::{Phase, ProgressEvent, ProgressSink};
use crate::shared::constants::DEFAULT_TARGET_FPS;
use crate::shared::frame_surface::SurfaceHandle;
use crate::shared::playback_clock::PlaybackClock;
use crate::source::domain::video_source::VideoSource;
use crate::upscale::domain::frame_upscaler::FrameUpscaler;

/// Streaming progress never reports complete; 100 is reserved for the
/// stopped phase.
const STREAMING_PERCENT_CAP: f64 = 99.9;

pub struct DriverConfig {
    /// Capture frame rate override; the source rate is used when `None`.
    pub target_fps: Option<f64>,
    /// Cooperative stop flag, honored at the next frame boundary.
    pub stop: Arc<AtomicBool>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            target_fps: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Drives one job from first frame to finished artifact.
///
/// The driver owns the cadence: for every source frame it writes the source
/// surface, renders one upscaled frame, advances the shared playback clock,
/// and drains the composite stream into the encoder session. Stopping (via
/// the flag or end of media) drains and finalizes, so a truncated run still
/// yields a playable artifact. Any component fault disposes the upscaler and
/// router, aborts the session, and lands in the failed phase.
pub struct FrameDriver {
    phase: Phase,
    clock: PlaybackClock,
    config: DriverConfig,
}

impl FrameDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            phase: Phase::Idle,
            clock: PlaybackClock::new(),
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        source: &mut dyn VideoSource,
        mut upscaler: Box<dyn FrameUpscaler>,
        router: &mut dyn AudioRouter,
        source_surface: SurfaceHandle,
        destination: SurfaceHandle,
        session: &mut dyn EncoderSession,
        format: EncodingFormat,
        scale: u32,
        sink: &mut dyn ProgressSink,
    ) -> Result<Artifact, JobError> {
        let result = self.drive(
            source,
            upscaler.as_mut(),
            router,
            &source_surface,
            &destination,
            session,
            format,
            scale,
            sink,
        );

        upscaler.dispose();
        router.dispose();

        match result {
            Ok(artifact) => {
                self.phase = Phase::Stopped;
                sink.emit(&ProgressEvent::phase(Phase::Stopped, 100.0));
                Ok(artifact)
            }
            Err(e) => {
                session.abort();
                self.phase = Phase::Failed;
                sink.emit(&ProgressEvent::with_message(
                    Phase::Failed,
                    self.clock.percent().min(STREAMING_PERCENT_CAP),
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn drive(
        &mut self,
        source: &mut dyn VideoSource,
        upscaler: &mut dyn FrameUpscaler,
        router: &mut dyn AudioRouter,
        source_surface: &SurfaceHandle,
        destination: &SurfaceHandle,
        session: &mut dyn EncoderSession,
        format: EncodingFormat,
        scale: u32,
        sink: &mut dyn ProgressSink,
    ) -> Result<Artifact, JobError> {
        self.phase = Phase::Priming;
        sink.emit(&ProgressEvent::phase(Phase::Priming, 0.0));

        // The preview stays silent; audio reaches the capture via the tap
        source.set_muted(true);
        source
            .begin_playback()
            .map_err(|e| JobError::Source(e.to_string()))?;
        let tap = router
            .tap()
            .map_err(|e| JobError::Audio(e.to_string()))?
            .cloned();

        let first = source
            .next_frame()
            .map_err(|e| JobError::Source(e.to_string()))?
            .ok_or_else(|| JobError::Source("source produced no frames".to_string()))?;

        source_surface
            .lock()
            .unwrap()
            .size_once(first.width, first.height)
            .map_err(|e| JobError::Source(e.to_string()))?;
        destination
            .lock()
            .unwrap()
            .size_once(first.width * scale, first.height * scale)
            .map_err(|e| JobError::Source(e.to_string()))?;

        self.clock.set_duration(source.duration());

        let target_fps = self.config.target_fps.unwrap_or_else(|| {
            let native = source.frame_rate();
            if native > 0.0 { native } else { DEFAULT_TARGET_FPS }
        });

        let mut stream = CaptureMixer::compose(destination.clone(), tap, target_fps);
        let spec = stream
            .spec()
            .ok_or_else(|| JobError::Source("capture stream has no spec".to_string()))?;
        session.start(&spec, format)?;

        self.phase = Phase::Streaming;
        sink.emit(&ProgressEvent::phase(Phase::Streaming, 0.0));

        let mut pending = Some(first);
        loop {
            if self.config.stop.load(Ordering::Relaxed) {
                log::info!(
                    "stop requested at {:.3} s, draining",
                    self.clock.position()
                );
                break;
            }

            let frame = match pending.take() {
                Some(frame) => frame,
                None => match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => return Err(JobError::Source(e.to_string())),
                },
            };

            {
                // Catch dimension changes before the byte-length check;
                // a swapped width/height has the same byte count.
                let surface = source_surface.lock().unwrap();
                if frame.width != surface.width() || frame.height != surface.height() {
                    return Err(JobError::Source(format!(
                        "source dimensions changed from {}x{} to {}x{}",
                        surface.width(),
                        surface.height(),
                        frame.width,
                        frame.height
                    )));
                }
            }
            source_surface
                .lock()
                .unwrap()
                .write_pixels(&frame.pixels)
                .map_err(|e| JobError::Source(e.to_string()))?;
            upscaler.render_one_frame()?;

            self.clock.advance_to(frame.timestamp);
            self.write_due_samples(&mut stream, session)?;

            sink.emit(&ProgressEvent::phase(
                Phase::Streaming,
                self.clock.percent().min(STREAMING_PERCENT_CAP),
            ));
        }

        self.phase = Phase::Draining;
        sink.emit(&ProgressEvent::phase(
            Phase::Draining,
            self.clock.percent().min(STREAMING_PERCENT_CAP),
        ));
        // The last video frame's display interval still needs its audio
        for sample in stream.drain_tail(self.clock.position() + 1.0 / target_fps) {
            session.write_sample(&sample)?;
        }
        let artifact = session.finalize()?;
        Ok(artifact)
    }

    fn write_due_samples(
        &mut self,
        stream: &mut CompositeStream,
        session: &mut dyn EncoderSession,
    ) -> Result<(), JobError> {
        for sample in stream.drain_until(self.clock.position()) {
            session.write_sample(&sample)?;
        }
        Ok(())
    }
}
