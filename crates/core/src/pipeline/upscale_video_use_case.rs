use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::audio::domain::audio_router::AudioRouter;
use crate::capability::domain::capability_prober::CapabilityProber;
use crate::encode::domain::encoder_session::{Artifact, EncoderSession, EncodingFormat};
use crate::model::domain::model_loader::ModelLoader;
use crate::pipeline::frame_driver::{DriverConfig, FrameDriver};
use crate::pipeline::job_error::JobError;
use crate::pipeline::progress::{Phase, ProgressEvent, ProgressSink};
use crate::shared::frame_surface::surface_handle;
use crate::source::domain::video_source::VideoSource;
use crate::upscale::infrastructure::upscaler_factory::UpscalerFactory;

/// Orchestrates one upscaling job end to end: probe the device, load the
/// model, negotiate an output format, then hand everything to the driver.
///
/// Consumes its source, router, and session on first execution; a second
/// `execute` is rejected.
pub struct UpscaleVideoUseCase {
    prober: Box<dyn CapabilityProber>,
    loader: Box<dyn ModelLoader>,
    source: Option<Box<dyn VideoSource>>,
    router: Option<Box<dyn AudioRouter>>,
    session: Option<Box<dyn EncoderSession>>,
    factory: UpscalerFactory,
    sink: Box<dyn ProgressSink>,
    stop: Arc<AtomicBool>,
    target_fps: Option<f64>,
}

impl UpscaleVideoUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prober: Box<dyn CapabilityProber>,
        loader: Box<dyn ModelLoader>,
        source: Box<dyn VideoSource>,
        router: Box<dyn AudioRouter>,
        session: Box<dyn EncoderSession>,
        factory: UpscalerFactory,
        sink: Box<dyn ProgressSink>,
        stop: Arc<AtomicBool>,
        target_fps: Option<f64>,
    ) -> Self {
        Self {
            prober,
            loader,
            source: Some(source),
            router: Some(router),
            session: Some(session),
            factory,
            sink,
            stop,
            target_fps,
        }
    }

    pub fn execute(
        &mut self,
        model_key: &str,
        candidates: &[EncodingFormat],
    ) -> Result<Artifact, JobError> {
        let result = self.execute_inner(model_key, candidates);
        if let Err(e) = &result {
            // The driver reports its own failures; everything earlier is ours
            self.sink.emit(&ProgressEvent::with_message(
                Phase::Failed,
                0.0,
                format!("[{}] {e}", e.reason_code()),
            ));
        }
        result
    }

    fn execute_inner(
        &mut self,
        model_key: &str,
        candidates: &[EncodingFormat],
    ) -> Result<Artifact, JobError> {
        let report = self.prober.probe();
        if !report.supported {
            return Err(JobError::CapabilityUnsupported);
        }
        log::info!(
            "compute backend: {}",
            report.adapter_info.as_deref().unwrap_or("unknown")
        );

        let descriptor = self.loader.load(model_key)?;
        log::info!(
            "model {} ({}, x{})",
            descriptor.name,
            descriptor.architecture_tag,
            descriptor.scale_factor()
        );

        let mut source = self.source.take().ok_or(JobError::AlreadyExecuted)?;
        let mut router = self.router.take().ok_or(JobError::AlreadyExecuted)?;
        let mut session = self.session.take().ok_or(JobError::AlreadyExecuted)?;

        let format = session.negotiate(candidates)?;

        let source_surface = surface_handle();
        let destination = surface_handle();
        let scale = descriptor.scale_factor();
        let upscaler = (self.factory)(
            &report,
            source_surface.clone(),
            destination.clone(),
            descriptor,
        )?;

        let mut driver = FrameDriver::new(DriverConfig {
            target_fps: self.target_fps,
            stop: self.stop.clone(),
        });
        let result = driver.run(
            source.as_mut(),
            upscaler,
            router.as_mut(),
            source_surface,
            destination,
            session.as_mut(),
            format,
            scale,
            self.sink.as_mut(),
        );
        source.close();
        result
    }
}
