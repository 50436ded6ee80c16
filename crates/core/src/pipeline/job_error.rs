use thiserror::Error;

use crate::encode::domain::encoder_session::EncoderError;
use crate::model::domain::model_loader::ModelError;
use crate::upscale::domain::frame_upscaler::{RenderError, UpscalerBuildError};

/// Terminal failure of an upscaling job. Every variant carries a stable
/// reason code for operator-facing reporting.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("this device cannot run the upscaler")]
    CapabilityUnsupported,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("upscaler construction failed: {0}")]
    Upscaler(#[from] UpscalerBuildError),
    #[error("frame render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error("video source failed: {0}")]
    Source(String),
    #[error("audio routing failed: {0}")]
    Audio(String),
    #[error("job was already executed")]
    AlreadyExecuted,
}

impl JobError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            JobError::CapabilityUnsupported => "capability-unsupported",
            JobError::Model(ModelError::Fetch { .. }) => "model-fetch",
            JobError::Model(ModelError::Format { .. }) => "model-format",
            JobError::Upscaler(_) => "upscaler-build",
            JobError::Render(_) => "render",
            JobError::Encoder(EncoderError::NoSupportedFormat(_)) => "no-supported-format",
            JobError::Encoder(EncoderError::InvalidSessionState { .. }) => "invalid-session-state",
            JobError::Encoder(EncoderError::Backend(_)) => "encode",
            JobError::Source(_) => "source",
            JobError::Audio(_) => "audio",
            JobError::AlreadyExecuted => "already-executed",
        }
    }
}
