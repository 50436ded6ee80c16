use thiserror::Error;

/// A backend fault during one frame's render. Always fatal to the job:
/// retrying a frame would desynchronize video from audio.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("source surface has no pixels yet")]
    SourceNotReady,
    #[error("destination surface is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DestinationMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("compute backend fault: {0}")]
    Backend(String),
    #[error("render called on a disposed upscaler")]
    Disposed,
}

/// Errors constructing an upscaler. Attempting construction against an
/// unsupported capability report fails closed here.
#[derive(Error, Debug)]
pub enum UpscalerBuildError {
    #[error("GPU inference is not supported on this machine")]
    Unsupported,
    #[error("failed to acquire compute device: {0}")]
    Device(String),
    #[error("model incompatible with upscaler: {0}")]
    Model(String),
}

/// The per-frame inference unit, bound to a fixed source/destination
/// surface pair for the lifetime of one job.
///
/// `render_one_frame` is called at most once per logical video frame and
/// never re-entrantly — the driver loop is the only caller. `dispose`
/// releases the compute context; it is called exactly once per job on
/// every exit path and is a no-op when repeated.
pub trait FrameUpscaler: Send {
    fn render_one_frame(&mut self) -> Result<(), RenderError>;
    fn dispose(&mut self);
}
