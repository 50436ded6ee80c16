use crate::capability::domain::capability_prober::CapabilityReport;
use crate::model::domain::model_loader::ModelDescriptor;
use crate::shared::frame_surface::SurfaceHandle;
use crate::upscale::domain::frame_upscaler::{FrameUpscaler, UpscalerBuildError};

use super::gpu_upscaler::GpuFrameUpscaler;

/// Builds an upscaler for a job. Lets the orchestration layer stay
/// independent of the concrete GPU type (and lets tests substitute stubs).
pub type UpscalerFactory = Box<
    dyn Fn(
            &CapabilityReport,
            SurfaceHandle,
            SurfaceHandle,
            ModelDescriptor,
        ) -> Result<Box<dyn FrameUpscaler>, UpscalerBuildError>
        + Send,
>;

/// The production factory: a wgpu compute upscaler, failing closed on an
/// unsupported report.
pub fn gpu_upscaler_factory() -> UpscalerFactory {
    Box::new(|report, source, destination, model| {
        Ok(Box::new(GpuFrameUpscaler::new(
            report,
            source,
            destination,
            model,
        )?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame_surface::surface_handle;

    #[test]
    fn test_factory_fails_closed_on_unsupported_report() {
        let factory = gpu_upscaler_factory();
        let model = ModelDescriptor {
            name: "m".to_string(),
            architecture_tag: "fsrcnn-lite".to_string(),
            weights: vec![0.0; 36],
            input_scale: 1,
            output_scale: 2,
            kernel_size: 3,
        };
        let result = factory(
            &CapabilityReport::unsupported(),
            surface_handle(),
            surface_handle(),
            model,
        );
        assert!(matches!(result, Err(UpscalerBuildError::Unsupported)));
    }
}
