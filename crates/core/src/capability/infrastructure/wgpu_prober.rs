use crate::capability::domain::capability_prober::{CapabilityProber, CapabilityReport};

/// Probes for a wgpu compute adapter.
///
/// This is the same backend the GPU upscaler runs on, so a positive report
/// means exactly that the render path can be constructed.
pub struct WgpuProber;

impl CapabilityProber for WgpuProber {
    fn probe(&self) -> CapabilityReport {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }));

        match adapter {
            Some(adapter) => {
                let info = adapter.get_info();
                CapabilityReport::supported_with(format!("{} ({:?})", info.name, info.backend))
            }
            None => CapabilityReport::unsupported(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_never_panics() {
        // On machines without a GPU this must come back as a normal
        // unsupported report, not a panic or error.
        let report = WgpuProber.probe();
        if report.supported {
            assert!(report.adapter_info.is_some());
        } else {
            assert!(report.adapter_info.is_none());
        }
    }
}
