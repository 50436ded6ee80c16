/// Outcome of probing the local compute backend.
///
/// Created once at startup and immutable afterwards; everything downstream
/// (model loading, upscaler construction) is gated on `supported`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityReport {
    pub supported: bool,
    /// Human-readable adapter descriptor, present when supported.
    pub adapter_info: Option<String>,
}

impl CapabilityReport {
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            adapter_info: None,
        }
    }

    pub fn supported_with(adapter_info: impl Into<String>) -> Self {
        Self {
            supported: true,
            adapter_info: Some(adapter_info.into()),
        }
    }
}

/// Detects whether the machine can run GPU inference at all.
///
/// `probe` is side-effect-free and never fails: the absence of a capable
/// backend is a normal, reportable outcome, not an error.
pub trait CapabilityProber: Send {
    fn probe(&self) -> CapabilityReport;
}
