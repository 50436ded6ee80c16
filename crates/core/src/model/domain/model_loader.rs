use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model fetch failed for '{key}': {reason}")]
    Fetch { key: String, reason: String },
    #[error("model format invalid for '{key}': {reason}")]
    Format { key: String, reason: String },
}

/// A validated super-resolution model: one polyphase kernel bank.
///
/// The network itself is an opaque, swappable artifact — the pipeline only
/// cares that the weight count matches the declared architecture and scale.
/// Owned exclusively by the frame upscaler for the lifetime of one job.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    pub architecture_tag: String,
    pub weights: Vec<f32>,
    pub input_scale: u32,
    pub output_scale: u32,
    /// Spatial tap size of each phase kernel, derived from the tag.
    pub kernel_size: u32,
}

impl ModelDescriptor {
    /// Integer upscale factor applied to each source dimension.
    pub fn scale_factor(&self) -> u32 {
        self.output_scale / self.input_scale
    }
}

/// Fetches and validates a serialized model from a content store.
///
/// Both error cases are terminal for the current job; there is no partial
/// or degraded model. Loading is idempotent and may cache by key.
pub trait ModelLoader: Send {
    fn load(&self, model_key: &str) -> Result<ModelDescriptor, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor() {
        let m = ModelDescriptor {
            name: "espcn-x2".to_string(),
            architecture_tag: "espcn".to_string(),
            weights: vec![0.0; 100],
            input_scale: 1,
            output_scale: 2,
            kernel_size: 5,
        };
        assert_eq!(m.scale_factor(), 2);
    }

    #[test]
    fn test_errors_display_key() {
        let e = ModelError::Fetch {
            key: "missing-model".to_string(),
            reason: "404".to_string(),
        };
        assert!(e.to_string().contains("missing-model"));
        let e = ModelError::Format {
            key: "bad".to_string(),
            reason: "empty weights".to_string(),
        };
        assert!(e.to_string().contains("empty weights"));
    }
}
