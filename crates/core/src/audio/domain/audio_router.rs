use std::sync::Arc;

/// Decoded source audio routed toward the capture path.
///
/// Samples are mono f32 at `sample_rate`. The buffer is shared so the
/// router and the capture mixer can hold the same tap without copying.
#[derive(Clone, Debug)]
pub struct AudioTap {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioTap {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples covering `[from_ts, to_ts)`, clamped to the buffer.
    /// Returns an empty slice for inverted or out-of-range windows.
    pub fn slice_between(&self, from_ts: f64, to_ts: f64) -> &[f32] {
        if self.sample_rate == 0 || to_ts <= from_ts {
            return &[];
        }
        let rate = self.sample_rate as f64;
        let start = ((from_ts.max(0.0) * rate) as usize).min(self.samples.len());
        let end = ((to_ts.max(0.0) * rate) as usize).min(self.samples.len());
        if end <= start {
            return &[];
        }
        &self.samples[start..end]
    }
}

/// Routes source audio to the capture path while the preview stays muted.
///
/// `tap` is lazy: the first call decodes, later calls return the same tap.
/// A source with no audio stream yields `Ok(None)` and the capture proceeds
/// video-only.
pub trait AudioRouter: Send {
    fn tap(&mut self) -> Result<Option<&AudioTap>, Box<dyn std::error::Error>>;

    /// Releases decode resources. Idempotent.
    fn dispose(&mut self);
}
