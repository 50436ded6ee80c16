/// Known upscaler kernel architectures and their spatial tap size.
///
/// The weight blob of a model tagged `tag` must contain exactly
/// `(output_scale / input_scale)^2 * k * k` f32 values, one polyphase
/// kernel per sub-pixel phase.
pub const KNOWN_ARCHITECTURES: &[(&str, u32)] = &[
    ("espcn", 5),
    ("fsrcnn-lite", 3),
    ("lapsrn-tiny", 7),
];

/// Kernel tap size for a recognized architecture tag.
pub fn kernel_size_for(tag: &str) -> Option<u32> {
    KNOWN_ARCHITECTURES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, k)| *k)
}

pub const DEFAULT_MODEL_KEY: &str = "espcn-x2";
pub const DEFAULT_STORE_URL: &str = "https://models.clearscale.dev/v1";

/// Sample rate the audio tap resamples to (Opus-compatible).
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 48000;

/// Output cadence used when the source reports no usable frame rate.
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Consecutive duplicate output frames before the mixer logs a warning
/// (~1 second at 30 fps). Repeats are absorbed, never surfaced as errors.
pub const STALE_REPEAT_WARN_THRESHOLD: u32 = 30;
