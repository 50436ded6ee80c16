use thiserror::Error;

use crate::capture::capture_mixer::{StreamSample, StreamSpec};

/// Output container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Mp4,
    WebM,
    Matroska,
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Matroska => "mkv",
        }
    }

    pub fn muxer_name(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Matroska => "matroska",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp9,
    Mpeg4,
}

impl VideoCodec {
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }
}

/// One container/codec candidate for negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingFormat {
    pub container: Container,
    pub codec: VideoCodec,
}

impl EncodingFormat {
    pub const fn new(container: Container, codec: VideoCodec) -> Self {
        Self { container, codec }
    }

    /// Whether the container can legally carry the codec.
    pub fn compatible(&self) -> bool {
        match self.container {
            Container::Mp4 => matches!(self.codec, VideoCodec::H264 | VideoCodec::Mpeg4),
            Container::WebM => matches!(self.codec, VideoCodec::Vp9),
            Container::Matroska => true,
        }
    }
}

impl std::fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.container.muxer_name(), self.codec.name())
    }
}

/// Preference-ordered defaults for negotiation.
pub fn default_candidates() -> Vec<EncodingFormat> {
    vec![
        EncodingFormat::new(Container::Mp4, VideoCodec::H264),
        EncodingFormat::new(Container::WebM, VideoCodec::Vp9),
        EncodingFormat::new(Container::Mp4, VideoCodec::Mpeg4),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Finalizing,
    Complete,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Finalizing => "finalizing",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("none of the {0} candidate formats is supported")]
    NoSupportedFormat(usize),
    #[error("operation requires session state {expected}, but session is {actual}")]
    InvalidSessionState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error("encoder backend error: {0}")]
    Backend(String),
}

/// The finished recording.
#[derive(Debug)]
pub struct Artifact {
    pub data: Vec<u8>,
    pub extension: &'static str,
    /// Duration in seconds, derived from the video frame count.
    pub duration: f64,
}

/// Stateful encoder for one recording.
///
/// `negotiate` may run any number of times while `Idle`; `start` moves to
/// `Recording`, `finalize` passes through `Finalizing` to `Complete`, and
/// `abort` lands in `Failed` from any state. No samples are accepted once
/// finalization begins.
pub trait EncoderSession: Send {
    /// Pick the first workable candidate, in order. Does not change state.
    fn negotiate(&mut self, candidates: &[EncodingFormat]) -> Result<EncodingFormat, EncoderError>;

    fn start(&mut self, spec: &StreamSpec, format: EncodingFormat) -> Result<(), EncoderError>;

    fn write_sample(&mut self, sample: &StreamSample) -> Result<(), EncoderError>;

    fn finalize(&mut self) -> Result<Artifact, EncoderError>;

    /// Discard the recording. Idempotent.
    fn abort(&mut self);

    fn state(&self) -> SessionState;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::mp4_h264(Container::Mp4, VideoCodec::H264, true)]
    #[case::mp4_mpeg4(Container::Mp4, VideoCodec::Mpeg4, true)]
    #[case::mp4_vp9(Container::Mp4, VideoCodec::Vp9, false)]
    #[case::webm_vp9(Container::WebM, VideoCodec::Vp9, true)]
    #[case::webm_h264(Container::WebM, VideoCodec::H264, false)]
    #[case::webm_mpeg4(Container::WebM, VideoCodec::Mpeg4, false)]
    #[case::mkv_h264(Container::Matroska, VideoCodec::H264, true)]
    #[case::mkv_vp9(Container::Matroska, VideoCodec::Vp9, true)]
    fn test_container_codec_compatibility(
        #[case] container: Container,
        #[case] codec: VideoCodec,
        #[case] expected: bool,
    ) {
        assert_eq!(EncodingFormat::new(container, codec).compatible(), expected);
    }

    #[test]
    fn test_default_candidates_are_all_compatible() {
        let candidates = default_candidates();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|f| f.compatible()));
    }

    #[test]
    fn test_format_display() {
        let f = EncodingFormat::new(Container::WebM, VideoCodec::Vp9);
        assert_eq!(f.to_string(), "webm:vp9");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Container::Mp4.extension(), "mp4");
        assert_eq!(Container::WebM.extension(), "webm");
        assert_eq!(Container::Matroska.extension(), "mkv");
    }
}
