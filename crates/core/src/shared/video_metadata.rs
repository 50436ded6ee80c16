use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Source duration in seconds; 0.0 when the container doesn't report one.
    pub duration: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let meta = VideoMetadata {
            width: 640,
            height: 360,
            fps: 24.0,
            duration: 10.0,
            total_frames: 240,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/clip.mp4")),
        };
        assert_eq!(meta.width, 640);
        assert_eq!(meta.height, 360);
        assert_eq!(meta.duration, 10.0);
        assert_eq!(meta.total_frames, 240);
    }

    #[test]
    fn test_clone_is_independent() {
        let meta = VideoMetadata {
            width: 320,
            height: 240,
            fps: 30.0,
            duration: 0.0,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        };
        assert_eq!(meta, meta.clone());
    }
}
