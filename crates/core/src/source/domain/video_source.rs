/// One decoded frame from the source, tagged with its presentation time.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    /// Tight RGB24 pixel data.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in seconds from the start of the source.
    pub timestamp: f64,
}

/// Playback-capable handle to a video source.
///
/// The pipeline does not own the source; it consumes it only through this
/// contract: native dimensions, duration, frame-by-frame delivery at
/// playback cadence, and an end-of-media signal (`next_frame` returning
/// `None`). Muting affects the preview side only — captured audio is routed
/// separately and never consults this flag.
pub trait VideoSource: Send {
    /// Start frame delivery. Must be called before `next_frame`.
    fn begin_playback(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    fn set_muted(&mut self, muted: bool);

    fn muted(&self) -> bool;

    /// Native dimensions, once known.
    fn native_dimensions(&self) -> Option<(u32, u32)>;

    /// Duration in seconds; 0.0 while unknown.
    fn duration(&self) -> f64;

    /// Source frame rate; 0.0 while unknown.
    fn frame_rate(&self) -> f64;

    /// Next frame in presentation order, or `None` at end of media.
    fn next_frame(&mut self) -> Result<Option<SourceFrame>, Box<dyn std::error::Error>>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
