/// Tracks the playback position and duration of one source timeline.
///
/// The driver, the capture mixer, and the encoder session are all keyed to
/// the same clock instance, so captured audio, emitted frames, and progress
/// all describe the same timeline. Position is monotonically non-decreasing
/// while a job is active.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackClock {
    position: f64,
    duration: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            duration: 0.0,
        }
    }

    /// Record the source duration. Only the first valid (positive, finite)
    /// value is kept; until one arrives, progress reads as zero.
    pub fn set_duration(&mut self, duration: f64) {
        if self.duration <= 0.0 && duration.is_finite() && duration > 0.0 {
            self.duration = duration;
        }
    }

    /// Advance the position. Regressions (and NaN) are ignored, keeping
    /// observed progress non-decreasing.
    pub fn advance_to(&mut self, position: f64) {
        if position.is_finite() && position > self.position {
            self.position = position;
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// `position / duration`, clamped to `[0, 1]`; zero while the duration
    /// is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.position / self.duration).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> f64 {
        self.progress() * 100.0
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_starts_at_zero() {
        let c = PlaybackClock::new();
        assert_eq!(c.position(), 0.0);
        assert_eq!(c.progress(), 0.0);
    }

    #[test]
    fn test_progress_zero_while_duration_unknown() {
        let mut c = PlaybackClock::new();
        c.advance_to(5.0);
        assert_eq!(c.progress(), 0.0);
        c.set_duration(10.0);
        assert_relative_eq!(c.progress(), 0.5);
    }

    #[test]
    fn test_position_is_monotonic() {
        let mut c = PlaybackClock::new();
        c.advance_to(2.0);
        c.advance_to(1.0);
        assert_eq!(c.position(), 2.0);
        c.advance_to(f64::NAN);
        assert_eq!(c.position(), 2.0);
    }

    #[test]
    fn test_first_valid_duration_wins() {
        let mut c = PlaybackClock::new();
        c.set_duration(0.0);
        c.set_duration(-3.0);
        c.set_duration(f64::INFINITY);
        assert_eq!(c.duration(), 0.0);
        c.set_duration(8.0);
        c.set_duration(20.0);
        assert_eq!(c.duration(), 8.0);
    }

    #[test]
    fn test_progress_clamped_to_one() {
        let mut c = PlaybackClock::new();
        c.set_duration(4.0);
        c.advance_to(9.0);
        assert_eq!(c.progress(), 1.0);
        assert_eq!(c.percent(), 100.0);
    }
}
