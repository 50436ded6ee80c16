/// Lifecycle phase of an upscaling job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Priming,
    Streaming,
    Draining,
    Stopped,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Priming => "priming",
            Phase::Streaming => "streaming",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
            Phase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Percent complete in [0, 100]. Reaches exactly 100 only once the
    /// job has stopped.
    pub percent: f64,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn phase(phase: Phase, percent: f64) -> Self {
        Self {
            phase,
            percent,
            message: None,
        }
    }

    pub fn with_message(phase: Phase, percent: f64, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent,
            message: Some(message.into()),
        }
    }
}

pub trait ProgressSink: Send {
    fn emit(&mut self, event: &ProgressEvent);
}

/// Swallows all events.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&mut self, _event: &ProgressEvent) {}
}

/// Logs phase changes always, and streaming progress at whole-percent steps.
pub struct LogProgressSink {
    last_phase: Option<Phase>,
    last_logged_percent: i64,
}

impl LogProgressSink {
    pub fn new() -> Self {
        Self {
            last_phase: None,
            last_logged_percent: -1,
        }
    }
}

impl Default for LogProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for LogProgressSink {
    fn emit(&mut self, event: &ProgressEvent) {
        let phase_changed = self.last_phase != Some(event.phase);
        let step = event.percent.floor() as i64;

        if phase_changed {
            match &event.message {
                Some(message) => log::info!("phase {}: {message}", event.phase),
                None => log::info!("phase {}", event.phase),
            }
            self.last_phase = Some(event.phase);
            self.last_logged_percent = step;
            return;
        }

        if step > self.last_logged_percent {
            log::info!("{} {:.1}%", event.phase, event.percent);
            self.last_logged_percent = step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_accepts_events() {
        let mut sink = NullProgressSink;
        sink.emit(&ProgressEvent::phase(Phase::Streaming, 12.5));
    }

    #[test]
    fn test_log_sink_tracks_phase_and_percent_state() {
        let mut sink = LogProgressSink::new();
        sink.emit(&ProgressEvent::phase(Phase::Priming, 0.0));
        assert_eq!(sink.last_phase, Some(Phase::Priming));

        sink.emit(&ProgressEvent::phase(Phase::Streaming, 3.7));
        sink.emit(&ProgressEvent::phase(Phase::Streaming, 3.9));
        assert_eq!(sink.last_logged_percent, 3);

        sink.emit(&ProgressEvent::phase(Phase::Streaming, 4.2));
        assert_eq!(sink.last_logged_percent, 4);
    }
}
