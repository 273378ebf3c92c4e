use std::time::{Duration, Instant};

/// Measures one request's processing window.
///
/// Restarting discards the previous start; windows are never nested.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    started_at: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn restart(&mut self) {
        self.started_at = Instant::now();
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        Self::elapsed_between(self.started_at, Instant::now())
    }

    /// `end - start`, clamped at zero
    pub fn elapsed_between(start: Instant, end: Instant) -> Duration {
        end.saturating_duration_since(start)
    }
}
