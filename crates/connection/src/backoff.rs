use std::time::Duration;

/// Doubling retry delay for consecutive failed dials.  Never gives up; the
/// delay just stops growing at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max:     Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial: initial.min(max),
            max,
            current: None,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial,
            Some(prev) => prev.saturating_mul(2).min(self.max),
        };
        self.current = Some(delay);
        delay
    }

    /// Forget past failures, e.g. after a connection reached `Open`.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
