use std::time::Duration;
use tokio::time::Instant;

/// Admits at most one event per `min_interval`; everything in between is
/// refused rather than queued.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_admitted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: None,
        }
    }

    /// Returns true and starts a new window if `now` is at least
    /// `min_interval` past the last admitted event.
    pub fn try_admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }
}
