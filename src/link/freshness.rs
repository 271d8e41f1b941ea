use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Tracks when telemetry last arrived. The link state is computed from these
/// timestamps on every read, never stored.
#[derive(Debug)]
pub struct Freshness {
    window: Duration,
    first_poll: Option<Instant>,
    last_frame: Option<Instant>,
    failing_since: Option<Instant>,
    consecutive_failures: u32,
}

impl Freshness {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            first_poll: None,
            last_frame: None,
            failing_since: None,
            consecutive_failures: 0,
        }
    }

    pub fn poll_started(&mut self, now: Instant) {
        self.first_poll.get_or_insert(now);
    }

    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.failing_since = None;
        self.consecutive_failures = 0;
    }

    /// Returns the number of failures in a row, this one included.
    pub fn record_failure(&mut self, now: Instant) -> u32 {
        self.failing_since.get_or_insert(now);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn state(&self, now: Instant) -> LinkState {
        if self.failing_since.is_some() {
            return LinkState::Disconnected;
        }
        match (self.last_frame, self.first_poll) {
            (Some(at), _) if now.saturating_duration_since(at) <= self.window => {
                LinkState::Connected
            }
            (Some(_), _) => LinkState::Disconnected,
            (None, Some(_)) => LinkState::Connecting,
            (None, None) => LinkState::Disconnected,
        }
    }
}
