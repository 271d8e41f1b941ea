use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::session::LinkSession;

/// Drives `LinkSession::poll_telemetry` once per poll interval.
pub struct TelemetryPoller {
    session: Arc<LinkSession>,
    running: Arc<AtomicBool>,
}

impl TelemetryPoller {
    pub fn new(session: Arc<LinkSession>) -> Self {
        Self {
            session,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let period = self.session.poll_interval();
        if period.is_zero() {
            bail!("Telemetry poll interval must be greater than zero");
        }
        info!("Starting telemetry poller every {:?}", period);

        let mut ticker = interval(period);
        // A slow poll must not be followed by a burst of catch-up polls
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            // Failures are logged by the session and show up as a stale link
            let _ = self.session.poll_telemetry().await;
        }

        info!("Telemetry poller stopped");
        Ok(())
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
