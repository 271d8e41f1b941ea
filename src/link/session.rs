use std::io;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::freshness::{Freshness, LinkState};
use super::rate_limit::RateLimiter;
use super::telemetry::TelemetryFrame;
use super::transport::{Transport, UdpTransport};
use crate::config::LinkConfig;
use crate::crtp::{self, SetpointCommand};
use crate::error::{PollFailure, TransportFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Dropped because the previous command went out less than one
    /// command interval ago.
    Throttled,
}

#[derive(Debug)]
struct LinkStatus {
    telemetry: TelemetryFrame,
    freshness: Freshness,
    last_transport_error: Option<String>,
}

/// The process's only link to the drone.
///
/// Built once at start-up and handed out as `Arc<LinkSession>`. Sends are
/// throttled, polls refresh the cached telemetry, and every failure is
/// returned as a value so the control path never stalls on a lost packet.
pub struct LinkSession {
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    limiter: Mutex<RateLimiter>,
    status: RwLock<LinkStatus>,
}

impl LinkSession {
    pub fn new(transport: Arc<dyn Transport>, config: &LinkConfig) -> Self {
        Self {
            transport,
            poll_interval: config.poll_interval(),
            limiter: Mutex::new(RateLimiter::new(config.min_command_interval())),
            status: RwLock::new(LinkStatus {
                telemetry: TelemetryFrame::default(),
                freshness: Freshness::new(config.staleness_window()),
                last_transport_error: None,
            }),
        }
    }

    /// Binds the UDP socket described by `config`.
    pub async fn connect(config: &LinkConfig) -> io::Result<Self> {
        let transport = UdpTransport::bind(config).await?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn send_setpoint(
        &self,
        cmd: SetpointCommand,
    ) -> Result<SendOutcome, TransportFailure> {
        let admitted = self
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_admit(Instant::now());
        if !admitted {
            trace!("Setpoint throttled: {:?}", cmd);
            return Ok(SendOutcome::Throttled);
        }

        let frame = crtp::encode_setpoint(&cmd);
        self.transmit(&frame, "setpoint").await?;
        trace!("Setpoint sent: {:?}", cmd);
        Ok(SendOutcome::Sent)
    }

    pub async fn request_telemetry_refresh(&self) -> Result<(), TransportFailure> {
        self.transmit(&crtp::REFRESH_PING, "telemetry refresh").await?;
        debug!("Telemetry refresh requested");
        Ok(())
    }

    /// Reads the newest telemetry frame, waiting at most one poll interval.
    ///
    /// On failure the previous values stay cached; only the link state drops
    /// to disconnected.
    pub async fn poll_telemetry(&self) -> Result<TelemetryFrame, PollFailure> {
        self.write_status().freshness.poll_started(Instant::now());

        let result = match self.transport.recv_latest(self.poll_interval).await {
            Ok(buf) => crtp::decode_telemetry(&buf).map_err(PollFailure::from),
            Err(e) => Err(e),
        };
        let now = Instant::now();

        match result {
            Ok(packet) => {
                let frame = {
                    let mut status = self.write_status();
                    let was = status.freshness.state(now);
                    status.telemetry.apply(&packet, Utc::now());
                    status.freshness.record_frame(now);
                    if was != LinkState::Connected {
                        info!("Telemetry link up (battery {}%)", packet.battery);
                    }
                    status.telemetry.clone().with_state(status.freshness.state(now))
                };
                trace!("Telemetry: {:?}", frame);
                Ok(frame)
            }
            Err(e) => {
                let failures = self.write_status().freshness.record_failure(now);
                match &e {
                    PollFailure::Timeout(_) => debug!("Telemetry poll #{} timed out", failures),
                    _ => warn!("Telemetry poll #{} failed: {}", failures, e),
                }
                Err(e)
            }
        }
    }

    /// Cached telemetry with the link state computed as of now.
    pub fn telemetry(&self) -> TelemetryFrame {
        let status = self.status.read().unwrap_or_else(PoisonError::into_inner);
        let state = status.freshness.state(Instant::now());
        status.telemetry.clone().with_state(state)
    }

    pub fn link_state(&self) -> LinkState {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .freshness
            .state(Instant::now())
    }

    pub fn last_transport_error(&self) -> Option<String> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_transport_error
            .clone()
    }

    async fn transmit(&self, frame: &[u8], what: &str) -> Result<(), TransportFailure> {
        match self.transport.send(frame).await {
            Ok(()) => {
                self.write_status().last_transport_error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send {}: {}", what, e);
                self.write_status().last_transport_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, LinkStatus> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }
}
