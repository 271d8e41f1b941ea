//! Stand-in drone for local development.
//!
//! Listens for setpoint frames, integrates a very rough flight model and
//! answers with telemetry: after every setpoint or refresh ping, and once a
//! second to whoever spoke to it last.
//!
//! Usage: `sim_drone [bind-addr]` (default `127.0.0.1:2390`).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use skybridge::crtp::{self, SetpointCommand, TelemetryPacket};
use skybridge::util::setup_logging;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

/// Thrust that holds altitude.
const HOVER_THRUST: f32 = 36_000.0;
/// Climb rate at full thrust, m/s.
const MAX_CLIMB_RATE: f32 = 1.5;

struct SimDrone {
    altitude: f32,
    roll: f32,
    pitch: f32,
    yaw: f32,
    thrust: u16,
    battery: f32,
    last_step: Instant,
}

impl SimDrone {
    fn new() -> Self {
        Self {
            altitude: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            thrust: 0,
            battery: 100.0,
            last_step: Instant::now(),
        }
    }

    fn step(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_step).as_secs_f32();
        self.last_step = now;

        let thrust = self.thrust as f32;
        let climb = ((thrust - HOVER_THRUST) / (u16::MAX as f32 - HOVER_THRUST)).clamp(-1.0, 1.0)
            * MAX_CLIMB_RATE;
        self.altitude = (self.altitude + climb * dt).max(0.0);
        if self.altitude == 0.0 {
            self.roll = 0.0;
            self.pitch = 0.0;
        }

        // About 7 minutes of flight at full thrust, idle drain otherwise
        let drain = 0.01 + 0.23 * thrust / u16::MAX as f32;
        self.battery = (self.battery - drain * dt).max(0.0);
    }

    fn apply(&mut self, cmd: &SetpointCommand) {
        self.roll = cmd.roll;
        self.pitch = cmd.pitch;
        self.yaw = cmd.yaw;
        self.thrust = if self.battery > 0.0 { cmd.thrust } else { 0 };
    }

    fn packet(&self) -> TelemetryPacket {
        TelemetryPacket {
            battery: self.battery.round() as u8,
            altitude: self.altitude,
            roll: self.roll,
            pitch: self.pitch,
            yaw: self.yaw,
            vbat: 3.0 + 1.2 * self.battery / 100.0,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging("info");

    let bind: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:2390".to_string())
        .parse()
        .context("Invalid bind address")?;
    let socket = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Simulated drone listening on {}", socket.local_addr()?);

    let mut drone = SimDrone::new();
    let mut peer: Option<SocketAddr> = None;
    let mut heartbeat = interval(Duration::from_secs(1));
    let mut buf = [0u8; 64];

    loop {
        let received = tokio::select! {
            received = socket.recv_from(&mut buf) => Some(received),
            _ = heartbeat.tick() => None,
        };
        drone.step(Instant::now());

        let reply = match received {
            Some(Err(e)) => {
                warn!("Receive failed: {}", e);
                continue;
            }
            Some(Ok((len, from))) => {
                if peer != Some(from) {
                    info!("Ground station at {}", from);
                    peer = Some(from);
                }
                handle_frame(&mut drone, &buf[..len])
            }
            None => peer.is_some(),
        };

        if let (true, Some(to)) = (reply, peer) {
            let frame = crtp::encode_telemetry(&drone.packet());
            if let Err(e) = socket.send_to(&frame, to).await {
                warn!("Failed to send telemetry to {}: {}", to, e);
            }
        }
    }
}

/// Returns true if the frame deserves a telemetry reply.
fn handle_frame(drone: &mut SimDrone, frame: &[u8]) -> bool {
    match frame.first().map(|h| crtp::port_of(*h)) {
        Some(crtp::SETPOINT_PORT) => match crtp::decode_setpoint(frame) {
            Ok(cmd) => {
                debug!("Setpoint {:?}", cmd);
                drone.apply(&cmd);
                true
            }
            Err(e) => {
                warn!("Dropping setpoint: {}", e);
                false
            }
        },
        Some(crtp::LOG_PORT) => true,
        Some(port) => {
            warn!("Ignoring frame on port {:#04x}", port);
            false
        }
        None => false,
    }
}
