use chrono::{DateTime, Utc};
use serde::Serialize;

use super::freshness::LinkState;
use crate::crtp::TelemetryPacket;

/// Last known drone state as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub battery: u8,
    pub altitude: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub vbat: f32,
    /// When the values were decoded. `None` until the first frame arrives.
    pub timestamp: Option<DateTime<Utc>>,
    pub connected: bool,
    pub link_state: LinkState,
}

impl Default for TelemetryFrame {
    fn default() -> Self {
        Self {
            battery: 0,
            altitude: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vbat: 0.0,
            timestamp: None,
            connected: false,
            link_state: LinkState::Disconnected,
        }
    }
}

impl TelemetryFrame {
    pub(crate) fn apply(&mut self, packet: &TelemetryPacket, at: DateTime<Utc>) {
        self.battery = packet.battery;
        self.altitude = packet.altitude;
        self.roll = packet.roll;
        self.pitch = packet.pitch;
        self.yaw = packet.yaw;
        self.vbat = packet.vbat;
        self.timestamp = Some(at);
    }

    pub(crate) fn with_state(mut self, state: LinkState) -> Self {
        self.link_state = state;
        self.connected = state == LinkState::Connected;
        self
    }
}
