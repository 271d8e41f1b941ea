//! CRTP-style framing for the two packets the bridge speaks.
//!
//! Every frame starts with a header byte `(port << 4) | channel` followed by
//! a fixed, little-endian payload. Only two layouts exist:
//!
//! | frame      | port | channel | payload                                        | size |
//! |------------|------|---------|------------------------------------------------|------|
//! | setpoint   | 0x03 | 0x00    | roll f32, pitch f32, yaw f32, thrust u16       | 15   |
//! | telemetry  | 0x05 | 0x00    | battery u8, altitude, roll, pitch, yaw, vbat f32 | 22 |
//!
//! A header-only telemetry frame (`0x50`) is used as the refresh ping.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Malformed};

pub const SETPOINT_PORT: u8 = 0x03;
pub const LOG_PORT: u8 = 0x05;
pub const CHANNEL: u8 = 0x00;

pub const SETPOINT_FRAME_LEN: usize = 15;
pub const TELEMETRY_FRAME_LEN: usize = 22;

pub const SETPOINT_HEADER: u8 = header(SETPOINT_PORT, CHANNEL);
pub const LOG_HEADER: u8 = header(LOG_PORT, CHANNEL);

/// Asks the drone to emit a telemetry frame right away.
pub const REFRESH_PING: [u8; 1] = [LOG_HEADER];

pub const fn header(port: u8, channel: u8) -> u8 {
    ((port & 0x0F) << 4) | (channel & 0x0F)
}

pub const fn port_of(header: u8) -> u8 {
    header >> 4
}

pub const fn channel_of(header: u8) -> u8 {
    header & 0x0F
}

/// Target attitude and motor power for one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SetpointCommand {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub thrust: u16,
}

impl SetpointCommand {
    pub fn new(roll: f32, pitch: f32, yaw: f32, thrust: u16) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            thrust,
        }
    }

    /// Builds a command from loosely typed input.
    ///
    /// Thrust is rounded to the nearest integer and clamped to `0..=65535`;
    /// a non-finite thrust becomes 0. Nothing ever wraps.
    pub fn from_raw(roll: f64, pitch: f64, yaw: f64, thrust: f64) -> Self {
        Self::new(roll as f32, pitch as f32, yaw as f32, clamp_thrust(thrust))
    }
}

pub fn clamp_thrust(thrust: f64) -> u16 {
    if !thrust.is_finite() {
        return 0;
    }
    thrust.round().clamp(0.0, u16::MAX as f64) as u16
}

/// Telemetry exactly as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryPacket {
    pub battery: u8,
    pub altitude: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub vbat: f32,
}

pub fn encode_setpoint(cmd: &SetpointCommand) -> [u8; SETPOINT_FRAME_LEN] {
    let mut buf = [0u8; SETPOINT_FRAME_LEN];
    buf[0] = SETPOINT_HEADER;
    buf[1..5].copy_from_slice(&cmd.roll.to_le_bytes());
    buf[5..9].copy_from_slice(&cmd.pitch.to_le_bytes());
    buf[9..13].copy_from_slice(&cmd.yaw.to_le_bytes());
    buf[13..15].copy_from_slice(&cmd.thrust.to_le_bytes());
    buf
}

pub fn decode_setpoint(buf: &[u8]) -> Result<SetpointCommand, DecodeError> {
    check_frame(buf, SETPOINT_PORT, SETPOINT_FRAME_LEN)?;
    Ok(SetpointCommand {
        roll: read_f32(buf, 1),
        pitch: read_f32(buf, 5),
        yaw: read_f32(buf, 9),
        thrust: u16::from_le_bytes([buf[13], buf[14]]),
    })
}

pub fn encode_telemetry(packet: &TelemetryPacket) -> [u8; TELEMETRY_FRAME_LEN] {
    let mut buf = [0u8; TELEMETRY_FRAME_LEN];
    buf[0] = LOG_HEADER;
    buf[1] = packet.battery;
    buf[2..6].copy_from_slice(&packet.altitude.to_le_bytes());
    buf[6..10].copy_from_slice(&packet.roll.to_le_bytes());
    buf[10..14].copy_from_slice(&packet.pitch.to_le_bytes());
    buf[14..18].copy_from_slice(&packet.yaw.to_le_bytes());
    buf[18..22].copy_from_slice(&packet.vbat.to_le_bytes());
    buf
}

pub fn decode_telemetry(buf: &[u8]) -> Result<TelemetryPacket, DecodeError> {
    check_frame(buf, LOG_PORT, TELEMETRY_FRAME_LEN)?;
    Ok(TelemetryPacket {
        battery: buf[1],
        altitude: read_f32(buf, 2),
        roll: read_f32(buf, 6),
        pitch: read_f32(buf, 10),
        yaw: read_f32(buf, 14),
        vbat: read_f32(buf, 18),
    })
}

fn check_frame(buf: &[u8], port: u8, min_len: usize) -> Result<(), DecodeError> {
    if buf.len() < min_len {
        return Err(DecodeError::MalformedFrame(Malformed::TooShort {
            expected: min_len,
            actual: buf.len(),
        }));
    }
    let actual = port_of(buf[0]);
    if actual != port {
        return Err(DecodeError::MalformedFrame(Malformed::WrongPort {
            expected: port,
            actual,
        }));
    }
    Ok(())
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
