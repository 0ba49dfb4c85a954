//! Channel kinds and the type codes recognized on each.
//!
//! The command/reply channel (TCP) leads every record with a 1-byte code.
//! The telemetry channel (UDP) leads every record with a 2-byte big-endian
//! code. Code values are shared with the vehicle firmware.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

/// Ping request (v2).
pub const CMD_PING: u16 = 0x01;
/// Watchdog keep-alive (v1).
pub const CMD_WATCHDOG: u16 = 0x02;
/// Operator geolocation (v1).
pub const CMD_USER_GEO_LOCATION: u16 = 0x05;
/// Camera parameter request (v2).
pub const CMD_GET_CAMERA_PARAMETERS: u16 = 0x06;
/// Set vehicle system clock (v2).
pub const CMD_SET_SYSTEM_TIME: u16 = 0x07;

/// Command acknowledgement (v2).
pub const REPLY_ACK: u16 = 0x81;
/// Ping reply (v2).
pub const REPLY_PING: u16 = 0x82;
/// Camera parameter reply (v2).
pub const REPLY_GET_CAMERA_PARAMETERS: u16 = 0x86;

/// Full telemetry, first generation.
pub const TELEMETRY_V1: u16 = 0x0101;
/// Full telemetry, second generation.
pub const TELEMETRY_V2: u16 = 0x0201;
/// Compass calibration progress (v2).
pub const COMPASS_CALIBRATION_V2: u16 = 0x0202;

/// The two logical channels between the control computer and the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Commands out, replies in (TCP).
    CommandReply,
    /// Broadcast telemetry in (UDP).
    Telemetry,
}

impl Channel {
    /// Width in bytes of the leading type code.
    pub const fn code_width(self) -> usize {
        match self {
            Channel::CommandReply => 1,
            Channel::Telemetry => 2,
        }
    }

    /// Read the leading type code, or `None` if `buf` is too short.
    pub fn peek_code(self, buf: &[u8]) -> Option<u16> {
        match self {
            Channel::CommandReply => buf.first().map(|&b| u16::from(b)),
            Channel::Telemetry => match buf {
                [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
                _ => None,
            },
        }
    }

    /// Write `code` in this channel's code width.
    pub fn put_code(self, code: u16, dst: &mut BytesMut) {
        match self {
            Channel::CommandReply => dst.put_u8(code as u8),
            Channel::Telemetry => dst.put_u16(code),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::CommandReply => "command-reply",
            Channel::Telemetry => "telemetry",
        }
    }
}

/// Returns a human-readable name for a type code on `channel`.
pub fn code_name(channel: Channel, code: u16) -> &'static str {
    match (channel, code) {
        (Channel::CommandReply, CMD_PING) => "CMD_PING",
        (Channel::CommandReply, CMD_WATCHDOG) => "CMD_WATCHDOG",
        (Channel::CommandReply, CMD_USER_GEO_LOCATION) => "CMD_USER_GEO_LOCATION",
        (Channel::CommandReply, CMD_GET_CAMERA_PARAMETERS) => "CMD_GET_CAMERA_PARAMETERS",
        (Channel::CommandReply, CMD_SET_SYSTEM_TIME) => "CMD_SET_SYSTEM_TIME",
        (Channel::CommandReply, REPLY_ACK) => "REPLY_ACK",
        (Channel::CommandReply, REPLY_PING) => "REPLY_PING",
        (Channel::CommandReply, REPLY_GET_CAMERA_PARAMETERS) => "REPLY_GET_CAMERA_PARAMETERS",
        (Channel::Telemetry, TELEMETRY_V1) => "TELEMETRY_V1",
        (Channel::Telemetry, TELEMETRY_V2) => "TELEMETRY_V2",
        (Channel::Telemetry, COMPASS_CALIBRATION_V2) => "COMPASS_CALIBRATION_V2",
        _ => "UNKNOWN",
    }
}
