//! Closed sets of decoded records, one enum per direction.

use serde::Serialize;

use crate::commands::{
    CmdGetCameraParameters, CmdPing, CmdSetSystemTime, CmdUserGeoLocation, CmdWatchdog,
};
use crate::replies::{ReplyAck, ReplyCameraParameters, ReplyPing};
use crate::telemetry::{CompassCalibrationV2, TelemetryV1, TelemetryV2};

/// Records the vehicle sends on the command/reply channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Ack(ReplyAck),
    Ping(ReplyPing),
    CameraParameters(ReplyCameraParameters),
}

/// Records the vehicle broadcasts on the telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Telemetry {
    V1(TelemetryV1),
    V2(TelemetryV2),
    CompassCalibration(CompassCalibrationV2),
}

/// Records the control side sends on the command/reply channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Ping(CmdPing),
    Watchdog(CmdWatchdog),
    UserGeoLocation(CmdUserGeoLocation),
    GetCameraParameters(CmdGetCameraParameters),
    SetSystemTime(CmdSetSystemTime),
}

impl Reply {
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Ack(_) => "ReplyAck",
            Reply::Ping(_) => "ReplyPing",
            Reply::CameraParameters(_) => "ReplyCameraParameters",
        }
    }
}

impl Telemetry {
    pub fn name(&self) -> &'static str {
        match self {
            Telemetry::V1(_) => "TelemetryV1",
            Telemetry::V2(_) => "TelemetryV2",
            Telemetry::CompassCalibration(_) => "CompassCalibrationV2",
        }
    }

    /// Device epoch milliseconds, for records that carry a clock.
    pub fn device_time_ms(&self) -> Option<u64> {
        match self {
            Telemetry::V1(t) => Some(t.time),
            Telemetry::V2(t) => Some(t.time),
            Telemetry::CompassCalibration(_) => None,
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping(_) => "CmdPing",
            Command::Watchdog(_) => "CmdWatchdog",
            Command::UserGeoLocation(_) => "CmdUserGeoLocation",
            Command::GetCameraParameters(_) => "CmdGetCameraParameters",
            Command::SetSystemTime(_) => "CmdSetSystemTime",
        }
    }
}

macro_rules! impl_from {
    ($($record:ty => $enum:ident::$variant:ident),* $(,)?) => {
        $(
            impl From<$record> for $enum {
                fn from(record: $record) -> Self {
                    $enum::$variant(record)
                }
            }
        )*
    };
}

impl_from! {
    ReplyAck => Reply::Ack,
    ReplyPing => Reply::Ping,
    ReplyCameraParameters => Reply::CameraParameters,
    TelemetryV1 => Telemetry::V1,
    TelemetryV2 => Telemetry::V2,
    CompassCalibrationV2 => Telemetry::CompassCalibration,
    CmdPing => Command::Ping,
    CmdWatchdog => Command::Watchdog,
    CmdUserGeoLocation => Command::UserGeoLocation,
    CmdGetCameraParameters => Command::GetCameraParameters,
    CmdSetSystemTime => Command::SetSystemTime,
}
