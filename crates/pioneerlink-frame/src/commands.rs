//! Outbound command records (command/reply channel).

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::channel::{
    Channel, CMD_GET_CAMERA_PARAMETERS, CMD_PING, CMD_SET_SYSTEM_TIME, CMD_USER_GEO_LOCATION,
    CMD_WATCHDOG,
};
use crate::codec::WireMessage;

/// Scale of the geolocation fixed-point fields (degrees × 1e7).
pub const GEO_SCALE: f64 = 1e7;

/// Ping request (v2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CmdPing {
    pub sequence: u16,
}

impl WireMessage for CmdPing {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = CMD_PING;
    const WIRE_SIZE: usize = 3;
    const NAME: &'static str = "CmdPing";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u16(self.sequence);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            sequence: src.get_u16(),
        }
    }
}

/// Watchdog keep-alive (v1).
///
/// The vehicle stops if it does not see this periodically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CmdWatchdog {
    /// Seconds since the control side started.
    pub connection_duration: i16,
    pub client_id: u8,
}

impl WireMessage for CmdWatchdog {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = CMD_WATCHDOG;
    const WIRE_SIZE: usize = 4;
    const NAME: &'static str = "CmdWatchdog";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_i16(self.connection_duration);
        dst.put_u8(self.client_id);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            connection_duration: src.get_i16(),
            client_id: src.get_u8(),
        }
    }
}

/// Operator position (v1), degrees × 1e7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CmdUserGeoLocation {
    pub latitude: i32,
    pub longitude: i32,
}

impl CmdUserGeoLocation {
    /// Build from decimal degrees, rounding to the wire resolution.
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: (latitude * GEO_SCALE).round() as i32,
            longitude: (longitude * GEO_SCALE).round() as i32,
        }
    }

    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / GEO_SCALE
    }

    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / GEO_SCALE
    }
}

impl WireMessage for CmdUserGeoLocation {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = CMD_USER_GEO_LOCATION;
    const WIRE_SIZE: usize = 9;
    const NAME: &'static str = "CmdUserGeoLocation";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_i32(self.latitude);
        dst.put_i32(self.longitude);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            latitude: src.get_i32(),
            longitude: src.get_i32(),
        }
    }
}

/// Camera parameter request (v2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CmdGetCameraParameters {
    pub camera: u8,
}

impl WireMessage for CmdGetCameraParameters {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = CMD_GET_CAMERA_PARAMETERS;
    const WIRE_SIZE: usize = 2;
    const NAME: &'static str = "CmdGetCameraParameters";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u8(self.camera);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            camera: src.get_u8(),
        }
    }
}

/// Set the vehicle clock (v2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CmdSetSystemTime {
    /// Seconds since the Unix epoch.
    pub unix_timestamp: i32,
}

impl WireMessage for CmdSetSystemTime {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = CMD_SET_SYSTEM_TIME;
    const WIRE_SIZE: usize = 5;
    const NAME: &'static str = "CmdSetSystemTime";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_i32(self.unix_timestamp);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            unix_timestamp: src.get_i32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    fn reencode<M: WireMessage + PartialEq + std::fmt::Debug>(msg: M) {
        let mut buf = BytesMut::new();
        let written = encode(&msg, &mut buf).unwrap();
        assert_eq!(written, M::WIRE_SIZE);
        let (decoded, consumed) = decode::<M>(&buf).unwrap().unwrap();
        assert_eq!(consumed, M::WIRE_SIZE);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn watchdog_layout() {
        let mut buf = BytesMut::new();
        encode(
            &CmdWatchdog {
                connection_duration: 300,
                client_id: 7,
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(buf.as_ref(), &[0x02, 0x01, 0x2C, 0x07]);
    }

    #[test]
    fn set_system_time_layout() {
        let mut buf = BytesMut::new();
        encode(
            &CmdSetSystemTime {
                unix_timestamp: 1_600_000_000,
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(buf.as_ref(), &[0x07, 0x5F, 0x5E, 0x10, 0x00]);
    }

    #[test]
    fn commands_survive_reencoding_at_extremes() {
        reencode(CmdPing { sequence: 0 });
        reencode(CmdPing {
            sequence: u16::MAX,
        });
        reencode(CmdWatchdog {
            connection_duration: i16::MIN,
            client_id: u8::MAX,
        });
        reencode(CmdWatchdog {
            connection_duration: i16::MAX,
            client_id: 0,
        });
        reencode(CmdUserGeoLocation {
            latitude: -900_000_000,
            longitude: 1_800_000_000,
        });
        reencode(CmdGetCameraParameters { camera: 1 });
        reencode(CmdSetSystemTime {
            unix_timestamp: i32::MAX,
        });
        reencode(CmdSetSystemTime { unix_timestamp: 0 });
    }

    #[test]
    fn geolocation_degree_conversion() {
        let geo = CmdUserGeoLocation::from_degrees(41.18478174, -8.70657964);
        assert_eq!(geo.latitude, 411_847_817);
        assert_eq!(geo.longitude, -87_065_796);
        assert!((geo.latitude_degrees() - 41.1847817).abs() < 1e-9);
        assert!((geo.longitude_degrees() + 8.7065796).abs() < 1e-9);
    }
}
