//! Broadcast telemetry records (telemetry channel).

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::channel::{Channel, COMPASS_CALIBRATION_V2, TELEMETRY_V1, TELEMETRY_V2};
use crate::codec::WireMessage;

/// First generation telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryV1 {
    /// Device clock, ms since the Unix epoch.
    pub time: u64,
    /// Millivolts.
    pub battery_voltage: u16,
    /// Millimetres below the surface.
    pub depth: i32,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl TelemetryV1 {
    pub fn depth_m(&self) -> f64 {
        f64::from(self.depth) / 1000.0
    }
}

impl WireMessage for TelemetryV1 {
    const CHANNEL: Channel = Channel::Telemetry;
    const CODE: u16 = TELEMETRY_V1;
    const WIRE_SIZE: usize = 22;
    const NAME: &'static str = "TelemetryV1";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u64(self.time);
        dst.put_u16(self.battery_voltage);
        dst.put_i32(self.depth);
        dst.put_i16(self.roll);
        dst.put_i16(self.pitch);
        dst.put_i16(self.yaw);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            time: src.get_u64(),
            battery_voltage: src.get_u16(),
            depth: src.get_i32(),
            roll: src.get_i16(),
            pitch: src.get_i16(),
            yaw: src.get_i16(),
        }
    }
}

/// Second generation telemetry.
///
/// Angles are whole degrees, depth is millimetres and water temperature is
/// tenths of a degree Celsius.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryV2 {
    /// Device clock, ms since the Unix epoch.
    pub time: u64,
    /// Device real-time clock, seconds.
    pub rt_clock: u32,
    pub depth: i32,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub temp_water: i16,
    pub battery_voltage: u16,
    pub battery_level: u8,
    pub lights: u8,
    pub camera_tilt: i8,
}

impl TelemetryV2 {
    pub fn depth_m(&self) -> f64 {
        f64::from(self.depth) / 1000.0
    }

    pub fn temperature_c(&self) -> f64 {
        f64::from(self.temp_water) / 10.0
    }
}

impl WireMessage for TelemetryV2 {
    const CHANNEL: Channel = Channel::Telemetry;
    const CODE: u16 = TELEMETRY_V2;
    const WIRE_SIZE: usize = 31;
    const NAME: &'static str = "TelemetryV2";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u64(self.time);
        dst.put_u32(self.rt_clock);
        dst.put_i32(self.depth);
        dst.put_i16(self.roll);
        dst.put_i16(self.pitch);
        dst.put_i16(self.yaw);
        dst.put_i16(self.temp_water);
        dst.put_u16(self.battery_voltage);
        dst.put_u8(self.battery_level);
        dst.put_u8(self.lights);
        dst.put_i8(self.camera_tilt);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            time: src.get_u64(),
            rt_clock: src.get_u32(),
            depth: src.get_i32(),
            roll: src.get_i16(),
            pitch: src.get_i16(),
            yaw: src.get_i16(),
            temp_water: src.get_i16(),
            battery_voltage: src.get_u16(),
            battery_level: src.get_u8(),
            lights: src.get_u8(),
            camera_tilt: src.get_i8(),
        }
    }
}

/// Compass calibration progress, percent per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompassCalibrationV2 {
    pub progress_x: u8,
    pub progress_y: u8,
    pub progress_z: u8,
    pub progress_thruster: u8,
}

impl WireMessage for CompassCalibrationV2 {
    const CHANNEL: Channel = Channel::Telemetry;
    const CODE: u16 = COMPASS_CALIBRATION_V2;
    const WIRE_SIZE: usize = 6;
    const NAME: &'static str = "CompassCalibrationV2";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u8(self.progress_x);
        dst.put_u8(self.progress_y);
        dst.put_u8(self.progress_z);
        dst.put_u8(self.progress_thruster);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            progress_x: src.get_u8(),
            progress_y: src.get_u8(),
            progress_z: src.get_u8(),
            progress_thruster: src.get_u8(),
        }
    }
}
