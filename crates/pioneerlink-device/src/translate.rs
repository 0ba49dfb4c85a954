//! Conversion between device records and generic navigation values.

use std::f64::consts::{PI, TAU};

use pioneerlink_frame::{CmdUserGeoLocation, TelemetryV2};

use crate::bus::{Measurement, NavigationEstimate, NavigationState, Orientation};

/// Latitude of the fixed reference used for synthetic estimates, degrees.
pub const REFERENCE_LAT_DEG: f64 = 41.184_781_74;
/// Longitude of the fixed reference used for synthetic estimates, degrees.
pub const REFERENCE_LON_DEG: f64 = -8.706_579_64;

/// WGS-84 semi-major axis, metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 first eccentricity squared.
const WGS84_E2: f64 = 0.006_694_379_990_13;

const ECEF_MAX_ITERATIONS: usize = 16;
const ECEF_HEIGHT_TOLERANCE: f64 = 1e-4;

/// Wrap an angle into `[-π, π)`.
pub fn normalize_radian(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Values published for one second-generation telemetry record.
///
/// With `synthetic` set, a navigation estimate at the fixed reference point
/// is appended, carrying the record's attitude and depth.
pub fn measurements_from_v2(telemetry: &TelemetryV2, synthetic: bool) -> Vec<Measurement> {
    let phi = f64::from(telemetry.roll).to_radians();
    let theta = f64::from(telemetry.pitch).to_radians();
    let psi = f64::from(telemetry.yaw).to_radians();
    let depth = telemetry.depth_m();

    let mut out = vec![
        Measurement::Depth { value: depth },
        Measurement::Orientation(Orientation {
            time: f64::from(telemetry.rt_clock),
            phi,
            theta,
            psi,
            psi_magnetic: psi,
        }),
        Measurement::Temperature {
            value: telemetry.temperature_c(),
        },
    ];

    if synthetic {
        out.push(Measurement::NavigationEstimate(NavigationEstimate {
            lat: REFERENCE_LAT_DEG.to_radians(),
            lon: REFERENCE_LON_DEG.to_radians(),
            phi,
            theta,
            psi,
            depth,
            synthetic: true,
        }));
    }
    out
}

/// Operator position command for a navigation update.
pub fn geolocation_from_state(state: &NavigationState) -> CmdUserGeoLocation {
    let (lat, lon) = displace(state.lat, state.lon, state.x, state.y);
    CmdUserGeoLocation::from_degrees(
        normalize_radian(lat).to_degrees(),
        normalize_radian(lon).to_degrees(),
    )
}

/// Move a WGS-84 position (radians) by `north`/`east` metres on the local
/// tangent plane.
pub fn displace(lat: f64, lon: f64, north: f64, east: f64) -> (f64, f64) {
    let (mut x, mut y, mut z) = to_ecef(lat, lon, 0.0);

    let phi = z.atan2(x.hypot(y));
    let (slon, clon) = lon.sin_cos();
    let (sphi, cphi) = phi.sin_cos();

    x += -slon * east - clon * sphi * north;
    y += clon * east - slon * sphi * north;
    z += cphi * north;

    let (lat, lon, _height) = from_ecef(x, y, z);
    (lat, lon)
}

fn prime_vertical_radius(lat: f64) -> f64 {
    let s = lat.sin();
    WGS84_A / (1.0 - WGS84_E2 * s * s).sqrt()
}

fn to_ecef(lat: f64, lon: f64, height: f64) -> (f64, f64, f64) {
    let (slat, clat) = lat.sin_cos();
    let (slon, clon) = lon.sin_cos();
    let rn = prime_vertical_radius(lat);
    (
        (rn + height) * clat * clon,
        (rn + height) * clat * slon,
        ((1.0 - WGS84_E2) * rn + height) * slat,
    )
}

fn from_ecef(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let p = x.hypot(y);
    let lon = y.atan2(x);
    let mut lat = (z / p).atan2(0.01);
    let mut rn = prime_vertical_radius(lat);
    let mut height = p / lat.cos() - rn;

    for _ in 0..ECEF_MAX_ITERATIONS {
        let previous = height;
        lat = (z / p).atan2(1.0 - WGS84_E2 * rn / (rn + height));
        rn = prime_vertical_radius(lat);
        height = p / lat.cos() - rn;
        if (height - previous).abs() <= ECEF_HEIGHT_TOLERANCE {
            break;
        }
    }
    (lat, lon, height)
}
