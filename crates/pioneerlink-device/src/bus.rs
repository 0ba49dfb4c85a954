//! Values exchanged with the surrounding system.
//!
//! Outbound values go through a [`Publisher`]. Inbound values are delivered
//! by calling the matching method on [`crate::Link`].

use std::path::PathBuf;

use pioneerlink_frame::Channel;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Roll, pitch and heading in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    /// Device real-time clock, seconds.
    pub time: f64,
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
    pub psi_magnetic: f64,
}

/// Vehicle navigation estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavigationEstimate {
    /// Radians.
    pub lat: f64,
    /// Radians.
    pub lon: f64,
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
    /// Metres.
    pub depth: f64,
    /// Built from telemetry at a fixed reference, not from a navigation
    /// solution.
    pub synthetic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Verbatim bytes of one record seen on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawFrame {
    pub channel: Channel,
    pub direction: Direction,
    pub bytes: Vec<u8>,
}

/// A value published outward.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    /// Metres.
    Depth { value: f64 },
    Orientation(Orientation),
    /// Degrees Celsius.
    Temperature { value: f64 },
    NavigationEstimate(NavigationEstimate),
    RawFrame(RawFrame),
}

impl Measurement {
    pub fn kind(&self) -> &'static str {
        match self {
            Measurement::Depth { .. } => "depth",
            Measurement::Orientation(_) => "orientation",
            Measurement::Temperature { .. } => "temperature",
            Measurement::NavigationEstimate(_) => "navigation_estimate",
            Measurement::RawFrame(_) => "raw_frame",
        }
    }
}

/// Outward bus for decoded values.
///
/// Called from the receive workers; implementations must not block for
/// long.
pub trait Publisher: Send + Sync {
    fn publish(&self, measurement: Measurement) -> Result<()>;
}

impl<F> Publisher for F
where
    F: Fn(Measurement) -> Result<()> + Send + Sync,
{
    fn publish(&self, measurement: Measurement) -> Result<()> {
        self(measurement)
    }
}

/// Publisher that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _measurement: Measurement) -> Result<()> {
        Ok(())
    }
}

/// Navigation update consumed from the surrounding system.
///
/// `lat`/`lon` is the reference point in radians; `x`/`y` are the
/// north/east offsets from it in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub lat: f64,
    pub lon: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub depth: f64,
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
}

/// Logging session boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingControl {
    /// A session started; raw logs go to `folder`.
    Started { folder: PathBuf },
    Stopped,
}
