//! Command and telemetry link for Pioneer underwater drones.
//!
//! The vehicle takes commands over TCP and answers on the same connection;
//! it broadcasts telemetry over UDP. This crate bundles the layers that
//! speak that protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP command channel and UDP telemetry channel
//! - [`frame`]: fixed-layout wire records, registries and dispatch
//! - [`device`]: the link task, translation, time sync and raw logs (behind
//!   the `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use pioneerlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pioneerlink_frame::*;
}

/// Re-export link types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use pioneerlink_device::*;
}
