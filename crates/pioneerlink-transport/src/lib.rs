//! Network channels for the Pioneer link.
//!
//! Two independently managed channels talk to the vehicle:
//! - a TCP channel for outbound commands and their replies
//! - a UDP channel for inbound broadcast telemetry
//!
//! This is the lowest layer of pioneerlink. Channels know nothing about the
//! wire protocol; received bytes go to an injected [`FrameHandler`] and health
//! transitions to an injected [`HealthSink`].

pub mod error;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::{ReliableChannel, ReliableConfig};
pub use traits::{
    AcceptAll, ChannelState, DiscardSink, FrameHandler, HealthSink, HealthState, RawSink,
    SenderFilter,
};
pub use udp::{DatagramChannel, DatagramConfig};
