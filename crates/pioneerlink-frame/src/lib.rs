//! Fixed-layout Pioneer wire records and per-channel dispatch.
//!
//! Every record starts with a type code whose width depends on the channel:
//! - 1 byte on the command/reply channel (TCP)
//! - 2 bytes, big-endian, on the telemetry channel (UDP)
//!
//! The code fully determines the record's size. Decoding never reads past
//! that size, and unrecognized codes are skipped rather than treated as
//! errors so that unknown traffic never stalls a channel.

pub mod channel;
pub mod codec;
pub mod commands;
pub mod error;
pub mod message;
pub mod reader;
pub mod registry;
pub mod replies;
pub mod telemetry;

pub use channel::{code_name, Channel};
pub use codec::{decode, encode, WireMessage};
pub use commands::{
    CmdGetCameraParameters, CmdPing, CmdSetSystemTime, CmdUserGeoLocation, CmdWatchdog,
};
pub use error::{FrameError, Result};
pub use message::{Command, Reply, Telemetry};
pub use reader::{RecordReader, StreamItem};
pub use registry::{Decoded, Dispatcher, MessageHandler, MessageRegistry, RegistryEntry};
pub use replies::{ReplyAck, ReplyCameraParameters, ReplyPing};
pub use telemetry::{CompassCalibrationV2, TelemetryV1, TelemetryV2};
