//! The Pioneer link task.
//!
//! Ties the two channels to the wire records: decodes replies and telemetry,
//! translates telemetry into generic measurements, keeps the vehicle clock
//! in step, sends the watchdog on every heartbeat and writes raw logs during
//! logging sessions. Everything runs on std threads; see [`Link`].

pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod handlers;
pub mod link;
pub mod logger;
pub mod timesync;
pub mod translate;

pub use bus::{
    Direction, LoggingControl, Measurement, NavigationEstimate, NavigationState, NullPublisher,
    Orientation, Publisher, RawFrame,
};
pub use command::{CommandChannel, CommandSender, Watchdog};
pub use config::{ConfigChange, LinkConfig, ReliableAction, SharedConfig};
pub use error::{LinkError, Result};
pub use handlers::{ReplyHandler, TelemetryHandler};
pub use link::{Link, TcpPeerFilter};
pub use logger::{LoggerSet, RawLogger, COMMANDS_FILE, REPLIES_FILE, TELEMETRY_FILE};
pub use timesync::{Clock, SystemClock, TimeSync};
