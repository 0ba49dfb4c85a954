use std::fmt;
use std::io;

use pioneerlink_device::LinkError;
use pioneerlink_frame::FrameError;
use pioneerlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DATA_INVALID,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::InvalidConfig { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        LinkError::Logger { source, path } => {
            io_error(&format!("{context} ({})", path.display()), source)
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_a_usage_error() {
        let err = link_error(
            "config",
            LinkError::InvalidConfig {
                field: "comm_timeout",
                reason: "must be within 1..=60 seconds".to_string(),
            },
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("config: invalid configuration"));
    }

    #[test]
    fn connect_errors_map_through_io_kind() {
        let err = transport_error(
            "connect",
            TransportError::Connect {
                addr: "127.0.0.1:2011".parse().expect("addr should parse"),
                source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn logger_errors_carry_the_path() {
        let err = link_error(
            "logging",
            LinkError::Logger {
                path: "/nowhere/commands.bin".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.message.contains("/nowhere/commands.bin"));
    }

    #[test]
    fn publish_errors_are_internal() {
        let err = link_error("run", LinkError::Publish("closed".to_string()));
        assert_eq!(err.code, INTERNAL);
    }
}
