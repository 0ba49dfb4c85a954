use std::path::PathBuf;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pioneerlink_transport::TransportError),

    /// Record encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] pioneerlink_frame::FrameError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A raw log file could not be opened or written.
    #[error("raw log {path}: {source}")]
    Logger {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The outward bus refused a value.
    #[error("publish failed: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
