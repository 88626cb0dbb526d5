//! Transport-level error types.
//!
//! These describe failures at the device layer. The background poller
//! swallows them as zero-byte ticks; explicit calls such as `open`, `write`
//! or the line-signal passthroughs surface them to the caller.

use thiserror::Error;

/// Errors that can occur while talking to a transport.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Attempted to open a transport that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// Attempted to use a transport that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The transport does not implement the requested operation.
    #[error("Operation not supported by this transport: {0}")]
    Unsupported(&'static str),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// True for failures the poller treats as "nothing arrived this tick"
    /// rather than as a device problem worth reporting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
