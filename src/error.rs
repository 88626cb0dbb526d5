//! Crate-level error type.
//!
//! A read that times out is not an error: it yields a short or empty result.
//! Errors are reserved for device failures on explicit calls, bad arguments,
//! configuration problems and failing to start the poller thread.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for buffered port operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the buffering engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed during an explicit open, close, write or
    /// passthrough call.
    #[error("transport error: {0}")]
    Port(#[from] PortError),

    /// A caller-supplied argument was rejected before touching any state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The background poller thread could not be started.
    #[error("failed to start poller thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True when the transport reported it is not open.
    pub fn is_not_open(&self) -> bool {
        matches!(self, Self::Port(PortError::NotOpen))
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Port(PortError::Io(io)) => io,
            Error::Port(PortError::NotOpen) => {
                std::io::Error::new(std::io::ErrorKind::NotConnected, err.to_string())
            }
            Error::InvalidArgument(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
            }
            Error::Spawn(io) => io,
            other => std::io::Error::other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::invalid_argument("delimiter must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid argument: delimiter must not be empty"
        );

        let err = Error::from(PortError::NotOpen);
        assert_eq!(err.to_string(), "transport error: Port is not open");
        assert!(err.is_not_open());
    }

    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::from(PortError::NotOpen).into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotConnected);

        let io: std::io::Error = Error::invalid_argument("n").into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);

        let inner = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let io: std::io::Error = Error::from(PortError::Io(inner)).into();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
