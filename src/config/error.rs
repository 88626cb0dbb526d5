//! Errors raised while loading, validating or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("cannot read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("cannot write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but is out of range for a port or buffer setting.
    #[error("invalid value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// A `BUFFERED_SERIAL_*` override could not be parsed.
    #[error("bad environment override '{var}': {message}")]
    EnvParseError { var: String, message: String },

    /// A required setting, such as the save path, was never provided.
    #[error("missing required setting: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
