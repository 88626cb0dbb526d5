//! Subscriber setup for the `buffered-serial` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it. The binary calls [`init_logging`] once at startup.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to open log file '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// The filter comes from `level_override` if given, else `RUST_LOG`, else
/// `config.level`. Console output goes to stderr so stdout stays free for
/// received data. With `config.file` set, a second JSON layer appends to that
/// file.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<(), LoggingError> {
    let filter = build_filter(config, level_override)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);
    let console = match config.format {
        LogFormat::Pretty => console.pretty().with_filter(filter.clone()).boxed(),
        LogFormat::Compact => console.compact().with_filter(filter.clone()).boxed(),
        LogFormat::Json => console.json().with_filter(filter.clone()).boxed(),
    };
    layers.push(console);

    if let Some(path) = &config.file {
        let file = open_log_file(path)?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .json()
            .with_filter(filter)
            .boxed();
        layers.push(file_layer);
    }

    Registry::default().with(layers).try_init()?;
    Ok(())
}

fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> Result<EnvFilter, ParseError> {
    let directive = match level_override {
        Some(level) => level.to_string(),
        None => std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| config.level.clone()),
    };
    EnvFilter::try_new(directive)
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let to_error = |source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)
}
