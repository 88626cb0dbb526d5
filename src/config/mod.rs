//! Configuration module for buffered-serial.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `BUFFERED_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./buffered-serial.toml` (current directory)
//! 3. `config.toml` in the platform config directory, e.g.
//!    `~/.config/buffered-serial/` on Linux
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `BUFFERED_SERIAL_<SECTION>_<KEY>`
//!
//! Examples:
//! - `BUFFERED_SERIAL_SERIAL_PORT=/dev/ttyUSB0`
//! - `BUFFERED_SERIAL_SERIAL_BAUD=115200`
//! - `BUFFERED_SERIAL_BUFFER_TIMEOUT_MS=500`
//! - `BUFFERED_SERIAL_BUFFER_DELIMITER=\r\n`
//!
//! # Example
//!
//! ```rust,no_run
//! use buffered_serial::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default baud: {}", config.serial.baud_rate);
//! let settings = config.port_settings()?;
//! println!("Poll interval: {:?}", settings.poll_interval);
//! # Ok::<(), buffered_serial::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{unescape, BufferConfig, Config, LogFormat, LoggingConfig, SerialConfig};
