//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "BUFFERED_SERIAL";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "buffered-serial.toml";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "BUFFERED_SERIAL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `BUFFERED_SERIAL_CONFIG` environment variable (explicit path)
    /// 2. `./buffered-serial.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Overrides before the bad variable stay applied; load() fails instead.
        if let Err(e) = apply_env_overrides(&mut config) {
            warn!(error = %e, "ignoring malformed environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            self.config = load_from_file(path)?;
            apply_env_overrides(&mut self.config)?;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "buffered-serial").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read `BUFFERED_SERIAL_<key>` and parse it, if set.
fn env_value<T: FromStr>(key: &str, message: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, message)),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `BUFFERED_SERIAL_<SECTION>_<KEY>`
/// For example:
/// - `BUFFERED_SERIAL_SERIAL_PORT=/dev/ttyUSB0`
/// - `BUFFERED_SERIAL_BUFFER_TIMEOUT_MS=-1`
/// - `BUFFERED_SERIAL_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some(val) = env_value::<String>("SERIAL_PORT", "Invalid port name")? {
        config.serial.port = Some(val);
    }
    if let Some(val) = env_value::<u32>("SERIAL_BAUD", "Invalid baud rate")? {
        config.serial.baud_rate = val;
    }
    if let Some(val) = env_value::<u64>("SERIAL_DEVICE_TIMEOUT_MS", "Invalid timeout")? {
        config.serial.device_timeout_ms = val;
    }

    // Buffer overrides
    if let Some(val) = env_value::<i64>("BUFFER_TIMEOUT_MS", "Invalid timeout")? {
        config.buffer.timeout_ms = val;
    }
    if let Some(val) = env_value::<u64>("BUFFER_POLL_INTERVAL_MS", "Invalid poll interval")? {
        config.buffer.poll_interval_ms = val;
    }
    if let Some(val) = env_value::<u64>("BUFFER_READ_QUANTUM_MS", "Invalid read quantum")? {
        config.buffer.read_quantum_ms = val;
    }
    // Not trimmed: whitespace can be part of a delimiter.
    if let Ok(val) = std::env::var(format!("{}_BUFFER_DELIMITER", ENV_PREFIX)) {
        config.buffer.delimiter = val;
    }

    // Logging overrides
    if let Some(val) = env_value::<String>("LOGGING_LEVEL", "Invalid log level")? {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var(format!("{}_LOGGING_FORMAT", ENV_PREFIX)) {
        config.logging.format = match val.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_parse(
                    format!("{}_LOGGING_FORMAT", ENV_PREFIX),
                    "Expected json, pretty or compact",
                ))
            }
        };
    }

    Ok(())
}
