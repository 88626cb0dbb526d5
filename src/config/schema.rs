//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::controller::PortSettings;
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use crate::reader::ReadTimeout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device configuration
    pub serial: SerialConfig,
    /// Buffering engine configuration
    pub buffer: BufferConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Runtime settings for a [`BufferedPort`](crate::BufferedPort), after
    /// validating the buffer section.
    pub fn port_settings(&self) -> ConfigResult<PortSettings> {
        self.buffer.validate()?;
        Ok(PortSettings {
            timeout: self.buffer.timeout(),
            poll_interval: self.buffer.poll_interval(),
            read_quantum: self.buffer.read_quantum(),
            delimiter: self.buffer.delimiter_bytes(),
        })
    }
}

/// Serial device configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device to open when none is given on the command line
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Transport-level read timeout in milliseconds. Kept short; consumer
    /// timeouts live in the `[buffer]` section.
    pub device_timeout_ms: u64,
    /// Friendly names for device paths
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let defaults = PortConfiguration::default();
        Self {
            port: None,
            baud_rate: defaults.baud_rate,
            data_bits: defaults.data_bits,
            parity: defaults.parity,
            stop_bits: defaults.stop_bits,
            flow_control: defaults.flow_control,
            device_timeout_ms: defaults.timeout.as_millis() as u64,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Get the device timeout as Duration
    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line settings handed to the transport on open.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: self.device_timeout(),
        }
    }
}

/// Buffering engine configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Consumer read timeout in milliseconds: 0 checks once, negative waits
    /// indefinitely.
    pub timeout_ms: i64,
    /// Pause between poller ticks in milliseconds
    pub poll_interval_ms: u64,
    /// Pause between buffer checks while a read waits, in milliseconds
    pub read_quantum_ms: u64,
    /// Default line delimiter. Escapes such as `\r\n` and `\x03` are decoded.
    pub delimiter: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        let defaults = PortSettings::default();
        Self {
            timeout_ms: 1000,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            read_quantum_ms: defaults.read_quantum.as_millis() as u64,
            delimiter: "\\n".to_string(),
        }
    }
}

impl BufferConfig {
    pub fn timeout(&self) -> ReadTimeout {
        ReadTimeout::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_quantum(&self) -> Duration {
        Duration::from_millis(self.read_quantum_ms)
    }

    /// The delimiter with escapes decoded.
    pub fn delimiter_bytes(&self) -> Vec<u8> {
        unescape(&self.delimiter)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "buffer.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.read_quantum_ms == 0 {
            return Err(ConfigError::validation(
                "buffer.read_quantum_ms",
                "must be greater than zero",
            ));
        }
        if self.delimiter_bytes().is_empty() {
            return Err(ConfigError::validation(
                "buffer.delimiter",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Log file path (optional)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// Decode `\n`, `\r`, `\t`, `\0`, `\\` and `\xHH` escapes.
///
/// Unknown escapes are kept verbatim so a typo never silently turns into a
/// different delimiter.
pub fn unescape(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let decoded = match bytes[i + 1] {
            b'n' => Some((b'\n', 2)),
            b'r' => Some((b'\r', 2)),
            b't' => Some((b'\t', 2)),
            b'0' => Some((0, 2)),
            b'\\' => Some((b'\\', 2)),
            b'x' => bytes
                .get(i + 2..i + 4)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .map(|byte| (byte, 4)),
            _ => None,
        };
        match decoded {
            Some((byte, width)) => {
                out.push(byte);
                i += width;
            }
            None => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    out
}
