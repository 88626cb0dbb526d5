//! Core traits for transport abstraction.
//!
//! Defines the `Transport` trait that the buffering engine drains, so real
//! serial ports and mock implementations can be used interchangeably.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read timeout applied to the device itself, independent of the consumer
/// timeout. Short so a poller tick never blocks for long on the device.
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Device-level read/write timeout.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: DEFAULT_TRANSPORT_TIMEOUT,
        }
    }
}

impl PortConfiguration {
    /// Apply every option that is set, leaving the rest untouched.
    pub fn apply(&mut self, options: &TransportOptions) {
        if let Some(baud_rate) = options.baud_rate {
            self.baud_rate = baud_rate;
        }
        if let Some(data_bits) = options.data_bits {
            self.data_bits = data_bits;
        }
        if let Some(parity) = options.parity {
            self.parity = parity;
        }
        if let Some(stop_bits) = options.stop_bits {
            self.stop_bits = stop_bits;
        }
        if let Some(flow_control) = options.flow_control {
            self.flow_control = flow_control;
        }
        if let Some(timeout) = options.read_timeout {
            self.timeout = timeout;
        }
    }
}

/// Device-specific settings forwarded unchanged to [`Transport::configure`].
///
/// Every field is optional; `None` means "leave as is". The buffering layer
/// never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportOptions {
    pub baud_rate: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub parity: Option<Parity>,
    pub stop_bits: Option<StopBits>,
    pub flow_control: Option<FlowControl>,
    pub read_timeout: Option<Duration>,
}

impl TransportOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// A byte-oriented device the buffering engine drains.
///
/// Implementations are driven from two threads: the poller thread calls
/// [`bytes_to_read`](Transport::bytes_to_read) and
/// [`read_bytes`](Transport::read_bytes), the owning controller calls
/// everything else. The controller serializes those calls behind a lock, so
/// implementations need not be reentrant.
///
/// Line-signal and break operations default to [`PortError::Unsupported`].
pub trait Transport: Send + std::fmt::Debug {
    /// Open the underlying device. Opening an open transport is an error.
    fn open(&mut self) -> Result<(), PortError>;

    /// Close the underlying device. Closing a closed transport succeeds.
    fn close(&mut self) -> Result<(), PortError>;

    /// Whether the device is currently open.
    fn is_open(&self) -> bool;

    /// Get the name/path of this transport.
    fn name(&self) -> &str;

    /// Write bytes to the device.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the device into the provided buffer.
    ///
    /// Must not block longer than the device timeout. Returns the number of
    /// bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Number of bytes the device reports as ready to read.
    fn bytes_to_read(&self) -> Result<usize, PortError>;

    /// Block until all written data has been transmitted.
    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Discard data received by the device but not yet read.
    fn clear_input(&mut self) -> Result<(), PortError>;

    /// Discard data written but not yet transmitted.
    fn clear_output(&mut self) -> Result<(), PortError>;

    /// Assert or release the break condition.
    fn set_break(&mut self, _level: bool) -> Result<(), PortError> {
        Err(PortError::Unsupported("break"))
    }

    /// Hold the break condition for `duration`, then release it.
    fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        self.set_break(true)?;
        std::thread::sleep(duration);
        self.set_break(false)
    }

    /// Drive the RTS (request to send) line.
    fn set_rts(&mut self, _level: bool) -> Result<(), PortError> {
        Err(PortError::Unsupported("rts"))
    }

    /// Drive the DTR (data terminal ready) line.
    fn set_dtr(&mut self, _level: bool) -> Result<(), PortError> {
        Err(PortError::Unsupported("dtr"))
    }

    /// Read the CTS (clear to send) line.
    fn read_cts(&mut self) -> Result<bool, PortError> {
        Err(PortError::Unsupported("cts"))
    }

    /// Read the DSR (data set ready) line.
    fn read_dsr(&mut self) -> Result<bool, PortError> {
        Err(PortError::Unsupported("dsr"))
    }

    /// Read the RI (ring indicator) line.
    fn read_ri(&mut self) -> Result<bool, PortError> {
        Err(PortError::Unsupported("ri"))
    }

    /// Read the CD (carrier detect) line.
    fn read_cd(&mut self) -> Result<bool, PortError> {
        Err(PortError::Unsupported("cd"))
    }

    /// Apply device-specific settings.
    fn configure(&mut self, _options: &TransportOptions) -> Result<(), PortError> {
        Err(PortError::Unsupported("configure"))
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), PortError> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), PortError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        (**self).write_bytes(data)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        (**self).read_bytes(buffer)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        (**self).bytes_to_read()
    }

    fn flush(&mut self) -> Result<(), PortError> {
        (**self).flush()
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        (**self).clear_input()
    }

    fn clear_output(&mut self) -> Result<(), PortError> {
        (**self).clear_output()
    }

    fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        (**self).set_break(level)
    }

    fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        (**self).send_break(duration)
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        (**self).set_rts(level)
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        (**self).set_dtr(level)
    }

    fn read_cts(&mut self) -> Result<bool, PortError> {
        (**self).read_cts()
    }

    fn read_dsr(&mut self) -> Result<bool, PortError> {
        (**self).read_dsr()
    }

    fn read_ri(&mut self) -> Result<bool, PortError> {
        (**self).read_ri()
    }

    fn read_cd(&mut self) -> Result<bool, PortError> {
        (**self).read_cd()
    }

    fn configure(&mut self, options: &TransportOptions) -> Result<(), PortError> {
        (**self).configure(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut config = PortConfiguration::default();
        config.apply(&TransportOptions {
            baud_rate: Some(115_200),
            parity: Some(Parity::Even),
            ..Default::default()
        });

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.timeout, DEFAULT_TRANSPORT_TIMEOUT);
    }

    #[test]
    fn test_empty_options() {
        assert!(TransportOptions::default().is_empty());
        let options = TransportOptions {
            stop_bits: Some(StopBits::Two),
            ..Default::default()
        };
        assert!(!options.is_empty());
    }

    #[test]
    fn test_data_bits_conversion() {
        let serialport_bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(serialport_bits, serialport::DataBits::Seven);
    }

    #[test]
    fn test_flow_control_conversion() {
        let serialport_flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(serialport_flow, serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_parity_conversion() {
        let serialport_parity: serialport::Parity = Parity::Odd.into();
        assert_eq!(serialport_parity, serialport::Parity::Odd);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let serialport_stop_bits: serialport::StopBits = StopBits::Two.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }
}
