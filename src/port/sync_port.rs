//! Serial port transport backed by the `serialport` crate.
//!
//! Unlike a raw `serialport::SerialPort`, a `SyncSerialPort` can be closed
//! and reopened in place, which is what the buffering controller needs for
//! its open/close cycles.

use super::error::PortError;
use super::traits::{PortConfiguration, Transport, TransportOptions};
use serde::Serialize;
use std::io::{Read, Write};

/// A system serial port as reported by the operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub kind: String,
}

/// List the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<PortInfo>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => match usb.product {
                    Some(product) => format!("usb ({product})"),
                    None => format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                },
                serialport::SerialPortType::PciPort => "pci".to_string(),
                serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            };
            PortInfo {
                name: p.port_name,
                kind,
            }
        })
        .collect())
}

/// Serial port transport wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The open device, `None` while closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
    /// Settings used on the next open and kept in sync by `configure`.
    config: PortConfiguration,
}

impl SyncSerialPort {
    /// Create a closed port handle. Nothing touches the device until
    /// [`Transport::open`] is called.
    ///
    /// # Example
    /// ```no_run
    /// use buffered_serial::port::{PortConfiguration, SyncSerialPort, Transport};
    ///
    /// let mut port = SyncSerialPort::new("/dev/ttyUSB0", PortConfiguration::default());
    /// port.open()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(port_name: impl Into<String>, config: PortConfiguration) -> Self {
        Self {
            port: None,
            name: port_name.into(),
            config,
        }
    }

    /// Create and open a port in one step.
    pub fn open_with(port_name: &str, config: PortConfiguration) -> Result<Self, PortError> {
        let mut port = Self::new(port_name, config);
        port.open()?;
        Ok(port)
    }

    /// The settings the port was (or will be) opened with.
    pub fn configuration(&self) -> &PortConfiguration {
        &self.config
    }

    /// Get a mutable reference to the underlying serialport implementation.
    ///
    /// This can be useful for accessing platform-specific features.
    pub fn as_raw_mut(&mut self) -> Option<&mut dyn serialport::SerialPort> {
        match self.port.as_mut() {
            Some(port) => Some(&mut **port),
            None => None,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }
}

impl Transport for SyncSerialPort {
    fn open(&mut self) -> Result<(), PortError> {
        if self.port.is_some() {
            return Err(PortError::AlreadyOpen);
        }

        let port = serialport::new(self.name.as_str(), self.config.baud_rate)
            .data_bits(self.config.data_bits.into())
            .flow_control(self.config.flow_control.into())
            .parity(self.config.parity.into())
            .stop_bits(self.config.stop_bits.into())
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(self.name.as_str()),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), PortError> {
        // Dropping the handle releases the file descriptor / COM handle.
        self.port = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.device()?.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.device()?.read(buffer).map_err(PortError::Io)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        let port = self.port.as_ref().ok_or(PortError::NotOpen)?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.device()?.flush().map_err(PortError::Io)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.device()?
            .clear(serialport::ClearBuffer::Input)
            .map_err(PortError::Serial)
    }

    fn clear_output(&mut self) -> Result<(), PortError> {
        self.device()?
            .clear(serialport::ClearBuffer::Output)
            .map_err(PortError::Serial)
    }

    fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        let port = self.device()?;
        if level {
            port.set_break()?;
        } else {
            port.clear_break()?;
        }
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        Ok(self.device()?.write_request_to_send(level)?)
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        Ok(self.device()?.write_data_terminal_ready(level)?)
    }

    fn read_cts(&mut self) -> Result<bool, PortError> {
        Ok(self.device()?.read_clear_to_send()?)
    }

    fn read_dsr(&mut self) -> Result<bool, PortError> {
        Ok(self.device()?.read_data_set_ready()?)
    }

    fn read_ri(&mut self) -> Result<bool, PortError> {
        Ok(self.device()?.read_ring_indicator()?)
    }

    fn read_cd(&mut self) -> Result<bool, PortError> {
        Ok(self.device()?.read_carrier_detect()?)
    }

    fn configure(&mut self, options: &TransportOptions) -> Result<(), PortError> {
        if let Some(port) = self.port.as_mut() {
            if let Some(baud_rate) = options.baud_rate {
                port.set_baud_rate(baud_rate)?;
            }
            if let Some(data_bits) = options.data_bits {
                port.set_data_bits(data_bits.into())?;
            }
            if let Some(parity) = options.parity {
                port.set_parity(parity.into())?;
            }
            if let Some(stop_bits) = options.stop_bits {
                port.set_stop_bits(stop_bits.into())?;
            }
            if let Some(flow_control) = options.flow_control {
                port.set_flow_control(flow_control.into())?;
            }
            if let Some(timeout) = options.read_timeout {
                port.set_timeout(timeout)?;
            }
        }
        self.config.apply(options);
        Ok(())
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("baud_rate", &self.config.baud_rate)
            .finish()
    }
}
