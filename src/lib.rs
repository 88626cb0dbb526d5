//! Buffered serial transport library
//!
//! A background poller continuously drains a serial-style byte transport
//! into an in-memory buffer, so application reads never race the device's
//! own (often small) receive buffer. Reads are timeout-bounded and return
//! partial data rather than failing when the deadline passes.
//!
//! # Modules
//!
//! - `buffer`: Thread-safe FIFO byte buffer
//! - `poller`: Background thread draining a transport into the buffer
//! - `reader`: Timeout-bounded `read` and `read_line`
//! - `controller`: `BufferedPort`, tying transport, poller and buffer together
//! - `port`: Transport abstraction, real serial port and mock
//! - `config`: Configuration management with TOML support
//! - `error`: Unified error handling
//! - `logging`: Subscriber setup for the binary
//!
//! # Example
//!
//! ```
//! use buffered_serial::{BufferedPort, MockTransport, PortSettings};
//! use std::time::Duration;
//!
//! let device = MockTransport::new("loop0");
//! let settings = PortSettings::default().with_poll_interval(Duration::from_millis(5));
//! let mut port = BufferedPort::open_with(device.clone(), settings)?;
//!
//! device.push_incoming(b"AT\r\nOK\r\n");
//! let line = port.read_line_timeout(b"\r\n", Duration::from_secs(1))?;
//! assert_eq!(line, b"AT\r\n");
//!
//! port.close()?;
//! # Ok::<(), buffered_serial::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod poller;
pub mod port;
pub mod reader;

// Re-export commonly used types for convenience
pub use buffer::SharedBuffer;
pub use controller::{BufferedPort, PortMetrics, PortSettings};
pub use error::{Error, Result};
pub use poller::{Poller, PollerState, SharedTransport, DEFAULT_POLL_INTERVAL};
pub use port::{
    available_ports, DataBits, FlowControl, MockTransport, Parity, PortConfiguration, PortError,
    PortInfo, StopBits, SyncSerialPort, Transport, TransportOptions,
};
pub use reader::{ReadTimeout, TimeoutReader, DEFAULT_READ_QUANTUM};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
