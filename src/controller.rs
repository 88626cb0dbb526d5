//! The buffered port: ties transport, poller, buffer and readers together.
//!
//! ```text
//!  device ──> Transport ──(poller thread)──> SharedBuffer ──> read / read_line
//!     ^                                                         (caller thread)
//!     └──────────── write / passthroughs (caller thread) ───────────┘
//! ```
//!
//! Lifecycle is `Closed --open()--> Open --close()--> Closed`, repeatable.
//! Buffered data survives `close()`; only [`BufferedPort::flush_input`]
//! discards it.

use crate::buffer::SharedBuffer;
use crate::error::{Error, Result};
use crate::poller::{Poller, PollerState, SharedTransport, DEFAULT_POLL_INTERVAL};
use crate::port::{PortConfiguration, PortError, SyncSerialPort, Transport, TransportOptions};
use crate::reader::{ReadTimeout, TimeoutReader, DEFAULT_READ_QUANTUM};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime settings of a [`BufferedPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Consumer timeout used by [`BufferedPort::read`] and friends.
    pub timeout: ReadTimeout,
    /// Pause between poller ticks. Also the floor below which shortening
    /// `timeout` stops mattering, since the buffer grows at most once a tick.
    pub poll_interval: Duration,
    /// Pause between buffer checks while a read waits.
    pub read_quantum: Duration,
    /// Delimiter used by [`BufferedPort::next_line`].
    pub delimiter: Vec<u8>,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            timeout: ReadTimeout::NonBlocking,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_quantum: DEFAULT_READ_QUANTUM,
            delimiter: b"\n".to_vec(),
        }
    }
}

impl PortSettings {
    pub fn with_timeout(mut self, timeout: impl Into<ReadTimeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_read_quantum(mut self, quantum: Duration) -> Self {
        self.read_quantum = quantum;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_argument("poll interval must be non-zero"));
        }
        if self.read_quantum.is_zero() {
            return Err(Error::invalid_argument("read quantum must be non-zero"));
        }
        if self.delimiter.is_empty() {
            return Err(Error::invalid_argument("line delimiter must not be empty"));
        }
        Ok(())
    }
}

/// Snapshot of a port's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMetrics {
    pub port_name: String,
    pub poller: PollerState,
    pub in_waiting: usize,
    /// Bytes moved from the transport into the buffer.
    pub bytes_received_total: u64,
    /// Bytes handed to callers.
    pub bytes_delivered_total: u64,
    /// Bytes dropped by input flushes.
    pub bytes_discarded_total: u64,
    pub bytes_written_total: u64,
    pub open_cycles: u64,
}

/// A transport whose incoming bytes are continuously buffered in memory.
///
/// # Example
/// ```
/// use buffered_serial::port::MockTransport;
/// use buffered_serial::{BufferedPort, PortSettings};
/// use std::time::Duration;
///
/// let device = MockTransport::new("MOCK0");
/// let settings = PortSettings::default()
///     .with_timeout(Duration::from_millis(500))
///     .with_poll_interval(Duration::from_millis(5));
/// let mut port = BufferedPort::open_with(device.clone(), settings)?;
///
/// device.push_incoming(b"OK\r\n");
/// assert_eq!(port.read_line(b"\r\n")?, b"OK\r\n");
///
/// port.close()?;
/// # Ok::<(), buffered_serial::Error>(())
/// ```
#[derive(Debug)]
pub struct BufferedPort {
    name: String,
    transport: SharedTransport,
    buffer: Arc<SharedBuffer>,
    poller: Poller,
    liveness: Arc<AtomicBool>,
    settings: PortSettings,
    bytes_written: AtomicU64,
    open_cycles: u64,
}

impl BufferedPort {
    /// Wrap a transport without opening it.
    pub fn new<T: Transport + 'static>(transport: T, settings: PortSettings) -> Result<Self> {
        settings.validate()?;
        let name = transport.name().to_string();
        let boxed: Box<dyn Transport> = Box::new(transport);
        let poller = Poller::new(settings.poll_interval);
        let liveness = poller.liveness();

        Ok(Self {
            name,
            transport: Arc::new(Mutex::new(boxed)),
            buffer: Arc::new(SharedBuffer::new()),
            poller,
            liveness,
            settings,
            bytes_written: AtomicU64::new(0),
            open_cycles: 0,
        })
    }

    /// Wrap a transport and open it.
    pub fn open_with<T: Transport + 'static>(transport: T, settings: PortSettings) -> Result<Self> {
        let mut port = Self::new(transport, settings)?;
        port.open()?;
        Ok(port)
    }

    /// Wrap a system serial port, closed.
    pub fn serial(
        port_name: &str,
        config: PortConfiguration,
        settings: PortSettings,
    ) -> Result<Self> {
        Self::new(SyncSerialPort::new(port_name, config), settings)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    pub fn timeout(&self) -> ReadTimeout {
        self.settings.timeout
    }

    /// Change the consumer timeout for subsequent reads.
    pub fn set_timeout(&mut self, timeout: impl Into<ReadTimeout>) {
        self.settings.timeout = timeout.into();
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// True while the transport is open and the poller is running.
    pub fn is_open(&self) -> bool {
        self.poller.is_running() && self.transport.lock().is_open()
    }

    /// Open the transport (if needed) and start buffering.
    ///
    /// Idempotent while open. A transport that fails to open is reported
    /// as an error and leaves the port closed.
    pub fn open(&mut self) -> Result<()> {
        if self.poller.is_running() {
            return Ok(());
        }

        {
            let mut port = self.transport.lock();
            if !port.is_open() {
                port.open()?;
            }
        }

        if let Err(e) = self
            .poller
            .start(Arc::clone(&self.transport), Arc::clone(&self.buffer))
        {
            if let Err(close_err) = self.transport.lock().close() {
                warn!(port = %self.name, error = %close_err, "close after failed start also failed");
            }
            return Err(e);
        }

        self.open_cycles += 1;
        info!(port = %self.name, buffered = self.buffer.len(), "port opened");
        Ok(())
    }

    /// Stop buffering and close the transport.
    ///
    /// Blocks until the poller thread has exited. Unread data stays
    /// buffered. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.poller.stop();

        let mut port = self.transport.lock();
        if port.is_open() {
            port.close()?;
            info!(port = %self.name, buffered = self.buffer.len(), "port closed");
        }
        Ok(())
    }

    /// Read `n` bytes using the configured timeout.
    ///
    /// Returns fewer than `n` bytes only when the timeout expired first.
    pub fn read(&self, n: usize) -> Vec<u8> {
        self.read_timeout(n, self.settings.timeout)
    }

    /// Read `n` bytes with an explicit timeout.
    pub fn read_timeout(&self, n: usize, timeout: impl Into<ReadTimeout>) -> Vec<u8> {
        self.reader(timeout.into()).read(n)
    }

    /// Read through the next `delim` using the configured timeout.
    ///
    /// Returns an empty vector if no full line arrived in time.
    pub fn read_line(&self, delim: &[u8]) -> Result<Vec<u8>> {
        self.read_line_timeout(delim, self.settings.timeout)
    }

    pub fn read_line_timeout(&self, delim: &[u8], timeout: impl Into<ReadTimeout>) -> Result<Vec<u8>> {
        self.reader(timeout.into()).read_line(delim)
    }

    /// Read through the configured delimiter using the configured timeout.
    pub fn next_line(&self) -> Result<Vec<u8>> {
        self.reader(self.settings.timeout)
            .read_line(&self.settings.delimiter)
    }

    /// Take everything buffered right now without waiting.
    pub fn read_available(&self) -> Vec<u8> {
        self.buffer.consume_all()
    }

    /// Bytes buffered and not yet read.
    pub fn in_waiting(&self) -> usize {
        self.buffer.len()
    }

    /// Write straight to the transport. Writes are never buffered.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.send(data)
    }

    /// Discard buffered input and the transport's own input queue.
    pub fn flush_input(&self) -> Result<()> {
        let mut port = self.transport.lock();
        let dropped = self.buffer.clear();
        debug!(port = %self.name, dropped, "input flushed");
        if port.is_open() {
            port.clear_input()?;
        }
        Ok(())
    }

    /// Block until written data has been transmitted.
    pub fn flush(&self) -> Result<()> {
        self.with_transport(|t| t.flush())
    }

    /// Discard data written but not yet transmitted.
    pub fn flush_output(&self) -> Result<()> {
        self.with_transport(|t| t.clear_output())
    }

    pub fn send_break(&self, duration: Duration) -> Result<()> {
        self.with_transport(|t| t.send_break(duration))
    }

    pub fn set_break(&self, level: bool) -> Result<()> {
        self.with_transport(|t| t.set_break(level))
    }

    pub fn set_rts(&self, level: bool) -> Result<()> {
        self.with_transport(|t| t.set_rts(level))
    }

    pub fn set_dtr(&self, level: bool) -> Result<()> {
        self.with_transport(|t| t.set_dtr(level))
    }

    pub fn cts(&self) -> Result<bool> {
        self.with_transport(|t| t.read_cts())
    }

    pub fn dsr(&self) -> Result<bool> {
        self.with_transport(|t| t.read_dsr())
    }

    pub fn ri(&self) -> Result<bool> {
        self.with_transport(|t| t.read_ri())
    }

    pub fn cd(&self) -> Result<bool> {
        self.with_transport(|t| t.read_cd())
    }

    /// Forward device-specific settings to the transport unchanged.
    pub fn configure(&self, options: &TransportOptions) -> Result<()> {
        if options.is_empty() {
            return Ok(());
        }
        self.with_transport(|t| t.configure(options))
    }

    pub fn metrics(&self) -> PortMetrics {
        PortMetrics {
            port_name: self.name.clone(),
            poller: self.poller.state(),
            in_waiting: self.buffer.len(),
            bytes_received_total: self.buffer.total_appended(),
            bytes_delivered_total: self.buffer.total_consumed(),
            bytes_discarded_total: self.buffer.total_discarded(),
            bytes_written_total: self.bytes_written.load(Ordering::Relaxed),
            open_cycles: self.open_cycles,
        }
    }

    fn reader(&self, timeout: ReadTimeout) -> TimeoutReader<'_> {
        TimeoutReader::new(&self.buffer, timeout)
            .with_quantum(self.settings.read_quantum)
            .with_liveness(&self.liveness)
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        let written = self.with_transport(|t| t.write_bytes(data))?;
        self.bytes_written
            .fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn with_transport<T>(
        &self,
        op: impl FnOnce(&mut dyn Transport) -> std::result::Result<T, PortError>,
    ) -> Result<T> {
        let mut port = self.transport.lock();
        Ok(op(&mut **port)?)
    }
}

impl Drop for BufferedPort {
    fn drop(&mut self) {
        if self.poller.is_running() {
            warn!(port = %self.name, "port dropped while open, closing it");
        }
        if let Err(e) = self.close() {
            warn!(port = %self.name, error = %e, "close on drop failed");
        }
    }
}

/// Reads up to `buf.len()` bytes using the configured timeout. Nothing
/// arriving in time is reported as `ErrorKind::TimedOut`, as a plain serial
/// port would.
impl io::Read for BufferedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let bytes = self.read_timeout(buf.len(), self.settings.timeout);
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no data received before timeout",
            ));
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

impl io::Write for BufferedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.send(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.with_transport(|t| t.flush())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockTransport;
    use pretty_assertions::assert_eq;
    use std::thread;
    use std::time::Instant;

    fn fast_settings() -> PortSettings {
        PortSettings::default()
            .with_timeout(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(5))
            .with_read_quantum(Duration::from_millis(2))
    }

    fn wait_buffered(port: &BufferedPort, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while port.in_waiting() < n && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(port.in_waiting() >= n, "timed out waiting for {n} bytes");
    }

    #[test]
    fn test_settings_validation() {
        assert!(PortSettings::default().validate().is_ok());
        assert!(PortSettings::default()
            .with_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PortSettings::default()
            .with_read_quantum(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PortSettings::default()
            .with_delimiter(Vec::new())
            .validate()
            .is_err());
    }

    #[test]
    fn test_new_rejects_bad_settings() {
        let result = BufferedPort::new(
            MockTransport::new("MOCK0"),
            PortSettings::default().with_poll_interval(Duration::ZERO),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_open_starts_poller() {
        let device = MockTransport::new("MOCK0");
        let mut port = BufferedPort::new(device.clone(), fast_settings()).unwrap();
        assert_eq!(port.poller_state(), PollerState::Stopped);
        assert!(!port.is_open());

        port.open().unwrap();
        assert!(port.is_open());
        assert_eq!(port.poller_state(), PollerState::Running);
        assert_eq!(device.open_count(), 1);

        port.open().unwrap();
        assert_eq!(device.open_count(), 1);
        assert_eq!(port.metrics().open_cycles, 1);
    }

    #[test]
    fn test_open_failure_is_surfaced() {
        let device = MockTransport::new("MOCK0");
        device.set_fail_open(true);
        let mut port = BufferedPort::new(device.clone(), fast_settings()).unwrap();

        let err = port.open().unwrap_err();
        assert!(matches!(err, Error::Port(PortError::NotFound(_))));
        assert!(!port.is_open());
        assert_eq!(port.poller_state(), PollerState::Stopped);

        port.open().unwrap();
        assert!(port.is_open());
    }

    #[test]
    fn test_buffered_data_survives_close() {
        let device = MockTransport::new("MOCK0");
        let mut port = BufferedPort::open_with(device.clone(), fast_settings()).unwrap();

        device.push_incoming(b"keep me");
        wait_buffered(&port, 7);
        port.close().unwrap();

        assert_eq!(device.close_count(), 1);
        assert_eq!(port.in_waiting(), 7);
        assert_eq!(port.read_timeout(7, ReadTimeout::NonBlocking), b"keep me");
    }

    #[test]
    fn test_reopen_cycle() {
        let device = MockTransport::new("MOCK0");
        let mut port = BufferedPort::open_with(device.clone(), fast_settings()).unwrap();
        port.close().unwrap();
        port.close().unwrap();
        port.open().unwrap();

        device.push_incoming(b"second life\n");
        assert_eq!(port.read_line(b"\n").unwrap(), b"second life\n");
        assert_eq!(device.open_count(), 2);
        assert_eq!(port.metrics().open_cycles, 2);
    }

    #[test]
    fn test_write_bypasses_buffer() {
        let device = MockTransport::new("MOCK0");
        let port = BufferedPort::open_with(device.clone(), fast_settings()).unwrap();

        assert_eq!(port.write(b"AT\r\n").unwrap(), 4);
        assert_eq!(device.written(), b"AT\r\n");
        assert_eq!(port.in_waiting(), 0);
        assert_eq!(port.metrics().bytes_written_total, 4);
    }

    #[test]
    fn test_write_on_closed_port_fails() {
        let device = MockTransport::new("MOCK0");
        let port = BufferedPort::new(device, fast_settings()).unwrap();
        assert!(port.write(b"x").unwrap_err().is_not_open());
    }

    #[test]
    fn test_flush_input_clears_both_sides() {
        let device = MockTransport::new("MOCK0");
        let port = BufferedPort::open_with(device.clone(), fast_settings()).unwrap();

        device.push_incoming(b"stale");
        wait_buffered(&port, 5);
        port.flush_input().unwrap();

        assert_eq!(port.in_waiting(), 0);
        assert_eq!(device.input_clear_count(), 1);
        assert_eq!(port.metrics().bytes_discarded_total, 5);
    }

    #[test]
    fn test_next_line_uses_configured_delimiter() {
        let device = MockTransport::new("MOCK0");
        let port = BufferedPort::open_with(
            device.clone(),
            fast_settings().with_delimiter(b"\r\n".to_vec()),
        )
        .unwrap();

        device.push_incoming(b"a\nb\r\n");
        assert_eq!(port.next_line().unwrap(), b"a\nb\r\n");
    }

    #[test]
    fn test_set_timeout() {
        let device = MockTransport::new("MOCK0");
        let mut port = BufferedPort::new(device, fast_settings()).unwrap();
        port.set_timeout(None::<Duration>);
        assert_eq!(port.timeout(), ReadTimeout::Infinite);
        port.set_timeout(Duration::ZERO);
        assert_eq!(port.timeout(), ReadTimeout::NonBlocking);
    }

    #[test]
    fn test_infinite_read_returns_after_close() {
        let device = MockTransport::new("MOCK0");
        let settings = fast_settings().with_timeout(ReadTimeout::Infinite);
        let port = Arc::new(Mutex::new(
            BufferedPort::open_with(device.clone(), settings).unwrap(),
        ));
        device.push_incoming(b"ab");
        wait_buffered(&port.lock(), 2);

        // Grab the pieces a reader needs, then close from another thread.
        let (buffer, liveness) = {
            let guard = port.lock();
            (Arc::clone(&guard.buffer), Arc::clone(&guard.liveness))
        };
        let closer = {
            let port = Arc::clone(&port);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                port.lock().close().unwrap();
            })
        };

        let reader = TimeoutReader::new(&buffer, ReadTimeout::Infinite).with_liveness(&liveness);
        assert_eq!(reader.read(10), b"ab");
        closer.join().unwrap();
    }

    #[test]
    fn test_drop_closes_transport() {
        let device = MockTransport::new("MOCK0");
        {
            let _port = BufferedPort::open_with(device.clone(), fast_settings()).unwrap();
        }
        assert!(!device.is_open());
        assert_eq!(device.close_count(), 1);
    }

    #[test]
    fn test_io_traits() {
        use std::io::{Read, Write};

        let device = MockTransport::new("MOCK0");
        let mut port = BufferedPort::open_with(
            device.clone(),
            fast_settings().with_timeout(Duration::from_millis(50)),
        )
        .unwrap();

        Write::write_all(&mut port, b"ping").unwrap();
        Write::flush(&mut port).unwrap();
        assert_eq!(device.written(), b"ping");
        assert_eq!(device.flush_count(), 1);

        device.push_incoming(b"pong");
        let mut buf = [0u8; 4];
        Read::read_exact(&mut port, &mut buf).unwrap();
        assert_eq!(&buf, b"pong");

        let err = Read::read(&mut port, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
