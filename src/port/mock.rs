//! Mock transport for testing.
//!
//! Provides a `MockTransport` that simulates a serial device without
//! hardware. Clones share state, so a test can hand one clone to a
//! `BufferedPort` and keep another to feed incoming bytes, inject faults and
//! inspect what was written.

use super::error::PortError;
use super::traits::{Transport, TransportOptions};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock transport.
#[derive(Debug, Default)]
struct MockState {
    open: bool,
    /// Bytes the "device" has received and not yet handed out.
    incoming: VecDeque<u8>,
    /// Log of all writes, one entry per call.
    write_log: Vec<Vec<u8>>,
    /// Number of upcoming `read_bytes` calls that fail.
    failing_reads: usize,
    /// Whether `bytes_to_read` currently fails.
    fail_bytes_to_read: bool,
    /// Whether the next `open` fails.
    fail_open: bool,
    /// Whether writes fail.
    fail_writes: bool,
    /// Maximum bytes handed out per `read_bytes` call (0 = unlimited).
    read_chunk: usize,
    rts: bool,
    dtr: bool,
    cts: bool,
    dsr: bool,
    ri: bool,
    cd: bool,
    break_active: bool,
    breaks_sent: Vec<Duration>,
    configure_log: Vec<TransportOptions>,
    opens: usize,
    closes: usize,
    input_clears: usize,
    output_clears: usize,
    flushes: usize,
    read_calls: usize,
}

/// Mock transport implementation for testing.
///
/// This implementation allows you to:
/// - Push bytes that the device "receives"
/// - Inspect what data was written
/// - Inject open, read, query and write failures
/// - Drive and observe the modem control lines
///
/// # Example
/// ```
/// use buffered_serial::port::{MockTransport, Transport};
///
/// let mut port = MockTransport::new("MOCK0");
/// port.open().unwrap();
///
/// port.push_incoming(b"Hello, World!");
/// assert_eq!(port.bytes_to_read().unwrap(), 13);
///
/// let mut buffer = [0u8; 13];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.written(), b"Response");
/// ```
#[derive(Clone)]
pub struct MockTransport {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new, closed mock transport with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Append bytes to what the device has received.
    pub fn push_incoming(&self, data: &[u8]) {
        self.state.lock().incoming.extend(data);
    }

    /// Bytes received by the device and not yet read from it.
    pub fn pending_incoming(&self) -> usize {
        self.state.lock().incoming.len()
    }

    /// All bytes written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Every write call, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Make the next `count` reads fail with an I/O error.
    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().failing_reads = count;
    }

    /// Make `bytes_to_read` fail until switched back off.
    pub fn set_fail_bytes_to_read(&self, fail: bool) {
        self.state.lock().fail_bytes_to_read = fail;
    }

    /// Make the next `open` fail with `NotFound`.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make writes fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Cap how many bytes a single `read_bytes` call returns (0 = no cap).
    pub fn set_read_chunk(&self, max: usize) {
        self.state.lock().read_chunk = max;
    }

    /// Set the levels reported for the input lines (CTS, DSR, RI, CD).
    pub fn set_input_lines(&self, cts: bool, dsr: bool, ri: bool, cd: bool) {
        let mut state = self.state.lock();
        state.cts = cts;
        state.dsr = dsr;
        state.ri = ri;
        state.cd = cd;
    }

    /// Current (RTS, DTR) output levels.
    pub fn output_lines(&self) -> (bool, bool) {
        let state = self.state.lock();
        (state.rts, state.dtr)
    }

    pub fn break_active(&self) -> bool {
        self.state.lock().break_active
    }

    /// Durations of every `send_break` call.
    pub fn breaks_sent(&self) -> Vec<Duration> {
        self.state.lock().breaks_sent.clone()
    }

    /// Every options bag passed to `configure`.
    pub fn configure_log(&self) -> Vec<TransportOptions> {
        self.state.lock().configure_log.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn input_clear_count(&self) -> usize {
        self.state.lock().input_clears
    }

    pub fn output_clear_count(&self) -> usize {
        self.state.lock().output_clears
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Number of `read_bytes` calls made, including failed ones.
    pub fn read_calls(&self) -> usize {
        self.state.lock().read_calls
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.fail_open {
            state.fail_open = false;
            return Err(PortError::not_found(self.name.as_str()));
        }
        if state.open {
            return Err(PortError::AlreadyOpen);
        }
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.read_calls += 1;
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated read failure",
            )));
        }

        let mut limit = buffer.len().min(state.incoming.len());
        if state.read_chunk > 0 {
            limit = limit.min(state.read_chunk);
        }
        if limit == 0 {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "No data available",
            )));
        }
        for (slot, byte) in buffer.iter_mut().zip(state.incoming.drain(..limit)) {
            *slot = byte;
        }
        Ok(limit)
    }

    fn bytes_to_read(&self) -> Result<usize, PortError> {
        let state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.fail_bytes_to_read {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated query failure",
            )));
        }
        Ok(state.incoming.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        state.flushes += 1;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        state.incoming.clear();
        state.input_clears += 1;
        Ok(())
    }

    fn clear_output(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        state.output_clears += 1;
        Ok(())
    }

    fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().break_active = level;
        Ok(())
    }

    fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        self.state.lock().breaks_sent.push(duration);
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().rts = level;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().dtr = level;
        Ok(())
    }

    fn read_cts(&mut self) -> Result<bool, PortError> {
        Ok(self.state.lock().cts)
    }

    fn read_dsr(&mut self) -> Result<bool, PortError> {
        Ok(self.state.lock().dsr)
    }

    fn read_ri(&mut self) -> Result<bool, PortError> {
        Ok(self.state.lock().ri)
    }

    fn read_cd(&mut self) -> Result<bool, PortError> {
        Ok(self.state.lock().cd)
    }

    fn configure(&mut self, options: &TransportOptions) -> Result<(), PortError> {
        self.state.lock().configure_log.push(options.clone());
        Ok(())
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("open", &state.open)
            .field("pending_incoming", &state.incoming.len())
            .finish()
    }
}
