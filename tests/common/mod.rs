//! Shared test utilities for buffered-serial tests.
//!
//! This module provides common test infrastructure including:
//! - Mock-backed ports with fast poller settings
//! - Polling helpers for conditions the poller thread makes true

#![allow(dead_code)]

use buffered_serial::{BufferedPort, MockTransport, PortSettings, ReadTimeout};
use std::thread;
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const READ_QUANTUM: Duration = Duration::from_millis(2);

/// Settings with a short poll interval so tests do not wait on 100 ms ticks.
pub fn fast_settings() -> PortSettings {
    PortSettings::default()
        .with_timeout(Duration::from_millis(500))
        .with_poll_interval(POLL_INTERVAL)
        .with_read_quantum(READ_QUANTUM)
}

/// Open a buffered port over a fresh mock and return both.
///
/// # Example
/// ```ignore
/// let (device, port) = open_mock_port("MOCK0", fast_settings());
/// device.push_incoming(b"OK\r\n");
/// ```
pub fn open_mock_port(name: &str, settings: PortSettings) -> (MockTransport, BufferedPort) {
    let device = MockTransport::new(name);
    let port = BufferedPort::open_with(device.clone(), settings).expect("mock port opens");
    (device, port)
}

/// Same as [`open_mock_port`] with a given consumer timeout.
pub fn open_with_timeout(timeout: impl Into<ReadTimeout>) -> (MockTransport, BufferedPort) {
    open_mock_port("MOCK0", fast_settings().with_timeout(timeout))
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Wait until the port has buffered at least `n` bytes.
pub fn wait_buffered(port: &BufferedPort, n: usize) {
    assert!(
        wait_until(|| port.in_waiting() >= n),
        "timed out waiting for {n} buffered bytes, have {}",
        port.in_waiting()
    );
}

/// Push `data` into the device after `delay`, from another thread.
pub fn push_later(device: &MockTransport, delay: Duration, data: &'static [u8]) -> thread::JoinHandle<()> {
    let device = device.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        device.push_incoming(data);
    })
}
