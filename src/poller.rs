//! Background poller that drains a transport into a [`SharedBuffer`].
//!
//! One dedicated thread per running cycle. Each tick asks the transport how
//! many bytes are waiting, reads them, appends them to the buffer and sleeps
//! for the poll interval. Transport errors during a tick count as "nothing
//! arrived"; only [`Poller::stop`] or a panicking transport ends the loop,
//! and either way the run flag drops so infinite readers give up.

use crate::buffer::SharedBuffer;
use crate::error::{Error, Result};
use crate::port::Transport;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default pause between poller ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "buffered-serial-poller";

/// Transport handle shared between the controller and the poller thread.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Lifecycle state of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    Stopped,
    Running,
}

/// Owns the poller thread and its run flag.
///
/// Dropping a `Poller` stops it, so the thread never outlives its owner.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollerState {
        match &self.handle {
            Some(handle) if !handle.is_finished() && self.running.load(Ordering::Acquire) => {
                PollerState::Running
            }
            _ => PollerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// Flag readers can watch to learn whether more bytes may still arrive.
    pub(crate) fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Spawn the poller thread. A no-op while already running.
    pub fn start(&mut self, transport: SharedTransport, buffer: Arc<SharedBuffer>) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // A previous thread may have died without stop(); reap it first.
        self.stop();

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || poll_loop(&transport, &buffer, &running, interval));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                debug!(interval_ms = interval.as_millis() as u64, "poller started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(Error::Spawn(e))
            }
        }
    }

    /// Signal the thread to finish and wait for it.
    ///
    /// Once this returns no further appends happen. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("poller thread panicked");
            } else {
                debug!("poller stopped");
            }
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    transport: &Mutex<Box<dyn Transport>>,
    buffer: &SharedBuffer,
    running: &AtomicBool,
    interval: Duration,
) {
    let _exit = ClearOnExit(running);
    let mut scratch = Vec::new();
    while running.load(Ordering::Acquire) {
        let moved = poll_once(transport, buffer, &mut scratch);
        if moved > 0 {
            trace!(bytes = moved, buffered = buffer.len(), "poller tick");
        }
        // stop() unparks us, so shutdown does not wait out a full interval.
        thread::park_timeout(interval);
    }
}

/// Lowers the run flag however the loop ends, including a panicking
/// transport, so readers waiting on it do not hang.
struct ClearOnExit<'a>(&'a AtomicBool);

impl Drop for ClearOnExit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run a single tick and return how many bytes were appended.
pub(crate) fn poll_once(
    transport: &Mutex<Box<dyn Transport>>,
    buffer: &SharedBuffer,
    scratch: &mut Vec<u8>,
) -> usize {
    let mut port = transport.lock();

    let available = match port.bytes_to_read() {
        Ok(n) => n,
        Err(e) => {
            debug!(error = %e, "bytes_to_read failed, treating as empty tick");
            0
        }
    };
    if available == 0 {
        return 0;
    }

    scratch.resize(available, 0);
    let read = match port.read_bytes(scratch.as_mut_slice()) {
        Ok(n) => n.min(available),
        Err(e) => {
            if !e.is_transient() {
                debug!(error = %e, "read failed, treating as empty tick");
            }
            0
        }
    };

    // Appending before releasing the transport makes flush_input, which
    // holds the transport lock while clearing, atomic with respect to a tick.
    buffer.append(&scratch[..read]);
    drop(port);
    read
}
