//! Timeout-bounded consumer reads against a [`SharedBuffer`].
//!
//! Both primitives poll the buffer every read quantum until they are
//! satisfied or the deadline passes. A timeout is an outcome, not an error:
//! `read` hands back whatever arrived, `read_line` hands back nothing and
//! leaves the partial line buffered.

use crate::buffer::SharedBuffer;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Default pause between buffer checks while a read waits.
pub const DEFAULT_READ_QUANTUM: Duration = Duration::from_millis(10);

/// How long a consumer read may wait for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadTimeout {
    /// Check once and return what is buffered.
    #[default]
    NonBlocking,
    /// Wait up to the given duration.
    After(Duration),
    /// Wait until satisfied, or until no more data can arrive.
    Infinite,
}

impl ReadTimeout {
    /// Interpret a millisecond count: negative waits forever, zero does not
    /// wait at all.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Self::Infinite,
            0 => Self::NonBlocking,
            ms => Self::After(Duration::from_millis(ms as u64)),
        }
    }

    /// The bounded wait, `None` for [`ReadTimeout::Infinite`].
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::NonBlocking => Some(Duration::ZERO),
            Self::After(d) => Some(*d),
            Self::Infinite => None,
        }
    }

    /// Inverse of [`from_millis`](Self::from_millis).
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::NonBlocking => 0,
            Self::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            Self::Infinite => -1,
        }
    }
}

impl From<Duration> for ReadTimeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::NonBlocking
        } else {
            Self::After(duration)
        }
    }
}

impl From<Option<Duration>> for ReadTimeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Infinite, Self::from)
    }
}

/// A single consumer's view of the buffer for one call.
///
/// Cheap to build; owns nothing. Multiple readers on the same buffer do not
/// coordinate with each other beyond the buffer's own lock.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutReader<'a> {
    buffer: &'a SharedBuffer,
    timeout: ReadTimeout,
    quantum: Duration,
    liveness: Option<&'a AtomicBool>,
}

impl<'a> TimeoutReader<'a> {
    pub fn new(buffer: &'a SharedBuffer, timeout: ReadTimeout) -> Self {
        Self {
            buffer,
            timeout,
            quantum: DEFAULT_READ_QUANTUM,
            liveness: None,
        }
    }

    pub fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    /// End infinite waits once `flag` goes false. Bounded waits ignore it.
    pub fn with_liveness(mut self, flag: &'a AtomicBool) -> Self {
        self.liveness = Some(flag);
        self
    }

    /// Read exactly `n` bytes, or whatever arrived by the deadline.
    pub fn read(&self, n: usize) -> Vec<u8> {
        if n == 0 {
            return Vec::new();
        }
        if let Some(bytes) = self.buffer.consume_exact(n) {
            return bytes;
        }

        let deadline = self.deadline();
        loop {
            if let Some(bytes) = self.buffer.consume_exact(n) {
                return bytes;
            }
            if !self.nap(deadline) {
                break;
            }
        }
        // Short read: hand over what is there, never more than asked for.
        self.buffer.consume_front(n)
    }

    /// Read up to and including the next `delim`.
    ///
    /// Returns an empty vector if no complete line shows up in time; any
    /// partial line stays buffered for the next call.
    pub fn read_line(&self, delim: &[u8]) -> Result<Vec<u8>> {
        if delim.is_empty() {
            return Err(Error::invalid_argument("line delimiter must not be empty"));
        }

        let deadline = self.deadline();
        loop {
            if let Some(line) = self.buffer.consume_through(delim) {
                return Ok(line);
            }
            if !self.nap(deadline) {
                return Ok(Vec::new());
            }
        }
    }

    fn deadline(&self) -> Deadline {
        match self.timeout {
            ReadTimeout::NonBlocking => Deadline::Now,
            // Past the end of the clock counts as no deadline at all.
            ReadTimeout::After(d) => Instant::now()
                .checked_add(d)
                .map_or(Deadline::Never, Deadline::At),
            ReadTimeout::Infinite => Deadline::Never,
        }
    }

    /// Sleep one quantum (clipped to the deadline). Returns false once the
    /// wait is over and the caller should take its final result.
    fn nap(&self, deadline: Deadline) -> bool {
        match deadline {
            Deadline::Now => false,
            Deadline::At(at) => {
                let now = Instant::now();
                if now >= at {
                    return false;
                }
                thread::sleep(self.quantum.min(at - now));
                true
            }
            Deadline::Never => {
                if let Some(flag) = self.liveness {
                    if !flag.load(Ordering::Acquire) {
                        return false;
                    }
                }
                thread::sleep(self.quantum);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Deadline {
    Now,
    At(Instant),
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn feed_later(buffer: &Arc<SharedBuffer>, delay: Duration, data: &'static [u8]) {
        let buffer = Arc::clone(buffer);
        thread::spawn(move || {
            thread::sleep(delay);
            buffer.append(data);
        });
    }

    #[test]
    fn test_timeout_conversions() {
        assert_eq!(ReadTimeout::from_millis(-1), ReadTimeout::Infinite);
        assert_eq!(ReadTimeout::from_millis(0), ReadTimeout::NonBlocking);
        assert_eq!(
            ReadTimeout::from_millis(250),
            ReadTimeout::After(Duration::from_millis(250))
        );
        assert_eq!(ReadTimeout::from(None::<Duration>), ReadTimeout::Infinite);
        assert_eq!(
            ReadTimeout::from(Some(Duration::ZERO)),
            ReadTimeout::NonBlocking
        );
        assert_eq!(ReadTimeout::After(Duration::from_secs(2)).as_millis(), 2000);
        assert_eq!(ReadTimeout::Infinite.as_duration(), None);
    }

    #[test]
    fn test_zero_length_read() {
        let buffer = SharedBuffer::new();
        buffer.append(b"abc");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::Infinite);
        assert!(reader.read(0).is_empty());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_satisfied_read_returns_immediately() {
        let buffer = SharedBuffer::new();
        buffer.append(b"abcdef");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::After(Duration::from_secs(5)));

        let started = Instant::now();
        assert_eq!(reader.read(4), b"abcd");
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_nonblocking_read_on_empty_buffer() {
        let buffer = SharedBuffer::new();
        let reader = TimeoutReader::new(&buffer, ReadTimeout::NonBlocking);

        let started = Instant::now();
        assert!(reader.read(5).is_empty());
        assert!(started.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_nonblocking_read_returns_partial() {
        let buffer = SharedBuffer::new();
        buffer.append(b"xy");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::NonBlocking);
        assert_eq!(reader.read(5), b"xy");
    }

    #[test]
    fn test_read_waits_for_enough_bytes() {
        let buffer = Arc::new(SharedBuffer::new());
        buffer.append(b"12");
        feed_later(&buffer, Duration::from_millis(30), b"345678");

        let reader = TimeoutReader::new(&buffer, ReadTimeout::After(Duration::from_secs(2)));
        assert_eq!(reader.read(5), b"12345");
        assert_eq!(buffer.snapshot(), b"678");
    }

    #[test]
    fn test_short_read_after_timeout() {
        let buffer = SharedBuffer::new();
        buffer.append(b"xyz");
        let timeout = Duration::from_millis(100);
        let reader = TimeoutReader::new(&buffer, ReadTimeout::After(timeout));

        let started = Instant::now();
        assert_eq!(reader.read(10), b"xyz");
        let elapsed = started.elapsed();
        assert!(elapsed >= timeout, "returned early after {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_millis(80));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_read_line_across_appends() {
        let buffer = Arc::new(SharedBuffer::new());
        buffer.append(b"AB");
        feed_later(&buffer, Duration::from_millis(50), b"CD\n");

        let reader = TimeoutReader::new(&buffer, ReadTimeout::After(Duration::from_millis(200)));
        assert_eq!(reader.read_line(b"\n").unwrap(), b"ABCD\n");
    }

    #[test]
    fn test_read_line_timeout_keeps_fragment() {
        let buffer = SharedBuffer::new();
        buffer.append(b"partial");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::After(Duration::from_millis(30)));

        assert!(reader.read_line(b"\n").unwrap().is_empty());
        assert_eq!(buffer.snapshot(), b"partial");
    }

    #[test]
    fn test_read_line_returns_one_line_at_a_time() {
        let buffer = SharedBuffer::new();
        buffer.append(b"one\r\ntwo\r\nthr");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::NonBlocking);

        assert_eq!(reader.read_line(b"\r\n").unwrap(), b"one\r\n");
        assert_eq!(reader.read_line(b"\r\n").unwrap(), b"two\r\n");
        assert!(reader.read_line(b"\r\n").unwrap().is_empty());
        assert_eq!(buffer.snapshot(), b"thr");
    }

    #[test]
    fn test_read_line_rejects_empty_delimiter() {
        let buffer = SharedBuffer::new();
        buffer.append(b"data");
        let reader = TimeoutReader::new(&buffer, ReadTimeout::NonBlocking);

        assert!(matches!(
            reader.read_line(b""),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_infinite_read_ends_when_source_dies() {
        let buffer = SharedBuffer::new();
        buffer.append(b"ab");
        let alive = Arc::new(AtomicBool::new(true));
        {
            let alive = Arc::clone(&alive);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                alive.store(false, Ordering::Release);
            });
        }

        let reader = TimeoutReader::new(&buffer, ReadTimeout::Infinite).with_liveness(&alive);
        assert_eq!(reader.read(10), b"ab");
        assert!(reader.read_line(b"\n").unwrap().is_empty());
    }

    #[test]
    fn test_infinite_read_waits_for_data() {
        let buffer = Arc::new(SharedBuffer::new());
        feed_later(&buffer, Duration::from_millis(40), b"done\n");

        let reader = TimeoutReader::new(&buffer, ReadTimeout::Infinite)
            .with_quantum(Duration::from_millis(2));
        assert_eq!(reader.read_line(b"\n").unwrap(), b"done\n");
    }

    #[test]
    fn test_unrepresentable_deadline_waits_like_infinite() {
        let buffer = Arc::new(SharedBuffer::new());
        buffer.append(b"AB");
        feed_later(&buffer, Duration::from_millis(30), b"CD\n");

        let reader = TimeoutReader::new(&buffer, ReadTimeout::from(Duration::MAX))
            .with_quantum(Duration::from_millis(2));
        assert_eq!(reader.read_line(b"\n").unwrap(), b"ABCD\n");

        feed_later(&buffer, Duration::from_millis(30), b"wxyz");
        assert_eq!(reader.read(4), b"wxyz");
    }

    #[test]
    fn test_unrepresentable_deadline_ends_when_source_dies() {
        let buffer = SharedBuffer::new();
        buffer.append(b"ab");
        let alive = AtomicBool::new(false);

        let reader =
            TimeoutReader::new(&buffer, ReadTimeout::After(Duration::MAX)).with_liveness(&alive);
        assert!(reader.read_line(b"\n").unwrap().is_empty());
        assert_eq!(reader.read(10), b"ab");
    }
}
