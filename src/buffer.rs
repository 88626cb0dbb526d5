//! Thread-safe FIFO byte buffer shared by the poller and consumers.
//!
//! Bytes are appended at the tail by the poller thread and consumed from the
//! head by readers. Every operation takes the single internal lock for its
//! whole duration, so a consumer never observes a half-applied append.

use memchr::memmem;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct Inner {
    bytes: VecDeque<u8>,
    appended: u64,
    consumed: u64,
    discarded: u64,
}

/// Unbounded byte queue guarded by a mutex.
///
/// # Example
/// ```
/// use buffered_serial::SharedBuffer;
///
/// let buffer = SharedBuffer::new();
/// buffer.append(b"AB");
/// buffer.append(b"CD\n");
/// assert_eq!(buffer.find(b"\n"), Some(4));
/// assert_eq!(buffer.consume_front(2), b"AB");
/// assert_eq!(buffer.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct SharedBuffer {
    inner: Mutex<Inner>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes at the tail.
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.bytes.extend(data);
        inner.appended += data.len() as u64;
    }

    /// Remove and return up to `n` bytes from the head.
    ///
    /// Returns fewer than `n` bytes when fewer are buffered; never blocks
    /// waiting for more.
    pub fn consume_front(&self, n: usize) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let take = n.min(inner.bytes.len());
        inner.consumed += take as u64;
        inner.bytes.drain(..take).collect()
    }

    /// Remove and return everything buffered.
    pub fn consume_all(&self) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let take = inner.bytes.len();
        inner.consumed += take as u64;
        inner.bytes.drain(..).collect()
    }

    /// Remove and return exactly `n` bytes, or nothing if fewer are buffered.
    pub fn consume_exact(&self, n: usize) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock();
        if inner.bytes.len() < n {
            return None;
        }
        inner.consumed += n as u64;
        Some(inner.bytes.drain(..n).collect())
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().bytes.is_empty()
    }

    /// Index of the first occurrence of `delim`, scanning the whole buffer.
    ///
    /// An empty delimiter never matches.
    pub fn find(&self, delim: &[u8]) -> Option<usize> {
        if delim.is_empty() {
            return None;
        }
        let mut inner = self.inner.lock();
        memmem::find(inner.bytes.make_contiguous(), delim)
    }

    /// Remove and return the head up to and including the first `delim`.
    ///
    /// The scan and the removal happen under one lock acquisition, so the
    /// returned line always ends with `delim` and contains no earlier copy of
    /// it. Returns `None` (leaving the buffer untouched) when `delim` is not
    /// present or is empty.
    pub fn consume_through(&self, delim: &[u8]) -> Option<Vec<u8>> {
        if delim.is_empty() {
            return None;
        }
        let mut inner = self.inner.lock();
        let index = memmem::find(inner.bytes.make_contiguous(), delim)?;
        let end = index + delim.len();
        inner.consumed += end as u64;
        Some(inner.bytes.drain(..end).collect())
    }

    /// Copy of the buffered bytes, leaving them in place.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().bytes.iter().copied().collect()
    }

    /// Discard everything buffered and return how many bytes were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.bytes.len();
        inner.bytes.clear();
        inner.discarded += dropped as u64;
        dropped
    }

    /// Total bytes ever appended.
    pub fn total_appended(&self) -> u64 {
        self.inner.lock().appended
    }

    /// Total bytes ever handed to consumers.
    pub fn total_consumed(&self) -> u64 {
        self.inner.lock().consumed
    }

    /// Total bytes dropped by [`clear`](Self::clear).
    pub fn total_discarded(&self) -> u64 {
        self.inner.lock().discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_and_consume_in_order() {
        let buffer = SharedBuffer::new();
        buffer.append(b"hello ");
        buffer.append(b"world");

        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.consume_front(6), b"hello ");
        assert_eq!(buffer.consume_front(100), b"world");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_consume_more_than_present_is_clamped() {
        let buffer = SharedBuffer::new();
        buffer.append(b"xyz");
        assert_eq!(buffer.consume_front(10), b"xyz");
        assert_eq!(buffer.consume_front(10), Vec::<u8>::new());
    }

    #[test]
    fn test_consume_exact() {
        let buffer = SharedBuffer::new();
        buffer.append(b"abc");
        assert_eq!(buffer.consume_exact(4), None);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.consume_exact(2), Some(b"ab".to_vec()));
        assert_eq!(buffer.consume_exact(0), Some(Vec::new()));
    }

    #[test]
    fn test_find_delimiter() {
        let buffer = SharedBuffer::new();
        buffer.append(b"line one\r\nline two\r\n");
        assert_eq!(buffer.find(b"\r\n"), Some(8));
        assert_eq!(buffer.find(b"three"), None);
        assert_eq!(buffer.find(b""), None);
    }

    #[test]
    fn test_find_after_wraparound() {
        let buffer = SharedBuffer::new();
        // Force the deque's head away from index 0 before the delimiter lands.
        buffer.append(&[b'a'; 64]);
        buffer.consume_front(60);
        buffer.append(b"bc\n");
        assert_eq!(buffer.find(b"\n"), Some(6));
        assert_eq!(buffer.consume_through(b"\n"), Some(b"aaaabc\n".to_vec()));
    }

    #[test]
    fn test_consume_through_leaves_rest() {
        let buffer = SharedBuffer::new();
        buffer.append(b"first\nsecond");
        assert_eq!(buffer.consume_through(b"\n"), Some(b"first\n".to_vec()));
        assert_eq!(buffer.consume_through(b"\n"), None);
        assert_eq!(buffer.snapshot(), b"second");
    }

    #[test]
    fn test_clear_counts_discarded() {
        let buffer = SharedBuffer::new();
        buffer.append(b"junk");
        assert_eq!(buffer.clear(), 4);
        assert_eq!(buffer.clear(), 0);
        assert_eq!(buffer.total_discarded(), 4);
        assert_eq!(buffer.total_appended(), 4);
        assert_eq!(buffer.total_consumed(), 0);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let buffer = SharedBuffer::new();
        buffer.append(&[]);
        assert_eq!(buffer.total_appended(), 0);
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let buffer = Arc::new(SharedBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    buffer.append(&i.to_le_bytes());
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 4000 {
            received.extend(buffer.consume_front(37));
            thread::yield_now();
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..1000u32).flat_map(|i| i.to_le_bytes()).collect();
        assert_eq!(received, expected);
    }
}
