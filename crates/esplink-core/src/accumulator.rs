//! Bounded response accumulator.
//!
//! Bytes from the radio are appended as they arrive and the whole buffer is
//! rescanned whenever the engine looks for a marker. Buffers are small and
//! exchanges short, so no incremental parser state is kept. Content is only
//! discarded by an explicit `reset`, which the engine performs when it enters
//! a state that issues a new command.

use esplink_protocol::markers::find;
use tracing::{trace, warn};

use crate::transport::Transport;

/// Default accumulator capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Append-only byte buffer with a fixed capacity.
#[derive(Debug, Clone)]
pub struct ResponseAccumulator {
    buf: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResponseAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    /// Append one byte. Once full, the byte is dropped, the overflow flag is
    /// set and `false` is returned.
    pub fn append(&mut self, byte: u8) -> bool {
        if self.buf.len() >= self.capacity {
            self.overflowed = true;
            return false;
        }
        self.buf.push(byte);
        true
    }

    /// Whether `marker` occurs anywhere in the buffer.
    pub fn contains(&self, marker: &[u8]) -> bool {
        find(&self.buf, marker).is_some()
    }

    /// Everything up to and including the first `marker`.
    pub fn extract_up_to(&self, marker: &[u8]) -> Option<&[u8]> {
        let at = find(&self.buf, marker)?;
        Some(&self.buf[..at + marker.len()])
    }

    /// The span from the first `start` through the first `end` that follows
    /// it, both markers included. `None` if `start` is missing or no `end`
    /// appears after it.
    pub fn extract_between(&self, start: &[u8], end: &[u8]) -> Option<&[u8]> {
        let start_at = find(&self.buf, start)?;
        let body_at = start_at + start.len();
        let end_at = body_at + find(&self.buf[body_at..], end)?;
        Some(&self.buf[start_at..end_at + end.len()])
    }

    /// Clear content and the overflow flag.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    /// Drain every byte the transport has waiting into the buffer. Bytes past
    /// capacity are read and dropped. Returns the number of bytes read.
    pub fn fill_from<T: Transport + ?Sized>(&mut self, transport: &mut T, echo: bool) -> usize {
        let was_overflowed = self.overflowed;
        let mut read = 0;
        let mut echoed = Vec::new();
        while transport.bytes_available() > 0 {
            let Some(byte) = transport.read_byte() else {
                break;
            };
            read += 1;
            if echo {
                echoed.push(byte);
            }
            self.append(byte);
        }
        if echo && !echoed.is_empty() {
            trace!(target: "esplink::wire", "<< {}", String::from_utf8_lossy(&echoed));
        }
        if self.overflowed && !was_overflowed {
            warn!(capacity = self.capacity, "Response buffer is full, dropping input");
        }
        read
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use esplink_protocol::markers::{HTML_END, HTML_START, OK};

    fn filled(content: &[u8]) -> ResponseAccumulator {
        let mut acc = ResponseAccumulator::new(64);
        for &b in content {
            assert!(acc.append(b));
        }
        acc
    }

    #[test]
    fn test_append_past_capacity_drops_bytes() {
        let mut acc = ResponseAccumulator::new(4);
        for &b in b"ABCD" {
            assert!(acc.append(b));
        }
        assert!(!acc.is_overflowed());

        assert!(!acc.append(b'E'));
        assert!(!acc.append(b'F'));
        assert_eq!(acc.as_bytes(), b"ABCD");
        assert!(acc.is_overflowed());
        assert_eq!(acc.len(), acc.capacity());

        acc.reset();
        assert!(acc.is_empty());
        assert!(!acc.is_overflowed());
    }

    #[test]
    fn test_contains() {
        let acc = filled(b"AT+CIPSTATUS\r\nSTATUS:5\r\n\r\nOK\r\n");
        assert!(acc.contains(OK));
        assert!(acc.contains(b"STATUS:"));
        assert!(!acc.contains(b"ERROR"));
    }

    #[test]
    fn test_extract_up_to() {
        let acc = filled(b"junk\r\nOK\r\nmore");
        assert_eq!(acc.extract_up_to(OK), Some(&b"junk\r\nOK"[..]));
        assert_eq!(acc.extract_up_to(b"FAIL"), None);
    }

    #[test]
    fn test_extract_between_returns_framed_payload() {
        let acc = filled(b"+IPD,40:HTTP/1.1 200\r\n\r\n<html>PAYLOAD</html>CLOSED");
        assert_eq!(
            acc.extract_between(HTML_START, HTML_END),
            Some(&b"<html>PAYLOAD</html>"[..])
        );
    }

    #[test]
    fn test_extract_between_missing_markers() {
        assert_eq!(filled(b"PAYLOAD</html>").extract_between(HTML_START, HTML_END), None);
        assert_eq!(filled(b"<html>PAYLOAD").extract_between(HTML_START, HTML_END), None);
        assert_eq!(
            filled(b"</html>x<html>").extract_between(HTML_START, HTML_END),
            None
        );
    }

    #[test]
    fn test_extract_between_skips_end_before_start() {
        let acc = filled(b"</html>junk<html>PAYLOAD</html>");
        assert_eq!(
            acc.extract_between(HTML_START, HTML_END),
            Some(&b"<html>PAYLOAD</html>"[..])
        );
    }

    #[test]
    fn test_fill_from_drains_transport() {
        let radio = MemoryTransport::new();
        let mut host = radio.clone();
        radio.push_rx(b"0123456789");

        let mut acc = ResponseAccumulator::new(6);
        assert_eq!(acc.fill_from(&mut host, false), 10);
        assert_eq!(acc.as_bytes(), b"012345");
        assert!(acc.is_overflowed());
        assert_eq!(radio.pending_rx(), 0);

        radio.push_rx(b"xy");
        assert_eq!(acc.fill_from(&mut host, true), 2);
        assert_eq!(acc.as_bytes(), b"012345");
    }
}
