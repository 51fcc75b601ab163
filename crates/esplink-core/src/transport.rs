//! Byte channel to the radio.
//!
//! The engine only ever asks whether bytes are waiting, reads them one at a
//! time and writes whole command lines. Implementations must never block on
//! reads; writes may block for as long as the underlying port buffers.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Non-blocking byte source/sink connected to the radio.
pub trait Transport: Send {
    /// Number of bytes that can be read right now.
    fn bytes_available(&mut self) -> usize;

    /// Read one byte, or `None` when nothing is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write all of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct Pipes {
    /// Radio to host.
    rx: VecDeque<u8>,
    /// Host to radio.
    tx: Vec<u8>,
    responder: Option<Responder>,
}

/// In-memory transport for simulation and tests.
///
/// Clones share the same pipes: keep one clone inside the link and use
/// another to play the radio's side.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    pipes: Arc<Mutex<Pipes>>,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pipes = self.pipes();
        f.debug_struct("MemoryTransport")
            .field("rx_pending", &pipes.rx.len())
            .field("tx_len", &pipes.tx.len())
            .field("responder", &pipes.responder.is_some())
            .finish()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn pipes(&self) -> MutexGuard<'_, Pipes> {
        self.pipes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes as if the radio had sent them.
    pub fn push_rx(&self, bytes: impl AsRef<[u8]>) {
        self.pipes().rx.extend(bytes.as_ref());
    }

    /// Bytes queued by the radio side and not yet read by the host.
    pub fn pending_rx(&self) -> usize {
        self.pipes().rx.len()
    }

    /// Drain everything the host has written so far.
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.pipes().tx)
    }

    /// Drain everything the host has written so far, as text.
    pub fn take_tx_string(&self) -> String {
        String::from_utf8_lossy(&self.take_tx()).into_owned()
    }

    /// Answer every host write with the bytes returned by `responder`.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.pipes().responder = Some(Box::new(responder));
    }

    /// Stop answering writes.
    pub fn clear_responder(&self) {
        self.pipes().responder = None;
    }
}

impl Transport for MemoryTransport {
    fn bytes_available(&mut self) -> usize {
        self.pipes().rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.pipes().rx.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.pipes();
        let pipes = &mut *guard;
        pipes.tx.extend_from_slice(bytes);
        if let Some(responder) = pipes.responder.as_mut() {
            let reply = responder(bytes);
            pipes.rx.extend(reply);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_pipes() {
        let radio = MemoryTransport::new();
        let mut host = radio.clone();

        radio.push_rx(b"OK");
        assert_eq!(host.bytes_available(), 2);
        assert_eq!(host.read_byte(), Some(b'O'));
        assert_eq!(host.read_byte(), Some(b'K'));
        assert_eq!(host.read_byte(), None);

        host.write_all(b"AT\r\n").unwrap();
        assert_eq!(radio.take_tx_string(), "AT\r\n");
        assert!(radio.take_tx().is_empty());
    }

    #[test]
    fn test_responder_answers_writes() {
        let radio = MemoryTransport::new();
        let mut host = radio.clone();
        radio.set_responder(|line| {
            if line == b"AT\r\n" {
                b"AT\r\n\r\nOK\r\n".to_vec()
            } else {
                Vec::new()
            }
        });

        host.write_all(b"AT\r\n").unwrap();
        assert_eq!(radio.pending_rx(), 10);
        host.write_all(b"AT+GMR\r\n").unwrap();
        assert_eq!(radio.pending_rx(), 10);

        radio.clear_responder();
        host.write_all(b"AT\r\n").unwrap();
        assert_eq!(radio.pending_rx(), 10);
    }
}
