//! Radio reached through a serial-over-TCP bridge.
//!
//! The socket is non-blocking. Received bytes are pulled into a local queue
//! whenever the engine asks what is available. Writes retry while the
//! send buffer is full and give up with `TimedOut` after the write timeout.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use esplink_core::Transport;

use crate::error::RuntimeError;

const READ_CHUNK: usize = 512;

/// How long a write may wait for room in the send buffer.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TcpTransport {
    stream: TcpStream,
    rx: VecDeque<u8>,
    closed: bool,
    write_timeout: Duration,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self, RuntimeError> {
        let stream = TcpStream::connect(&addr).map_err(|source| RuntimeError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self, RuntimeError> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            debug!(%peer, "Connected to radio bridge");
        }
        Ok(Self {
            stream,
            rx: VecDeque::new(),
            closed: false,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Whether the bridge has closed its end.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move whatever the socket holds into the local queue.
    fn pump(&mut self) {
        if self.closed {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    warn!("Radio bridge closed the connection");
                    self.closed = true;
                    break;
                }
                Ok(n) => self.rx.extend(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "Bridge read failed");
                    break;
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn bytes_available(&mut self) -> usize {
        self.pump();
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.pump();
        }
        self.rx.pop_front()
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        let deadline = Instant::now() + self.write_timeout;
        while !bytes.is_empty() {
            match self.stream.write(bytes) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => bytes = &bytes[n..],
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    if Instant::now() >= deadline {
                        warn!(remaining = bytes.len(), "Bridge send buffer stayed full");
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                    std::thread::yield_now()
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
