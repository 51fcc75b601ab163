//! Radio attached to a local serial port.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, warn};

use esplink_core::Transport;

use crate::error::RuntimeError;

/// Baud rate the radio ships with.
pub const DEFAULT_BAUD: u32 = 115_200;

const READ_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud: u32) -> Result<Self, RuntimeError> {
        let mut port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| RuntimeError::Serial {
                path: path.to_string(),
                source,
            })?;

        // Keep the control lines low so attaching does not reset the radio.
        check_line("DTR", port.write_data_terminal_ready(false));
        check_line("RTS", port.write_request_to_send(false));

        debug!(path, baud, "Opened serial port");
        Ok(Self { port })
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

/// Log a failed control-line write. Returns whether the line was set.
fn check_line(line: &str, result: serialport::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(line, error = %err, "Failed to lower control line; the radio may reset");
            false
        }
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> usize {
        match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(err) => {
                warn!(error = %err, "Failed to query serial input");
                0
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.bytes_available() == 0 {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(err) if err.kind() == io::ErrorKind::TimedOut => None,
            Err(err) => {
                warn!(error = %err, "Serial read failed");
                None
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)?;
        self.port.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_line_failure_is_reported() {
        assert!(check_line("DTR", Ok(())));
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged");
        assert!(!check_line("RTS", Err(err)));
    }
}
