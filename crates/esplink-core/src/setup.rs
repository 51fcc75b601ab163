//! Blocking setup and diagnostic helpers.
//!
//! These run with the engine locked, so no tick interleaves with them, and
//! each one busy-waits against its own deadline. They are meant for bring-up
//! and diagnostics, never for the tick path.

use esplink_protocol::markers::{ADDRESS_LEN, OK, READY};
use esplink_protocol::Command;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::SetupError;
use crate::transport::Transport;

impl<T: Transport, C: Clock> Engine<T, C> {
    /// `AT` must be answered with `OK`.
    pub(crate) fn probe(&mut self) -> Result<(), SetupError> {
        self.drain();
        self.write_command(Command::Attention)?;
        if self.wait_for(OK, self.config.timeouts.presence_ms) {
            info!("Radio present");
            Ok(())
        } else {
            warn!("Radio not present");
            Err(SetupError::NotPresent)
        }
    }

    /// Disable auto-connect, select station mode, then soft reset.
    pub(crate) fn reset(&mut self) -> Result<(), SetupError> {
        let mode_ms = self.config.timeouts.mode_ms;
        let reset_ms = self.config.timeouts.reset_ms;
        let result = self
            .command_expect(Command::DisableAutoConnect, OK, mode_ms)
            .and_then(|_| self.command_expect(Command::StationMode, OK, mode_ms))
            .and_then(|_| self.command_expect(Command::Reset, READY, reset_ms));
        match &result {
            Ok(()) => info!("Reset successful"),
            Err(err) => warn!(error = %err, "Reset unsuccessful"),
        }
        result
    }

    /// Factory restore followed by the reset sequence.
    pub(crate) fn restore(&mut self) -> Result<(), SetupError> {
        self.command_expect(Command::Restore, READY, self.config.timeouts.reset_ms)?;
        self.reset()
    }

    /// Read the 17-character hardware address that follows the first `"`
    /// in the `AT+CIPAPMAC?` answer.
    pub(crate) fn query_address(&mut self) -> Result<String, SetupError> {
        let timeout_ms = self.config.timeouts.address_ms;
        let timeout = SetupError::Timeout {
            command: Command::QueryAddress.name(),
            timeout_ms,
        };

        self.drain();
        self.write_command(Command::QueryAddress)?;
        let start = self.clock.now_ms();
        let mut address: Option<String> = None;
        while self.clock.now_ms().saturating_sub(start) < timeout_ms {
            let Some(byte) = self.transport.read_byte() else {
                std::thread::yield_now();
                continue;
            };
            if let Some(addr) = address.as_mut() {
                addr.push(char::from(byte));
                if addr.len() >= ADDRESS_LEN {
                    break;
                }
            } else if byte == b'"' {
                address = Some(String::with_capacity(ADDRESS_LEN));
            }
        }
        if let Some(addr) = address.filter(|a| a.len() >= ADDRESS_LEN) {
            let spent = self.clock.now_ms().saturating_sub(start);
            if self.wait_for(OK, timeout_ms.saturating_sub(spent)) {
                debug!(address = %addr, "Read hardware address");
                return Ok(addr);
            }
        }
        warn!("Hardware address request timed out");
        Err(timeout)
    }

    /// Write `text` as a command line and collect everything received until
    /// `timeout_ms` has passed.
    pub(crate) fn send_raw(&mut self, text: &str, timeout_ms: u64) -> Result<String, SetupError> {
        self.drain();
        self.write_command(Command::Raw(text))?;
        let start = self.clock.now_ms();
        let mut received = Vec::new();
        while self.clock.now_ms().saturating_sub(start) < timeout_ms {
            match self.transport.read_byte() {
                Some(byte) => received.push(byte),
                None => std::thread::yield_now(),
            }
        }
        Ok(String::from_utf8_lossy(&received).into_owned())
    }

    fn command_expect(
        &mut self,
        command: Command<'_>,
        marker: &[u8],
        timeout_ms: u64,
    ) -> Result<(), SetupError> {
        self.drain();
        self.write_command(command)?;
        if self.wait_for(marker, timeout_ms) {
            Ok(())
        } else {
            Err(SetupError::Timeout {
                command: command.name(),
                timeout_ms,
            })
        }
    }

    /// Busy-wait until the received stream ends with `marker`.
    fn wait_for(&mut self, marker: &[u8], timeout_ms: u64) -> bool {
        let start = self.clock.now_ms();
        let mut tail: Vec<u8> = Vec::with_capacity(marker.len() + 1);
        while self.clock.now_ms().saturating_sub(start) < timeout_ms {
            let Some(byte) = self.transport.read_byte() else {
                std::thread::yield_now();
                continue;
            };
            if self.config.echo {
                trace!(target: "esplink::wire", "<< {}", char::from(byte).escape_default());
            }
            tail.push(byte);
            if tail.len() > marker.len() {
                tail.remove(0);
            }
            if tail == marker {
                return true;
            }
        }
        false
    }
}
