//! Tick-driven protocol state machine.
//!
//! Each tick inspects the accumulated radio output for the current state's
//! markers and either advances, falls back to `Idle`, or does nothing. No
//! tick ever waits: a state that needs an answer records when it was entered
//! and gives up once its deadline has passed.
//!
//! ```text
//! Idle ──status due──▶ CheckingStatus ──not joined──▶ Joining ──▶ Idle
//!   │                        └──joined / error / timeout──▶ Idle
//!   └──connected + request──▶ Opening ──▶ Sending ──▶ AwaitingSendAck
//!                                                        │
//!                      Idle ◀── </html> or failure ── AwaitingHttpResponse
//! ```

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use esplink_protocol::markers::{
    is_joined_status, parse_status, ALREADY_CONNECTED, ERROR, FAIL, HTML_END, HTML_START, OK,
    OK_PROMPT, SEND_OK,
};
use esplink_protocol::Command;
use tracing::{debug, info, trace, warn};

use crate::accumulator::ResponseAccumulator;
use crate::clock::Clock;
use crate::config::LinkConfig;
use crate::request::{CompletedResponse, Request};
use crate::shared::Shared;
use crate::transport::Transport;

/// Engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    /// Nothing outstanding.
    Idle,
    /// Awaiting the `AT+CIPSTATUS` answer.
    CheckingStatus,
    /// Awaiting the `AT+CWJAP_DEF` answer.
    Joining,
    /// Awaiting the `AT+CIPSTART` answer.
    Opening,
    /// Awaiting the data prompt after `AT+CIPSEND`.
    Sending,
    /// Request written, awaiting `SEND OK`.
    AwaitingSendAck,
    /// Awaiting the closing `</html>`.
    AwaitingHttpResponse,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::CheckingStatus => "CheckingStatus",
            Self::Joining => "Joining",
            Self::Opening => "Opening",
            Self::Sending => "Sending",
            Self::AwaitingSendAck => "AwaitingSendAck",
            Self::AwaitingHttpResponse => "AwaitingHttpResponse",
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::CheckingStatus,
            2 => Self::Joining,
            3 => Self::Opening,
            4 => Self::Sending,
            5 => Self::AwaitingSendAck,
            6 => Self::AwaitingHttpResponse,
            _ => Self::Idle,
        }
    }

    /// States that belong to an HTTP exchange.
    pub const fn is_exchange(self) -> bool {
        matches!(
            self,
            Self::Opening | Self::Sending | Self::AwaitingSendAck | Self::AwaitingHttpResponse
        )
    }
}

/// What the Idle state decided under the critical section.
enum IdleAction {
    CheckStatus,
    Open {
        generation: u64,
        host: String,
        port: u16,
    },
    Wait,
}

pub(crate) struct Engine<T, C> {
    pub(crate) transport: T,
    pub(crate) clock: C,
    pub(crate) config: LinkConfig,
    pub(crate) shared: Arc<Shared>,
    accumulator: ResponseAccumulator,
    state: LinkState,
    entered_ms: u64,
    /// Slot generation of the request being exchanged.
    active: Option<u64>,
}

impl<T: Transport, C: Clock> Engine<T, C> {
    pub(crate) fn new(transport: T, clock: C, config: LinkConfig, shared: Arc<Shared>) -> Self {
        let accumulator = ResponseAccumulator::new(config.capacities.accumulator);
        Self {
            transport,
            clock,
            config,
            shared,
            accumulator,
            state: LinkState::Idle,
            entered_ms: 0,
            active: None,
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    /// Advance the state machine by one step.
    pub(crate) fn tick(&mut self) {
        let now = self.clock.now_ms();
        if self.state.is_exchange() && !self.active_still_pending() {
            info!(state = self.state.as_str(), "Request cleared, abandoning exchange");
            self.send(Command::Close);
            self.active = None;
            self.enter(LinkState::Idle, now);
            return;
        }
        if self.state != LinkState::Idle {
            self.accumulator
                .fill_from(&mut self.transport, self.config.echo);
        }
        match self.state {
            LinkState::Idle => self.on_idle(now),
            LinkState::CheckingStatus => self.on_checking_status(now),
            LinkState::Joining => self.on_joining(now),
            LinkState::Opening => self.on_opening(now),
            LinkState::Sending => self.on_sending(now),
            LinkState::AwaitingSendAck => self.on_awaiting_send_ack(now),
            LinkState::AwaitingHttpResponse => self.on_awaiting_http_response(now),
        }
    }

    fn on_idle(&mut self, now: u64) {
        let check_due = self.shared.auto_check.load(Ordering::SeqCst)
            && self
                .shared
                .status
                .check_due(now, self.config.timeouts.reconnect_check_ms);
        let connected = self.shared.status.is_connected();

        let action = self.shared.guarded.with(|g| {
            if g.credentials.is_some() && (g.pending_apply || check_due) {
                g.pending_apply = false;
                return IdleAction::CheckStatus;
            }
            match g.slot.pending() {
                Some(pending) if connected => IdleAction::Open {
                    generation: pending.generation,
                    host: pending.request.host.clone(),
                    port: pending.request.port,
                },
                _ => IdleAction::Wait,
            }
        });

        match action {
            IdleAction::CheckStatus => {
                debug!("Checking connection status");
                self.issue(Command::Status, LinkState::CheckingStatus, now);
            }
            IdleAction::Open {
                generation,
                host,
                port,
            } => {
                debug!(%host, port, "Opening TCP connection");
                self.active = Some(generation);
                self.issue(Command::Open { host: &host, port }, LinkState::Opening, now);
            }
            IdleAction::Wait => {}
        }
    }

    fn on_checking_status(&mut self, now: u64) {
        if self.accumulator.contains(OK) {
            match parse_status(self.accumulator.as_bytes()) {
                Some(status) if is_joined_status(status) => {
                    trace!(status, "Connection ok");
                    self.shared.status.record_check(now);
                    self.shared.status.set_connected(true);
                    self.enter(LinkState::Idle, now);
                }
                status => {
                    self.shared.status.set_connected(false);
                    let credentials = self.shared.guarded.with(|g| g.credentials.clone());
                    match credentials {
                        Some(creds) => {
                            info!(ssid = creds.ssid(), ?status, "Not connected, attempting to join");
                            self.issue(
                                Command::Join {
                                    ssid: creds.ssid(),
                                    password: creds.password(),
                                },
                                LinkState::Joining,
                                now,
                            );
                        }
                        None => {
                            self.shared.status.record_check(now);
                            self.enter(LinkState::Idle, now);
                        }
                    }
                }
            }
        } else if self.accumulator.contains(ERROR) {
            warn!("Couldn't determine connection status");
            self.resolve_check(false, now);
        } else if self.elapsed(now, self.config.timeouts.status_ms) {
            warn!("Connection status query timed out");
            self.resolve_check(false, now);
        }
    }

    fn on_joining(&mut self, now: u64) {
        if self.accumulator.contains(OK) {
            info!("Joined network");
            self.resolve_check(true, now);
        } else if self.accumulator.contains(FAIL) {
            warn!("Failed to join network");
            self.resolve_check(false, now);
        } else if self.accumulator.contains(ERROR) {
            warn!("Malformed join command");
            self.resolve_check(false, now);
        } else if self.elapsed(now, self.config.timeouts.join_ms) {
            warn!("Join attempt timed out");
            self.resolve_check(false, now);
        }
    }

    fn on_opening(&mut self, now: u64) {
        let acc = &self.accumulator;
        if acc.contains(OK) || (acc.contains(ERROR) && acc.contains(ALREADY_CONNECTED)) {
            let Some(len) = self.with_active(|request| request.as_http().encoded_len()) else {
                self.abandon(now);
                return;
            };
            debug!(len, "TCP connection open, announcing request size");
            self.issue(Command::SendSize(len), LinkState::Sending, now);
        } else if acc.contains(ERROR) {
            warn!("Could not make TCP connection");
            self.fail_request(now);
        } else if self.elapsed(now, self.config.timeouts.open_ms) {
            warn!("TCP connection attempt timed out");
            self.fail_request(now);
        }
    }

    fn on_sending(&mut self, now: u64) {
        if self.accumulator.contains(OK_PROMPT) {
            let Some(bytes) = self.with_active(|request| request.as_http().encode()) else {
                self.abandon(now);
                return;
            };
            self.discard_input();
            if self.config.echo {
                debug!(target: "esplink::wire", ">> {}", String::from_utf8_lossy(&bytes));
            }
            if let Err(err) = self.transport.write_all(&bytes) {
                warn!(error = %err, "Failed to write HTTP request");
            }
            self.enter(LinkState::AwaitingSendAck, now);
        } else if self.accumulator.contains(ERROR) {
            warn!("Send size command failed");
            self.fail_request(now);
        } else if self.elapsed(now, self.config.timeouts.send_size_ms) {
            warn!("Send size command timed out");
            self.fail_request(now);
        }
    }

    fn on_awaiting_send_ack(&mut self, now: u64) {
        if self.accumulator.contains(SEND_OK) {
            self.shared.transmitted.fetch_add(1, Ordering::SeqCst);
            debug!("Request sent, awaiting response");
            // The response may already be in the buffer, so it is kept.
            self.enter(LinkState::AwaitingHttpResponse, now);
        } else if self.accumulator.contains(ERROR) {
            warn!("Problem sending HTTP data");
            self.fail_request(now);
        } else if self.elapsed(now, self.config.timeouts.send_ack_ms) {
            warn!("Timeout while confirming HTTP send");
            self.fail_request(now);
        }
    }

    fn on_awaiting_http_response(&mut self, now: u64) {
        if self.accumulator.contains(HTML_END) {
            let mut payload = self
                .accumulator
                .extract_between(HTML_START, HTML_END)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            let limit = self.config.capacities.response;
            if payload.len() > limit {
                warn!(len = payload.len(), limit, "Response payload truncated");
                payload.truncate(limit);
            }
            let len = payload.len();

            let generation = self.active.take();
            let delivered = self.shared.guarded.with(|g| match generation {
                Some(generation) if g.slot.clear_generation(generation) => {
                    g.response = Some(CompletedResponse::new(payload));
                    true
                }
                _ => false,
            });
            if delivered {
                self.shared.received.fetch_add(1, Ordering::SeqCst);
                info!(bytes = len, "Got HTTP response");
            }
            self.send(Command::Close);
            self.enter(LinkState::Idle, now);
        } else if self.elapsed(now, self.config.timeouts.http_ms) {
            warn!("HTTP response timed out");
            self.fail_request(now);
        }
    }

    /// Finish a status check or join attempt.
    fn resolve_check(&mut self, connected: bool, now: u64) {
        self.shared.status.record_check(now);
        self.shared.status.set_connected(connected);
        self.enter(LinkState::Idle, now);
    }

    /// Close the connection after a failed exchange and drop the request
    /// unless it asked to be retried.
    fn fail_request(&mut self, now: u64) {
        self.send(Command::Close);
        if let Some(generation) = self.active.take() {
            let kept = self.shared.guarded.with(|g| {
                let retry = match g.slot.pending() {
                    Some(pending) if pending.generation == generation => pending.request.retry,
                    _ => return false,
                };
                if !retry {
                    g.slot.clear();
                }
                retry
            });
            if kept {
                info!("Request kept for retry");
            } else {
                debug!("Request dropped");
            }
        }
        self.enter(LinkState::Idle, now);
    }

    /// The active request vanished mid-exchange.
    fn abandon(&mut self, now: u64) {
        self.send(Command::Close);
        self.active = None;
        self.enter(LinkState::Idle, now);
    }

    fn active_still_pending(&self) -> bool {
        self.with_active(|_| ()).is_some()
    }

    /// Run `f` on the request being exchanged, if the slot still holds it.
    fn with_active<R>(&self, f: impl FnOnce(&Request) -> R) -> Option<R> {
        let generation = self.active?;
        self.shared.guarded.with(|g| {
            g.slot
                .pending()
                .filter(|pending| pending.generation == generation)
                .map(|pending| f(&pending.request))
        })
    }

    /// Start a fresh exchange step: drop stale input, write `command`, move
    /// to `next`.
    fn issue(&mut self, command: Command<'_>, next: LinkState, now: u64) {
        self.discard_input();
        self.send(command);
        self.enter(next, now);
    }

    fn enter(&mut self, next: LinkState, now: u64) {
        if next != self.state {
            trace!(from = self.state.as_str(), to = next.as_str(), "State transition");
        }
        self.state = next;
        self.entered_ms = now;
        self.shared.publish_state(next);
    }

    fn elapsed(&self, now: u64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.entered_ms) > timeout_ms
    }

    /// Empty both the transport's pending input and the accumulator.
    pub(crate) fn discard_input(&mut self) {
        self.drain();
        self.accumulator.reset();
    }

    /// Read and drop whatever the transport has waiting.
    pub(crate) fn drain(&mut self) {
        let mut dropped = Vec::new();
        while self.transport.bytes_available() > 0 {
            match self.transport.read_byte() {
                Some(byte) => dropped.push(byte),
                None => break,
            }
        }
        if self.config.echo && !dropped.is_empty() {
            trace!(target: "esplink::wire", "<< {}", String::from_utf8_lossy(&dropped));
        }
    }

    /// Write one command line from the tick path. Write failures are
    /// logged; the state's deadline takes care of the missing answer.
    pub(crate) fn send(&mut self, command: Command<'_>) {
        if let Err(err) = self.write_command(command) {
            warn!(command = command.name(), error = %err, "Failed to write command");
        }
    }

    /// Write one command line and report transport failures.
    pub(crate) fn write_command(&mut self, command: Command<'_>) -> io::Result<()> {
        if self.config.echo {
            match command {
                Command::Join { ssid, .. } => {
                    debug!(target: "esplink::wire", ">> AT+CWJAP_DEF=\"{}\",<redacted>", ssid)
                }
                _ => debug!(target: "esplink::wire", ">> {}", command),
            }
        }
        self.transport.write_all(&command.encode())
    }
}
