//! Public facade.
//!
//! `EspLink` is the context object handed to the scheduler binding. The
//! scheduler calls [`Tick::tick`] periodically; everything else is called
//! from foreground code and returns immediately, except the setup helpers
//! which are explicitly blocking.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{debug, info, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::config::LinkConfig;
use crate::connection::Credentials;
use crate::engine::{Engine, LinkState};
use crate::error::{SetupError, SubmitError, ValidationError};
use crate::request::{CompletedResponse, Request};
use crate::shared::Shared;
use crate::transport::Transport;

/// Periodic callback target registered with a scheduler.
pub trait Tick: Send + Sync {
    /// Advance the engine by one step. Must not block.
    fn tick(&self);
}

impl<T: Tick + ?Sized> Tick for Arc<T> {
    fn tick(&self) {
        (**self).tick()
    }
}

/// Non-blocking network client over an AT-command radio.
pub struct EspLink<T, C = MonotonicClock> {
    shared: Arc<Shared>,
    engine: Mutex<Engine<T, C>>,
    config: LinkConfig,
}

impl<T: Transport> EspLink<T, MonotonicClock> {
    /// Link with the wall clock and the given configuration.
    pub fn with_config(transport: T, config: LinkConfig) -> Self {
        Self::new(transport, MonotonicClock::new(), config)
    }
}

impl<T: Transport, C: Clock> EspLink<T, C> {
    pub fn new(transport: T, clock: C, config: LinkConfig) -> Self {
        let shared = Arc::new(Shared::new(config.auto_check));
        let engine = Engine::new(transport, clock, config.clone(), Arc::clone(&shared));
        Self {
            shared,
            engine: Mutex::new(engine),
            config,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Crate version string.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Current engine state.
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    pub fn is_connected(&self) -> bool {
        self.shared.status.is_connected()
    }

    /// Store new credentials. The engine checks the connection and joins
    /// with them on its next idle tick.
    pub fn set_credentials(&self, ssid: &str, password: &str) -> Result<(), ValidationError> {
        let credentials = Credentials::new(ssid, password, &self.config.capacities)?;
        self.shared.guarded.with(|g| {
            g.credentials = Some(credentials);
            g.pending_apply = true;
        });
        info!(ssid, "Network credentials updated");
        Ok(())
    }

    /// Whether freshly supplied credentials are still waiting to be applied.
    pub fn credentials_pending(&self) -> bool {
        self.shared.guarded.with(|g| g.pending_apply)
    }

    pub fn auto_check(&self) -> bool {
        self.shared.auto_check.load(Ordering::SeqCst)
    }

    /// Enable or disable the periodic connection check and rejoin.
    pub fn set_auto_check(&self, enabled: bool) {
        self.shared.auto_check.store(enabled, Ordering::SeqCst);
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Queue `request` in the single request slot.
    ///
    /// Any unfetched response from an earlier request is discarded.
    pub fn submit(&self, request: Request) -> Result<(), SubmitError> {
        request.validate(&self.config.capacities)?;
        let (method, host, port) = (request.method, request.host.clone(), request.port);
        self.shared.guarded.with(|g| {
            g.slot.install(request)?;
            g.response = None;
            Ok::<_, SubmitError>(())
        })?;
        debug!(%method, %host, port, "Request queued");
        Ok(())
    }

    /// Drop the pending request. Bytes already written to the radio are not
    /// recalled. Returns whether a request was cleared.
    pub fn cancel(&self) -> bool {
        let cleared = self.shared.guarded.with(|g| g.slot.clear());
        if cleared {
            info!("Cleared in-progress request");
        }
        cleared
    }

    pub fn is_busy(&self) -> bool {
        self.shared.guarded.with(|g| g.slot.is_occupied())
    }

    /// Copy of the pending request, if any.
    pub fn pending_request(&self) -> Option<Request> {
        self.shared
            .guarded
            .with(|g| g.slot.pending().map(|p| p.request.clone()))
    }

    pub fn has_response(&self) -> bool {
        self.shared.guarded.with(|g| g.response.is_some())
    }

    /// Take the completed response, leaving none ready.
    pub fn fetch_response(&self) -> Option<CompletedResponse> {
        let response = self.shared.guarded.with(|g| g.response.take());
        if response.is_none() {
            trace!("No response ready");
        }
        response
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// Requests the radio confirmed as sent.
    pub fn transmit_count(&self) -> u32 {
        self.shared.transmitted.load(Ordering::SeqCst)
    }

    pub fn reset_transmit_count(&self) {
        self.shared.transmitted.store(0, Ordering::SeqCst);
    }

    /// Responses received.
    pub fn receive_count(&self) -> u32 {
        self.shared.received.load(Ordering::SeqCst)
    }

    pub fn reset_receive_count(&self) {
        self.shared.received.store(0, Ordering::SeqCst);
    }

    // ========================================================================
    // Setup and diagnostics (blocking)
    // ========================================================================

    /// Probe the radio, run the reset sequence and read its hardware address.
    pub fn begin(&self) -> Result<(), SetupError> {
        let mut engine = self.lock_engine();
        engine.probe()?;
        engine.reset()?;
        let address = match engine.query_address() {
            Ok(address) => Some(address),
            Err(SetupError::Transport(err)) => return Err(SetupError::Transport(err)),
            Err(_) => None,
        };
        engine.drain();
        drop(engine);

        self.shared.guarded.with(|g| g.address = address);
        Ok(())
    }

    /// Disable auto-connect, force station mode and soft reset the radio.
    pub fn reset(&self) -> Result<(), SetupError> {
        self.lock_engine().reset()
    }

    /// Factory restore, then the reset sequence.
    pub fn restore(&self) -> Result<(), SetupError> {
        self.lock_engine().restore()
    }

    /// Query the hardware address from the radio and remember it.
    pub fn query_address(&self) -> Result<String, SetupError> {
        let address = self.lock_engine().query_address()?;
        self.shared
            .guarded
            .with(|g| g.address = Some(address.clone()));
        Ok(address)
    }

    /// Hardware address read during setup.
    pub fn address(&self) -> Option<String> {
        self.shared.guarded.with(|g| g.address.clone())
    }

    /// Send an arbitrary command line and return everything the radio
    /// printed within `timeout_ms`.
    pub fn send_command(&self, command: &str, timeout_ms: u64) -> Result<String, SetupError> {
        self.lock_engine().send_raw(command, timeout_ms)
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine<T, C>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport, C: Clock> Tick for EspLink<T, C> {
    fn tick(&self) {
        match self.engine.try_lock() {
            Ok(mut engine) => engine.tick(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().tick(),
            // A setup helper owns the radio; this tick is masked.
            Err(TryLockError::WouldBlock) => trace!("Engine busy, tick skipped"),
        }
    }
}

impl<T, C> std::fmt::Debug for EspLink<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspLink")
            .field("state", &self.shared.state())
            .field("connected", &self.shared.status.is_connected())
            .finish_non_exhaustive()
    }
}
