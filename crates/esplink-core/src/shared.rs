//! State shared between the facade and the engine tick.
//!
//! Scope of the critical section:
//! - `Credentials` and the pending-apply marker: written together by
//!   `set_credentials`, read together by the Idle state.
//! - The request slot: installed/cancelled by the facade, read and cleared
//!   by the engine.
//! - The completed response: stored by the engine, taken by the facade.
//!
//! Scalar flags and counters live outside it as atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::connection::{ConnectionStatus, Credentials};
use crate::critical::CriticalSection;
use crate::engine::LinkState;
use crate::request::{CompletedResponse, RequestSlot};

#[derive(Debug, Default)]
pub(crate) struct Guarded {
    pub(crate) credentials: Option<Credentials>,
    /// Credentials were supplied and not yet checked against the radio.
    pub(crate) pending_apply: bool,
    pub(crate) slot: RequestSlot,
    /// `Some` means a response is ready to fetch.
    pub(crate) response: Option<CompletedResponse>,
    /// Hardware address captured during setup.
    pub(crate) address: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) guarded: CriticalSection<Guarded>,
    pub(crate) status: ConnectionStatus,
    pub(crate) auto_check: AtomicBool,
    pub(crate) transmitted: AtomicU32,
    pub(crate) received: AtomicU32,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new(auto_check: bool) -> Self {
        Self {
            guarded: CriticalSection::default(),
            status: ConnectionStatus::default(),
            auto_check: AtomicBool::new(auto_check),
            transmitted: AtomicU32::new(0),
            received: AtomicU32::new(0),
            state: AtomicU8::new(LinkState::Idle as u8),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn publish_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}
