//! Network credentials and connectivity status.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::Capacities;
use crate::error::{Field, ValidationError};

/// Network identifier and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    /// Validate against `caps`. The identifier must be non-empty; the secret
    /// may be empty for open networks.
    pub fn new(ssid: &str, password: &str, caps: &Capacities) -> Result<Self, ValidationError> {
        if ssid.is_empty() {
            return Err(ValidationError::EmptySsid);
        }
        ValidationError::check_len(Field::Ssid, ssid, caps.ssid)?;
        ValidationError::check_len(Field::Password, password, caps.password)?;
        Ok(Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connectivity as last observed by the engine.
///
/// Written only by the engine; the facade reads the connected flag.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    connected: AtomicBool,
    last_check_ms: AtomicU64,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn last_check_ms(&self) -> u64 {
        self.last_check_ms.load(Ordering::SeqCst)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Record a resolved check at `now_ms`.
    pub(crate) fn record_check(&self, now_ms: u64) {
        self.last_check_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Whether the periodic re-check interval has elapsed.
    pub(crate) fn check_due(&self, now_ms: u64, interval_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_check_ms()) > interval_ms
    }
}
