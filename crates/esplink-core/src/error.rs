//! Caller-facing errors.
//!
//! Only validation, busy and setup failures are reported to the caller.
//! Protocol failures during an exchange (command errors, timeouts, join
//! failures, malformed status) are absorbed by the engine's fallback
//! transitions and show up only through `is_connected`, the counters and the
//! absence of a response.

use std::fmt;

use thiserror::Error;

/// Field named in a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ssid,
    Password,
    Host,
    Path,
    Body,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Ssid => "ssid",
            Field::Password => "password",
            Field::Host => "host",
            Field::Path => "path",
            Field::Body => "body",
        })
    }
}

/// Input rejected before any state changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The network identifier is empty.
    #[error("The empty string is not a valid network identifier")]
    EmptySsid,

    /// A field exceeds its fixed capacity.
    #[error("{field} is {len} bytes, the limit is {max}")]
    TooLong { field: Field, len: usize, max: usize },
}

impl ValidationError {
    /// Check `value` against `max`, rejecting rather than truncating.
    pub(crate) fn check_len(field: Field, value: &str, max: usize) -> Result<(), Self> {
        if value.len() > max {
            Err(Self::TooLong {
                field,
                len: value.len(),
                max,
            })
        } else {
            Ok(())
        }
    }
}

/// Errors returned by `EspLink::submit`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The single request slot is occupied.
    #[error("Could not make request; one is already in progress")]
    Busy,
}

/// Errors returned by the blocking setup helpers.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The radio did not answer the presence probe.
    #[error("Radio not present (no answer to AT)")]
    NotPresent,

    /// The expected marker did not arrive before the deadline.
    #[error("{command} timed out after {timeout_ms} ms")]
    Timeout {
        command: &'static str,
        timeout_ms: u64,
    },

    /// Writing to the transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}
