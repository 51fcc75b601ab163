//! # esplink-core
//!
//! Non-blocking client for an ESP8266-style AT-command radio.
//!
//! This crate provides:
//! - The tick-driven protocol engine (`engine`) and its public facade
//!   ([`EspLink`])
//! - The bounded response accumulator, request slot and connection manager
//! - The critical section shared by foreground calls and the tick
//! - Blocking setup helpers for bring-up and diagnostics
//! - Transport and clock seams, with in-memory implementations for tests
//!
//! This crate contains no async code and no scheduler. A runtime binding
//! calls [`Tick::tick`] on a fixed interval; see `esplink-runtime`.

pub mod accumulator;
pub mod clock;
pub mod config;
pub mod connection;
pub mod critical;
pub mod engine;
pub mod error;
pub mod request;
pub mod transport;

mod link;
mod setup;
mod shared;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Capacities, ConfigError, LinkConfig, Timeouts};
pub use engine::LinkState;
pub use error::{Field, SetupError, SubmitError, ValidationError};
pub use esplink_protocol::HttpMethod;
pub use link::{EspLink, Tick};
pub use request::{CompletedResponse, Request};
pub use transport::{MemoryTransport, Transport};
