//! # esplink-runtime
//!
//! Host bindings for `esplink-core`.
//!
//! Enable features based on the attached radio:
//! - `serial` (default) - radio on a local serial port
//!
//! The TCP transport and the tokio ticker are always available.

pub mod error;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;
pub mod ticker;

pub use error::RuntimeError;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use ticker::Ticker;

pub use esplink_core::{EspLink, LinkConfig, Tick};
