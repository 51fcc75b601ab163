//! # esplink-protocol
//!
//! Wire vocabulary of the AT-command radio.
//!
//! This crate provides:
//! - The command set sent to the radio (`commands`)
//! - The response markers recognised in its output (`markers`)
//! - The HTTP/1.1 request codec used over the radio's TCP link (`codec`)
//!
//! Nothing here performs I/O; the engine in `esplink-core` decides when each
//! piece is written or matched.

pub mod codec;
pub mod commands;
pub mod markers;

pub use codec::{HttpMethod, HttpRequest, ParseMethodError};
pub use commands::Command;
