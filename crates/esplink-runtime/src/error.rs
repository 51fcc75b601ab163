//! Errors raised while attaching to a radio.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[cfg(feature = "serial")]
    #[error("Failed to open serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
