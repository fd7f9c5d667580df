//! # Error Types
//!
//! Custom error types for MSP Link using `thiserror`.

use thiserror::Error;

use crate::link::Stream;

/// Main error type for MSP Link
#[derive(Debug, Error)]
pub enum MspLinkError {
    /// Protocol misuse (unknown ID, wrong message class)
    #[error("MSP protocol error: {0}")]
    Protocol(String),

    /// Serializer given field values that do not match the schema
    #[error("command rejected: {0}")]
    ArityMismatch(String),

    /// A request for this stream is already in flight
    #[error("stream {0:?} already has a request in flight")]
    StreamBusy(Stream),

    /// The link is not accepting requests (idle, faulted, or torn down)
    #[error("link is not connected")]
    NotConnected,

    /// No usable serial device
    #[error("no serial port found (tried {0})")]
    SerialPortNotFound(String),

    /// Serial port errors
    #[error("serial port error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for MSP Link
pub type Result<T> = std::result::Result<T, MspLinkError>;
