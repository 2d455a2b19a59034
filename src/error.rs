//! Error types for the printer-temp-monitor crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reported by the underlying serial port library.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error while talking to the device or writing a report.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to establish a connection to the printer.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Operation requires a connection but the transport is not connected.
    #[error("Printer not connected")]
    NotConnected,

    /// The connection to the printer was lost.
    #[error("Connection lost")]
    ConnectionLost,

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// The settings object failed validation.
    #[error("Invalid configuration: {context}")]
    InvalidConfig {
        /// Which setting was rejected and why.
        context: String,
    },

    /// The configuration file is not valid JSON for the settings schema.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfig`] with the given context.
    pub(crate) fn config(context: impl Into<String>) -> Self {
        Self::InvalidConfig {
            context: context.into(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
