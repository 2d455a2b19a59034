//! Serial link to the printer.
//!
//! [`SerialTransport`] is the capability the monitor loop drives. The
//! production binding is [`SerialPortTransport`]; tests bind
//! [`ScriptedTransport`], which replays canned response lines.

pub mod scripted;
pub mod serial;

use async_trait::async_trait;

use crate::error::Result;

pub use scripted::{CancelPoint, ScriptLog, ScriptStep, ScriptedTransport};
pub use serial::SerialPortTransport;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// No link is open.
    #[default]
    Disconnected,
    /// Currently opening the link.
    Connecting,
    /// Link open and stabilized.
    Connected,
    /// Currently closing the link.
    Disconnecting,
}

impl TransportState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Line-oriented link to the printer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialTransport: Send {
    /// Open the link and wait for the device to settle.
    async fn connect(&mut self) -> Result<()>;

    /// Write one command line; a newline terminator is appended.
    async fn send(&mut self, command: &str) -> Result<()>;

    /// Read one response line.
    ///
    /// Returns an empty string when the read times out or the bytes are not
    /// valid text. Errors are reserved for failures that end the session.
    async fn receive(&mut self) -> Result<String>;

    /// Release the link. Calling it on a closed transport does nothing.
    async fn close(&mut self);

    /// Current connection state.
    fn state(&self) -> TransportState;
}
