//! `serialport`-backed transport.
//!
//! The `serialport` API is blocking, so every port operation runs on the
//! blocking thread pool against a shared link guarded by a mutex. Only one
//! operation is ever in flight because the monitor awaits each call.

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{SerialTransport, TransportState};
use crate::config::MonitorSettings;
use crate::error::{Error, Result};

/// Per-read timeout on the port; `receive` loops until its own deadline.
const READ_POLL: Duration = Duration::from_millis(100);

/// Bytes buffered without a newline before the partial line is dropped.
const MAX_LINE_LEN: usize = 4096;

/// Open port plus bytes read past the last returned line.
struct Link<P = Box<dyn SerialPort>> {
    port: P,
    pending: BytesMut,
    /// Set after an overlong line was dropped; bytes up to the next
    /// newline belong to it and are discarded too.
    discarding: bool,
}

impl<P: Read + Write> Link<P> {
    fn new(port: P) -> Self {
        Self {
            port,
            pending: BytesMut::with_capacity(256),
            discarding: false,
        }
    }

    /// Read until a full line is buffered or `timeout` passes.
    ///
    /// Returns `None` on timeout; any partial line stays buffered.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut chunk = [0u8; 256];

        loop {
            while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line = self.pending.split_to(pos + 1);
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                return Ok(Some(line[..pos].to_vec()));
            }

            if self.pending.len() > MAX_LINE_LEN {
                warn!(
                    "Dropping {} bytes received without a line terminator",
                    self.pending.len()
                );
                self.pending.clear();
                self.discarding = true;
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(None);
            }

            match self.port.read(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Read one line as trimmed text.
    ///
    /// A timeout and undecodable bytes both yield an empty string.
    fn read_text(&mut self, timeout: Duration) -> io::Result<String> {
        let Some(bytes) = self.read_line(timeout)? else {
            debug!("Read timed out after {:?}", timeout);
            return Ok(String::new());
        };

        match String::from_utf8(bytes) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                debug!("Discarding undecodable response: {}", e);
                Ok(String::new())
            }
        }
    }

    fn write_line(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

/// Transport over a local serial port.
pub struct SerialPortTransport {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    stabilization_delay: Duration,
    link: Option<Arc<Mutex<Link>>>,
    state: TransportState,
}

impl SerialPortTransport {
    /// Create a transport for the port described in `settings`.
    ///
    /// Nothing is opened until [`SerialTransport::connect`].
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            port_name: settings.serial.port.clone(),
            baud_rate: settings.serial.baud_rate,
            timeout: settings.read_timeout(),
            stabilization_delay: settings.stabilization_delay(),
            link: None,
            state: TransportState::Disconnected,
        }
    }

    /// Names of the serial ports present on this system.
    pub fn available_ports() -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Port this transport opens.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn link(&self) -> Result<Arc<Mutex<Link>>> {
        self.link.clone().ok_or(Error::NotConnected)
    }

    fn set_state(&mut self, new_state: TransportState) {
        if self.state != new_state {
            debug!("Transport state changed: {} -> {}", self.state, new_state);
            self.state = new_state;
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Internal(format!("serial task failed: {e}"))
}

#[async_trait]
impl SerialTransport for SerialPortTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.state.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        self.set_state(TransportState::Connecting);

        let builder = serialport::new(self.port_name.as_str(), self.baud_rate).timeout(READ_POLL);
        let opened = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(join_error)?;

        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                self.set_state(TransportState::Disconnected);
                return Err(Error::ConnectionFailed {
                    reason: format!("{}: {}", self.port_name, e),
                });
            }
        };

        info!(
            "Connected to printer on {} at {} baud",
            self.port_name, self.baud_rate
        );

        // Opening the port resets most boards; anything sent before the
        // bootloader hands over is lost.
        tokio::time::sleep(self.stabilization_delay).await;

        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Failed to clear input buffer: {}", e);
        }

        self.link = Some(Arc::new(Mutex::new(Link::new(port))));
        self.set_state(TransportState::Connected);
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        let link = self.link()?;
        let mut frame = command.trim().as_bytes().to_vec();
        frame.push(b'\n');

        debug!("Sending {:?}", command.trim());
        tokio::task::spawn_blocking(move || link.lock().write_line(&frame))
            .await
            .map_err(join_error)??;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        let link = self.link()?;
        let timeout = self.timeout;

        let text = tokio::task::spawn_blocking(move || link.lock().read_text(timeout))
            .await
            .map_err(join_error)??;
        Ok(text)
    }

    async fn close(&mut self) {
        let Some(link) = self.link.take() else {
            self.set_state(TransportState::Disconnected);
            return;
        };

        self.set_state(TransportState::Disconnecting);
        // The port closes when the last handle is dropped.
        drop(link);
        info!("Closed connection to {}", self.port_name);
        self.set_state(TransportState::Disconnected);
    }

    fn state(&self) -> TransportState {
        self.state
    }
}
