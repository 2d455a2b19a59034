//! Cooperative cancellation.
//!
//! An operator interrupt only flips a flag. Everything that follows (the
//! final report, closing the port) happens in the monitor loop when it
//! next checks the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared stop flag checked by the monitor loop.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Repeated calls have no further effect.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Check if a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once a stop is requested.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a cancel in between is not lost.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Turns the process interrupt signal into a [`CancellationToken`] stop.
pub struct CancellationController {
    token: CancellationToken,
    handler: Option<JoinHandle<()>>,
}

impl CancellationController {
    /// Create a controller with a fresh token and no handler installed.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handler: None,
        }
    }

    /// Handle to the controlled flag.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Listen for Ctrl+C and cancel the token when it arrives.
    ///
    /// Must be called from within a Tokio runtime. Installing twice is a
    /// no-op.
    pub fn install_interrupt_handler(&mut self) -> Result<()> {
        if self.handler.is_some() {
            debug!("Interrupt handler already installed");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("no async runtime: {e}")))?;

        let token = self.token.clone();
        self.handler = Some(runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => token.cancel(),
                Err(e) => warn!("Unable to listen for interrupt signal: {}", e),
            }
        }));

        Ok(())
    }

    /// Request a stop without a signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
