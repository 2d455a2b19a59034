//! Replaying transport for tests and dry runs.
//!
//! [`ScriptedTransport`] plays back a fixed list of responses, one per
//! `receive`, and records everything the monitor does to it. It can also
//! fire a [`CancellationToken`] at a chosen point in the I/O sequence to
//! simulate an operator interrupt arriving mid-cycle.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{SerialTransport, TransportState};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// One scripted response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Return this line from `receive`.
    Line(String),
    /// Behave as a read timeout (empty line).
    Timeout,
    /// Fail the read as if the device disappeared.
    Fail,
}

/// Where in the I/O sequence a scripted interrupt fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPoint {
    /// While the nth command is being written.
    OnSend,
    /// While waiting for the nth response.
    OnReceive,
}

/// Everything the monitor did to a [`ScriptedTransport`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLog {
    /// Commands passed to `send`, in order.
    pub sent: Vec<String>,
    /// Number of `connect` calls.
    pub connects: usize,
    /// Number of `receive` calls.
    pub receives: usize,
    /// Number of `close` calls that released an open link.
    pub closes: usize,
}

struct ScriptedCancel {
    token: CancellationToken,
    point: CancelPoint,
    nth: usize,
}

/// Transport that replays canned response lines.
///
/// Once the script is exhausted every `receive` fails with
/// [`Error::ConnectionLost`], which ends a monitor session.
pub struct ScriptedTransport {
    steps: VecDeque<ScriptStep>,
    refuse_connect: bool,
    response_delay: Duration,
    cancel: Option<ScriptedCancel>,
    log: Arc<Mutex<ScriptLog>>,
    state: TransportState,
}

impl ScriptedTransport {
    /// Create a transport that returns `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_steps(lines.into_iter().map(|l| ScriptStep::Line(l.into())))
    }

    /// Create a transport from explicit steps.
    pub fn with_steps(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            refuse_connect: false,
            response_delay: Duration::ZERO,
            cancel: None,
            log: Arc::new(Mutex::new(ScriptLog::default())),
            state: TransportState::Disconnected,
        }
    }

    /// Make `connect` fail.
    pub fn refusing_connection(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Wait this long inside every `receive`, like a slow device.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Cancel `token` during the `nth` (1-based) send or receive.
    pub fn cancel_at(mut self, token: CancellationToken, point: CancelPoint, nth: usize) -> Self {
        self.cancel = Some(ScriptedCancel { token, point, nth });
        self
    }

    /// Shared handle to the call log; stays valid after the transport moves.
    pub fn log(&self) -> Arc<Mutex<ScriptLog>> {
        self.log.clone()
    }

    fn maybe_cancel(&self, point: CancelPoint, count: usize) {
        if let Some(cancel) = &self.cancel {
            if cancel.point == point && cancel.nth == count {
                debug!("Scripted interrupt at {:?} #{}", point, count);
                cancel.token.cancel();
            }
        }
    }
}

#[async_trait]
impl SerialTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.log.lock().connects += 1;
        if self.refuse_connect {
            return Err(Error::ConnectionFailed {
                reason: "scripted refusal".to_string(),
            });
        }
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        if !self.state.is_connected() {
            return Err(Error::NotConnected);
        }
        let count = {
            let mut log = self.log.lock();
            log.sent.push(command.trim().to_string());
            log.sent.len()
        };
        self.maybe_cancel(CancelPoint::OnSend, count);
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        if !self.state.is_connected() {
            return Err(Error::NotConnected);
        }
        let count = {
            let mut log = self.log.lock();
            log.receives += 1;
            log.receives
        };
        self.maybe_cancel(CancelPoint::OnReceive, count);

        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }

        match self.steps.pop_front() {
            Some(ScriptStep::Line(line)) => Ok(line),
            Some(ScriptStep::Timeout) => Ok(String::new()),
            Some(ScriptStep::Fail) | None => Err(Error::ConnectionLost),
        }
    }

    async fn close(&mut self) {
        if self.state.is_connected() {
            self.log.lock().closes += 1;
        }
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }
}
