//! Polling loop and run/stop state machine.
//!
//! A monitor run moves through
//! `Idle -> Connecting -> Running -> Stopping -> Terminated`. A failed
//! connect goes straight from `Connecting` to `Terminated`. Every way out of
//! `Running` (operator interrupt, transport failure, run duration reached)
//! passes through a single `Stopping` step that prints the final report and
//! closes the transport exactly once.

use chrono::Local;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::cancel::CancellationToken;
use crate::config::MonitorSettings;
use crate::data::MonitorSession;
use crate::error::{Error, Result};
use crate::protocol::ResponseParser;
use crate::report::{FinalSnapshots, Reporter};
use crate::transport::SerialTransport;

/// Lifecycle state of a monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MonitorState {
    /// Constructed, not started.
    #[default]
    Idle,
    /// Opening the transport.
    Connecting,
    /// Polling.
    Running,
    /// Printing the final report and releasing the transport.
    Stopping,
    /// Finished.
    Terminated,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Why a running monitor stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The cancellation token was set.
    Cancelled,
    /// The configured run duration elapsed.
    Completed,
    /// A send, receive or report write failed.
    TransportError(Error),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "interrupted by operator"),
            Self::Completed => write!(f, "run duration reached"),
            Self::TransportError(e) => write!(f, "error during monitoring: {}", e),
        }
    }
}

/// Result of a finished monitor run.
#[derive(Debug)]
pub struct MonitorOutcome {
    /// Why the run stopped.
    pub reason: StopReason,
    /// Ticks that produced at least one reading.
    pub reading_count: u64,
    /// Time spent in `Running`.
    pub elapsed: Duration,
    /// Full-history statistics per channel with data.
    pub final_snapshots: FinalSnapshots,
}

/// Upper bound on lines read while draining a handshake reply.
const MAX_HANDSHAKE_LINES: usize = 256;

/// Drives a transport on a fixed cadence and reports on the readings.
pub struct MonitorLoop<T, W> {
    transport: T,
    out: W,
    token: CancellationToken,
    parser: ResponseParser,
    reporter: Reporter,
    poll_command: String,
    handshake_command: Option<String>,
    handshake_lines: usize,
    capacity: usize,
    sample_interval: Duration,
    duration_limit: Option<Duration>,
    state: MonitorState,
}

impl<T: SerialTransport, W: Write> MonitorLoop<T, W> {
    /// Create a monitor over `transport`, writing reports to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `settings` fail validation; no
    /// transport operation happens in that case.
    pub fn new(
        settings: &MonitorSettings,
        transport: T,
        token: CancellationToken,
        out: W,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            transport,
            out,
            token,
            parser: ResponseParser::default(),
            reporter: Reporter::new(settings),
            poll_command: settings.monitoring.temperature_request_command.clone(),
            handshake_command: settings.monitoring.handshake_command.clone(),
            handshake_lines: settings.monitoring.handshake_lines,
            capacity: settings.monitoring.max_data_points,
            sample_interval: settings.sample_interval(),
            duration_limit: settings.duration_limit(),
            state: MonitorState::Idle,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Run until cancelled, the duration limit is reached, or the transport
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the transport cannot be opened. Once
    /// connected, every stop is reported through [`MonitorOutcome::reason`].
    pub async fn run(mut self) -> Result<MonitorOutcome> {
        self.transition(MonitorState::Connecting);

        if let Err(e) = self.transport.connect().await {
            error!("Failed to connect to printer: {}", e);
            let _ = writeln!(self.out, "Cannot connect to printer: {e}");
            self.transition(MonitorState::Terminated);
            return Err(e);
        }

        let mut session = match MonitorSession::new(self.parser.channels(), self.capacity) {
            Ok(session) => session,
            Err(e) => {
                self.transport.close().await;
                self.transition(MonitorState::Terminated);
                return Err(e);
            }
        };
        self.transition(MonitorState::Running);
        info!("Monitoring started at {}", session.started_at().format("%H:%M:%S"));

        let reason = self.poll(&mut session).await;

        self.transition(MonitorState::Stopping);
        Ok(self.shutdown(session, reason).await)
    }

    /// The `Running` state. Returns only when the run must stop.
    async fn poll(&mut self, session: &mut MonitorSession) -> StopReason {
        if let Err(e) = self.handshake().await {
            error!("Handshake failed: {}", e);
            return StopReason::TransportError(e);
        }

        loop {
            if self.token.is_cancelled() {
                return StopReason::Cancelled;
            }
            if let Some(limit) = self.duration_limit {
                if session.elapsed() >= limit {
                    info!("Run duration of {:?} reached", limit);
                    return StopReason::Completed;
                }
            }

            let tick_started = Instant::now();
            match self.tick(session).await {
                Ok(true) => {}
                Ok(false) => return StopReason::Cancelled,
                Err(e) => {
                    error!("Error during monitoring: {}", e);
                    return StopReason::TransportError(e);
                }
            }

            let remaining = self.sample_interval.saturating_sub(tick_started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = self.token.cancelled() => {
                    debug!("Sleep interrupted by cancellation");
                    return StopReason::Cancelled;
                }
            }
        }
    }

    /// One poll cycle. Returns `Ok(false)` if cancellation was observed
    /// after a blocking call.
    async fn tick(&mut self, session: &mut MonitorSession) -> Result<bool> {
        self.transport.send(&self.poll_command).await?;
        if self.token.is_cancelled() {
            return Ok(false);
        }

        let line = self.transport.receive().await?;
        if self.token.is_cancelled() {
            debug!("Discarding response received after cancellation");
            return Ok(false);
        }

        if line.is_empty() {
            debug!("No response this cycle");
            return Ok(true);
        }

        if !self.parser.has_marker(&line) {
            debug!("Ignoring line without channel markers: {:?}", line);
            return Ok(true);
        }

        let readings = self.parser.parse(&line);
        if !session.record(&readings) {
            debug!("Ignoring line without valid readings: {:?}", line);
            return Ok(true);
        }

        let report = self
            .reporter
            .live_report(session, &readings, &line, Local::now());
        self.out.write_all(report.as_bytes())?;
        self.out.flush()?;

        Ok(true)
    }

    /// Send the configured identification request and echo its replies.
    ///
    /// The first `handshake_lines` lines are echoed. The rest of the reply
    /// is read up to its `ok` so capability lines never reach the poll
    /// loop; an empty read also ends it.
    async fn handshake(&mut self) -> Result<()> {
        let Some(command) = self.handshake_command.clone() else {
            return Ok(());
        };

        writeln!(self.out, "Initializing printer communication...")?;
        self.transport.send(&command).await?;

        let mut drained = 0;
        for read in 0..MAX_HANDSHAKE_LINES {
            if self.token.is_cancelled() {
                break;
            }
            let line = self.transport.receive().await?;
            if line.is_empty() {
                break;
            }
            if read < self.handshake_lines {
                writeln!(self.out, "Response: {line}")?;
            } else {
                drained += 1;
            }
            if line == "ok" || line.starts_with("ok ") {
                break;
            }
        }
        if drained > 0 {
            debug!("Skipped {} further handshake lines", drained);
        }

        self.out.flush()?;
        Ok(())
    }

    /// The `Stopping` state: final report, then release the transport.
    async fn shutdown(mut self, session: MonitorSession, reason: StopReason) -> MonitorOutcome {
        info!("Stopping monitor: {}", reason);

        let report = self.reporter.final_report(&session, &reason);
        let written = self
            .out
            .write_all(report.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            error!("Failed to write final report: {}", e);
        }

        self.transport.close().await;
        self.transition(MonitorState::Terminated);

        MonitorOutcome {
            final_snapshots: self.reporter.final_snapshots(&session),
            reading_count: session.reading_count(),
            elapsed: session.elapsed(),
            reason,
        }
    }

    fn transition(&mut self, new_state: MonitorState) {
        if self.state != new_state {
            debug!("Monitor state changed: {} -> {}", self.state, new_state);
            self.state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Channel;
    use crate::transport::{MockSerialTransport, ScriptStep, ScriptedTransport, TransportState};

    fn test_settings() -> MonitorSettings {
        let mut settings = MonitorSettings::default();
        settings.serial.stabilization_delay = 0.0;
        settings.monitoring.sample_interval_seconds = 0.001;
        settings.monitoring.handshake_command = None;
        settings.display.clear_screen = false;
        settings
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let mut settings = test_settings();
        settings.monitoring.max_data_points = 0;

        let transport = ScriptedTransport::new(["T:1.0"]);
        let log = transport.log();
        let result = MonitorLoop::new(&settings, transport, CancellationToken::new(), Vec::new());

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert_eq!(log.lock().connects, 0);
    }

    #[test]
    fn test_new_is_idle() {
        let monitor = MonitorLoop::new(
            &test_settings(),
            ScriptedTransport::new(["ok"]),
            CancellationToken::new(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_connect_failure_terminates_without_running() {
        let mut transport = MockSerialTransport::new();
        transport.expect_connect().times(1).returning(|| {
            Err(Error::ConnectionFailed {
                reason: "no such device".to_string(),
            })
        });
        transport.expect_send().times(0);
        transport.expect_receive().times(0);
        transport.expect_close().times(0);

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let result = monitor.run().await;

        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Cannot connect to printer"));
        assert!(!text.contains("FINAL"));
    }

    #[tokio::test]
    async fn test_send_failure_stops_with_final_report() {
        let mut transport = MockSerialTransport::new();
        transport.expect_connect().times(1).returning(|| Ok(()));
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(Error::ConnectionLost));
        transport.expect_close().times(1).return_const(());
        transport
            .expect_state()
            .return_const(TransportState::Connected);

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let outcome = monitor.run().await.unwrap();

        assert!(matches!(
            outcome.reason,
            StopReason::TransportError(Error::ConnectionLost)
        ));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(count(&text, "FINAL TEMPERATURE STABILITY ANALYSIS"), 1);
        assert!(text.contains("No readings were collected."));
    }

    #[tokio::test]
    async fn test_readings_flow_into_buffers() {
        let lines: Vec<String> = (0..12)
            .map(|i| format!("ok T:{}.0 /210.00 B:60.0 /60.00 @:0 B@:0", 200 + i % 3))
            .collect();
        let transport = ScriptedTransport::new(lines);
        let log = transport.log();

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let outcome = monitor.run().await.unwrap();

        // The script runs dry after 12 lines, which ends the session.
        assert!(matches!(
            outcome.reason,
            StopReason::TransportError(Error::ConnectionLost)
        ));
        assert_eq!(outcome.reading_count, 12);

        let hotend = outcome.final_snapshots[&Channel::Hotend].unwrap();
        assert_eq!(hotend.count, 12);
        assert_eq!(hotend.min, 200.0);
        assert_eq!(hotend.max, 202.0);
        let bed = outcome.final_snapshots[&Channel::Bed].unwrap();
        assert_eq!(bed.std_dev, 0.0);

        let log = log.lock();
        assert_eq!(log.sent.len(), 13);
        assert!(log.sent.iter().all(|c| c == "M105"));
        assert_eq!(log.closes, 1);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Hotend (last 10 readings) Statistics:"));
        assert!(text.contains("Hotend (last 12 readings) Statistics:"));
        assert!(text.contains("Recent Hotend Trend:"));
        assert_eq!(count(&text, "FINAL TEMPERATURE STABILITY ANALYSIS"), 1);
    }

    #[tokio::test]
    async fn test_lines_without_markers_are_skipped() {
        let transport = ScriptedTransport::with_steps([
            ScriptStep::Line("ok".to_string()),
            ScriptStep::Timeout,
            ScriptStep::Line("T:200.5 /0.0".to_string()),
            ScriptStep::Line("echo:busy: processing".to_string()),
        ]);

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.reading_count, 1);
        assert!(outcome.final_snapshots[&Channel::Hotend].is_none());
        assert!(!outcome.final_snapshots.contains_key(&Channel::Bed));
    }

    #[tokio::test]
    async fn test_duration_limit_completes() {
        let mut settings = test_settings();
        // 30 ms
        settings.monitoring.duration_minutes = Some(0.0005);

        let transport =
            ScriptedTransport::with_steps(std::iter::repeat(ScriptStep::Timeout).take(100_000));
        let log = transport.log();

        let monitor =
            MonitorLoop::new(&settings, transport, CancellationToken::new(), Vec::new()).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), monitor.run())
            .await
            .expect("duration limit must stop the run")
            .unwrap();

        assert!(matches!(outcome.reason, StopReason::Completed));
        assert!(outcome.elapsed >= Duration::from_millis(30));
        assert_eq!(log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_handshake_echoes_responses() {
        let mut settings = test_settings();
        settings.monitoring.handshake_command = Some("M115".to_string());
        settings.monitoring.handshake_lines = 5;

        let transport = ScriptedTransport::with_steps([
            ScriptStep::Line("FIRMWARE_NAME:Marlin 2.1".to_string()),
            ScriptStep::Line("Cap:AUTOREPORT_TEMP:1".to_string()),
            ScriptStep::Timeout,
            ScriptStep::Line("T:200.0 B:60.0".to_string()),
        ]);
        let log = transport.log();

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&settings, transport, CancellationToken::new(), &mut out).unwrap();
        let outcome = monitor.run().await.unwrap();

        assert_eq!(outcome.reading_count, 1);
        assert_eq!(log.lock().sent[0], "M115");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Response: FIRMWARE_NAME:Marlin 2.1"));
        assert!(text.contains("Response: Cap:AUTOREPORT_TEMP:1"));
    }

    #[tokio::test]
    async fn test_handshake_drains_capability_lines() {
        let mut settings = test_settings();
        settings.monitoring.handshake_command = Some("M115".to_string());
        settings.monitoring.handshake_lines = 2;

        let transport = ScriptedTransport::new([
            "FIRMWARE_NAME:Marlin 2.1.2 SOURCE_CODE_URL:github.com/MarlinFirmware/Marlin",
            "Cap:SERIAL_XON_XOFF:0",
            "Cap:BUILD_PERCENT:1",
            "Cap:AUTOREPORT_TEMP:1",
            "Cap:THERMAL_PROTECTION:1",
            "ok",
            "ok T:210.0 /210.0 B:60.0 /60.0",
        ]);
        let log = transport.log();

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&settings, transport, CancellationToken::new(), &mut out).unwrap();
        let outcome = monitor.run().await.unwrap();

        // Only the status reply is recorded, not `Cap:BUILD_PERCENT:1`.
        assert_eq!(outcome.reading_count, 1);
        assert_eq!(log.lock().sent, vec!["M115", "M105", "M105"]);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Response: Cap:SERIAL_XON_XOFF:0"));
        assert!(!text.contains("Cap:BUILD_PERCENT"));
        assert!(text.contains("Current: Hotend 210.000°C | Bed 60.000°C"));
    }

    #[tokio::test]
    async fn test_refused_connection_never_polls() {
        let transport = ScriptedTransport::new(["T:200.0"]).refusing_connection();
        let log = transport.log();

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let result = monitor.run().await;

        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        let log = log.lock();
        assert_eq!(log.connects, 1);
        assert!(log.sent.is_empty());
        assert_eq!(log.receives, 0);
        assert_eq!(log.closes, 0);
    }

    #[tokio::test]
    async fn test_receive_failure_mid_run_reports_once() {
        let mut steps: Vec<ScriptStep> = (0..6)
            .map(|i| ScriptStep::Line(format!("T:{}.0 B:60.0", 200 + i % 2)))
            .collect();
        steps.push(ScriptStep::Fail);
        steps.push(ScriptStep::Line("T:999.0".to_string()));
        let transport = ScriptedTransport::with_steps(steps);
        let log = transport.log();

        let mut out = Vec::new();
        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), &mut out)
                .unwrap();
        let outcome = monitor.run().await.unwrap();

        assert!(matches!(
            outcome.reason,
            StopReason::TransportError(Error::ConnectionLost)
        ));
        assert_eq!(outcome.reading_count, 6);
        let hotend = outcome.final_snapshots[&Channel::Hotend].unwrap();
        assert_eq!(hotend.max, 201.0);

        let log = log.lock();
        assert_eq!(log.receives, 7);
        assert_eq!(log.closes, 1);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(count(&text, "FINAL TEMPERATURE STABILITY ANALYSIS"), 1);
        assert!(text.contains("Stopped: error during monitoring: Connection lost"));
    }

    /// Writer whose every write fails.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_report_write_failure_stops_session() {
        let transport = ScriptedTransport::new(["T:200.0 B:60.0", "T:200.1 B:60.0"]);
        let log = transport.log();

        let monitor =
            MonitorLoop::new(&test_settings(), transport, CancellationToken::new(), ClosedPipe)
                .unwrap();
        let outcome = monitor.run().await.unwrap();

        assert!(matches!(
            outcome.reason,
            StopReason::TransportError(Error::Io(_))
        ));
        assert_eq!(outcome.reading_count, 1);

        let log = log.lock();
        assert_eq!(log.sent.len(), 1);
        assert_eq!(log.closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_subtracts_processing_time() {
        let mut settings = test_settings();
        settings.monitoring.sample_interval_seconds = 0.05;

        // Four replies taking 30 ms each, then the link drops on the fifth.
        let transport = ScriptedTransport::new(["T:200.0", "T:200.1", "T:200.2", "T:200.3"])
            .with_response_delay(Duration::from_millis(30));

        let started = Instant::now();
        let monitor =
            MonitorLoop::new(&settings, transport, CancellationToken::new(), Vec::new()).unwrap();
        let outcome = monitor.run().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.reading_count, 4);
        // Cycles start 50 ms apart; sleeping the full interval would take
        // 4 * (30 + 50) + 30 = 350 ms.
        assert!(elapsed >= Duration::from_millis(230), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(260), "{elapsed:?}");
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Cancelled.to_string(), "interrupted by operator");
        assert_eq!(StopReason::Completed.to_string(), "run duration reached");
        assert_eq!(
            StopReason::TransportError(Error::ConnectionLost).to_string(),
            "error during monitoring: Connection lost"
        );
    }
}
