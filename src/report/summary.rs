//! Live and final report text.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::graph::TextGraphRenderer;
use crate::config::MonitorSettings;
use crate::data::{MonitorSession, StatisticsEngine, StatisticsSnapshot, MIN_REPORT_SAMPLES};
use crate::monitor::StopReason;
use crate::protocol::{Channel, ChannelReadings};

/// Buffer length a channel needs before live statistics and charts appear.
pub const LIVE_ANALYSIS_MIN_SAMPLES: usize = 10;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";
const TITLE: &str = "3D Printer Temperature Monitor";

/// Statistics for each channel that has data, over its whole buffer.
pub type FinalSnapshots = BTreeMap<Channel, Option<StatisticsSnapshot>>;

/// Assembles report text from session state.
#[derive(Debug, Clone)]
pub struct Reporter {
    engine: StatisticsEngine,
    renderer: TextGraphRenderer,
    rolling_window: usize,
    live_points: usize,
    live_width: usize,
    final_width: usize,
    clear_screen: bool,
    show_raw: bool,
}

impl Reporter {
    /// Create a reporter from the display and analysis settings.
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            engine: StatisticsEngine::new(settings.analysis.stability_thresholds),
            renderer: TextGraphRenderer::default(),
            rolling_window: settings.display.rolling_window_size,
            live_points: settings.live_graph_points(),
            live_width: settings.live_graph_width(),
            final_width: settings.display.graph_width,
            clear_screen: settings.display.clear_screen,
            show_raw: settings.display.show_raw_response,
        }
    }

    /// The statistics engine used for every report.
    pub fn engine(&self) -> &StatisticsEngine {
        &self.engine
    }

    /// Report printed after each tick that produced readings.
    ///
    /// Statistics cover the trailing rolling window and the trend chart a
    /// shorter window, for each channel holding at least
    /// [`LIVE_ANALYSIS_MIN_SAMPLES`] values.
    pub fn live_report(
        &self,
        session: &MonitorSession,
        readings: &ChannelReadings,
        raw_line: &str,
        now: DateTime<Local>,
    ) -> String {
        let mut out = String::new();

        if self.clear_screen {
            out.push_str(CLEAR_SCREEN);
        }
        let _ = writeln!(out, "{TITLE}");
        let _ = writeln!(
            out,
            "Time: {} | Elapsed: {:.0}s | Readings: {}",
            now.format("%H:%M:%S"),
            session.elapsed().as_secs_f64(),
            session.reading_count()
        );
        let _ = writeln!(out, "{}", "=".repeat(60));

        let current: Vec<String> = readings
            .iter()
            .map(|(channel, value)| format!("{} {:.3}°C", channel.label(), value))
            .collect();
        let _ = writeln!(out, "Current: {}", current.join(" | "));

        let ready: Vec<_> = session
            .buffers()
            .filter(|(_, buffer)| buffer.len() >= LIVE_ANALYSIS_MIN_SAMPLES)
            .collect();

        for (channel, buffer) in &ready {
            let window = buffer.windowed(self.rolling_window);
            if let Some(stats) = self.engine.summarize_reportable(&window) {
                let label = format!("{} (last {} readings)", channel.label(), window.len());
                out.push_str(&self.format_statistics(&stats, &label));
            }
        }

        for (channel, buffer) in &ready {
            let recent = buffer.windowed(self.live_points);
            let _ = writeln!(out, "\nRecent {} Trend:", channel.label());
            let _ = writeln!(
                out,
                "{}",
                self.renderer
                    .render(&recent, self.live_width, &format!("{} trend", channel.label()))
            );
        }

        if self.show_raw {
            let _ = writeln!(out, "\nRaw response: {raw_line}");
        }
        let _ = writeln!(out, "\nPress Ctrl+C to stop and see final analysis...");

        out
    }

    /// Statistics over each channel's entire buffer, for channels with data.
    ///
    /// A channel with fewer than [`MIN_REPORT_SAMPLES`] values maps to
    /// `None`. Channels that never produced a value are omitted.
    pub fn final_snapshots(&self, session: &MonitorSession) -> FinalSnapshots {
        session
            .buffers()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(channel, buffer)| {
                (channel, self.engine.summarize_reportable(&buffer.snapshot()))
            })
            .collect()
    }

    /// Report printed once when the monitor stops.
    pub fn final_report(&self, session: &MonitorSession, reason: &StopReason) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "FINAL TEMPERATURE STABILITY ANALYSIS");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "Session started {} | Elapsed: {:.0}s | Readings: {}",
            session.started_at().format("%Y-%m-%d %H:%M:%S"),
            session.elapsed().as_secs_f64(),
            session.reading_count()
        );
        let _ = writeln!(out, "Stopped: {reason}");

        let snapshots = self.final_snapshots(session);
        if snapshots.is_empty() {
            let _ = writeln!(out, "\nNo readings were collected.");
        }

        for (channel, stats) in &snapshots {
            let label = channel.label().to_uppercase();
            match stats {
                Some(stats) => out.push_str(&self.format_statistics(stats, &label)),
                None => {
                    let count = session.buffer(*channel).map_or(0, |b| b.len());
                    let _ = writeln!(
                        out,
                        "\n{label}: {count} readings, at least {MIN_REPORT_SAMPLES} needed for statistics"
                    );
                }
            }

            if let Some(buffer) = session.buffer(*channel) {
                let _ = writeln!(
                    out,
                    "{}",
                    self.renderer.render(
                        &buffer.snapshot(),
                        self.final_width,
                        &format!("{} Graph", channel.label())
                    )
                );
            }
        }

        let t = self.engine.thresholds();
        let _ = writeln!(out, "\nA stable temperature signal should show:");
        let _ = writeln!(
            out,
            "  - Standard deviation < {}°C for good stability",
            t.good_std_dev
        );
        let _ = writeln!(out, "  - Range < {}°C over time", t.good_range);
        let _ = writeln!(out, "  - Smooth, consistent readings");

        out
    }

    /// Multi-line statistics block.
    pub fn format_statistics(&self, stats: &StatisticsSnapshot, label: &str) -> String {
        let target = if stats.within_target_range {
            "met"
        } else {
            "missed"
        };
        format!(
            "\n{label} Statistics:\n\
             \x20 Samples: {}\n\
             \x20 Mean: {:.4}°C\n\
             \x20 Std Dev: {:.4}°C\n\
             \x20 Range: {:.4}°C (min: {:.3}, max: {:.3})\n\
             \x20 Range target (< {}°C): {}\n\
             \x20 Stability: {}\n",
            stats.count,
            stats.mean,
            stats.std_dev,
            stats.range,
            stats.min,
            stats.max,
            self.engine.thresholds().good_range,
            target,
            stats.stability,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseParser;
    use pretty_assertions::assert_eq;

    fn quiet_settings() -> MonitorSettings {
        let mut settings = MonitorSettings::default();
        settings.display.clear_screen = false;
        settings
    }

    fn session_with(lines: &[&str]) -> (MonitorSession, ChannelReadings) {
        let parser = ResponseParser::default();
        let mut session = MonitorSession::new(&Channel::ALL, 100).unwrap();
        let mut last = ChannelReadings::default();
        for line in lines {
            last = parser.parse(line);
            session.record(&last);
        }
        (session, last)
    }

    #[test]
    fn test_format_statistics() {
        let reporter = Reporter::new(&quiet_settings());
        let stats = reporter
            .engine()
            .summarize(&[200.0, 200.0, 200.0, 200.0, 200.0])
            .unwrap();
        let expected = "
Bed Statistics:
  Samples: 5
  Mean: 200.0000°C
  Std Dev: 0.0000°C
  Range: 0.0000°C (min: 200.000, max: 200.000)
  Range target (< 1°C): met
  Stability: EXCELLENT
";
        assert_eq!(reporter.format_statistics(&stats, "Bed"), expected);
    }

    #[test]
    fn test_live_report_before_analysis_threshold() {
        let reporter = Reporter::new(&quiet_settings());
        let (session, last) = session_with(&["T:200.0 /200.0 B:60.0 /60.0"]);

        let out = reporter.live_report(&session, &last, "T:200.0 /200.0 B:60.0 /60.0", Local::now());
        assert!(out.starts_with(TITLE));
        assert!(out.contains("Current: Hotend 200.000°C | Bed 60.000°C"));
        assert!(out.contains("Readings: 1"));
        assert!(!out.contains("Statistics"));
        assert!(out.contains("Raw response: T:200.0 /200.0 B:60.0 /60.0"));
    }

    #[test]
    fn test_live_report_with_analysis() {
        let mut settings = quiet_settings();
        settings.display.rolling_window_size = 8;
        let reporter = Reporter::new(&settings);

        let lines: Vec<String> = (0..12)
            .map(|i| format!("T:{}.0 B:60.0", 200 + i))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (session, last) = session_with(&refs);

        let out = reporter.live_report(&session, &last, refs[11], Local::now());
        assert!(out.contains("Hotend (last 8 readings) Statistics:"));
        assert!(out.contains("Recent Hotend Trend:"));
        assert!(out.contains("Bed trend: all values equal to 60.000"));
    }

    #[test]
    fn test_live_report_clear_screen() {
        let reporter = Reporter::new(&MonitorSettings::default());
        let (session, last) = session_with(&["T:1.0"]);
        let out = reporter.live_report(&session, &last, "T:1.0", Local::now());
        assert!(out.starts_with(CLEAR_SCREEN));
    }

    #[test]
    fn test_final_snapshots_cover_full_buffer() {
        let mut settings = quiet_settings();
        settings.display.rolling_window_size = 5;
        let reporter = Reporter::new(&settings);

        let lines: Vec<String> = (0..20).map(|i| format!("T:{}.0", 200 + i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (session, _) = session_with(&refs);

        let snapshots = reporter.final_snapshots(&session);
        assert_eq!(snapshots.len(), 1);
        let hotend = snapshots[&Channel::Hotend].unwrap();
        assert_eq!(hotend.count, 20);
        assert_eq!(hotend.min, 200.0);
        assert_eq!(hotend.max, 219.0);
        assert!(!snapshots.contains_key(&Channel::Bed));

        // Unchanged buffer yields identical snapshots.
        assert_eq!(snapshots, reporter.final_snapshots(&session));
    }

    #[test]
    fn test_final_report_with_few_samples() {
        let reporter = Reporter::new(&quiet_settings());
        let (session, _) = session_with(&["T:200.0 B:60.0", "T:201.0 B:60.5"]);

        let out = reporter.final_report(&session, &StopReason::Cancelled);
        assert!(out.contains("FINAL TEMPERATURE STABILITY ANALYSIS"));
        assert!(out.contains("Stopped: interrupted by operator"));
        assert!(out.contains("HOTEND: 2 readings, at least 5 needed for statistics"));
        assert!(out.contains("Hotend Graph (200.000 to 201.000"));
        assert!(out.contains("Standard deviation < 0.25°C for good stability"));
        assert!(out.contains("Range < 1°C over time"));
    }

    #[test]
    fn test_final_report_without_data() {
        let reporter = Reporter::new(&quiet_settings());
        let (session, _) = session_with(&[]);
        let out = reporter.final_report(&session, &StopReason::Completed);
        assert!(out.contains("No readings were collected."));
    }
}
