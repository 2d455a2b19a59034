//! Monitor settings.
//!
//! The settings object is constructed once at startup and passed by
//! reference into the transport, the statistics engine and the monitor
//! loop. The JSON layout matches the `config.json` shipped with the
//! firmware tools, with every key optional.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::data::StabilityThresholds;
use crate::error::{Error, Result};

/// Longest accepted wait for a single response line.
pub const MAX_READ_TIMEOUT: Duration = Duration::from_secs(3600);

/// Serial link parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path or port name (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout in seconds.
    pub timeout: f64,
    /// Delay after opening the port before the first command, in seconds.
    ///
    /// Most boards reset when the port is opened and drop anything sent
    /// during their boot sequence.
    pub stabilization_delay: f64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout: 2.0,
            stabilization_delay: 2.0,
        }
    }
}

/// Polling parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Seconds between poll cycles.
    pub sample_interval_seconds: f64,
    /// Capacity of each channel's rolling buffer.
    pub max_data_points: usize,
    /// Status request sent every cycle.
    pub temperature_request_command: String,
    /// Command sent once after connecting, `None` to skip the handshake.
    pub handshake_command: Option<String>,
    /// Maximum number of handshake responses echoed.
    pub handshake_lines: usize,
    /// Stop after this many minutes; run until interrupted when absent.
    pub duration_minutes: Option<f64>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            sample_interval_seconds: 1.0,
            max_data_points: 300,
            temperature_request_command: "M105".to_string(),
            handshake_command: Some("M115".to_string()),
            handshake_lines: 5,
            duration_minutes: None,
        }
    }
}

/// Text output parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Trailing window used for periodic statistics.
    pub rolling_window_size: usize,
    /// Column count of the final chart. Live charts use half of it.
    pub graph_width: usize,
    /// Number of recent values plotted in the live chart.
    pub graph_points: usize,
    /// Clear the terminal before each live report.
    pub clear_screen: bool,
    /// Echo the raw device line in each live report.
    pub show_raw_response: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            rolling_window_size: 30,
            graph_width: 60,
            graph_points: 20,
            clear_screen: true,
            show_raw_response: true,
        }
    }
}

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Stability classification boundaries.
    pub stability_thresholds: StabilityThresholds,
}

/// Complete settings object consumed by the monitor.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Serial link parameters.
    pub serial: SerialSettings,
    /// Polling parameters.
    pub monitoring: MonitoringSettings,
    /// Text output parameters.
    pub display: DisplaySettings,
    /// Analysis parameters.
    pub analysis: AnalysisSettings,
}

impl MonitorSettings {
    /// Parse settings from JSON text and validate them.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read,
    /// [`Error::ConfigParse`] if it is not valid JSON, and
    /// [`Error::InvalidConfig`] if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every value the monitor depends on.
    pub fn validate(&self) -> Result<()> {
        let serial = &self.serial;
        if serial.port.trim().is_empty() {
            return Err(Error::config("serial.port must not be empty"));
        }
        if serial.baud_rate == 0 {
            return Err(Error::config("serial.baud_rate must be positive"));
        }
        let timeout = positive_duration("serial.timeout", serial.timeout)?;
        if timeout > MAX_READ_TIMEOUT {
            return Err(Error::config(format!(
                "serial.timeout must not exceed {}s, got {}",
                MAX_READ_TIMEOUT.as_secs(),
                serial.timeout
            )));
        }
        if !serial.stabilization_delay.is_finite() || serial.stabilization_delay < 0.0 {
            return Err(Error::config(format!(
                "serial.stabilization_delay must be a non-negative number, got {}",
                serial.stabilization_delay
            )));
        }

        let monitoring = &self.monitoring;
        positive_duration(
            "monitoring.sample_interval_seconds",
            monitoring.sample_interval_seconds,
        )?;
        if monitoring.max_data_points == 0 {
            return Err(Error::config("monitoring.max_data_points must be positive"));
        }
        if monitoring.temperature_request_command.trim().is_empty() {
            return Err(Error::config(
                "monitoring.temperature_request_command must not be empty",
            ));
        }
        if let Some(minutes) = monitoring.duration_minutes {
            positive_duration("monitoring.duration_minutes", minutes * 60.0)?;
        }

        let display = &self.display;
        if display.rolling_window_size == 0 {
            return Err(Error::config("display.rolling_window_size must be positive"));
        }
        if display.graph_points == 0 {
            return Err(Error::config("display.graph_points must be positive"));
        }
        if display.graph_width < 2 {
            return Err(Error::config(format!(
                "display.graph_width must be at least 2, got {}",
                display.graph_width
            )));
        }

        self.analysis.stability_thresholds.validate()
    }

    /// Read timeout of the serial link.
    pub fn read_timeout(&self) -> Duration {
        seconds(self.serial.timeout)
    }

    /// Delay between opening the port and the first command.
    pub fn stabilization_delay(&self) -> Duration {
        seconds(self.serial.stabilization_delay)
    }

    /// Target time between the start of two poll cycles.
    pub fn sample_interval(&self) -> Duration {
        seconds(self.monitoring.sample_interval_seconds)
    }

    /// Optional run-time limit.
    pub fn duration_limit(&self) -> Option<Duration> {
        self.monitoring
            .duration_minutes
            .map(|minutes| seconds(minutes * 60.0))
    }

    /// Number of values plotted by the live trend chart.
    pub fn live_graph_points(&self) -> usize {
        self.display
            .graph_points
            .min(self.display.rolling_window_size)
    }

    /// Column count of the live trend chart.
    pub fn live_graph_width(&self) -> usize {
        (self.display.graph_width / 2).max(1)
    }

    /// Human-readable configuration summary printed at startup.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(40);
        let duration = match self.monitoring.duration_minutes {
            Some(minutes) => format!("{} minutes", minutes),
            None => "until interrupted".to_string(),
        };
        let t = &self.analysis.stability_thresholds;
        format!(
            "Temperature Monitor Configuration:\n{rule}\n\
             Serial Port: {}\n\
             Baud Rate: {}\n\
             Timeout: {}s\n\
             Duration: {}\n\
             Sample Interval: {}s\n\
             Buffer Size: {} readings\n\
             Thresholds (std dev): excellent < {}, good < {}, fair < {}\n\
             {rule}",
            self.serial.port,
            self.serial.baud_rate,
            self.serial.timeout,
            duration,
            self.monitoring.sample_interval_seconds,
            self.monitoring.max_data_points,
            t.excellent_std_dev,
            t.good_std_dev,
            t.fair_std_dev,
        )
    }
}

fn positive_duration(name: &str, value: f64) -> Result<Duration> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::config(format!(
            "{name} must be a positive number, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::config(format!("{name} is out of range ({value}): {e}")))
}

/// Saturating conversion for settings that have not been validated.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}
