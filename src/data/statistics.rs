//! Streaming statistics and stability classification.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Minimum sample count before a summary is reported.
///
/// Early readings after connecting are noisy; summaries over fewer samples
/// are suppressed by [`StatisticsEngine::summarize_reportable`].
pub const MIN_REPORT_SAMPLES: usize = 5;

/// Discrete stability label derived from the standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    /// Below the excellent threshold.
    Excellent,
    /// Below the good threshold.
    Good,
    /// Below the fair threshold.
    Fair,
    /// At or above the fair threshold.
    Poor,
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "EXCELLENT"),
            Self::Good => write!(f, "GOOD"),
            Self::Fair => write!(f, "FAIR"),
            Self::Poor => write!(f, "POOR"),
        }
    }
}

/// Standard deviation boundaries and range target.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    /// Standard deviation below which a signal is excellent.
    pub excellent_std_dev: f64,
    /// Standard deviation below which a signal is good.
    pub good_std_dev: f64,
    /// Standard deviation below which a signal is fair.
    pub fair_std_dev: f64,
    /// Target maximum range (max - min).
    pub good_range: f64,
}

impl StabilityThresholds {
    /// Check that all boundaries are positive and ascending.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("excellent_std_dev", self.excellent_std_dev),
            ("good_std_dev", self.good_std_dev),
            ("fair_std_dev", self.fair_std_dev),
            ("good_range", self.good_range),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::config(format!(
                    "analysis.stability_thresholds.{name} must be a positive number, got {value}"
                )));
            }
        }

        if self.excellent_std_dev > self.good_std_dev || self.good_std_dev > self.fair_std_dev {
            return Err(Error::config(format!(
                "stability thresholds must ascend: excellent {} <= good {} <= fair {}",
                self.excellent_std_dev, self.good_std_dev, self.fair_std_dev
            )));
        }

        Ok(())
    }
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            excellent_std_dev: 0.15,
            good_std_dev: 0.25,
            fair_std_dev: 0.5,
            good_range: 1.0,
        }
    }
}

/// Summary of a sequence of readings at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsSnapshot {
    /// Number of readings summarized.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1 divisor), 0 for a single reading.
    pub std_dev: f64,
    /// Smallest reading.
    pub min: f64,
    /// Largest reading.
    pub max: f64,
    /// `max - min`.
    pub range: f64,
    /// Classification of `std_dev`.
    pub stability: Stability,
    /// Whether `range` is below the configured range target.
    pub within_target_range: bool,
}

/// Computes [`StatisticsSnapshot`]s against configured thresholds.
#[derive(Debug, Clone, Default)]
pub struct StatisticsEngine {
    thresholds: StabilityThresholds,
}

impl StatisticsEngine {
    /// Create an engine using the given thresholds.
    pub fn new(thresholds: StabilityThresholds) -> Self {
        Self { thresholds }
    }

    /// The thresholds in use.
    pub fn thresholds(&self) -> &StabilityThresholds {
        &self.thresholds
    }

    /// Summarize a sequence of readings.
    ///
    /// Returns `None` for an empty sequence.
    ///
    /// # Example
    ///
    /// ```
    /// use printer_temp_monitor::data::{Stability, StatisticsEngine};
    ///
    /// let stats = StatisticsEngine::default()
    ///     .summarize(&[200.0, 200.0, 200.0])
    ///     .unwrap();
    /// assert_eq!(stats.std_dev, 0.0);
    /// assert_eq!(stats.stability, Stability::Excellent);
    /// ```
    pub fn summarize(&self, values: &[f64]) -> Option<StatisticsSnapshot> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;

        let std_dev = if count < 2 {
            0.0
        } else {
            let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1.0)).sqrt()
        };

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        Some(StatisticsSnapshot {
            count,
            mean,
            std_dev,
            min,
            max,
            range,
            stability: self.classify(std_dev),
            within_target_range: range < self.thresholds.good_range,
        })
    }

    /// Summarize only once at least [`MIN_REPORT_SAMPLES`] readings exist.
    pub fn summarize_reportable(&self, values: &[f64]) -> Option<StatisticsSnapshot> {
        if values.len() < MIN_REPORT_SAMPLES {
            None
        } else {
            self.summarize(values)
        }
    }

    /// Classify a standard deviation; the first threshold it is strictly
    /// below wins.
    pub fn classify(&self, std_dev: f64) -> Stability {
        let t = &self.thresholds;
        if std_dev < t.excellent_std_dev {
            Stability::Excellent
        } else if std_dev < t.good_std_dev {
            Stability::Good
        } else if std_dev < t.fair_std_dev {
            Stability::Fair
        } else {
            Stability::Poor
        }
    }
}
