//! Data structures for collected readings.
//!
//! This module contains the rolling sample history, the statistics engine
//! and the session state that ties them together.

pub mod buffer;
pub mod session;
pub mod statistics;

pub use buffer::RollingSampleBuffer;
pub use session::MonitorSession;
pub use statistics::{
    Stability, StabilityThresholds, StatisticsEngine, StatisticsSnapshot, MIN_REPORT_SAMPLES,
};
