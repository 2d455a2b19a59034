//! Text output.
//!
//! This module renders ASCII trend charts and assembles the live and
//! final reports printed by the monitor.

pub mod graph;
pub mod summary;

pub use graph::TextGraphRenderer;
pub use summary::{FinalSnapshots, Reporter, LIVE_ANALYSIS_MIN_SAMPLES};
