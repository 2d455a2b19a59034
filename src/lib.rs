//! # printer-temp-monitor
//!
//! Real-time temperature telemetry for 3D printers running Marlin-style
//! firmware, over a serial link.
//!
//! The monitor polls the printer with a status request (`M105` by
//! default), parses the `T:`/`B:` fields of each reply, keeps a bounded
//! history per heater, and reports how stable each temperature is.
//!
//! ## Features
//!
//! - **Polling**: fixed-cadence request/response over any [`SerialTransport`]
//! - **Rolling history**: fixed-capacity ring buffer per channel
//! - **Statistics**: mean, sample standard deviation, min/max/range
//! - **Stability classification**: configurable excellent/good/fair/poor
//!   thresholds
//! - **Text charts**: six-level ASCII trend charts
//! - **Clean shutdown**: Ctrl+C always yields one final report and closes
//!   the port
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use printer_temp_monitor::{
//!     CancellationController, MonitorLoop, MonitorSettings, Result, SerialPortTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = MonitorSettings::load("config.json")?;
//!
//!     let mut controller = CancellationController::new();
//!     controller.install_interrupt_handler()?;
//!
//!     let transport = SerialPortTransport::new(&settings);
//!     let monitor = MonitorLoop::new(&settings, transport, controller.token(), std::io::stdout())?;
//!
//!     let outcome = monitor.run().await?;
//!     println!("Stopped after {} readings: {}", outcome.reading_count, outcome.reason);
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! The user needs access to the serial device, usually via the `dialout`
//! group.
//!
//! ### Boards that reset on connect
//! Many controllers reboot when the port opens. Raise
//! `serial.stabilization_delay` if the first replies are missing.

// Public modules
pub mod cancel;
pub mod config;
pub mod data;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod report;
pub mod transport;

// Re-exports for convenience
pub use cancel::{CancellationController, CancellationToken};
pub use config::MonitorSettings;
pub use error::{Error, Result};
pub use monitor::{MonitorLoop, MonitorOutcome, MonitorState, StopReason};
pub use transport::{SerialPortTransport, SerialTransport, TransportState};

// Re-export commonly used types from submodules
pub use data::{
    MonitorSession, RollingSampleBuffer, Stability, StabilityThresholds, StatisticsEngine,
    StatisticsSnapshot,
};
pub use protocol::{Channel, ChannelReadings, ResponseParser};
pub use report::{Reporter, TextGraphRenderer};
