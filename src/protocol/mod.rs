//! Protocol module for the printer's serial status lines.
//!
//! This module contains:
//! - The channel enumeration and its marker tokens
//! - Status response parsing

pub mod channel;
pub mod response;

pub use channel::Channel;
pub use response::{ChannelReadings, ResponseParser};
