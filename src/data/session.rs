//! Monitoring session state.
//!
//! A session begins when the connection is established and ends when the
//! monitor stops. It owns the per-channel histories.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use super::buffer::RollingSampleBuffer;
use crate::error::Result;
use crate::protocol::{Channel, ChannelReadings};

/// Run-level state of one monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorSession {
    /// Wall-clock start, for display.
    started_at: DateTime<Local>,
    /// Monotonic start, for elapsed time.
    started: Instant,
    /// Number of ticks that produced at least one reading.
    reading_count: u64,
    /// History per channel.
    buffers: BTreeMap<Channel, RollingSampleBuffer>,
}

impl MonitorSession {
    /// Start a session with one empty buffer of `capacity` per channel.
    pub fn new(channels: &[Channel], capacity: usize) -> Result<Self> {
        let mut buffers = BTreeMap::new();
        for &channel in channels {
            buffers.insert(channel, RollingSampleBuffer::new(capacity)?);
        }

        Ok(Self {
            started_at: Local::now(),
            started: Instant::now(),
            reading_count: 0,
            buffers,
        })
    }

    /// Store every reading present in one parsed line.
    ///
    /// Returns `false` (and changes nothing) if the line had no readings.
    pub fn record(&mut self, readings: &ChannelReadings) -> bool {
        let mut stored = false;
        for (channel, value) in readings.iter() {
            if let Some(buffer) = self.buffers.get_mut(&channel) {
                buffer.append(value);
                stored = true;
            }
        }

        if stored {
            self.reading_count += 1;
        }
        stored
    }

    /// History for a channel.
    pub fn buffer(&self, channel: Channel) -> Option<&RollingSampleBuffer> {
        self.buffers.get(&channel)
    }

    /// Iterate channels and their histories in channel order.
    pub fn buffers(&self) -> impl Iterator<Item = (Channel, &RollingSampleBuffer)> {
        self.buffers.iter().map(|(channel, buffer)| (*channel, buffer))
    }

    /// Number of ticks that produced readings.
    pub fn reading_count(&self) -> u64 {
        self.reading_count
    }

    /// Wall-clock time the session started.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
