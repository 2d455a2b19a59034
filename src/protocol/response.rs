//! Status response parsing.
//!
//! A temperature report looks like:
//!
//! ```text
//! ok T:205.31 /210.00 B:59.87 /60.00 @:127 B@:0
//! ```
//!
//! Each channel marker is followed by the current value, optionally by a
//! `/target` pair. Only the current value is extracted.

use std::collections::BTreeMap;
use tracing::trace;

use super::channel::Channel;

/// Values extracted from one response line, keyed by channel.
///
/// A channel is absent when its marker was missing or its value did not
/// parse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelReadings {
    values: BTreeMap<Channel, f64>,
}

impl ChannelReadings {
    /// Value for a channel, if present in the line.
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    /// Check if no channel produced a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of channels with a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate present readings in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.values.iter().map(|(channel, value)| (*channel, *value))
    }

    pub(crate) fn insert(&mut self, channel: Channel, value: f64) {
        self.values.insert(channel, value);
    }
}

/// Extracts channel readings from raw status lines.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    channels: Vec<Channel>,
}

impl ResponseParser {
    /// Create a parser that looks for the given channels.
    pub fn new(channels: impl Into<Vec<Channel>>) -> Self {
        Self {
            channels: channels.into(),
        }
    }

    /// Channels this parser extracts.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Parse one response line.
    ///
    /// Never fails: a line without markers yields an empty result, and a
    /// malformed value only drops its own channel.
    ///
    /// # Example
    ///
    /// ```
    /// use printer_temp_monitor::protocol::{Channel, ResponseParser};
    ///
    /// let readings = ResponseParser::default().parse("T:205.31 /210.00 B:59.87 /60.00");
    /// assert_eq!(readings.get(Channel::Hotend), Some(205.31));
    /// assert_eq!(readings.get(Channel::Bed), Some(59.87));
    /// ```
    pub fn parse(&self, line: &str) -> ChannelReadings {
        let mut readings = ChannelReadings::default();

        for &channel in &self.channels {
            if let Some(value) = extract_value(line, channel.marker()) {
                readings.insert(channel, value);
            }
        }

        readings
    }

    /// Check if the line carries at least one known channel marker.
    pub fn has_marker(&self, line: &str) -> bool {
        self.channels.iter().any(|c| line.contains(c.marker()))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Channel::ALL)
    }
}

/// Numeric token after the first occurrence of `marker`.
///
/// The token ends at the next space; if there is none it ends at the next
/// `/`, otherwise at end of line.
fn extract_value(line: &str, marker: &str) -> Option<f64> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];

    let end = rest
        .find(' ')
        .or_else(|| rest.find('/'))
        .unwrap_or(rest.len());
    let token = &rest[..end];

    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            trace!("Unparseable value {:?} after marker {}", token, marker);
            None
        }
    }
}
