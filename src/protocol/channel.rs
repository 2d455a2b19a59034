//! Measurement channels reported by the firmware.

/// A measured quantity reported in the status line.
///
/// Each channel is identified in the response by a short marker token
/// (`T:` for the active hotend, `B:` for the bed). The rest of the crate
/// iterates [`Channel::ALL`] and never assumes a fixed channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Active hotend heater.
    Hotend,
    /// Heated bed.
    Bed,
}

impl Channel {
    /// Every channel, in report order.
    pub const ALL: [Channel; 2] = [Channel::Hotend, Channel::Bed];

    /// Marker token that precedes this channel's value in a status line.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Hotend => "T:",
            Self::Bed => "B:",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hotend => "Hotend",
            Self::Bed => "Bed",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
