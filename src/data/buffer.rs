//! Fixed-capacity sample history.

use crate::error::{Error, Result};

/// Rolling history of the most recent readings for one channel.
///
/// Backed by a ring buffer: once `capacity` values are stored, each append
/// overwrites the oldest one. Iteration order is always oldest to newest.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSampleBuffer {
    /// Storage; grows up to `capacity`, then is overwritten in place.
    values: Vec<f64>,
    /// Index of the oldest value once the buffer is full.
    head: usize,
    capacity: usize,
}

impl RollingSampleBuffer {
    /// Create an empty buffer holding at most `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidParameter {
                name: "capacity".to_string(),
                value: capacity.to_string(),
            });
        }

        Ok(Self {
            values: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        })
    }

    /// Append a value, evicting the oldest one when full.
    pub fn append(&mut self, value: f64) {
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            self.values[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Iterate stored values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let (newer, older) = self.values.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    /// All stored values, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// The last `k` values, oldest first.
    ///
    /// `k` larger than the current length returns everything.
    pub fn windowed(&self, k: usize) -> Vec<f64> {
        let skip = self.len().saturating_sub(k);
        self.iter().skip(skip).collect()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no value has been appended.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of stored values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
