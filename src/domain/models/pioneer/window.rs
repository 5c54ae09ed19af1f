//! Per-expert rolling window of recent estimates and their distances.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Estimate, Period};

/// Returned when a test asks for more history than the window holds.
///
/// This is a "no verdict yet" signal; callers convert it into a `None` score
/// and never surface it to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("Insufficient history: {available} of {required} required observations")]
    InsufficientHistory { required: usize, available: usize },
}

/// One retained observation: the estimate and its distance to the period's
/// benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub period: Period,
    pub estimate: Estimate,
    pub distance: f64,
}

/// Fixed-capacity sliding window over an expert's closed periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    capacity: usize,
    entries: VecDeque<WindowEntry>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a closed period, evicting the oldest entry when full.
    pub fn push(&mut self, period: Period, estimate: Estimate, distance: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(WindowEntry {
            period,
            estimate,
            distance,
        });
    }

    /// Distance recorded for `period`, if that period is still retained.
    pub fn distance(&self, period: Period) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.period == period)
            .map(|e| e.distance)
    }

    /// Retained entries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.distance).collect()
    }

    pub fn latest(&self) -> Option<&WindowEntry> {
        self.entries.back()
    }

    /// Ensure at least `min` entries are retained.
    pub fn require(&self, min: usize) -> Result<&Self, WindowError> {
        if self.entries.len() < min {
            return Err(WindowError::InsufficientHistory {
                required: min,
                available: self.entries.len(),
            });
        }
        Ok(self)
    }

    /// Change the capacity, keeping only the newest entries.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}
