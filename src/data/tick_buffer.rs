/// Bounded per-token tick buffer
use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::Tick;

/// Sliding window of the most recent ticks for one token, oldest evicted first
#[derive(Debug, Clone)]
pub struct TickBuffer {
    ticks: VecDeque<Tick>,
    capacity: usize,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TickBuffer {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a tick to the buffer
    pub fn push(&mut self, tick: Tick) {
        if self.ticks.len() >= self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
    }

    /// Get the last tick
    pub fn get_last(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    /// Get recent N ticks, oldest first
    pub fn get_recent(&self, n: usize) -> Vec<Tick> {
        let skip = self.ticks.len().saturating_sub(n);
        self.ticks.iter().skip(skip).cloned().collect()
    }

    /// Get all ticks
    pub fn get_all(&self) -> Vec<Tick> {
        self.ticks.iter().cloned().collect()
    }

    /// Ticks with `since <= timestamp < until`, in arrival order
    pub fn window(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> TickWindow<'_> {
        TickWindow {
            ticks: &self.ticks,
            since,
            until,
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Read-only view over a half-open time range of a [`TickBuffer`].
///
/// Every call to [`TickWindow::iter`] starts from the beginning again.
#[derive(Debug, Clone, Copy)]
pub struct TickWindow<'a> {
    ticks: &'a VecDeque<Tick>,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl<'a> TickWindow<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Tick> + Clone + 'a {
        let (since, until) = (self.since, self.until);
        self.ticks
            .iter()
            .filter(move |tick| tick.timestamp >= since && tick.timestamp < until)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_vec(&self) -> Vec<Tick> {
        self.iter().cloned().collect()
    }
}
