//! Fixed-capacity rolling history of closed intervals

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use super::IntervalStats;
use crate::error::{Error, Result};

/// Writer half of the history window.
///
/// Owned by the accumulator task, the only writer. Readers get a
/// [`WindowReader`] through [`reader`](Self::reader).
#[derive(Debug)]
pub struct HistoryWindow {
    slots: Arc<RwLock<VecDeque<IntervalStats>>>,
    capacity: usize,
    step: usize,
}

impl HistoryWindow {
    /// Create an empty window holding at most `capacity` snapshots.
    ///
    /// When full, `step` oldest snapshots are evicted to make room; a step
    /// of 1 gives plain ring semantics.
    pub fn new(capacity: usize, step: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("history capacity must be at least 1".into()));
        }
        if step == 0 || step > capacity {
            return Err(Error::Config(format!(
                "history step must be between 1 and {}, got {}",
                capacity, step
            )));
        }
        Ok(Self {
            slots: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            step,
        })
    }

    /// Maximum number of snapshots retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of snapshots evicted at once when full
    pub fn step(&self) -> usize {
        self.step
    }

    /// Append a closed interval, evicting the oldest when at capacity
    pub fn push_back(&mut self, snapshot: IntervalStats) {
        let mut slots = self.slots.write();
        if slots.len() >= self.capacity {
            let evict = self.step.min(slots.len());
            slots.drain(..evict);
        }
        slots.push_back(snapshot);
    }

    /// Read-only handle for the status side
    pub fn reader(&self) -> WindowReader {
        WindowReader {
            slots: self.slots.clone(),
            capacity: self.capacity,
        }
    }
}

/// Read-only view of the history window, cheap to clone
#[derive(Debug, Clone)]
pub struct WindowReader {
    slots: Arc<RwLock<VecDeque<IntervalStats>>>,
    capacity: usize,
}

impl WindowReader {
    /// Copy of the current contents, oldest first
    pub fn snapshot_all(&self) -> Vec<IntervalStats> {
        self.slots.read().iter().copied().collect()
    }

    /// Most recently closed interval
    pub fn latest(&self) -> Option<IntervalStats> {
        self.slots.read().back().copied()
    }

    /// Number of snapshots currently held
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no interval has closed yet
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Maximum number of snapshots retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
