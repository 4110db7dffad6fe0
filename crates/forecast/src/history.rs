//! Bounded rolling history for autoregressive forecasting.

use std::collections::VecDeque;

/// Most recent values kept while forecasting
pub const HISTORY_CAPACITY: usize = 20;

/// Fixed-capacity FIFO of demand values, oldest first.
///
/// Pushing onto a full buffer evicts the oldest value, so `len()` never
/// exceeds the capacity.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Seed with a series, keeping only its last `capacity` values
    pub fn seeded(series: &[f64], capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        for &value in series {
            buffer.push(value);
        }
        buffer
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value `k` steps back; `lag(1)` is the most recent
    pub fn lag(&self, k: usize) -> Option<f64> {
        if k == 0 || k > self.values.len() {
            return None;
        }
        self.values.get(self.values.len() - k).copied()
    }

    /// The last `n` values (fewer if the buffer is shorter), oldest first
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).copied().collect()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}
