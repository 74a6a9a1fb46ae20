//! Rolling window of paint-time samples

use std::collections::VecDeque;
use std::time::Duration;

/// The last `capacity` paint durations, oldest first, with a running total.
pub struct RingBuffer {
    samples: VecDeque<Duration>,
    capacity: usize,
    total: Duration,
}

impl RingBuffer {
    /// A zero capacity is raised to one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total: Duration::ZERO,
        }
    }

    /// Record one paint, evicting the oldest once the window is full.
    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.total += sample;
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Zero for an empty window.
    pub fn average(&self) -> Duration {
        match self.samples.len() {
            0 => Duration::ZERO,
            n => self.total / n as u32,
        }
    }

    pub fn min_max(&self) -> (Duration, Duration) {
        let min = self.samples.iter().min().copied().unwrap_or_default();
        let max = self.samples.iter().max().copied().unwrap_or_default();
        (min, max)
    }
}
