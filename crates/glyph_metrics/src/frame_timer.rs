//! Paint-time sampling for the render loop

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

/// Measures how long each paint pass takes, independent of the frame rate.
///
/// `fps()` here is the theoretical ceiling implied by paint cost alone; the
/// rate the loop actually reached comes from [`crate::FpsCounter`].
pub struct FrameTimer {
    paint_start: Option<Instant>,
    paint_times: RingBuffer,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            paint_start: None,
            paint_times: RingBuffer::new(capacity),
        }
    }

    pub fn begin(&mut self) {
        self.paint_start = Some(Instant::now());
    }

    /// Close the pass opened by `begin`; unmatched calls are ignored.
    pub fn end(&mut self) {
        if let Some(start) = self.paint_start.take() {
            self.paint_times.push(start.elapsed());
        }
    }

    pub fn record(&mut self, paint_time: Duration) {
        self.paint_times.push(paint_time);
    }

    pub fn fps(&self) -> f64 {
        let avg = self.paint_times.average();
        if avg.as_secs_f64() > 0.0 {
            1.0 / avg.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.paint_times.average().as_secs_f64() * 1000.0
    }

    pub fn frame_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.paint_times.min_max();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_paint_times() {
        let mut timer = FrameTimer::new(4);
        timer.record(Duration::from_millis(2));
        timer.record(Duration::from_millis(4));
        assert!((timer.frame_time_ms() - 3.0).abs() < 1e-9);
        assert_eq!(timer.frame_time_range_ms(), (2.0, 4.0));
    }

    #[test]
    fn test_end_without_begin_is_ignored() {
        let mut timer = FrameTimer::new(4);
        timer.end();
        assert_eq!(timer.frame_time_ms(), 0.0);
        assert_eq!(timer.fps(), 0.0);
    }
}
