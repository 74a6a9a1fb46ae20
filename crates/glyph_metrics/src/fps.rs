//! Measured frames-per-second over fixed windows

use std::time::{Duration, Instant};

/// Counts presented frames and turns them into a rate once per window.
///
/// The rate comes from the number of frames actually recorded, divided by the
/// real length of the window, so a loop that falls behind its nominal interval
/// reports the lower rate it really achieved.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    window_start: Option<Instant>,
    frames: u32,
    fps: u32,
}

impl FpsCounter {
    /// Counter with the usual one-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        assert!(!window.is_zero(), "fps window must be non-zero");
        Self {
            window,
            window_start: None,
            frames: 0,
            fps: 0,
        }
    }

    /// Record one presented frame at `now`.
    ///
    /// The first call only opens the window. Returns the new rate whenever a
    /// window closes.
    pub fn record_frame(&mut self, now: Instant) -> Option<u32> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };

        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.window {
            return None;
        }

        self.fps = (f64::from(self.frames) / elapsed.as_secs_f64()).round() as u32;
        self.frames = 0;
        self.window_start = Some(now);
        Some(self.fps)
    }

    /// Rate measured over the last closed window (0 before the first one).
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self) {
        self.window_start = None;
        self.frames = 0;
        self.fps = 0;
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
