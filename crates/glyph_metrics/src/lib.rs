//! Glyph Metrics - frame-rate and frame-time tracking
//!
//! [`FpsCounter`] is always available: the render loop reports its measured
//! frame rate through it. Frame-time sampling ([`FrameTimer`], [`RingBuffer`])
//! is only collected when the `metrics` feature is enabled and compiles down
//! to no-op stubs otherwise.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable frame-time collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use glyph_metrics::{FpsCounter, FrameTimer};
//!
//! let mut fps = FpsCounter::new();
//! let mut timer = FrameTimer::new(60); // Track last 60 frames
//! timer.begin();
//! // ... paint ...
//! timer.end();
//! if let Some(rate) = fps.record_frame(std::time::Instant::now()) {
//!     println!("FPS: {rate} ({:.2} ms/frame)", timer.frame_time_ms());
//! }
//! ```

mod fps;
#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;

pub use fps::FpsCounter;
#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct FrameTimer;

#[cfg(not(feature = "metrics"))]
impl FrameTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn fps(&self) -> f64 { 0.0 }
    pub fn frame_time_ms(&self) -> f64 { 0.0 }
    pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
pub struct RingBuffer;

#[cfg(not(feature = "metrics"))]
impl RingBuffer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn push(&mut self, _sample: std::time::Duration) {}
    pub fn average(&self) -> std::time::Duration { std::time::Duration::ZERO }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_compiles_without_metrics() {
        // Stubs and the always-on counter must build in either configuration
        let mut timer = super::FrameTimer::new(60);
        timer.begin();
        timer.end();
        let mut window = super::RingBuffer::new(10);
        window.push(std::time::Duration::from_millis(1));
        let counter = super::FpsCounter::new();
        assert_eq!(counter.fps(), 0);
    }
}
