//! Fixed-rate periodic scheduling
//!
//! A [`FrameScheduler`] owns one thread and invokes a callback at a nominal
//! interval. Sleeping alone is too coarse for game ticks, so each cycle sleeps
//! until `spin_threshold` before the deadline and busy-polls the clock for the
//! remainder. The signed error of every cycle is carried forward as a drift
//! offset, which keeps the long-run rate at `1 / interval` even though single
//! cycles overshoot.
//!
//! Time comes from a [`Clock`] so tests can drive the loop with
//! [`ManualClock`] instead of wall time.

use parking_lot::{Condvar, Mutex};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default distance from the deadline at which sleeping gives way to spinning.
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_millis(2);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler '{name}' needs a non-zero interval")]
    ZeroInterval { name: String },

    #[error("scheduler '{name}': spin threshold {threshold:?} must be below the interval {interval:?}")]
    SpinThresholdTooLarge {
        name: String,
        threshold: Duration,
        interval: Duration,
    },

    #[error("scheduler '{name}' is already running")]
    AlreadyStarted { name: String },

    #[error("failed to spawn scheduler thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scheduler thread '{name}' panicked")]
    Panicked { name: String },
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared interrupt flag with a wakeable sleep.
#[derive(Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    sleep_lock: Mutex<()>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let _guard = self.sleep_lock.lock();
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` of wall time unless cancelled first.
    ///
    /// Returns `false` if the sleep ended because of cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.sleep_lock.lock();
        while !self.is_cancelled() {
            if self.wake.wait_until(&mut guard, deadline).timed_out() {
                return !self.is_cancelled();
            }
        }
        false
    }
}

// ============================================================================
// Clocks
// ============================================================================

/// Time source for schedulers.
pub trait Clock: Send + Sync + 'static {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Block for `duration`; return `false` if `token` was cancelled meanwhile.
    fn sleep(&self, duration: Duration, token: &CancelToken) -> bool;

    /// One iteration of a busy wait.
    fn spin(&self);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration, token: &CancelToken) -> bool {
        token.sleep(duration)
    }

    fn spin(&self) {
        std::hint::spin_loop();
    }
}

/// Deterministic virtual clock.
///
/// Sleeping jumps virtual time forward by the requested amount and each spin
/// advances it by `spin_step`. Callbacks can simulate work with [`advance`].
///
/// [`advance`]: ManualClock::advance
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicU64,
    spin_step: Duration,
}

impl ManualClock {
    pub fn new(spin_step: Duration) -> Self {
        assert!(!spin_step.is_zero(), "spin step must be non-zero");
        Self {
            nanos: AtomicU64::new(0),
            spin_step,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Duration::from_micros(100))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        self.advance(duration);
        !token.is_cancelled()
    }

    fn spin(&self) {
        self.advance(self.spin_step);
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Parameters for one scheduler thread.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Thread name, also used in log output.
    pub name: String,
    /// Nominal time between callbacks.
    pub interval: Duration,
    /// How close to the deadline the coarse sleep stops.
    pub spin_threshold: Duration,
    /// Daemon schedulers are cancelled and detached on drop instead of joined.
    pub daemon: bool,
}

impl SchedulerConfig {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            daemon: false,
        }
    }

    pub fn with_spin_threshold(mut self, spin_threshold: Duration) -> Self {
        self.spin_threshold = spin_threshold;
        self
    }

    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval.is_zero() {
            return Err(SchedulerError::ZeroInterval {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn validate_fixed(&self) -> Result<(), SchedulerError> {
        self.validate()?;
        if self.spin_threshold >= self.interval {
            return Err(SchedulerError::SpinThresholdTooLarge {
                name: self.name.clone(),
                threshold: self.spin_threshold,
                interval: self.interval,
            });
        }
        Ok(())
    }
}

/// State shared between a scheduler handle and its thread.
struct Control {
    token: CancelToken,
    /// Held by the thread while a callback runs so `cancel` can wait it out.
    gate: Mutex<()>,
    thread_id: Mutex<Option<ThreadId>>,
}

impl Control {
    /// Run `f` unless cancellation has been observed.
    fn invoke(&self, f: impl FnOnce() -> ControlFlow<()>) -> ControlFlow<()> {
        let _gate = self.gate.lock();
        if self.token.is_cancelled() {
            return ControlFlow::Break(());
        }
        f()
    }
}

/// Periodic invoker running on a dedicated thread.
pub struct FrameScheduler {
    name: String,
    daemon: bool,
    clock: Arc<dyn Clock>,
    control: Arc<Control>,
    handle: Option<JoinHandle<()>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            name: String::new(),
            daemon: false,
            clock,
            control: Self::fresh_control(),
            handle: None,
        }
    }

    fn fresh_control() -> Arc<Control> {
        Arc::new(Control {
            token: CancelToken::new(),
            gate: Mutex::new(()),
            thread_id: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the drift-corrected loop.
    ///
    /// `callback` receives the real time since its previous invocation (or
    /// since start, for the first call). Returning `ControlFlow::Break` ends
    /// the loop.
    pub fn start<F>(&mut self, config: SchedulerConfig, callback: F) -> Result<(), SchedulerError>
    where
        F: FnMut(Duration) -> ControlFlow<()> + Send + 'static,
    {
        config.validate_fixed()?;
        let clock = Arc::clone(&self.clock);
        let interval = config.interval;
        let threshold = config.spin_threshold;
        self.spawn(config, move |control| {
            fixed_rate_loop(&*clock, control, interval, threshold, callback)
        })
    }

    /// Start a plain sleep-then-run loop with no drift correction.
    pub fn start_non_fixed<F>(
        &mut self,
        config: SchedulerConfig,
        callback: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut(Duration) -> ControlFlow<()> + Send + 'static,
    {
        config.validate()?;
        let clock = Arc::clone(&self.clock);
        let interval = config.interval;
        self.spawn(config, move |control| {
            sleep_loop(&*clock, control, interval, callback)
        })
    }

    fn spawn<L>(&mut self, config: SchedulerConfig, body: L) -> Result<(), SchedulerError>
    where
        L: FnOnce(&Control) + Send + 'static,
    {
        if self.is_alive() {
            return Err(SchedulerError::AlreadyStarted { name: config.name });
        }
        // A finished thread may be restarted with a fresh token.
        if let Some(old) = self.handle.take() {
            let _ = old.join();
        }
        self.control = Self::fresh_control();
        self.name = config.name.clone();
        self.daemon = config.daemon;

        let control = Arc::clone(&self.control);
        let name = config.name.clone();
        let handle = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || {
                *control.thread_id.lock() = Some(thread::current().id());
                tracing::debug!(scheduler = %name, interval = ?config.interval, "scheduler started");
                body(&control);
                tracing::debug!(scheduler = %name, "scheduler stopped");
            })
            .map_err(|source| SchedulerError::Spawn {
                name: config.name,
                source,
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Request the loop to stop.
    ///
    /// Wakes a sleeping loop immediately. When called from any thread other
    /// than the scheduler's own, waits for an in-flight callback to finish, so
    /// no callback starts after this returns.
    pub fn cancel(&self) {
        self.control.token.cancel();
        let on_own_thread = *self.control.thread_id.lock() == Some(thread::current().id());
        if !on_own_thread {
            drop(self.control.gate.lock());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.token.is_cancelled()
    }

    /// Whether the scheduler thread is still running.
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Block until the scheduler thread has exited.
    pub fn join(&mut self) -> Result<(), SchedulerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SchedulerError::Panicked {
                name: self.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        self.control.token.cancel();
        if self.daemon {
            self.handle.take();
        } else if let Err(err) = self.join() {
            tracing::error!("{err}");
        }
    }
}

fn fixed_rate_loop<F>(
    clock: &dyn Clock,
    control: &Control,
    interval: Duration,
    threshold: Duration,
    mut callback: F,
) where
    F: FnMut(Duration) -> ControlFlow<()>,
{
    let interval_ns = interval.as_nanos() as i64;
    let sleep_bound = interval_ns - threshold.as_nanos() as i64;
    let mut prev = clock.now();
    // Cumulative (actual - nominal); positive means the loop is running late.
    let mut offset: i64 = 0;

    while !control.token.is_cancelled() {
        let mut now = clock.now();
        let mut elapsed = nanos_between(prev, now);

        if elapsed + offset < sleep_bound {
            let wait = Duration::from_nanos((sleep_bound - elapsed - offset) as u64);
            if !clock.sleep(wait, &control.token) {
                break;
            }
            now = clock.now();
            elapsed = nanos_between(prev, now);
        }

        while elapsed + offset < interval_ns {
            if control.token.is_cancelled() {
                return;
            }
            clock.spin();
            now = clock.now();
            elapsed = nanos_between(prev, now);
        }

        // One late cycle is paid back by the next; a long stall is not replayed.
        offset = (offset + elapsed - interval_ns).clamp(-interval_ns, interval_ns);
        prev = now;
        tracing::trace!(elapsed_ns = elapsed, offset_ns = offset, "tick");

        let elapsed = Duration::from_nanos(elapsed as u64);
        if control.invoke(|| callback(elapsed)).is_break() {
            break;
        }
    }
}

fn sleep_loop<F>(clock: &dyn Clock, control: &Control, interval: Duration, mut callback: F)
where
    F: FnMut(Duration) -> ControlFlow<()>,
{
    let mut prev = clock.now();
    while !control.token.is_cancelled() {
        if !clock.sleep(interval, &control.token) {
            break;
        }
        let now = clock.now();
        let elapsed = now.saturating_sub(prev);
        prev = now;
        if control.invoke(|| callback(elapsed)).is_break() {
            break;
        }
    }
}

fn nanos_between(earlier: Duration, later: Duration) -> i64 {
    later.saturating_sub(earlier).as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    /// Run a fixed-rate scheduler on a virtual clock until `duration` passes.
    fn run_virtual(
        interval: Duration,
        duration: Duration,
        work: impl Fn(usize) -> Duration + Send + 'static,
    ) -> Vec<Duration> {
        let clock = Arc::new(ManualClock::new(Duration::from_micros(50)));
        let mut scheduler = FrameScheduler::with_clock(clock.clone());
        let (tx, rx) = mpsc::channel();
        let mut calls = 0usize;
        scheduler
            .start(SchedulerConfig::new("virtual", interval), move |elapsed| {
                if clock.now() > duration {
                    return ControlFlow::Break(());
                }
                tx.send(elapsed).unwrap();
                calls += 1;
                clock.advance(work(calls));
                ControlFlow::Continue(())
            })
            .unwrap();
        scheduler.join().unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn test_virtual_clock_call_count() {
        let interval = Duration::from_millis(20);
        let duration = Duration::from_millis(1000);
        let samples = run_virtual(interval, duration, |_| Duration::from_micros(300));

        let expected = (duration.as_millis() / interval.as_millis()) as usize;
        assert!(
            samples.len() + 1 >= expected && samples.len() <= expected + 1,
            "got {} callbacks",
            samples.len()
        );
    }

    #[test]
    fn test_drift_converges_to_interval() {
        // Every third callback overruns the interval by 7ms
        let interval = Duration::from_millis(10);
        let samples = run_virtual(interval, Duration::from_secs(3), |n| {
            if n % 3 == 0 {
                Duration::from_millis(17)
            } else {
                Duration::from_millis(1)
            }
        });

        let total: Duration = samples.iter().sum();
        let mean = total.as_secs_f64() / samples.len() as f64;
        assert!(
            (mean - interval.as_secs_f64()).abs() < 0.0005,
            "mean elapsed {mean}"
        );
        // Individual cycles overshoot, the average does not
        assert!(samples.iter().any(|s| *s > interval));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut scheduler = FrameScheduler::new();
        let err = scheduler
            .start(SchedulerConfig::new("bad", Duration::ZERO), |_| {
                ControlFlow::Continue(())
            })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ZeroInterval { .. }));
        assert!(!scheduler.is_alive());
    }

    #[test]
    fn test_spin_threshold_must_fit() {
        let mut scheduler = FrameScheduler::new();
        let config = SchedulerConfig::new("tight", Duration::from_millis(2))
            .with_spin_threshold(Duration::from_millis(2));
        let err = scheduler
            .start(config, |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::SpinThresholdTooLarge { .. }));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut scheduler = FrameScheduler::new();
        let config = SchedulerConfig::new("twice", Duration::from_millis(5));
        scheduler
            .start(config.clone(), |_| ControlFlow::Continue(()))
            .unwrap();
        let err = scheduler
            .start(config, |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyStarted { .. }));
        scheduler.cancel();
        scheduler.join().unwrap();
    }

    #[test]
    fn test_cancel_during_sleep() {
        // Long interval with a tiny spin window: the thread is asleep when cancelled
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = FrameScheduler::new();
        let counter = Arc::clone(&calls);
        scheduler
            .start(
                SchedulerConfig::new("sleepy", Duration::from_millis(200))
                    .with_spin_threshold(Duration::from_millis(1)),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ControlFlow::Continue(())
                },
            )
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        scheduler.cancel();
        let after_cancel = calls.load(Ordering::SeqCst);
        scheduler.join().unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(after_cancel, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_alive());
    }

    #[test]
    fn test_cancel_during_spin() {
        // Spin threshold close to the interval: most of each cycle is spent spinning
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = FrameScheduler::new();
        let counter = Arc::clone(&calls);
        let interval = Duration::from_millis(10);
        scheduler
            .start(
                SchedulerConfig::new("spinny", interval)
                    .with_spin_threshold(Duration::from_millis(9)),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ControlFlow::Continue(())
                },
            )
            .unwrap();

        thread::sleep(Duration::from_millis(55));
        scheduler.cancel();
        let after_cancel = calls.load(Ordering::SeqCst);
        let started = Instant::now();
        scheduler.join().unwrap();
        assert!(started.elapsed() <= interval);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn test_break_from_callback_stops_loop() {
        let mut scheduler = FrameScheduler::new();
        let config = SchedulerConfig::new("countdown", Duration::from_millis(2))
            .with_spin_threshold(Duration::from_millis(1));
        let mut remaining = 3;
        scheduler
            .start(config, move |_| {
                remaining -= 1;
                if remaining == 0 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        scheduler.join().unwrap();
        assert!(!scheduler.is_alive());
    }

    #[test]
    fn test_cancel_non_fixed() {
        let mut scheduler = FrameScheduler::new();
        let (tx, rx) = mpsc::channel::<()>();
        scheduler
            .start_non_fixed(
                SchedulerConfig::new("poller", Duration::from_millis(2)),
                move |_| {
                    let _ = tx.send(());
                    ControlFlow::Continue(())
                },
            )
            .unwrap();
        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        scheduler.cancel();
        scheduler.join().unwrap();
        assert!(scheduler.is_cancelled());
    }

    #[test]
    fn test_non_fixed_reports_elapsed() {
        let clock = Arc::new(ManualClock::default());
        let mut scheduler = FrameScheduler::with_clock(clock.clone());
        let (tx, rx) = mpsc::channel();
        let mut calls = 0;
        scheduler
            .start_non_fixed(
                SchedulerConfig::new("input", Duration::from_millis(5)),
                move |elapsed| {
                    tx.send(elapsed).unwrap();
                    calls += 1;
                    if calls == 4 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .unwrap();
        scheduler.join().unwrap();
        let samples: Vec<_> = rx.try_iter().collect();
        assert_eq!(samples, vec![Duration::from_millis(5); 4]);
    }

    #[test]
    fn test_fixed_rate_wall_clock() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = FrameScheduler::new();
        let counter = Arc::clone(&calls);
        scheduler
            .start(
                SchedulerConfig::new("wall", Duration::from_millis(20)),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ControlFlow::Continue(())
                },
            )
            .unwrap();
        thread::sleep(Duration::from_millis(1000));
        scheduler.cancel();
        scheduler.join().unwrap();

        let count = calls.load(Ordering::SeqCst);
        assert!((48..=52).contains(&count), "got {count} callbacks");
    }
}
