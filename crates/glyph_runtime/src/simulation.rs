//! The three-loop simulation driver
//!
//! `run` spawns three schedulers and blocks until the simulation ends:
//!
//! - **event**: poll the input device, diff against the previous poll and
//!   dispatch listener callbacks.
//! - **logic** (fixed rate): `BeforeUpdate` tasks, entity updates,
//!   `AfterUpdate` tasks, layout sync, continuation check, `AfterLogic` tasks.
//! - **render** (fixed rate): clear callback, `BeforeRender` tasks, paint,
//!   `AfterRender` tasks, flip, FPS accounting. The display lock is not held
//!   while tasks run.
//!
//! For every phase the one-shot tasks run before the recurring ones.

use crate::config::{Intervals, SimulationConfig};
use crate::error::SimulationError;
use glyph_core::collision::CollisionResolver;
use glyph_core::context::{SimContext, Subsystem};
use glyph_core::graphics::{DrawTarget, Surface};
use glyph_core::tasks::Phase;
use glyph_core::time::{CancelToken, FrameScheduler, SchedulerConfig};
use glyph_metrics::{metrics, FpsCounter, FrameTimer};
use glyph_render::DisplayService;
use glyph_services::{InputDevice, InputDispatcher, InputSnapshot};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Only one simulation may run per process.
static RUNNING: AtomicBool = AtomicBool::new(false);

struct RunGuard;

impl RunGuard {
    fn acquire() -> Result<Self, SimulationError> {
        RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| RunGuard)
            .map_err(|_| SimulationError::AlreadyRunning)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.store(false, Ordering::SeqCst);
    }
}

/// First fatal error raised inside a loop, plus the wake-up for `run`.
#[derive(Default)]
struct Outcome {
    error: Mutex<Option<SimulationError>>,
    stopped: CancelToken,
}

impl Outcome {
    fn fail(&self, err: SimulationError) {
        self.error.lock().get_or_insert(err);
        self.stopped.cancel();
    }

    fn take(&self) -> Option<SimulationError> {
        self.error.lock().take()
    }
}

type SharedDisplay = Arc<Mutex<Box<dyn DisplayService>>>;
type SharedInput = Arc<Mutex<Box<dyn InputDevice>>>;

/// Cloneable access to the display from tasks and other threads.
///
/// The render loop holds the display only while it clears, paints and flips,
/// so `BeforeRender`/`AfterRender` tasks may draw through a handle. The frame
/// being built is [`DisplayService::next_buffer`] until the flip.
#[derive(Clone)]
pub struct DisplayHandle {
    inner: SharedDisplay,
}

impl DisplayHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn DisplayService) -> R) -> R {
        let mut display = self.inner.lock();
        f(&mut **display)
    }
}

pub struct Simulation {
    context: SimContext,
    config: SimulationConfig,
    display: SharedDisplay,
    input: SharedInput,
    dispatcher: Arc<InputDispatcher>,
}

impl Simulation {
    /// Initialise `display` and wrap everything into a simulation handle.
    pub fn new(
        config: SimulationConfig,
        mut display: Box<dyn DisplayService>,
        input: Box<dyn InputDevice>,
    ) -> Result<Self, SimulationError> {
        display.init(&config.display)?;
        let context = SimContext::new(config.display.size());
        info!(
            width = config.display.width,
            height = config.display.height,
            "simulation created"
        );
        Ok(Self {
            context,
            config,
            display: Arc::new(Mutex::new(display)),
            input: Arc::new(Mutex::new(input)),
            dispatcher: Arc::new(InputDispatcher::new()),
        })
    }

    /// Shared state for entities, tasks and control from other threads.
    pub fn context(&self) -> &SimContext {
        &self.context
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn input(&self) -> &InputDispatcher {
        &self.dispatcher
    }

    pub fn display(&self) -> DisplayHandle {
        DisplayHandle {
            inner: Arc::clone(&self.display),
        }
    }

    /// Borrow the display, e.g. to inspect a buffer between runs.
    pub fn with_display<R>(&self, f: impl FnOnce(&mut dyn DisplayService) -> R) -> R {
        self.display().with(f)
    }

    /// Request a graceful stop after the current logic tick.
    pub fn interrupt(&self) {
        self.context.interrupt();
    }

    /// Run until `keep_running` returns `false`, [`SimContext::interrupt`] is
    /// called, or a loop fails.
    ///
    /// `clear` prepares each frame on a surface covering the whole grid. It
    /// may be called again after a previous run has finished.
    pub fn run<C, P>(
        &self,
        intervals: Intervals,
        clear: C,
        keep_running: P,
    ) -> Result<(), SimulationError>
    where
        C: FnMut(&mut Surface<'_>) + Send + 'static,
        P: FnMut(&SimContext) -> bool + Send + 'static,
    {
        intervals.validate()?;
        let _guard = RunGuard::acquire()?;
        self.context.clear_interrupt();

        let outcome = Arc::new(Outcome::default());
        let mut event = FrameScheduler::new();
        let mut logic = FrameScheduler::new();
        let mut render = FrameScheduler::new();

        // Any early return drops the started schedulers, which cancels and
        // joins them.
        event.start_non_fixed(
            SchedulerConfig::new("glyph-event", intervals.event),
            self.event_loop(Arc::clone(&outcome)),
        )?;
        logic.start(
            SchedulerConfig::new("glyph-logic", intervals.logic)
                .with_spin_threshold(self.spin_threshold(intervals.logic)),
            self.logic_loop(Arc::clone(&outcome), keep_running),
        )?;
        render.start(
            SchedulerConfig::new("glyph-render", intervals.render)
                .with_spin_threshold(self.spin_threshold(intervals.render)),
            self.render_loop(Arc::clone(&outcome), clear),
        )?;
        info!(?intervals, "simulation running");

        while logic.is_alive() && render.is_alive() {
            if !outcome.stopped.sleep(self.config.liveness_poll) {
                break;
            }
        }

        event.cancel();
        logic.cancel();
        render.cancel();
        let joined = [event.join(), logic.join(), render.join()];
        info!(fps = self.context.fps(), "simulation stopped");

        if let Some(err) = outcome.take() {
            return Err(err);
        }
        for result in joined {
            result?;
        }
        Ok(())
    }

    /// Tear down, dropping every queued task.
    pub fn close(self) {
        self.context.one_shot_tasks().clear();
        self.context.recurring_tasks().clear();
        info!(entities = self.context.layout().len(), "simulation closed");
    }

    fn spin_threshold(&self, interval: Duration) -> Duration {
        self.config.spin_threshold.min(interval / 2)
    }

    fn event_loop(
        &self,
        outcome: Arc<Outcome>,
    ) -> impl FnMut(Duration) -> ControlFlow<()> + Send + 'static {
        let ctx = self.context.clone();
        let input = Arc::clone(&self.input);
        let dispatcher = Arc::clone(&self.dispatcher);
        let mut previous = InputSnapshot::new();
        let mut current = InputSnapshot::new();

        move |_elapsed: Duration| {
            if ctx.is_paused(Subsystem::Event) {
                return ControlFlow::Continue(());
            }
            if let Err(err) = input.lock().poll(&mut current) {
                error!(%err, "input poll failed");
                ctx.interrupt();
                outcome.fail(err.into());
                return ControlFlow::Break(());
            }
            let summary = dispatcher.dispatch(&previous, &current);
            if summary.pressed > 0 || summary.released > 0 {
                trace!(?summary, "input dispatched");
            }
            previous = current;
            ControlFlow::Continue(())
        }
    }

    fn logic_loop<P>(
        &self,
        outcome: Arc<Outcome>,
        mut keep_running: P,
    ) -> impl FnMut(Duration) -> ControlFlow<()> + Send + 'static
    where
        P: FnMut(&SimContext) -> bool + Send + 'static,
    {
        let ctx = self.context.clone();
        let resolver = RefCell::new(CollisionResolver::new());

        move |elapsed: Duration| {
            if ctx.is_interrupted() {
                outcome.stopped.cancel();
                return ControlFlow::Break(());
            }
            if ctx.is_paused(Subsystem::Logic) {
                return ControlFlow::Continue(());
            }

            ctx.run_phase(Phase::BeforeUpdate);
            let snapshot = ctx.layout().snapshot();
            let updated = ctx.update_entities(&snapshot, &resolver, elapsed);
            drop(snapshot);
            ctx.run_phase(Phase::AfterUpdate);
            let report = ctx.sync_layout();
            trace!(updated, ?elapsed, "logic tick");

            if !keep_running(&ctx) || ctx.is_interrupted() {
                debug!(?report, "logic loop finished");
                outcome.stopped.cancel();
                return ControlFlow::Break(());
            }
            ctx.run_phase(Phase::AfterLogic);
            ControlFlow::Continue(())
        }
    }

    fn render_loop<C>(
        &self,
        outcome: Arc<Outcome>,
        mut clear: C,
    ) -> impl FnMut(Duration) -> ControlFlow<()> + Send + 'static
    where
        C: FnMut(&mut Surface<'_>) + Send + 'static,
    {
        let ctx = self.context.clone();
        let display = Arc::clone(&self.display);
        let mut fps = FpsCounter::new();
        let mut timer = FrameTimer::new(120);

        move |_elapsed: Duration| {
            if ctx.is_paused(Subsystem::Render) {
                return ControlFlow::Continue(());
            }
            let buffer = display.lock().next_buffer();
            metrics! { timer.begin(); }

            // The display is released around each task phase
            {
                let mut display = display.lock();
                let target: &mut dyn DrawTarget = &mut *display;
                clear(&mut Surface::full(target, buffer));
            }
            ctx.run_phase(Phase::BeforeRender);
            {
                let mut display = display.lock();
                let target: &mut dyn DrawTarget = &mut *display;
                let snapshot = ctx.layout().snapshot();
                for (_, entity) in snapshot.visible() {
                    let mut surface =
                        Surface::new(&mut *target, entity.position(), entity.size(), buffer);
                    entity.render(&mut surface);
                }
            }
            ctx.run_phase(Phase::AfterRender);
            metrics! { timer.end(); }

            let flipped = display.lock().flip(buffer);
            if let Err(err) = flipped {
                error!(%err, buffer, "flip failed");
                ctx.interrupt();
                outcome.fail(err.into());
                return ControlFlow::Break(());
            }

            if let Some(rate) = fps.record_frame(Instant::now()) {
                ctx.set_fps(rate);
                debug!(fps = rate, "render rate");
                metrics! {
                    let (min, max) = timer.frame_time_range_ms();
                    debug!(
                        paint_ms = timer.frame_time_ms(),
                        min_ms = min,
                        max_ms = max,
                        "paint time"
                    );
                }
            }
            ControlFlow::Continue(())
        }
    }
}
