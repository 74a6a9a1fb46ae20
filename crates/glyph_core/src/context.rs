//! Shared simulation state handed to entities and tasks

use crate::collision::CollisionResolver;
use crate::entity::{Entity, EntityHandle, EntityId};
use crate::layout::{EntityLayout, Layer, LayoutEvent, LayoutSnapshot, SyncReport};
use crate::math::Size;
use crate::tasks::{Phase, TaskId, TaskQueue};
use parking_lot::MutexGuard;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A loop that can be paused independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Event,
    Logic,
    Render,
}

impl Subsystem {
    pub const ALL: [Subsystem; 3] = [Subsystem::Event, Subsystem::Logic, Subsystem::Render];

    const fn bit(self) -> u8 {
        match self {
            Subsystem::Event => 0b001,
            Subsystem::Logic => 0b010,
            Subsystem::Render => 0b100,
        }
    }
}

struct Shared {
    size: Size,
    layout: EntityLayout,
    once: TaskQueue,
    recurring: TaskQueue,
    paused: AtomicU8,
    interrupted: AtomicBool,
    fps: AtomicU32,
}

/// Cheaply cloneable handle to the running simulation.
///
/// Everything here is safe to call from any thread.
#[derive(Clone)]
pub struct SimContext {
    inner: Arc<Shared>,
}

impl SimContext {
    pub fn new(size: Size) -> Self {
        Self {
            inner: Arc::new(Shared {
                size,
                layout: EntityLayout::new(),
                once: TaskQueue::new(),
                recurring: TaskQueue::new(),
                paused: AtomicU8::new(0),
                interrupted: AtomicBool::new(false),
                fps: AtomicU32::new(0),
            }),
        }
    }

    /// Grid size in cells.
    pub fn size(&self) -> Size {
        self.inner.size
    }

    pub fn layout(&self) -> &EntityLayout {
        &self.inner.layout
    }

    /// Add an entity; it joins the map at the end of the current logic tick.
    pub fn put_entity<E: Entity>(&self, entity: E, layer: Layer) -> EntityHandle {
        self.inner.layout.add(entity, layer)
    }

    /// Run `task` once, the next time `phase` comes around.
    pub fn run_once<F>(&self, phase: Phase, task: F) -> TaskId
    where
        F: FnMut() + Send + 'static,
    {
        self.inner.once.add(phase, task)
    }

    /// Run `task` every time `phase` comes around until removed.
    pub fn add_recurring<F>(&self, phase: Phase, task: F) -> TaskId
    where
        F: FnMut() + Send + 'static,
    {
        self.inner.recurring.add(phase, task)
    }

    pub fn remove_recurring(&self, phase: Phase, id: TaskId) -> bool {
        self.inner.recurring.remove_task(phase, id)
    }

    pub fn one_shot_tasks(&self) -> &TaskQueue {
        &self.inner.once
    }

    pub fn recurring_tasks(&self) -> &TaskQueue {
        &self.inner.recurring
    }

    /// Drain the one-shot bucket for `phase`, then run the recurring one.
    pub fn run_phase(&self, phase: Phase) {
        self.inner.once.run_task_list(phase);
        self.inner.recurring.run_task_list_no_remove(phase);
    }

    /// Ask the simulation to stop after the current logic tick.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Re-arm after a finished run.
    pub fn clear_interrupt(&self) {
        self.inner.interrupted.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self, subsystem: Subsystem) {
        self.inner.paused.fetch_or(subsystem.bit(), Ordering::SeqCst);
    }

    pub fn resume(&self, subsystem: Subsystem) {
        self.inner.paused.fetch_and(!subsystem.bit(), Ordering::SeqCst);
    }

    pub fn is_paused(&self, subsystem: Subsystem) -> bool {
        self.inner.paused.load(Ordering::SeqCst) & subsystem.bit() != 0
    }

    /// Frames presented per second over the last full window.
    pub fn fps(&self) -> u32 {
        self.inner.fps.load(Ordering::Relaxed)
    }

    pub fn set_fps(&self, fps: u32) {
        self.inner.fps.store(fps, Ordering::Relaxed);
    }

    /// Call `update` on every live committed entity, in layout order.
    ///
    /// Returns how many entities were updated.
    pub fn update_entities(
        &self,
        snapshot: &LayoutSnapshot,
        resolver: &RefCell<CollisionResolver>,
        elapsed: Duration,
    ) -> usize {
        let mut updated = 0;
        for handle in snapshot.handles() {
            let mut entity = handle.lock();
            if entity.is_dead() {
                continue;
            }
            let ctx = UpdateContext::new(self, snapshot, handle.id(), resolver);
            entity.update(&ctx, elapsed);
            updated += 1;
        }
        updated
    }

    /// Commit the layout, then call `on_remove` for every entity it dropped
    /// and `on_generate` for every entity it committed.
    ///
    /// Hooks run on the calling thread once the new snapshot is published, so
    /// a continuation check right after the sync already sees their effects.
    pub fn sync_layout(&self) -> SyncReport {
        let mut events = Vec::new();
        let report = self.inner.layout.sync(|event| events.push(event));
        for event in events {
            match event {
                LayoutEvent::Generated(handle) => handle.lock().on_generate(self),
                LayoutEvent::Removed(handle) => handle.lock().on_remove(self),
            }
        }
        report
    }
}

impl fmt::Debug for SimContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimContext")
            .field("size", &self.inner.size)
            .field("layout", &self.inner.layout)
            .field("interrupted", &self.is_interrupted())
            .field("paused", &self.inner.paused.load(Ordering::Relaxed))
            .finish()
    }
}

/// What an entity sees during its own `update`.
///
/// Dereferences to the [`SimContext`]. Lookups here skip the updating entity
/// without locking it.
pub struct UpdateContext<'a> {
    sim: &'a SimContext,
    snapshot: &'a LayoutSnapshot,
    me: EntityId,
    resolver: &'a RefCell<CollisionResolver>,
}

impl<'a> UpdateContext<'a> {
    pub fn new(
        sim: &'a SimContext,
        snapshot: &'a LayoutSnapshot,
        me: EntityId,
        resolver: &'a RefCell<CollisionResolver>,
    ) -> Self {
        Self {
            sim,
            snapshot,
            me,
            resolver,
        }
    }

    /// Id of the entity being updated.
    pub fn id(&self) -> EntityId {
        self.me
    }

    pub fn snapshot(&self) -> &LayoutSnapshot {
        self.snapshot
    }

    /// Every other live entity, each locked while yielded.
    pub fn others(&self) -> impl Iterator<Item = (&EntityHandle, MutexGuard<'_, dyn Entity>)> + '_ {
        self.snapshot
            .handles()
            .filter(move |handle| handle.id() != self.me)
            .filter_map(|handle| {
                let entity = handle.lock();
                (!entity.is_dead()).then_some((handle, entity))
            })
    }

    /// Entities `me` collides with, in layout order.
    pub fn colliding(&self, me: &dyn Entity) -> Vec<EntityHandle> {
        self.resolver
            .borrow_mut()
            .collisions(self.snapshot, self.me, me)
    }

    /// Run collision callbacks for every current hit.
    ///
    /// For each hit `other`: `other.on_collision(me)`, then
    /// `me.on_collision(other)`. A pair is skipped when either side is already
    /// dead, and dispatch stops as soon as `me` dies. Returns the number of
    /// pairs dispatched.
    pub fn dispatch_collisions(&self, me: &mut dyn Entity) -> usize {
        let hits = self.colliding(me);
        let mut dispatched = 0;
        for hit in hits {
            if me.is_dead() {
                break;
            }
            let mut other = hit.lock();
            if other.is_dead() {
                continue;
            }
            other.on_collision(self.sim, me);
            me.on_collision(self.sim, &*other);
            dispatched += 1;
        }
        dispatched
    }
}

impl Deref for UpdateContext<'_> {
    type Target = SimContext;

    fn deref(&self) -> &SimContext {
        self.sim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;
    use crate::graphics::Surface;
    use crate::impl_entity_base;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Moves right one cell per tick and logs every hook.
    struct Probe {
        name: &'static str,
        base: EntityBase,
        speed: i32,
        log: Log,
        lethal: bool,
    }

    impl Probe {
        fn new(name: &'static str, x: i32, log: &Log) -> Self {
            Self {
                name,
                base: EntityBase::new(x, 0, 1, 1),
                speed: 0,
                log: Arc::clone(log),
                lethal: false,
            }
        }

        fn record(&self, what: String) {
            self.log.lock().push(what);
        }
    }

    impl Entity for Probe {
        impl_entity_base!(base);

        fn render(&self, _surface: &mut Surface<'_>) {}

        fn update(&mut self, ctx: &UpdateContext<'_>, _elapsed: Duration) {
            self.base.move_by(self.speed, 0);
            self.record(format!("{} update", self.name));
            ctx.dispatch_collisions(self);
        }

        fn on_generate(&mut self, _ctx: &SimContext) {
            self.record(format!("{} generate", self.name));
        }

        fn on_remove(&mut self, _ctx: &SimContext) {
            self.record(format!("{} remove", self.name));
        }

        fn on_collision(&mut self, ctx: &SimContext, other: &dyn Entity) {
            self.record(format!("{} hit at {}", self.name, other.position().x));
            if self.lethal {
                self.be_killed(ctx, other);
            }
        }
    }

    fn tick(ctx: &SimContext, resolver: &RefCell<CollisionResolver>) {
        ctx.run_phase(Phase::BeforeUpdate);
        let snapshot = ctx.layout().snapshot();
        ctx.update_entities(&snapshot, resolver, Duration::from_millis(20));
        ctx.run_phase(Phase::AfterUpdate);
        ctx.sync_layout();
        ctx.run_phase(Phase::AfterLogic);
    }

    #[test]
    fn test_hooks_run_when_sync_publishes() {
        let ctx = SimContext::new(Size::new(10, 1));
        let log: Log = Arc::default();
        let resolver = RefCell::new(CollisionResolver::new());
        let handle = ctx.put_entity(Probe::new("a", 0, &log), 0);
        assert!(log.lock().is_empty());

        ctx.sync_layout();
        assert_eq!(*log.lock(), vec!["a generate"]);
        assert!(ctx.one_shot_tasks().is_empty(Phase::AfterLogic));

        handle.lock().be_killed(&ctx, &Probe::new("x", 5, &log));
        ctx.sync_layout();
        // Reported by the sync itself, with no later phase needed
        assert_eq!(*log.lock(), vec!["a generate", "a remove"]);
        tick(&ctx, &resolver);
        assert_eq!(*log.lock(), vec!["a generate", "a remove"]);
        assert!(ctx.layout().is_empty());
    }

    #[test]
    fn test_hooks_may_spawn_entities() {
        struct Spawner {
            base: EntityBase,
            log: Log,
        }

        impl Entity for Spawner {
            impl_entity_base!(base);

            fn render(&self, _surface: &mut Surface<'_>) {}

            fn update(&mut self, _ctx: &UpdateContext<'_>, _elapsed: Duration) {}

            fn on_generate(&mut self, ctx: &SimContext) {
                ctx.put_entity(Probe::new("child", 1, &self.log), 0);
            }
        }

        let ctx = SimContext::new(Size::new(4, 1));
        let log: Log = Arc::default();
        ctx.put_entity(
            Spawner {
                base: EntityBase::new(0, 0, 1, 1),
                log: Arc::clone(&log),
            },
            0,
        );

        ctx.sync_layout();
        assert_eq!(ctx.layout().len(), 1);
        assert_eq!(ctx.layout().pending_len(), 1);
        ctx.sync_layout();
        assert_eq!(ctx.layout().len(), 2);
        assert_eq!(*log.lock(), vec!["child generate"]);
    }

    #[test]
    fn test_collision_dispatch_order() {
        let ctx = SimContext::new(Size::new(10, 1));
        let log: Log = Arc::default();
        let resolver = RefCell::new(CollisionResolver::new());

        let mut mover = Probe::new("m", 0, &log);
        mover.speed = 1;
        ctx.put_entity(mover, 0);
        ctx.put_entity(Probe::new("far", 2, &log), 2);
        ctx.put_entity(Probe::new("near", 1, &log), 1);
        ctx.sync_layout();
        log.lock().clear();

        tick(&ctx, &resolver);
        let entries = log.lock().clone();
        // m moves onto x=1 and only hits "near"; "near" then hits m, which
        // receives first
        assert_eq!(
            entries,
            vec![
                "m update",
                "near hit at 1",
                "m hit at 1",
                "near update",
                "m hit at 1",
                "near hit at 1",
                "far update",
            ]
        );
    }

    #[test]
    fn test_dead_entities_stop_receiving_collisions() {
        let ctx = SimContext::new(Size::new(10, 1));
        let log: Log = Arc::default();
        let resolver = RefCell::new(CollisionResolver::new());

        let mut mover = Probe::new("m", 0, &log);
        mover.lethal = true;
        mover.base.width = 3;
        ctx.put_entity(mover, 0);
        ctx.put_entity(Probe::new("b", 1, &log), 1);
        ctx.put_entity(Probe::new("c", 2, &log), 2);
        ctx.sync_layout();
        log.lock().clear();

        tick(&ctx, &resolver);
        let entries = log.lock().clone();
        // m dies on its first hit, so "c" never sees it
        assert_eq!(
            entries,
            vec![
                "m update",
                "b hit at 0",
                "m hit at 1",
                "b update",
                "c update",
                "m remove",
            ]
        );
    }

    #[test]
    fn test_pause_bits_are_independent() {
        let ctx = SimContext::new(Size::new(1, 1));
        ctx.pause(Subsystem::Logic);
        ctx.pause(Subsystem::Render);
        ctx.resume(Subsystem::Render);
        assert!(ctx.is_paused(Subsystem::Logic));
        assert!(!ctx.is_paused(Subsystem::Render));
        assert!(!ctx.is_paused(Subsystem::Event));
    }

    #[test]
    fn test_interrupt_and_clear() {
        let ctx = SimContext::new(Size::new(1, 1));
        let other = ctx.clone();
        other.interrupt();
        assert!(ctx.is_interrupted());
        ctx.clear_interrupt();
        assert!(!other.is_interrupted());
    }

    #[test]
    fn test_recurring_runs_after_one_shot() {
        let ctx = SimContext::new(Size::new(1, 1));
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        let id = ctx.add_recurring(Phase::BeforeRender, move || sink.lock().push("every".into()));
        let sink = Arc::clone(&log);
        ctx.run_once(Phase::BeforeRender, move || sink.lock().push("once".into()));

        ctx.run_phase(Phase::BeforeRender);
        ctx.run_phase(Phase::BeforeRender);
        assert!(ctx.remove_recurring(Phase::BeforeRender, id));
        ctx.run_phase(Phase::BeforeRender);
        assert_eq!(*log.lock(), vec!["once", "every", "every"]);
    }

    #[test]
    fn test_others_skips_self() {
        let ctx = SimContext::new(Size::new(4, 1));
        let log: Log = Arc::default();
        let me = ctx.put_entity(Probe::new("me", 0, &log), 0);
        let you = ctx.put_entity(Probe::new("you", 3, &log), 0);
        ctx.sync_layout();

        let snapshot = ctx.layout().snapshot();
        let resolver = RefCell::new(CollisionResolver::new());
        let _locked = me.lock();
        let update = UpdateContext::new(&ctx, &snapshot, me.id(), &resolver);
        let others: Vec<_> = update.others().map(|(h, _)| h.clone()).collect();
        assert_eq!(others, vec![you]);
        assert_eq!(update.size(), Size::new(4, 1));
    }
}
