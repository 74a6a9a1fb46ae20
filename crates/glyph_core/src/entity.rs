//! Game entities
//!
//! An entity is anything that lives on the map. The [`Entity`] trait is the
//! whole contract; [`EntityBase`] is an optional bundle of the usual fields
//! that an implementation can embed and expose with [`impl_entity_base!`].
//!
//! Entities are shared between the logic thread (which updates them) and the
//! render thread (which paints them) through an [`EntityHandle`].

use crate::context::{SimContext, UpdateContext};
use crate::graphics::Surface;
use crate::math::{LocalPoint, LocalRect, MapPoint, MapRect, Size};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Behaviour and state every map entity exposes.
///
/// All hooks run on the logic thread. `render` runs on the render thread.
/// The entity is locked for the duration of every call, so an implementation
/// must not reach for its own [`EntityHandle`] from inside one.
pub trait Entity: Send + 'static {
    /// Top-left cell in map space.
    fn position(&self) -> MapPoint;

    fn size(&self) -> Size;

    fn is_visible(&self) -> bool {
        true
    }

    fn is_collidable(&self) -> bool;

    /// Dead entities are skipped from now on and dropped by the next sync.
    fn is_dead(&self) -> bool;

    fn bounds(&self) -> MapRect {
        MapRect::from_parts(self.position(), self.size())
    }

    /// Paint into a surface clipped to this entity's bounds.
    fn render(&self, surface: &mut Surface<'_>);

    /// Push the solid cells of this entity that fall inside `area`.
    ///
    /// Both `area` and the reported cells are relative to the entity origin.
    /// The default hit-shape is the full bounding rectangle.
    fn occupied_cells(&self, area: LocalRect, out: &mut Vec<LocalPoint>) {
        let own = LocalRect::from_parts(LocalPoint::ORIGIN, self.size());
        if let Some(area) = own.intersection(&area) {
            out.extend(area.cells());
        }
    }

    /// Advance one logic tick. `elapsed` is the real time since the last tick.
    fn update(&mut self, ctx: &UpdateContext<'_>, elapsed: Duration);

    /// Called once, by the sync that committed this entity.
    fn on_generate(&mut self, _ctx: &SimContext) {}

    /// Called once, by the sync that removed this entity.
    fn on_remove(&mut self, _ctx: &SimContext) {}

    fn on_collision(&mut self, _ctx: &SimContext, _other: &dyn Entity) {}

    /// Another entity asks this one to die. Ignored unless overridden.
    fn be_killed(&mut self, _ctx: &SimContext, _killer: &dyn Entity) {}
}

/// Process-unique entity identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Shared, lockable reference to an entity.
///
/// Cloning is cheap and keeps the same identity.
#[derive(Clone)]
pub struct EntityHandle {
    id: EntityId,
    inner: Arc<Mutex<dyn Entity>>,
}

impl EntityHandle {
    pub fn new<E: Entity>(entity: E) -> Self {
        let inner: Arc<Mutex<dyn Entity>> = Arc::new(Mutex::new(entity));
        Self {
            id: EntityId::next(),
            inner,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Lock the entity. Blocks while another thread is using it.
    pub fn lock(&self) -> MutexGuard<'_, dyn Entity> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, dyn Entity>> {
        self.inner.try_lock()
    }

    /// Convenience for a one-off liveness check.
    pub fn is_dead(&self) -> bool {
        self.lock().is_dead()
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityHandle {}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.id).finish()
    }
}

/// Common entity fields with sensible defaults.
///
/// Embed it and forward the capability accessors with [`impl_entity_base!`]:
///
/// ```ignore
/// struct Bullet { base: EntityBase }
///
/// impl Entity for Bullet {
///     impl_entity_base!(base);
///     // render, update ...
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBase {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub visible: bool,
    pub collidable: bool,
    pub dead: bool,
}

impl EntityBase {
    /// Visible, collidable and alive.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            visible: true,
            collidable: true,
            dead: false,
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_collidable(mut self, collidable: bool) -> Self {
        self.collidable = collidable;
        self
    }

    pub fn position(&self) -> MapPoint {
        MapPoint::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds(&self) -> MapRect {
        MapRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn move_to(&mut self, position: MapPoint) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn kill(&mut self) {
        self.dead = true;
    }
}

/// Implement the capability accessors of [`Entity`] by delegating to an
/// [`EntityBase`] field.
///
/// `impl_entity_base!(base)` also provides a `be_killed` that marks the
/// entity dead. Use `impl_entity_base!(@accessors base)` to write your own.
#[macro_export]
macro_rules! impl_entity_base {
    (@accessors $field:ident) => {
        fn position(&self) -> $crate::math::MapPoint {
            self.$field.position()
        }

        fn size(&self) -> $crate::math::Size {
            self.$field.size()
        }

        fn is_visible(&self) -> bool {
            self.$field.visible
        }

        fn is_collidable(&self) -> bool {
            self.$field.collidable
        }

        fn is_dead(&self) -> bool {
            self.$field.dead
        }
    };
    ($field:ident) => {
        $crate::impl_entity_base!(@accessors $field);

        fn be_killed(
            &mut self,
            _ctx: &$crate::context::SimContext,
            _killer: &dyn $crate::entity::Entity,
        ) {
            self.$field.kill();
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dot {
        base: EntityBase,
    }

    impl Entity for Dot {
        impl_entity_base!(base);

        fn render(&self, surface: &mut Surface<'_>) {
            surface.fill_rect('.', LocalRect::new(0, 0, 1, 1), None);
        }

        fn update(&mut self, _ctx: &UpdateContext<'_>, _elapsed: Duration) {}
    }

    /// Survives one hit.
    struct Shielded {
        base: EntityBase,
        hits: u32,
    }

    impl Entity for Shielded {
        impl_entity_base!(@accessors base);

        fn render(&self, _surface: &mut Surface<'_>) {}

        fn update(&mut self, _ctx: &UpdateContext<'_>, _elapsed: Duration) {}

        fn be_killed(&mut self, _ctx: &SimContext, _killer: &dyn Entity) {
            self.hits += 1;
            if self.hits > 1 {
                self.base.kill();
            }
        }
    }

    #[test]
    fn test_base_delegation() {
        let dot = Dot {
            base: EntityBase::new(3, 4, 2, 1).with_visible(false),
        };
        assert_eq!(dot.position(), MapPoint::new(3, 4));
        assert_eq!(dot.bounds(), MapRect::new(3, 4, 2, 1));
        assert!(!dot.is_visible());
        assert!(dot.is_collidable());
        assert!(!dot.is_dead());
    }

    #[test]
    fn test_default_hit_shape_is_clipped_rectangle() {
        let dot = Dot {
            base: EntityBase::new(0, 0, 2, 2),
        };
        let mut cells = Vec::new();
        dot.occupied_cells(LocalRect::new(1, -1, 5, 2), &mut cells);
        assert_eq!(cells, vec![LocalPoint::new(1, 0)]);
    }

    #[test]
    fn test_handle_identity() {
        let a = EntityHandle::new(Dot {
            base: EntityBase::new(0, 0, 1, 1),
        });
        let b = EntityHandle::new(Dot {
            base: EntityBase::new(0, 0, 1, 1),
        });
        assert_eq!(a.clone(), a);
        assert_ne!(a, b);
        assert!(a.id() < b.id());
        assert!(!a.is_dead());
    }

    #[test]
    fn test_be_killed_through_handle() {
        let victim = EntityHandle::new(Dot {
            base: EntityBase::new(0, 0, 1, 1),
        });
        let killer = Dot {
            base: EntityBase::new(0, 0, 1, 1),
        };
        let ctx = SimContext::new(Size::new(10, 10));
        victim.lock().be_killed(&ctx, &killer);
        assert!(victim.is_dead());
    }

    #[test]
    fn test_custom_be_killed() {
        let ctx = SimContext::new(Size::new(10, 10));
        let killer = Dot {
            base: EntityBase::new(0, 0, 1, 1),
        };
        let mut shielded = Shielded {
            base: EntityBase::new(0, 0, 1, 1),
            hits: 0,
        };
        shielded.be_killed(&ctx, &killer);
        assert!(!shielded.is_dead());
        shielded.be_killed(&ctx, &killer);
        assert!(shielded.is_dead());
    }
}
