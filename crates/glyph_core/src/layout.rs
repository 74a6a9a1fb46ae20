//! Layered entity store with a deferred commit point
//!
//! Entities can be added from any thread, but they only become part of the
//! map when the logic thread calls [`EntityLayout::sync`]. The committed state
//! is an immutable [`LayoutSnapshot`]; readers hold on to one snapshot for a
//! whole pass, so structure never changes underneath an update or paint loop.

use crate::entity::{Entity, EntityHandle};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Paint and collision order key. Lower layers come first.
pub type Layer = i32;

#[derive(Clone)]
struct Slot {
    handle: EntityHandle,
    layer: Layer,
}

/// Committed layout at one sync point.
///
/// Ordered by ascending layer, then by the order entities were added.
#[derive(Clone, Default)]
pub struct LayoutSnapshot {
    slots: Arc<[Slot]>,
}

impl LayoutSnapshot {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every committed handle without locking anything.
    pub fn handles(&self) -> impl Iterator<Item = &EntityHandle> + '_ {
        self.slots.iter().map(|slot| &slot.handle)
    }

    /// Handles with their layer.
    pub fn layers(&self) -> impl Iterator<Item = (Layer, &EntityHandle)> + '_ {
        self.slots.iter().map(|slot| (slot.layer, &slot.handle))
    }

    /// Live entities, each locked while it is yielded.
    ///
    /// Must not be used from inside an entity hook: the caller already holds
    /// its own lock.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityHandle, MutexGuard<'_, dyn Entity>)> + '_ {
        self.handles().filter_map(|handle| {
            let entity = handle.lock();
            (!entity.is_dead()).then_some((handle, entity))
        })
    }

    /// Live entities that want to be painted.
    pub fn visible(&self) -> impl Iterator<Item = (&EntityHandle, MutexGuard<'_, dyn Entity>)> + '_ {
        self.iter().filter(|(_, entity)| entity.is_visible())
    }

    /// Live entities that take part in collisions.
    pub fn collidable(
        &self,
    ) -> impl Iterator<Item = (&EntityHandle, MutexGuard<'_, dyn Entity>)> + '_ {
        self.iter().filter(|(_, entity)| entity.is_collidable())
    }

    pub fn contains(&self, handle: &EntityHandle) -> bool {
        self.handles().any(|h| h == handle)
    }

    pub fn layer_of(&self, handle: &EntityHandle) -> Option<Layer> {
        self.layers().find(|(_, h)| *h == handle).map(|(layer, _)| layer)
    }
}

impl fmt::Debug for LayoutSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers().map(|(layer, handle)| (layer, handle.id())))
            .finish()
    }
}

/// Structural change reported by [`EntityLayout::sync`].
#[derive(Debug, Clone)]
pub enum LayoutEvent {
    Generated(EntityHandle),
    Removed(EntityHandle),
}

/// Counts of what one sync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: usize,
    pub added: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.added == 0
    }
}

/// Entity store with pending adds and a published snapshot.
pub struct EntityLayout {
    pending_tx: Sender<Slot>,
    pending_rx: Receiver<Slot>,
    committed: RwLock<LayoutSnapshot>,
    sync_lock: Mutex<()>,
}

impl EntityLayout {
    pub fn new() -> Self {
        let (pending_tx, pending_rx) = crossbeam_channel::unbounded();
        Self {
            pending_tx,
            pending_rx,
            committed: RwLock::new(LayoutSnapshot::default()),
            sync_lock: Mutex::new(()),
        }
    }

    /// Queue `entity` for `layer`. It is committed by the next sync.
    pub fn add<E: Entity>(&self, entity: E, layer: Layer) -> EntityHandle {
        let handle = EntityHandle::new(entity);
        self.add_handle(handle.clone(), layer);
        handle
    }

    pub fn add_handle(&self, handle: EntityHandle, layer: Layer) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.pending_tx.send(Slot { handle, layer });
    }

    /// Commit pending changes.
    ///
    /// Drops committed entities that died, then appends pending adds to their
    /// layers, publishing the result as the new snapshot. `notify` sees every
    /// removal before any addition. Concurrent calls serialise.
    pub fn sync(&self, mut notify: impl FnMut(LayoutEvent)) -> SyncReport {
        let _guard = self.sync_lock.lock();
        let current = self.snapshot();
        let mut report = SyncReport::default();

        let mut slots: Vec<Slot> = Vec::with_capacity(current.len() + self.pending_rx.len());
        for slot in current.slots.iter() {
            if slot.handle.is_dead() {
                report.removed += 1;
                notify(LayoutEvent::Removed(slot.handle.clone()));
            } else {
                slots.push(slot.clone());
            }
        }

        let first_new = slots.len();
        slots.extend(self.pending_rx.try_iter());
        report.added = slots.len() - first_new;
        for slot in &slots[first_new..] {
            notify(LayoutEvent::Generated(slot.handle.clone()));
        }

        if report.is_empty() {
            return report;
        }

        // Stable, so insertion order survives within a layer
        slots.sort_by_key(|slot| slot.layer);
        *self.committed.write() = LayoutSnapshot {
            slots: slots.into(),
        };
        debug!(
            removed = report.removed,
            added = report.added,
            "layout synced"
        );
        report
    }

    /// The last committed state.
    pub fn snapshot(&self) -> LayoutSnapshot {
        self.committed.read().clone()
    }

    /// Committed entity count.
    pub fn len(&self) -> usize {
        self.committed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds waiting for the next sync.
    pub fn pending_len(&self) -> usize {
        self.pending_rx.len()
    }
}

impl Default for EntityLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLayout")
            .field("committed", &self.len())
            .field("pending", &self.pending_len())
            .finish()
    }
}
