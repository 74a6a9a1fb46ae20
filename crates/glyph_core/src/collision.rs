//! Two-phase collision test
//!
//! The broad phase rejects pairs whose bounding boxes do not overlap. The
//! narrow phase asks both entities which of their cells inside the overlap are
//! solid and reports a hit when any cell is solid for both.

use crate::entity::{Entity, EntityHandle, EntityId};
use crate::layout::LayoutSnapshot;
use crate::math::{LocalPoint, MapRect};

/// Collision checker with reusable scratch buffers.
///
/// Read-only with respect to entities: it never calls a hook.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    cells: Vec<LocalPoint>,
    mask: Vec<bool>,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed entities that `probe` currently collides with, in layout
    /// order.
    ///
    /// `probe_id` is skipped without being locked, so this may be called while
    /// the probe itself is locked.
    pub fn collisions(
        &mut self,
        snapshot: &LayoutSnapshot,
        probe_id: EntityId,
        probe: &dyn Entity,
    ) -> Vec<EntityHandle> {
        if !probe.is_collidable() || probe.is_dead() {
            return Vec::new();
        }
        let bounds = probe.bounds();
        let mut hits = Vec::new();
        for handle in snapshot.handles() {
            if handle.id() == probe_id {
                continue;
            }
            let other = handle.lock();
            if self.check(probe, bounds, &*other) {
                hits.push(handle.clone());
            }
        }
        hits
    }

    /// Whether `a` and `b` collide right now.
    pub fn collides(&mut self, a: &dyn Entity, b: &dyn Entity) -> bool {
        if !a.is_collidable() || a.is_dead() {
            return false;
        }
        self.check(a, a.bounds(), b)
    }

    fn check(&mut self, a: &dyn Entity, a_bounds: MapRect, b: &dyn Entity) -> bool {
        if !b.is_collidable() || b.is_dead() {
            return false;
        }
        let b_bounds = b.bounds();
        match a_bounds.intersection(&b_bounds) {
            Some(overlap) => self.cells_overlap(a, a_bounds, b, b_bounds, overlap),
            None => false,
        }
    }

    fn cells_overlap(
        &mut self,
        a: &dyn Entity,
        a_bounds: MapRect,
        b: &dyn Entity,
        b_bounds: MapRect,
        overlap: MapRect,
    ) -> bool {
        let Self { cells, mask } = self;
        mask.clear();
        mask.resize(overlap.area(), false);

        let a_origin = a_bounds.origin();
        cells.clear();
        a.occupied_cells(overlap.to_local(a_origin), cells);
        for cell in cells.drain(..) {
            if let Some(i) = overlap.index_of(cell.to_map(a_origin)) {
                mask[i] = true;
            }
        }

        let b_origin = b_bounds.origin();
        b.occupied_cells(overlap.to_local(b_origin), cells);
        let hit = cells
            .iter()
            .filter_map(|cell| overlap.index_of(cell.to_map(b_origin)))
            .any(|i| mask[i]);
        cells.clear();
        hit
    }
}
