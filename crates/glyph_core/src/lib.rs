//! Glyph Core
//!
//! Building blocks of a fixed-rate character-grid simulation:
//! - Space-tagged grid geometry
//! - Drift-corrected frame scheduling
//! - Phase-indexed task queues
//! - Entities, the layered layout and collision checks
//! - Clipped drawing surfaces

pub mod collision;
pub mod context;
pub mod entity;
pub mod graphics;
pub mod layout;
pub mod math;
pub mod tasks;
pub mod time;

pub use collision::CollisionResolver;
pub use context::{SimContext, Subsystem, UpdateContext};
pub use entity::{Entity, EntityBase, EntityHandle, EntityId};
pub use graphics::{char_width, str_width, Attr, DrawTarget, Surface};
pub use layout::{EntityLayout, Layer, LayoutEvent, LayoutSnapshot, SyncReport};
pub use math::{LocalPoint, LocalRect, MapPoint, MapRect, Size};
pub use tasks::{Phase, TaskId, TaskQueue};
pub use time::{
    CancelToken, Clock, FrameScheduler, ManualClock, SchedulerConfig, SchedulerError, SystemClock,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
