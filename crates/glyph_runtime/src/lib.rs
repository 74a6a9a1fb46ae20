//! Glyph Runtime
//!
//! Wires the core, render and services crates into a running simulation:
//! three scheduler threads (event, logic, render) around one shared
//! [`SimContext`](glyph_core::SimContext).

pub mod config;
pub mod error;
pub mod simulation;

pub use config::{Intervals, SimulationConfig};
pub use error::SimulationError;
pub use simulation::{DisplayHandle, Simulation};
