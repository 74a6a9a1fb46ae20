//! Glyph Render System
//!
//! Multi-buffered character displays. Drawing always goes to a buffer chosen
//! by index; `flip` makes a buffer the visible one.

pub mod display;
pub mod memory;

pub use display::{DisplayConfig, DisplayError, DisplayService};
pub use memory::MemoryDisplay;
