//! Glyph Services Layer
//!
//! Platform-facing pieces around the simulation: input devices, listener
//! dispatch and settings.

pub mod dispatch;
pub mod input;
pub mod settings;

pub use dispatch::{ButtonListener, DispatchSummary, InputDispatcher, ListenerId, MouseMoveListener};
pub use input::{
    keys, InputDevice, InputError, InputScript, InputSnapshot, NullInput, ScriptedInput,
};
pub use settings::{Settings, SettingsError};
