//! Runtime errors

use glyph_core::time::SchedulerError;
use glyph_render::DisplayError;
use glyph_services::InputError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{loop_name} interval must be non-zero")]
    InvalidInterval { loop_name: &'static str },

    #[error("a simulation is already running in this process")]
    AlreadyRunning,

    #[error("display failure")]
    Display(#[from] DisplayError),

    #[error("input failure")]
    Input(#[from] InputError),

    #[error("scheduler failure")]
    Scheduler(#[from] SchedulerError),
}
