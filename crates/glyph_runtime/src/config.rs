//! Runtime configuration

use crate::error::SimulationError;
use glyph_core::time::DEFAULT_SPIN_THRESHOLD;
use glyph_render::DisplayConfig;
use glyph_services::Settings;
use std::time::Duration;

/// Fixed parameters of a [`Simulation`](crate::Simulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub display: DisplayConfig,
    /// Coarse-sleep cutoff for the fixed-rate loops. Capped at half of each
    /// loop's interval.
    pub spin_threshold: Duration,
    /// How often `run` checks that logic and render are still alive.
    pub liveness_poll: Duration,
}

impl SimulationConfig {
    pub fn new(display: DisplayConfig) -> Self {
        Self {
            display,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            liveness_poll: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let display = DisplayConfig {
            width: settings.display.width,
            height: settings.display.height,
            cell_width: settings.display.cell_width,
            buffer_count: settings.display.buffer_count,
        };
        Self {
            display,
            spin_threshold: settings.timing.spin_threshold(),
            liveness_poll: settings.timing.liveness_poll(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(DisplayConfig::default())
    }
}

/// Tick intervals of the three loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub event: Duration,
    pub logic: Duration,
    pub render: Duration,
}

impl Intervals {
    pub fn new(event: Duration, logic: Duration, render: Duration) -> Self {
        Self {
            event,
            logic,
            render,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.timing.event_interval(),
            settings.timing.logic_interval(),
            settings.timing.render_interval(),
        )
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        for (loop_name, interval) in [
            ("event", self.event),
            ("logic", self.logic),
            ("render", self.render),
        ] {
            if interval.is_zero() {
                return Err(SimulationError::InvalidInterval { loop_name });
            }
        }
        Ok(())
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
