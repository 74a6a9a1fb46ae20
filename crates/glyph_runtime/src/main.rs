//! Glyph Runtime
//!
//! Headless demo: scrolls a banner across an in-memory grid for a few seconds.
//!
//! Usage: `glyph [settings.json] [seconds]`

use anyhow::{Context, Result};
use glyph_core::entity::{Entity, EntityBase};
use glyph_core::graphics::{str_width, Attr, Surface};
use glyph_core::impl_entity_base;
use glyph_core::math::{LocalRect, Size};
use glyph_core::{SimContext, UpdateContext};
use glyph_render::MemoryDisplay;
use glyph_runtime::{Intervals, Simulation, SimulationConfig};
use glyph_services::{keys, ButtonListener, NullInput, Settings};
use std::time::{Duration, Instant};

/// Text that drifts one column to the right per `step`, wrapping at the edge.
struct Banner {
    base: EntityBase,
    text: String,
    step: Duration,
    carry: Duration,
    grid_width: i32,
}

impl Banner {
    fn new(text: &str, row: i32, grid: Size) -> Self {
        Self {
            base: EntityBase::new(0, row, str_width(text), 1).with_collidable(false),
            text: text.to_string(),
            step: Duration::from_millis(100),
            carry: Duration::ZERO,
            grid_width: grid.width,
        }
    }
}

impl Entity for Banner {
    impl_entity_base!(base);

    fn render(&self, surface: &mut Surface<'_>) {
        let width = self.base.width;
        surface.draw_string_line(&self.text, 0, 0, width, 0, Some(Attr::FOREGROUND_GREEN));
    }

    fn update(&mut self, _ctx: &UpdateContext<'_>, elapsed: Duration) {
        self.carry += elapsed;
        while self.carry >= self.step {
            self.carry -= self.step;
            self.base.move_by(1, 0);
            if self.base.x >= self.grid_width {
                self.base.x = -self.base.width;
            }
        }
    }

    fn on_generate(&mut self, ctx: &SimContext) {
        tracing::info!(text = %self.text, grid = ?ctx.size(), "banner placed");
    }
}

/// Stops the simulation on Esc.
struct EscapeListener(SimContext);

impl ButtonListener for EscapeListener {
    fn on_pressed(&mut self, code: u8) {
        if code == keys::ESC {
            self.0.interrupt();
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("Glyph v{}", glyph_core::VERSION);

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load(&path).with_context(|| format!("loading {path}"))?,
        None => Settings::default(),
    };
    let seconds: u64 = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid run time {raw:?}"))?,
        None => 3,
    };

    let simulation = Simulation::new(
        SimulationConfig::from_settings(&settings),
        Box::new(MemoryDisplay::new()),
        Box::new(NullInput),
    )?;
    let ctx = simulation.context().clone();
    simulation
        .input()
        .add_button_listener(EscapeListener(ctx.clone()));
    ctx.put_entity(Banner::new("glyph engine", ctx.size().height / 2, ctx.size()), 0);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    simulation.run(
        Intervals::from_settings(&settings),
        |surface| {
            let size = surface.clip().size();
            surface.fill_rect(' ', LocalRect::new(0, 0, size.width, size.height), Some(Attr::DEFAULT));
        },
        move |_| Instant::now() < deadline,
    )?;

    tracing::info!(fps = ctx.fps(), entities = ctx.layout().len(), "run finished");
    simulation.close();
    Ok(())
}
