//! Display service contract

use glyph_core::graphics::{Attr, DrawTarget};
use glyph_core::math::{MapPoint, MapRect, Size};
use thiserror::Error;

/// Grid and buffering parameters, applied once by [`DisplayService::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Columns.
    pub width: i32,
    /// Rows.
    pub height: i32,
    /// Pixel width of one narrow cell, for backends that size a font.
    pub cell_width: u32,
    /// Number of off-screen buffers, at least 1.
    pub buffer_count: usize,
}

impl DisplayConfig {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), DisplayError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(DisplayError::InvalidConfig(format!(
                "grid must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        if self.buffer_count == 0 {
            return Err(DisplayError::InvalidConfig(
                "at least one buffer is required".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 25,
            cell_width: 8,
            buffer_count: 2,
        }
    }
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display has not been initialised")]
    NotInitialized,

    #[error("display is already initialised")]
    AlreadyInitialized,

    #[error("invalid display config: {0}")]
    InvalidConfig(String),

    #[error("buffer {index} out of range ({count} buffers)")]
    BufferOutOfRange { index: usize, count: usize },

    #[error("display backend failure: {0}")]
    Backend(String),
}

/// A multi-buffered character display.
///
/// Every drawing call names the buffer it writes to. Writes outside the grid
/// or to a buffer that does not exist are dropped.
pub trait DisplayService: DrawTarget + Send {
    /// Allocate buffers. Must be called once, before any drawing.
    fn init(&mut self, config: &DisplayConfig) -> Result<(), DisplayError>;

    fn buffer_count(&self) -> usize;

    /// Buffer currently shown.
    fn active_buffer(&self) -> usize;

    /// Buffer to draw the next frame into.
    fn next_buffer(&self) -> usize {
        (self.active_buffer() + 1) % self.buffer_count().max(1)
    }

    /// Show `buffer`. Never clears anything.
    fn flip(&mut self, buffer: usize) -> Result<(), DisplayError>;

    /// Write `ch` into `amount` consecutive cells starting at `at`, wrapping
    /// onto following rows.
    fn quick_fill_char(&mut self, ch: char, at: MapPoint, amount: usize, buffer: usize);

    /// Set the attribute of `amount` consecutive cells starting at `at`.
    fn quick_fill_attr(&mut self, attr: Attr, at: MapPoint, amount: usize, buffer: usize);

    /// Blank a whole buffer to spaces with the default attribute.
    fn clear(&mut self, buffer: usize) {
        let cells = self.grid_size().area();
        self.quick_fill_char(' ', MapPoint::ORIGIN, cells, buffer);
        self.quick_fill_attr(Attr::DEFAULT, MapPoint::ORIGIN, cells, buffer);
    }
}

impl DrawTarget for Box<dyn DisplayService> {
    fn grid_size(&self) -> Size {
        (**self).grid_size()
    }

    fn fill_rect(&mut self, ch: char, area: MapRect, buffer: usize) {
        (**self).fill_rect(ch, area, buffer)
    }

    fn modify_attr(&mut self, attr: Attr, area: MapRect, buffer: usize) {
        (**self).modify_attr(attr, area, buffer)
    }

    fn draw_string(&mut self, text: &str, at: MapPoint, buffer: usize) {
        (**self).draw_string(text, at, buffer)
    }
}
