//! In-memory display
//!
//! Keeps every buffer as a plain cell grid. Used headless, for tests, and as
//! the reference for what a terminal backend should show.

use crate::display::{DisplayConfig, DisplayError, DisplayService};
use glyph_core::graphics::{char_width, Attr, DrawTarget};
use glyph_core::math::{MapPoint, MapRect, Size};
use tracing::info;

/// Marks the right half of a double-width character.
const CONTINUATION: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    attr: Attr,
}

const BLANK: Cell = Cell {
    ch: ' ',
    attr: Attr::DEFAULT,
};

#[derive(Debug, Default)]
pub struct MemoryDisplay {
    config: Option<DisplayConfig>,
    size: Size,
    buffers: Vec<Vec<Cell>>,
    active: usize,
    flips: u64,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&DisplayConfig> {
        self.config.as_ref()
    }

    /// Number of successful flips so far.
    pub fn flips(&self) -> u64 {
        self.flips
    }

    /// Character and attribute at `point`. The right half of a wide
    /// character reads as `'\0'`.
    pub fn cell(&self, buffer: usize, point: MapPoint) -> Option<(char, Attr)> {
        let index = self.index(point)?;
        let cell = self.buffers.get(buffer)?[index];
        Some((cell.ch, cell.attr))
    }

    /// One row of `buffer` as text.
    pub fn row_text(&self, buffer: usize, y: i32) -> String {
        let Some(cells) = self.buffers.get(buffer) else {
            return String::new();
        };
        if y < 0 || y >= self.size.height {
            return String::new();
        }
        let width = self.size.width as usize;
        let start = y as usize * width;
        cells[start..start + width]
            .iter()
            .map(|cell| cell.ch)
            .filter(|&ch| ch != CONTINUATION)
            .collect()
    }

    /// Whole buffer as text, one line per row.
    pub fn render_text(&self, buffer: usize) -> String {
        (0..self.size.height)
            .map(|y| self.row_text(buffer, y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn index(&self, point: MapPoint) -> Option<usize> {
        MapRect::from_parts(MapPoint::ORIGIN, self.size).index_of(point)
    }

    fn clip(&self, area: MapRect) -> Option<MapRect> {
        area.intersection(&MapRect::from_parts(MapPoint::ORIGIN, self.size))
    }

    fn put(&mut self, buffer: usize, x: i32, y: i32, ch: char) {
        let width = char_width(ch);
        if y < 0 || y >= self.size.height || x < 0 || x + width > self.size.width {
            return;
        }
        let row_len = self.size.width as usize;
        let Some(cells) = self.buffers.get_mut(buffer) else {
            return;
        };
        let start = y as usize * row_len;
        let row = &mut cells[start..start + row_len];
        let x = x as usize;

        break_wide(row, x);
        if width == 2 {
            break_wide(row, x + 1);
        }
        row[x].ch = ch;
        if width == 2 {
            row[x + 1].ch = CONTINUATION;
        }
    }
}

/// Blank whatever wide character currently overlaps column `x`.
fn break_wide(row: &mut [Cell], x: usize) {
    if row[x].ch == CONTINUATION && x > 0 {
        row[x - 1].ch = ' ';
        row[x].ch = ' ';
    }
    if char_width(row[x].ch) == 2 && x + 1 < row.len() {
        row[x + 1].ch = ' ';
    }
}

impl DrawTarget for MemoryDisplay {
    fn grid_size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, ch: char, area: MapRect, buffer: usize) {
        let Some(area) = self.clip(area) else {
            return;
        };
        let width = char_width(ch);
        for y in area.y..area.bottom() {
            for n in 0..area.width / width {
                self.put(buffer, area.x + n * width, y, ch);
            }
        }
    }

    fn modify_attr(&mut self, attr: Attr, area: MapRect, buffer: usize) {
        let Some(area) = self.clip(area) else {
            return;
        };
        let row_len = self.size.width as usize;
        let Some(cells) = self.buffers.get_mut(buffer) else {
            return;
        };
        for point in area.cells() {
            cells[point.y as usize * row_len + point.x as usize].attr = attr;
        }
    }

    fn draw_string(&mut self, text: &str, at: MapPoint, buffer: usize) {
        let mut x = at.x;
        for ch in text.chars() {
            self.put(buffer, x, at.y, ch);
            x += char_width(ch);
        }
    }
}

impl DisplayService for MemoryDisplay {
    fn init(&mut self, config: &DisplayConfig) -> Result<(), DisplayError> {
        if self.is_initialized() {
            return Err(DisplayError::AlreadyInitialized);
        }
        config.validate()?;

        self.size = config.size();
        self.buffers = vec![vec![BLANK; self.size.area()]; config.buffer_count];
        self.active = 0;
        self.config = Some(*config);
        info!(
            width = config.width,
            height = config.height,
            buffers = config.buffer_count,
            "memory display initialised"
        );
        Ok(())
    }

    fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn active_buffer(&self) -> usize {
        self.active
    }

    fn flip(&mut self, buffer: usize) -> Result<(), DisplayError> {
        if !self.is_initialized() {
            return Err(DisplayError::NotInitialized);
        }
        if buffer >= self.buffers.len() {
            return Err(DisplayError::BufferOutOfRange {
                index: buffer,
                count: self.buffers.len(),
            });
        }
        self.active = buffer;
        self.flips += 1;
        Ok(())
    }

    fn quick_fill_char(&mut self, ch: char, at: MapPoint, amount: usize, buffer: usize) {
        let Some(start) = self.index(at) else {
            return;
        };
        let end = (start + amount).min(self.size.area());
        let row_len = self.size.width as usize;
        let step = char_width(ch) as usize;
        let mut i = start;
        while i < end {
            // A wide character that would hang past the row end is skipped
            self.put(buffer, (i % row_len) as i32, (i / row_len) as i32, ch);
            i += step;
        }
    }

    fn quick_fill_attr(&mut self, attr: Attr, at: MapPoint, amount: usize, buffer: usize) {
        let Some(start) = self.index(at) else {
            return;
        };
        let end = (start + amount).min(self.size.area());
        if let Some(cells) = self.buffers.get_mut(buffer) {
            for cell in &mut cells[start..end] {
                cell.attr = attr;
            }
        }
    }
}
