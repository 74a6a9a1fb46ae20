//! Character-grid drawing
//!
//! A [`DrawTarget`] is anything that holds one or more character buffers the
//! size of the grid. A [`Surface`] is a view onto one buffer of a target,
//! restricted to a rectangle; entities draw through it in their own local
//! coordinates and never touch cells outside their bounds.

use crate::math::{LocalPoint, LocalRect, MapPoint, MapRect, Size};

/// Number of grid columns a character occupies.
///
/// Latin-1 is narrow, everything else (CJK, box drawing, symbols) is treated
/// as double width.
pub fn char_width(c: char) -> i32 {
    if (c as u32) < 0x100 {
        1
    } else {
        2
    }
}

/// Column width of a whole string.
pub fn str_width(text: &str) -> i32 {
    text.chars().map(char_width).sum()
}

/// Cell colour attribute, laid out like a console attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attr(pub u16);

impl Attr {
    pub const FOREGROUND_BLUE: Attr = Attr(0x0001);
    pub const FOREGROUND_GREEN: Attr = Attr(0x0002);
    pub const FOREGROUND_RED: Attr = Attr(0x0004);
    pub const FOREGROUND_INTENSITY: Attr = Attr(0x0008);
    pub const BACKGROUND_BLUE: Attr = Attr(0x0010);
    pub const BACKGROUND_GREEN: Attr = Attr(0x0020);
    pub const BACKGROUND_RED: Attr = Attr(0x0040);
    pub const BACKGROUND_INTENSITY: Attr = Attr(0x0080);
    pub const COMMON_LVB_LEADING_BYTE: Attr = Attr(0x0100);
    pub const COMMON_LVB_TRAILING_BYTE: Attr = Attr(0x0200);
    pub const COMMON_LVB_GRID_HORIZONTAL: Attr = Attr(0x0400);
    pub const COMMON_LVB_GRID_LVERTICAL: Attr = Attr(0x0800);
    pub const COMMON_LVB_GRID_RVERTICAL: Attr = Attr(0x1000);
    pub const COMMON_LVB_REVERSE_VIDEO: Attr = Attr(0x4000);
    pub const COMMON_LVB_UNDERSCORE: Attr = Attr(0x8000);

    /// Light grey on black.
    pub const DEFAULT: Attr = Attr(0x0007);

    pub const fn union(self, other: Attr) -> Attr {
        Attr(self.0 | other.0)
    }
}

impl std::ops::BitOr for Attr {
    type Output = Attr;

    fn bitor(self, rhs: Attr) -> Attr {
        self.union(rhs)
    }
}

/// Buffer-indexed primitive drawing operations.
///
/// Rectangles are in map space and already clipped by the caller.
pub trait DrawTarget {
    fn grid_size(&self) -> Size;

    /// Fill `area` with `ch`. A wide character covers two columns, so only
    /// `area.width / char_width(ch)` copies fit on each row.
    fn fill_rect(&mut self, ch: char, area: MapRect, buffer: usize);

    fn modify_attr(&mut self, attr: Attr, area: MapRect, buffer: usize);

    /// Write `text` starting at `at` on a single row.
    fn draw_string(&mut self, text: &str, at: MapPoint, buffer: usize);
}

/// Clipped drawing view used by entities.
pub struct Surface<'a> {
    target: &'a mut dyn DrawTarget,
    origin: MapPoint,
    clip: MapRect,
    buffer: usize,
}

impl<'a> Surface<'a> {
    /// View of `target` rooted at `origin`, clipped to `size` and to the grid.
    pub fn new(target: &'a mut dyn DrawTarget, origin: MapPoint, size: Size, buffer: usize) -> Self {
        let grid = MapRect::from_parts(MapPoint::ORIGIN, target.grid_size());
        let clip = MapRect::from_parts(origin, size)
            .intersection(&grid)
            .unwrap_or(MapRect::EMPTY);
        Self {
            target,
            origin,
            clip,
            buffer,
        }
    }

    /// View of the entire grid.
    pub fn full(target: &'a mut dyn DrawTarget, buffer: usize) -> Self {
        let size = target.grid_size();
        Self::new(target, MapPoint::ORIGIN, size, buffer)
    }

    pub fn origin(&self) -> MapPoint {
        self.origin
    }

    /// Drawable region in map space. Empty when fully off-grid.
    pub fn clip(&self) -> MapRect {
        self.clip
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    fn clip_local(&self, area: LocalRect) -> Option<MapRect> {
        area.to_map(self.origin).intersection(&self.clip)
    }

    pub fn fill_rect(&mut self, ch: char, area: LocalRect, attr: Option<Attr>) {
        if let Some(area) = self.clip_local(area) {
            self.target.fill_rect(ch, area, self.buffer);
            if let Some(attr) = attr {
                self.target.modify_attr(attr, area, self.buffer);
            }
        }
    }

    /// Draw only the border of `area`, one character wide (two columns for a
    /// wide character on the sides).
    pub fn fill_rect_hollow(&mut self, ch: char, area: LocalRect, attr: Option<Attr>) {
        let side = char_width(ch);
        if area.height < 3 || area.width <= side * 2 {
            self.fill_rect(ch, area, attr);
            return;
        }
        let LocalRect {
            x,
            y,
            width,
            height,
            ..
        } = area;
        self.fill_rect(ch, LocalRect::new(x, y, width, 1), attr);
        self.fill_rect(ch, LocalRect::new(x, y + height - 1, width, 1), attr);
        self.fill_rect(ch, LocalRect::new(x, y + 1, side, height - 2), attr);
        self.fill_rect(ch, LocalRect::new(x + width - side, y + 1, side, height - 2), attr);
    }

    pub fn modify_rect(&mut self, attr: Attr, area: LocalRect) {
        if let Some(area) = self.clip_local(area) {
            self.target.modify_attr(attr, area, self.buffer);
        }
    }

    /// Draw one line of `text` at `(x, y)`, at most `max_width` columns wide,
    /// scrolled left by `offset_x` columns (negative offsets count as 0).
    ///
    /// Wide characters that would straddle either edge are left out. Returns
    /// how many more columns of scroll would be needed to show the end of the
    /// text (0 when it already fits).
    pub fn draw_string_line(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        max_width: i32,
        offset_x: i32,
        attr: Option<Attr>,
    ) -> i32 {
        let offset_x = offset_x.max(0);
        let total = str_width(text);
        let overflow = (total - offset_x - max_width).max(0);

        let row = y + self.origin.y;
        if max_width <= 0 || !self.clip.contains_y(row) {
            return overflow;
        }

        // Visible column window in map space
        let left = (x + self.origin.x).max(self.clip.x);
        let right = (x + self.origin.x + max_width).min(self.clip.right());
        if left >= right {
            return overflow;
        }

        let mut visible = String::new();
        let mut start = None;
        let mut end = left;
        let mut column = x + self.origin.x - offset_x;
        for c in text.chars() {
            let w = char_width(c);
            if column >= right {
                break;
            }
            if column >= left && column + w <= right {
                if start.is_none() {
                    start = Some(column);
                }
                visible.push(c);
                end = column + w;
            }
            column += w;
        }

        if let Some(start) = start {
            self.target
                .draw_string(&visible, MapPoint::new(start, row), self.buffer);
            if let Some(attr) = attr {
                let area = MapRect::new(start, row, end - start, 1);
                self.target.modify_attr(attr, area, self.buffer);
            }
        }
        overflow
    }

    /// Word-wrap-free text box: break `text` into rows of at most `max_width`
    /// columns (and at `'\n'`), skip the first `offset_y` rows and draw up to
    /// `max_height` rows starting at `(x, y)`.
    ///
    /// Returns the number of rows that did not fit below the box.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_string_rect(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        max_width: i32,
        max_height: i32,
        offset_y: i32,
        attr: Option<Attr>,
    ) -> i32 {
        let offset_y = offset_y.max(0);
        if max_width <= 0 {
            return 0;
        }
        let lines = wrap_lines(text, max_width);
        let total = lines.len() as i32;
        let shown = lines
            .iter()
            .skip(offset_y as usize)
            .take(max_height.max(0) as usize);
        for (row, line) in shown.enumerate() {
            self.draw_string_line(line, x, y + row as i32, max_width, 0, attr);
        }
        (total - offset_y - max_height.max(0)).max(0)
    }

    /// Horizontal dashed pattern across `area`: `line_len` characters, then
    /// `space_len` blank columns, repeated. `offset` scrolls the pattern.
    pub fn draw_dotted_line(
        &mut self,
        ch: char,
        area: LocalRect,
        line_len: i32,
        space_len: i32,
        offset: i32,
    ) {
        let line = line_len * char_width(ch);
        let period = line + space_len;
        if line <= 0 || period <= 0 {
            return;
        }
        let mut start = area.x - offset.rem_euclid(period);
        while start < area.right() {
            let left = start.max(area.x);
            let right = (start + line).min(area.right());
            if left < right {
                self.fill_rect(ch, LocalRect::new(left, area.y, right - left, area.height), None);
            }
            start += period;
        }
    }

    /// Vertical counterpart of [`Surface::draw_dotted_line`]; lengths in rows.
    pub fn draw_vertical_dotted_line(
        &mut self,
        ch: char,
        area: LocalRect,
        line_len: i32,
        space_len: i32,
        offset: i32,
    ) {
        let period = line_len + space_len;
        if line_len <= 0 || period <= 0 {
            return;
        }
        let mut start = area.y - offset.rem_euclid(period);
        while start < area.bottom() {
            let top = start.max(area.y);
            let bottom = (start + line_len).min(area.bottom());
            if top < bottom {
                self.fill_rect(ch, LocalRect::new(area.x, top, area.width, bottom - top), None);
            }
            start += period;
        }
    }

    /// Local coordinates of a map cell, for entities that track absolute
    /// positions.
    pub fn to_local(&self, point: MapPoint) -> LocalPoint {
        point.to_local(self.origin)
    }
}

fn wrap_lines(text: &str, max_width: i32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut width = 0;
        for c in paragraph.chars() {
            let w = char_width(c);
            if width + w > max_width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                width = 0;
            }
            line.push(c);
            width += w;
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Narrow-only grid; a wide character is stored in its first cell and the
    /// second is marked with `\0`.
    struct Grid {
        size: Size,
        cells: Vec<char>,
        attrs: Vec<Attr>,
    }

    impl Grid {
        fn new(width: i32, height: i32) -> Self {
            let size = Size::new(width, height);
            Self {
                size,
                cells: vec![' '; size.area()],
                attrs: vec![Attr::DEFAULT; size.area()],
            }
        }

        fn index(&self, x: i32, y: i32) -> usize {
            (y * self.size.width + x) as usize
        }

        fn row(&self, y: i32) -> String {
            (0..self.size.width)
                .map(|x| self.cells[self.index(x, y)])
                .filter(|c| *c != '\0')
                .collect()
        }

        fn put(&mut self, c: char, x: i32, y: i32) {
            let i = self.index(x, y);
            self.cells[i] = c;
            if char_width(c) == 2 {
                self.cells[i + 1] = '\0';
            }
        }
    }

    impl DrawTarget for Grid {
        fn grid_size(&self) -> Size {
            self.size
        }

        fn fill_rect(&mut self, ch: char, area: MapRect, _buffer: usize) {
            let w = char_width(ch);
            for row in area.y..area.bottom() {
                for n in 0..area.width / w {
                    self.put(ch, area.x + n * w, row);
                }
            }
        }

        fn modify_attr(&mut self, attr: Attr, area: MapRect, _buffer: usize) {
            for cell in area.cells() {
                let i = self.index(cell.x, cell.y);
                self.attrs[i] = attr;
            }
        }

        fn draw_string(&mut self, text: &str, at: MapPoint, _buffer: usize) {
            let mut x = at.x;
            for c in text.chars() {
                self.put(c, x, at.y);
                x += char_width(c);
            }
        }
    }

    #[test]
    fn test_char_width() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('\u{e9}'), 1);
        assert_eq!(char_width('\u{2588}'), 2);
        assert_eq!(str_width("a\u{4e2d}b"), 4);
    }

    #[test]
    fn test_fill_clipped_to_surface() {
        let mut grid = Grid::new(6, 3);
        {
            let mut surface = Surface::new(&mut grid, MapPoint::new(1, 1), Size::new(3, 1), 0);
            surface.fill_rect('#', LocalRect::new(-5, -5, 20, 20), Some(Attr::FOREGROUND_RED));
        }
        assert_eq!(grid.row(0), "      ");
        assert_eq!(grid.row(1), " ###  ");
        assert_eq!(grid.attrs[grid.index(1, 1)], Attr::FOREGROUND_RED);
        assert_eq!(grid.attrs[grid.index(4, 1)], Attr::DEFAULT);
    }

    #[test]
    fn test_offscreen_entity_keeps_local_origin() {
        let mut grid = Grid::new(4, 2);
        {
            // Entity hangs two columns off the left edge
            let mut surface = Surface::new(&mut grid, MapPoint::new(-2, 0), Size::new(4, 1), 0);
            assert_eq!(surface.clip(), MapRect::new(0, 0, 2, 1));
            surface.draw_string_line("abcd", 0, 0, 4, 0, None);
        }
        assert_eq!(grid.row(0), "cd  ");
    }

    #[test]
    fn test_hollow_rect() {
        let mut grid = Grid::new(4, 3);
        Surface::full(&mut grid, 0).fill_rect_hollow('*', LocalRect::new(0, 0, 4, 3), None);
        assert_eq!(grid.row(0), "****");
        assert_eq!(grid.row(1), "*  *");
        assert_eq!(grid.row(2), "****");
    }

    #[test]
    fn test_string_line_scroll_and_overflow() {
        let mut grid = Grid::new(8, 1);
        let overflow = Surface::full(&mut grid, 0).draw_string_line("abcdefgh", 1, 0, 3, 2, None);
        assert_eq!(grid.row(0), " cde    ");
        assert_eq!(overflow, 3);

        let mut grid = Grid::new(8, 1);
        let overflow = Surface::full(&mut grid, 0).draw_string_line("ab", 0, 0, 5, 0, None);
        assert_eq!(overflow, 0);
        assert_eq!(grid.row(0), "ab      ");
    }

    #[test]
    fn test_negative_offsets_count_as_zero() {
        let mut grid = Grid::new(8, 1);
        let overflow = Surface::full(&mut grid, 0).draw_string_line("abcdefgh", 1, 0, 3, -1, None);
        assert_eq!(grid.row(0), " abc    ");
        assert_eq!(overflow, 5);

        let mut grid = Grid::new(4, 3);
        let hidden = Surface::full(&mut grid, 0).draw_string_rect("abcdefghij", 0, 0, 3, 2, -2, None);
        assert_eq!(grid.row(0), "abc ");
        assert_eq!(grid.row(1), "def ");
        assert_eq!(hidden, 2);
    }

    #[test]
    fn test_string_line_drops_straddling_wide_char() {
        let mut grid = Grid::new(6, 1);
        // '\u{4e2d}' would need columns 2..4 but the window ends at 3
        let overflow = Surface::full(&mut grid, 0).draw_string_line("ab\u{4e2d}", 0, 0, 3, 0, None);
        assert_eq!(grid.row(0), "ab    ");
        assert_eq!(overflow, 1);
    }

    #[test]
    fn test_string_rect_wraps_and_counts_overflow() {
        let mut grid = Grid::new(4, 3);
        let hidden = Surface::full(&mut grid, 0).draw_string_rect("abcdefghij", 0, 0, 3, 2, 1, None);
        assert_eq!(grid.row(0), "def ");
        assert_eq!(grid.row(1), "ghi ");
        assert_eq!(grid.row(2), "    ");
        // rows: abc / def / ghi / j, skip 1, show 2, 1 left over
        assert_eq!(hidden, 1);
    }

    #[test]
    fn test_string_rect_honours_newlines() {
        let mut grid = Grid::new(4, 2);
        let hidden = Surface::full(&mut grid, 0).draw_string_rect("ab\ncd", 0, 0, 4, 2, 0, None);
        assert_eq!(grid.row(0), "ab  ");
        assert_eq!(grid.row(1), "cd  ");
        assert_eq!(hidden, 0);
    }

    #[test]
    fn test_dotted_lines() {
        let mut grid = Grid::new(8, 1);
        Surface::full(&mut grid, 0).draw_dotted_line('-', LocalRect::new(0, 0, 8, 1), 2, 1, 0);
        assert_eq!(grid.row(0), "-- -- --");

        let mut grid = Grid::new(8, 1);
        Surface::full(&mut grid, 0).draw_dotted_line('-', LocalRect::new(0, 0, 8, 1), 2, 1, 1);
        assert_eq!(grid.row(0), "- -- -- ");

        let mut grid = Grid::new(1, 5);
        Surface::full(&mut grid, 0).draw_vertical_dotted_line('|', LocalRect::new(0, 0, 1, 5), 1, 1, 0);
        let column: String = (0..5).map(|y| grid.row(y)).collect();
        assert_eq!(column, "| | |");
    }

    #[test]
    fn test_surface_fully_offgrid_draws_nothing() {
        let mut grid = Grid::new(3, 3);
        {
            let mut surface = Surface::new(&mut grid, MapPoint::new(10, 10), Size::new(2, 2), 0);
            assert!(surface.clip().is_empty());
            surface.fill_rect('#', LocalRect::new(0, 0, 2, 2), None);
            surface.draw_string_line("x", 0, 0, 1, 0, None);
        }
        assert!(grid.cells.iter().all(|c| *c == ' '));
    }
}
