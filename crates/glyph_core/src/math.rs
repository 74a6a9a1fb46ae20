//! Grid geometry
//!
//! Every point and rectangle carries its frame of reference in the type:
//! [`MapSpace`] is the absolute character grid, [`LocalSpace`] is relative to
//! an entity's origin. Moving between the two always takes an explicit origin,
//! so an entity-relative cell can never be compared with a map cell by mistake.
//!
//! Rectangles are half-open: `right()` and `bottom()` are the first column/row
//! *outside* the rectangle.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Marker for a coordinate frame.
pub trait Space: Copy + Eq + Hash + Default + fmt::Debug + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Absolute grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MapSpace;

/// Coordinates relative to an entity's top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocalSpace;

impl Space for MapSpace {
    const NAME: &'static str = "map";
}

impl Space for LocalSpace {
    const NAME: &'static str = "local";
}

/// A grid cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point<S: Space> {
    pub x: i32,
    pub y: i32,
    _space: PhantomData<S>,
}

pub type MapPoint = Point<MapSpace>;
pub type LocalPoint = Point<LocalSpace>;

impl<S: Space> Point<S> {
    pub const ORIGIN: Self = Self::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl LocalPoint {
    /// Translate into map space given the owning entity's origin.
    pub const fn to_map(self, origin: MapPoint) -> MapPoint {
        MapPoint::new(origin.x + self.x, origin.y + self.y)
    }
}

impl MapPoint {
    /// Translate into the local space rooted at `origin`.
    pub const fn to_local(self, origin: MapPoint) -> LocalPoint {
        LocalPoint::new(self.x - origin.x, self.y - origin.y)
    }
}

impl<S: Space> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", S::NAME, self.x, self.y)
    }
}

/// Width and height in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }
}

/// Axis-aligned rectangle of cells.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<S: Space> {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    _space: PhantomData<S>,
}

pub type MapRect = Rect<MapSpace>;
pub type LocalRect = Rect<LocalSpace>;

impl<S: Space> Rect<S> {
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            _space: PhantomData,
        }
    }

    pub const fn from_parts(origin: Point<S>, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub const fn origin(&self) -> Point<S> {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// First column to the right of the rectangle.
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// First row below the rectangle.
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(&self) -> usize {
        self.size().area()
    }

    pub const fn contains_x(&self, x: i32) -> bool {
        x >= self.x && x < self.right()
    }

    pub const fn contains_y(&self, y: i32) -> bool {
        y >= self.y && y < self.bottom()
    }

    pub const fn contains(&self, point: Point<S>) -> bool {
        self.contains_x(point.x) && self.contains_y(point.y)
    }

    /// Overlapping region, or `None` when the rectangles are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left >= right || top >= bottom {
            return None;
        }
        Some(Self::new(left, top, right - left, bottom - top))
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// Row-major iterator over every cell.
    pub fn cells(&self) -> impl Iterator<Item = Point<S>> {
        let Rect { x, y, .. } = *self;
        let (right, bottom) = (self.right(), self.bottom());
        (y..bottom).flat_map(move |row| (x..right).map(move |col| Point::new(col, row)))
    }

    /// Row-major index of `point` inside the rectangle.
    pub fn index_of(&self, point: Point<S>) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let row = (point.y - self.y) as usize;
        let col = (point.x - self.x) as usize;
        Some(row * self.width as usize + col)
    }
}

impl LocalRect {
    pub const fn to_map(self, origin: MapPoint) -> MapRect {
        MapRect::new(origin.x + self.x, origin.y + self.y, self.width, self.height)
    }
}

impl MapRect {
    pub const fn to_local(self, origin: MapPoint) -> LocalRect {
        LocalRect::new(self.x - origin.x, self.y - origin.y, self.width, self.height)
    }
}

impl<S: Space> fmt::Debug for Rect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}, {} {}x{}]",
            S::NAME,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}
