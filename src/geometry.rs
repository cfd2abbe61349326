//! Integer geometry over the artboard grid.
//!
//! Cells are addressed with `i32` so that walks may step one cell past the
//! edge of the grid; anything outside `[0, width) x [0, height)` is off-grid.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// An empty region at the origin
    pub const EMPTY: Region = Region { x: 0, y: 0, width: 0, height: 0 };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive top edge
    pub fn top(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.top()
    }

    /// Clips this region to a grid of the given size.
    ///
    /// Returns `None` when nothing of the region lies on the grid.
    pub fn clipped(&self, grid_width: i32, grid_height: i32) -> Option<Region> {
        let x = self.x.max(0);
        let y = self.y.max(0);
        let right = self.right().min(grid_width);
        let top = self.top().min(grid_height);
        let clipped = Region::new(x, y, right - x, top - y);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Smallest region covering both `self` and `other`. Empty regions are ignored.
    pub fn union(&self, other: &Region) -> Region {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let top = self.top().max(other.top());
        Region::new(x, y, right - x, top - y)
    }

    /// Iterates the cells of this region row by row, starting at the bottom row.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (x0, right) = (self.x, self.right());
        (self.y..self.top()).flat_map(move |y| (x0..right).map(move |x| (x, y)))
    }
}

/// A run of cells on a single row, `height` is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub x: i32,
    pub y: i32,
    pub width: i32,
}

impl Span {
    pub fn new(x: i32, y: i32, width: i32) -> Self {
        Self { x, y, width }
    }

    /// Builds the span covering `west..=east` on row `y`.
    pub fn between(west: i32, east: i32, y: i32) -> Self {
        Self::new(west, y, east - west + 1)
    }

    /// Exclusive right edge
    pub fn end(&self) -> i32 {
        self.x + self.width
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        y == self.y && x >= self.x && x < self.end()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.y == other.y && self.x < other.end() && other.x < self.end()
    }

    /// Middle cell of the run; ties round toward the lower x.
    pub fn midpoint(&self) -> i32 {
        self.x + (self.width - 1) / 2
    }

    pub fn region(&self) -> Region {
        Region::new(self.x, self.y, self.width, 1)
    }
}

impl From<Span> for Region {
    fn from(span: Span) -> Self {
        span.region()
    }
}
