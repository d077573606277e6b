//! Tile grid coordinates and the envelope-to-tile-range conversion.
//!
//! Tile (0, 0) is the upper-left tile of the matrix at every zoom level,
//! whether or not it is stored. Columns grow eastward and rows grow
//! **southward**, so the y axis of the tile grid runs opposite to the
//! y axis of the reference system.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// A tile coordinate (zoom/column/row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x), 0 at the west edge
    pub x: i64,
    /// Row (y), 0 at the north edge
    pub y: i64,
}

impl TileCoord {
    pub fn new(z: u32, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Upper-left corner of a tile matrix: (min x, max y) of the pyramid envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridOrigin {
    pub x: f64,
    pub y: f64,
}

impl GridOrigin {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin of a matrix covering `bounds`.
    pub fn top_left(bounds: &BoundingBox) -> Self {
        Self {
            x: bounds.min_x,
            y: bounds.max_y,
        }
    }
}

/// Ground extent of a single tile (pixel size times tile size in pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileSpan {
    pub x: f64,
    pub y: f64,
}

impl TileSpan {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Envelope of the tile at `col`/`row` in a matrix anchored at `origin`.
    pub fn tile_envelope(&self, origin: GridOrigin, col: i64, row: i64) -> BoundingBox {
        let min_x = origin.x + col as f64 * self.x;
        let max_y = origin.y - row as f64 * self.y;
        BoundingBox::new(min_x, max_y - self.y, min_x + self.x, max_y)
    }
}

/// Inclusive rectangle of tile indices at one zoom level.
///
/// Bounds may fall outside the matrix (negative or past its width) when the
/// envelope they were computed from does; stores simply hold no tiles there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndexRange {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl TileIndexRange {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right < self.left || self.bottom < self.top
    }

    /// Number of columns covered.
    pub fn width(&self) -> u64 {
        if self.right < self.left {
            0
        } else {
            self.right.abs_diff(self.left).saturating_add(1)
        }
    }

    /// Number of rows covered.
    pub fn height(&self) -> u64 {
        if self.bottom < self.top {
            0
        } else {
            self.bottom.abs_diff(self.top).saturating_add(1)
        }
    }

    pub fn tile_count(&self) -> u64 {
        self.width().saturating_mul(self.height())
    }

    pub fn contains(&self, col: i64, row: i64) -> bool {
        col >= self.left && col <= self.right && row >= self.top && row <= self.bottom
    }

    pub fn columns(&self) -> std::ops::RangeInclusive<i64> {
        self.left..=self.right
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<i64> {
        self.top..=self.bottom
    }

    /// Intersect with a `matrix_width` x `matrix_height` grid.
    pub fn clamped(&self, matrix_width: u32, matrix_height: u32) -> Option<TileIndexRange> {
        let clamped = TileIndexRange {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(matrix_width as i64 - 1),
            bottom: self.bottom.min(matrix_height as i64 - 1),
        };
        (!clamped.is_empty()).then_some(clamped)
    }
}

impl std::fmt::Display for TileIndexRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cols {}..={} rows {}..={}",
            self.left, self.right, self.top, self.bottom
        )
    }
}

/// How the trailing column/row produced by `ceil` is reconsidered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeTrim {
    /// Keep the raw floor/ceil bounds.
    None,
    /// Drop the trailing tile when its leading edge lies strictly past the
    /// envelope. Applied to explicit read requests.
    #[default]
    Overhang,
    /// Also drop the trailing tile when its leading edge sits exactly on the
    /// envelope edge. Applied to whole-pyramid reads.
    Flush,
}

/// Compute the tiles covering `envelope` in a matrix anchored at `origin`.
///
/// Leading bounds use `floor` and trailing bounds `ceil`; rounding would drop
/// a tile contributing only part of a pixel row or column at the edge. Any
/// tile overlapping the envelope by a positive area is always included.
pub fn tile_range(
    envelope: &BoundingBox,
    origin: GridOrigin,
    span: TileSpan,
    trim: EdgeTrim,
) -> TileIndexRange {
    let left = ((envelope.min_x - origin.x) / span.x).floor() as i64;
    let top = ((origin.y - envelope.max_y) / span.y).floor() as i64;
    let mut right = ((envelope.max_x - origin.x) / span.x).ceil() as i64;
    let mut bottom = ((origin.y - envelope.min_y) / span.y).ceil() as i64;

    let right_edge = origin.x + right as f64 * span.x;
    let bottom_edge = origin.y - bottom as f64 * span.y;

    let (drop_right, drop_bottom) = match trim {
        EdgeTrim::None => (false, false),
        EdgeTrim::Overhang => (right_edge > envelope.max_x, bottom_edge < envelope.min_y),
        EdgeTrim::Flush => (right_edge >= envelope.max_x, bottom_edge <= envelope.min_y),
    };

    if drop_right && right > left {
        right -= 1;
    }
    if drop_bottom && bottom > top {
        bottom -= 1;
    }

    TileIndexRange {
        left,
        top,
        right,
        bottom,
    }
}
