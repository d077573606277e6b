//! The tile store seam.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use mosaic_common::{Pyramid, TileCoord, TileIndexRange};

use crate::StorageResult;

/// Raw payload of one stored tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTile {
    pub zoom: u32,
    pub col: i64,
    pub row: i64,
    pub data: Bytes,
}

impl StoredTile {
    pub fn new(zoom: u32, col: i64, row: i64, data: impl Into<Bytes>) -> Self {
        Self {
            zoom,
            col,
            row,
            data: data.into(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.zoom, self.col, self.row)
    }
}

/// Forward-only iteration over the stored tiles of one range.
///
/// A cursor is not restartable. Dropping it releases whatever the store
/// holds open for it.
pub trait TileCursor: Iterator<Item = StorageResult<StoredTile>> + Send {}

impl<T> TileCursor for T where T: Iterator<Item = StorageResult<StoredTile>> + Send {}

/// A catalog of tile pyramids with random access to their tiles.
pub trait TileStore: Send + Sync {
    /// Names of the coverages (tile tables) in catalog order.
    fn coverage_names(&self) -> Vec<String>;

    /// Metadata of one coverage. `tile_count` on each level reflects the
    /// tiles actually stored.
    fn pyramid(&self, name: &str) -> StorageResult<Pyramid>;

    /// Open a cursor over the stored tiles of `zoom` that fall inside `range`.
    ///
    /// Positions without a stored tile are skipped.
    fn open_cursor(
        &self,
        name: &str,
        zoom: u32,
        range: &TileIndexRange,
    ) -> StorageResult<Box<dyn TileCursor>>;
}

/// Counts a cursor as open for as long as it lives.
#[derive(Debug)]
pub struct CursorGuard {
    open: Arc<AtomicUsize>,
}

impl CursorGuard {
    pub fn acquire(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { open: open.clone() }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
