//! In-memory tile store.
//!
//! Holds every tile payload in a map keyed by `(zoom, row, col)`. Each open
//! cursor is counted, so callers can verify that cursors are released on
//! every path.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use mosaic_common::{Level, Pyramid, TileCoord, TileIndexRange};
use tracing::debug;

use crate::store::{CursorGuard, StoredTile, TileCursor, TileStore};
use crate::{StorageError, StorageResult};

struct MemoryCoverage {
    pyramid: Pyramid,
    tiles: BTreeMap<(u32, i64, i64), Bytes>,
    failing: HashSet<TileCoord>,
}

/// Tile store backed by in-memory maps.
#[derive(Default)]
pub struct MemoryTileStore {
    coverages: Vec<MemoryCoverage>,
    open_cursors: Arc<AtomicUsize>,
    cursors_opened: AtomicUsize,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coverage. A coverage of the same name is replaced in place.
    pub fn add_coverage(&mut self, pyramid: Pyramid) {
        let coverage = MemoryCoverage {
            pyramid,
            tiles: BTreeMap::new(),
            failing: HashSet::new(),
        };
        match self
            .coverages
            .iter_mut()
            .find(|c| c.pyramid.name == coverage.pyramid.name)
        {
            Some(existing) => *existing = coverage,
            None => self.coverages.push(coverage),
        }
    }

    pub fn insert_tile(
        &mut self,
        name: &str,
        zoom: u32,
        col: i64,
        row: i64,
        data: impl Into<Bytes>,
    ) -> StorageResult<()> {
        let coverage = self.coverage_mut(name, zoom)?;
        coverage.tiles.insert((zoom, row, col), data.into());
        Ok(())
    }

    /// Make the cursor report a read error instead of yielding this tile.
    pub fn fail_tile(&mut self, name: &str, zoom: u32, col: i64, row: i64) -> StorageResult<()> {
        let coverage = self.coverage_mut(name, zoom)?;
        coverage.failing.insert(TileCoord::new(zoom, col, row));
        Ok(())
    }

    /// Cursors currently alive.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Cursors opened over the lifetime of the store.
    pub fn cursors_opened(&self) -> usize {
        self.cursors_opened.load(Ordering::SeqCst)
    }

    fn coverage(&self, name: &str) -> StorageResult<&MemoryCoverage> {
        self.coverages
            .iter()
            .find(|c| c.pyramid.name == name)
            .ok_or_else(|| StorageError::UnknownCoverage(name.to_string()))
    }

    fn coverage_mut(&mut self, name: &str, zoom: u32) -> StorageResult<&mut MemoryCoverage> {
        let coverage = self
            .coverages
            .iter_mut()
            .find(|c| c.pyramid.name == name)
            .ok_or_else(|| StorageError::UnknownCoverage(name.to_string()))?;
        if coverage.pyramid.level(zoom).is_none() {
            return Err(StorageError::UnknownLevel {
                coverage: name.to_string(),
                zoom,
            });
        }
        Ok(coverage)
    }
}

impl TileStore for MemoryTileStore {
    fn coverage_names(&self) -> Vec<String> {
        self.coverages
            .iter()
            .map(|c| c.pyramid.name.clone())
            .collect()
    }

    fn pyramid(&self, name: &str) -> StorageResult<Pyramid> {
        let coverage = self.coverage(name)?;
        let pyramid = &coverage.pyramid;

        let levels: Vec<Level> = pyramid
            .levels()
            .iter()
            .map(|level| Level {
                tile_count: coverage
                    .tiles
                    .range((level.zoom, i64::MIN, i64::MIN)..=(level.zoom, i64::MAX, i64::MAX))
                    .count() as u64,
                ..level.clone()
            })
            .collect();

        Ok(Pyramid::new(
            pyramid.name.clone(),
            pyramid.srid,
            pyramid.bounds,
            levels,
        )?)
    }

    fn open_cursor(
        &self,
        name: &str,
        zoom: u32,
        range: &TileIndexRange,
    ) -> StorageResult<Box<dyn TileCursor>> {
        let coverage = self.coverage(name)?;
        if coverage.pyramid.level(zoom).is_none() {
            return Err(StorageError::UnknownLevel {
                coverage: name.to_string(),
                zoom,
            });
        }

        // BTreeMap::range panics on inverted bounds
        let tiles: Vec<StorageResult<StoredTile>> = if range.is_empty() {
            Vec::new()
        } else {
            coverage
                .tiles
                .range((zoom, range.top, i64::MIN)..=(zoom, range.bottom, i64::MAX))
                .filter(|((_, row, col), _)| range.contains(*col, *row))
                .map(|(&(zoom, row, col), data)| {
                    let coord = TileCoord::new(zoom, col, row);
                    if coverage.failing.contains(&coord) {
                        Err(StorageError::tile_read(coord, "injected read failure"))
                    } else {
                        Ok(StoredTile::new(zoom, col, row, data.clone()))
                    }
                })
                .collect()
        };

        self.cursors_opened.fetch_add(1, Ordering::SeqCst);
        debug!(coverage = %name, zoom, range = %range, tiles = tiles.len(), "Opened memory cursor");

        Ok(Box::new(MemoryCursor {
            tiles: tiles.into_iter(),
            _guard: CursorGuard::acquire(&self.open_cursors),
        }))
    }
}

struct MemoryCursor {
    tiles: std::vec::IntoIter<StorageResult<StoredTile>>,
    _guard: CursorGuard,
}

impl Iterator for MemoryCursor {
    type Item = StorageResult<StoredTile>;

    fn next(&mut self) -> Option<Self::Item> {
        self.tiles.next()
    }
}
