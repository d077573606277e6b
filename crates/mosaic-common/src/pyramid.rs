//! Pyramid metadata and zoom level selection.
//!
//! A [`Pyramid`] is a read-only view over one tile table of a store's
//! catalog: the ground footprint shared by every level plus the ordered
//! [`Level`]s, coarsest first.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tile::{GridOrigin, TileSpan};
use crate::{BoundingBox, MosaicError, MosaicResult};

/// One zoom step of a pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Zoom index, increasing towards finer resolution
    pub zoom: u32,

    /// Ground units per pixel along x
    pub pixel_size_x: f64,

    /// Ground units per pixel along y
    pub pixel_size_y: f64,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tile columns
    pub matrix_width: u32,

    /// Number of tile rows
    pub matrix_height: u32,

    /// Number of tiles actually stored at this level
    #[serde(default)]
    pub tile_count: u64,
}

impl Level {
    pub fn has_tiles(&self) -> bool {
        self.tile_count > 0
    }

    /// Ground extent of one tile at this level.
    pub fn tile_span(&self) -> TileSpan {
        TileSpan::new(
            self.pixel_size_x * self.tile_width as f64,
            self.pixel_size_y * self.tile_height as f64,
        )
    }

    /// Pixel dimensions of the full matrix.
    pub fn grid_size(&self) -> (u64, u64) {
        (
            self.matrix_width as u64 * self.tile_width as u64,
            self.matrix_height as u64 * self.tile_height as u64,
        )
    }
}

/// A multi-resolution tiled raster dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pyramid {
    /// Table / coverage name
    pub name: String,

    /// Declared EPSG identifier
    pub srid: i32,

    /// Ground footprint shared by all levels
    pub bounds: BoundingBox,

    /// Levels ordered by ascending zoom
    levels: Vec<Level>,
}

impl Pyramid {
    /// Build a pyramid, sorting levels by zoom and checking that resolution
    /// strictly increases with zoom.
    pub fn new(
        name: impl Into<String>,
        srid: i32,
        bounds: BoundingBox,
        mut levels: Vec<Level>,
    ) -> MosaicResult<Self> {
        let name = name.into();

        if !bounds.is_valid() || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(MosaicError::invalid_pyramid(
                name,
                format!("bounds {:?} are empty or inverted", bounds),
            ));
        }

        levels.sort_by_key(|level| level.zoom);

        for level in &levels {
            if level.tile_width == 0 || level.tile_height == 0 {
                return Err(MosaicError::invalid_pyramid(
                    name,
                    format!("level {} has a zero tile dimension", level.zoom),
                ));
            }
            if !(level.pixel_size_x > 0.0 && level.pixel_size_y > 0.0) {
                return Err(MosaicError::invalid_pyramid(
                    name,
                    format!("level {} has a non-positive pixel size", level.zoom),
                ));
            }
        }

        for pair in levels.windows(2) {
            if pair[0].zoom == pair[1].zoom {
                return Err(MosaicError::invalid_pyramid(
                    name,
                    format!("zoom level {} is defined twice", pair[0].zoom),
                ));
            }
            if pair[1].pixel_size_x >= pair[0].pixel_size_x {
                return Err(MosaicError::invalid_pyramid(
                    name,
                    format!(
                        "pixel size must shrink as zoom grows (zoom {} -> {})",
                        pair[0].zoom, pair[1].zoom
                    ),
                ));
            }
        }

        Ok(Self {
            name,
            srid,
            bounds,
            levels,
        })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, zoom: u32) -> Option<&Level> {
        self.levels.iter().find(|level| level.zoom == zoom)
    }

    /// Upper-left corner of every tile matrix.
    pub fn origin(&self) -> GridOrigin {
        GridOrigin::top_left(&self.bounds)
    }

    /// Finest level as declared in the catalog, whether populated or not.
    pub fn finest_level(&self) -> Option<&Level> {
        self.levels.last()
    }

    /// Highest-resolution level with at least one stored tile.
    pub fn finest_populated_level(&self) -> Option<&Level> {
        let mut best: Option<&Level> = None;
        for level in self.levels.iter().filter(|l| l.has_tiles()) {
            if best.map_or(true, |b| level.pixel_size_x < b.pixel_size_x) {
                best = Some(level);
            }
        }
        best
    }

    /// Populated level whose x pixel size is closest to `resolution`.
    ///
    /// Ties go to the level met first in ascending zoom order, i.e. the
    /// coarser one.
    pub fn nearest_populated_level(&self, resolution: f64) -> Option<&Level> {
        let mut best: Option<&Level> = None;
        let mut difference = f64::MAX;
        for level in self.levels.iter().filter(|l| l.has_tiles()) {
            let candidate = (resolution - level.pixel_size_x).abs();
            if candidate < difference {
                difference = candidate;
                best = Some(level);
            }
        }
        best
    }

    /// Pick the level to read for a request.
    ///
    /// With both an envelope and a pixel width the level nearest the
    /// requested horizontal resolution wins; otherwise the finest populated
    /// level. `None` means no level holds any tile.
    pub fn select_level(
        &self,
        requested: Option<&BoundingBox>,
        pixel_width: Option<u32>,
    ) -> Option<&Level> {
        if let (Some(envelope), Some(width)) = (requested, pixel_width) {
            if width > 0 {
                let horizontal_resolution = envelope.width() / width as f64;
                if let Some(level) = self.nearest_populated_level(horizontal_resolution) {
                    debug!(
                        pyramid = %self.name,
                        resolution = horizontal_resolution,
                        zoom = level.zoom,
                        "Matched requested resolution"
                    );
                    return Some(level);
                }
            }
        }
        self.finest_populated_level()
    }

    /// Full footprint of the pyramid.
    pub fn original_envelope(&self) -> BoundingBox {
        self.bounds
    }

    /// Pixel dimensions of the finest level's matrix.
    pub fn original_grid_range(&self) -> Option<(u64, u64)> {
        self.finest_level().map(Level::grid_size)
    }

    /// Pixel size (x, y) of the finest level.
    pub fn highest_resolution(&self) -> Option<(f64, f64)> {
        self.finest_level()
            .map(|level| (level.pixel_size_x, level.pixel_size_y))
    }
}
