//! The pyramid reader.

use std::sync::Arc;

use mosaic_common::{
    tile_range, BoundingBox, Crs, CrsResolver, EdgeTrim, EpsgRegistry, Level, Pyramid,
    TileIndexRange,
};
use mosaic_renderer::{ImageTileDecoder, Mosaic, TileDecoder, TileImage};
use rayon::prelude::*;
use tile_storage::{StoredTile, TileStore};
use tracing::{debug, info, instrument, warn};

use crate::{ReadOutcome, ReadRequest, ReaderConfig, ReaderError, ReaderResult};

/// Catalog entry cached at open time.
struct Coverage {
    pyramid: Pyramid,
    crs: Option<Crs>,
}

/// Reads composited rasters out of the coverages of one tile store.
///
/// The catalog is loaded once by [`PyramidReader::open`]; reads only touch
/// the store to pull tiles. The reader is `Send + Sync` and can serve
/// concurrent reads.
pub struct PyramidReader {
    store: Arc<dyn TileStore>,
    decoder: Arc<dyn TileDecoder>,
    config: ReaderConfig,
    coverages: Vec<Coverage>,
}

impl PyramidReader {
    /// Load the store's catalog and resolve each coverage's reference system.
    ///
    /// Coverages whose EPSG identifier cannot be resolved stay readable and
    /// report no CRS.
    pub fn open(
        store: Arc<dyn TileStore>,
        decoder: Arc<dyn TileDecoder>,
        resolver: &dyn CrsResolver,
        config: ReaderConfig,
    ) -> ReaderResult<Self> {
        config.validate()?;

        let names = store.coverage_names();
        if names.is_empty() {
            warn!("Tile store holds no coverages");
            return Err(ReaderError::InvalidCoverageName(String::new()));
        }

        let mut coverages = Vec::with_capacity(names.len());
        for name in names {
            let pyramid = store.pyramid(&name)?;
            let crs = match resolver.resolve(pyramid.srid) {
                Ok(crs) => {
                    if !crs.valid_bounds().contains(&pyramid.bounds) {
                        warn!(
                            coverage = %name,
                            crs = %crs,
                            bounds = ?pyramid.bounds,
                            "Pyramid envelope extends past the valid area of its reference system"
                        );
                    }
                    Some(crs)
                }
                Err(e) => {
                    warn!(
                        coverage = %name,
                        srid = pyramid.srid,
                        error = %e,
                        "Reference system unresolvable, reading without CRS"
                    );
                    None
                }
            };
            debug!(
                coverage = %name,
                levels = pyramid.levels().len(),
                crs = ?crs.as_ref().map(|c| c.to_string()),
                "Loaded coverage"
            );
            coverages.push(Coverage { pyramid, crs });
        }

        info!(
            coverages = coverages.len(),
            default = %coverages[0].pyramid.name,
            "Pyramid reader ready"
        );

        Ok(Self {
            store,
            decoder,
            config,
            coverages,
        })
    }

    /// Open with the bundled decoder, the EPSG registry and default settings.
    pub fn with_defaults(store: Arc<dyn TileStore>) -> ReaderResult<Self> {
        Self::open(
            store,
            Arc::new(ImageTileDecoder::new()),
            &EpsgRegistry,
            ReaderConfig::default(),
        )
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn coverage_names(&self) -> Vec<&str> {
        self.coverages
            .iter()
            .map(|c| c.pyramid.name.as_str())
            .collect()
    }

    pub fn coverage_count(&self) -> usize {
        self.coverages.len()
    }

    /// First coverage in catalog order.
    pub fn default_coverage(&self) -> &str {
        &self.coverages[0].pyramid.name
    }

    pub fn pyramid(&self, name: &str) -> ReaderResult<&Pyramid> {
        self.coverage(name).map(|c| &c.pyramid)
    }

    pub fn original_envelope(&self, name: &str) -> ReaderResult<BoundingBox> {
        Ok(self.pyramid(name)?.original_envelope())
    }

    /// Pixel dimensions of the finest level of `name`.
    pub fn original_grid_range(&self, name: &str) -> ReaderResult<Option<(u64, u64)>> {
        Ok(self.pyramid(name)?.original_grid_range())
    }

    pub fn highest_resolution(&self, name: &str) -> ReaderResult<Option<(f64, f64)>> {
        Ok(self.pyramid(name)?.highest_resolution())
    }

    /// Resolved reference system of `name`, `None` when unresolvable.
    pub fn crs(&self, name: &str) -> ReaderResult<Option<Crs>> {
        self.coverage(name).map(|c| c.crs.clone())
    }

    /// Read from the default coverage.
    pub fn read(&self, request: &ReadRequest) -> ReaderResult<ReadOutcome> {
        self.read_coverage(self.default_coverage(), request)
    }

    /// Read `request` from coverage `name`.
    #[instrument(skip(self), fields(coverage = %name))]
    pub fn read_coverage(&self, name: &str, request: &ReadRequest) -> ReaderResult<ReadOutcome> {
        let coverage = self.coverage(name)?;
        request.validate()?;

        let pyramid = &coverage.pyramid;
        let Some(level) = pyramid.select_level(request.envelope.as_ref(), request.width) else {
            info!("No level holds any tile");
            return Ok(ReadOutcome::Empty);
        };

        // Explicit requests keep a trailing tile whose edge sits on the
        // envelope; whole-pyramid reads drop it.
        let (envelope, trim) = match request.envelope {
            Some(envelope) => (envelope, EdgeTrim::Overhang),
            None => (pyramid.original_envelope(), EdgeTrim::Flush),
        };
        let range = tile_range(&envelope, pyramid.origin(), level.tile_span(), trim);
        debug!(zoom = level.zoom, range = %range, "Selected level and tile range");

        self.check_output_budget(level, &range)?;

        let tiles: Vec<StoredTile> = {
            let cursor = self.store.open_cursor(name, level.zoom, &range)?;
            cursor.collect::<Result<_, _>>()?
        };

        let decoded = self.decode_tiles(tiles)?;
        let tile_count = decoded.len();

        let mut mosaic = Mosaic::new(range, level, pyramid.origin(), coverage.crs.clone());
        for (col, row, image) in decoded {
            mosaic.place(col, row, image);
        }

        match mosaic.finish()? {
            Some(result) => {
                info!(
                    zoom = result.zoom,
                    tiles = tile_count,
                    width = result.width(),
                    height = result.height(),
                    "Read composited"
                );
                Ok(ReadOutcome::Coverage(result))
            }
            None => {
                info!(zoom = level.zoom, range = %range, "No stored tiles in range");
                Ok(ReadOutcome::Empty)
            }
        }
    }

    fn coverage(&self, name: &str) -> ReaderResult<&Coverage> {
        self.coverages
            .iter()
            .find(|c| c.pyramid.name == name)
            .ok_or_else(|| ReaderError::InvalidCoverageName(name.to_string()))
    }

    /// Reject ranges whose in-matrix part would composite above the budget.
    fn check_output_budget(&self, level: &Level, range: &TileIndexRange) -> ReaderResult<()> {
        let Some(clamped) = range.clamped(level.matrix_width, level.matrix_height) else {
            return Ok(());
        };

        let width = clamped.width().saturating_mul(level.tile_width as u64);
        let height = clamped.height().saturating_mul(level.tile_height as u64);
        if width.saturating_mul(height) > self.config.max_output_pixels {
            return Err(ReaderError::OutputTooLarge {
                width,
                height,
                limit: self.config.max_output_pixels,
            });
        }
        Ok(())
    }

    fn decode_tiles(&self, tiles: Vec<StoredTile>) -> ReaderResult<Vec<(i64, i64, TileImage)>> {
        let decode = |tile: &StoredTile| {
            self.decoder
                .decode(&tile.data)
                .map(|image| (tile.col, tile.row, image))
                .map_err(|source| ReaderError::TileDecode {
                    coord: tile.coord(),
                    source,
                })
        };

        if self.config.decode_in_parallel(tiles.len()) {
            debug!(tiles = tiles.len(), "Decoding tiles in parallel");
            tiles.par_iter().map(decode).collect()
        } else {
            tiles.iter().map(decode).collect()
        }
    }
}
