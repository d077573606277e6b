//! Placement and overlay of decoded tiles into one raster.
//!
//! Tiles are placed by exact translation: the canvas covers the bounding
//! rectangle of the placed tiles, and the tile at `col`/`row` lands at
//! `((col - min_col) * tile_width, (row - min_row) * tile_height)`. No
//! resampling is done.
//!
//! A mosaic of one tile hands that tile back untouched, palette included.
//! Several tiles are normalised to RGBA8 and overlaid in `(row, col)` order
//! onto a transparent canvas. A source pixel wins whenever its alpha is
//! non-zero; a fully transparent source pixel is still copied onto canvas
//! that nothing has covered yet, so its colour samples survive.

use image::{DynamicImage, RgbaImage};
use mosaic_common::{BoundingBox, Crs, GridOrigin, Level, TileIndexRange, TileSpan};
use serde::Serialize;
use tracing::debug;

use crate::{RenderError, RenderResult, TileImage};

/// A composited raster and where it sits on the ground.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: TileImage,
    /// Union of the envelopes of every placed tile
    pub envelope: BoundingBox,
    /// Zoom level the tiles were read from
    pub zoom: u32,
    /// `None` when the pyramid's reference system could not be resolved
    pub crs: Option<Crs>,
}

impl CompositeResult {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Ground units per output pixel along x and y.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.envelope.width() / self.width() as f64,
            self.envelope.height() / self.height() as f64,
        )
    }

    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        self.image.encode_png()
    }

    /// Georeferencing summary, written next to exported images.
    pub fn metadata(&self) -> CompositeMetadata {
        CompositeMetadata {
            envelope: self.envelope,
            zoom: self.zoom,
            width: self.width(),
            height: self.height(),
            crs: self.crs.as_ref().map(|crs| crs.to_string()),
        }
    }
}

/// Serializable description of a [`CompositeResult`] without its pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeMetadata {
    pub envelope: BoundingBox,
    pub zoom: u32,
    pub width: u32,
    pub height: u32,
    pub crs: Option<String>,
}

struct PlacedTile {
    col: i64,
    row: i64,
    image: TileImage,
}

/// Accumulates decoded tiles of one level and composites them.
pub struct Mosaic {
    range: TileIndexRange,
    origin: GridOrigin,
    span: TileSpan,
    zoom: u32,
    tile_width: u32,
    tile_height: u32,
    crs: Option<Crs>,
    tiles: Vec<PlacedTile>,
}

impl Mosaic {
    pub fn new(range: TileIndexRange, level: &Level, origin: GridOrigin, crs: Option<Crs>) -> Self {
        Self {
            range,
            origin,
            span: level.tile_span(),
            zoom: level.zoom,
            tile_width: level.tile_width,
            tile_height: level.tile_height,
            crs,
            tiles: Vec::new(),
        }
    }

    pub fn place(&mut self, col: i64, row: i64, image: TileImage) {
        self.tiles.push(PlacedTile { col, row, image });
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Ground envelope of the tile at `col`/`row`.
    pub fn tile_envelope(&self, col: i64, row: i64) -> BoundingBox {
        self.span.tile_envelope(self.origin, col, row)
    }

    /// Pixel offset of a tile relative to the range's top-left corner.
    ///
    /// `None` when the offset does not fit an `i64`, which happens for ranges
    /// derived from envelopes far outside the pyramid.
    pub fn pixel_offset(&self, col: i64, row: i64) -> Option<(i64, i64)> {
        let x = col
            .checked_sub(self.range.left)?
            .checked_mul(self.tile_width as i64)?;
        let y = row
            .checked_sub(self.range.top)?
            .checked_mul(self.tile_height as i64)?;
        Some((x, y))
    }

    /// Composite everything placed so far. `None` when nothing was placed.
    pub fn finish(mut self) -> RenderResult<Option<CompositeResult>> {
        self.tiles.sort_by_key(|tile| (tile.row, tile.col));

        let Some(first) = self.tiles.first() else {
            return Ok(None);
        };

        let mut envelope = self.tile_envelope(first.col, first.row);
        for tile in &self.tiles[1..] {
            envelope.expand_to_include(&self.tile_envelope(tile.col, tile.row));
        }

        if self.tiles.len() == 1 {
            let tile = self.tiles.remove(0);
            debug!(zoom = self.zoom, col = tile.col, row = tile.row, "Single tile mosaic");
            return Ok(Some(CompositeResult {
                image: tile.image,
                envelope,
                zoom: self.zoom,
                crs: self.crs,
            }));
        }

        let canvas = self.overlay()?;
        debug!(
            zoom = self.zoom,
            range = %self.range,
            tiles = self.tiles.len(),
            width = canvas.width(),
            height = canvas.height(),
            "Composited mosaic"
        );

        Ok(Some(CompositeResult {
            image: TileImage::Direct(DynamicImage::ImageRgba8(canvas)),
            envelope,
            zoom: self.zoom,
            crs: self.crs,
        }))
    }

    fn overlay(&self) -> RenderResult<RgbaImage> {
        let (min_col, max_col, min_row, max_row) = self.tiles.iter().fold(
            (i64::MAX, i64::MIN, i64::MAX, i64::MIN),
            |(c0, c1, r0, r1), tile| {
                (c0.min(tile.col), c1.max(tile.col), r0.min(tile.row), r1.max(tile.row))
            },
        );

        let cells = |min: i64, max: i64| max.checked_sub(min).and_then(|d| d.checked_add(1));
        let (Some(cols), Some(rows)) = (cells(min_col, max_col), cells(min_row, max_row)) else {
            return Err(RenderError::InvalidRaster(format!(
                "tiles span columns {}..={} and rows {}..={}",
                min_col, max_col, min_row, max_row
            )));
        };

        let width = cols as u64 * self.tile_width as u64;
        let height = rows as u64 * self.tile_height as u64;
        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(RenderError::InvalidRaster(format!(
                    "mosaic canvas {}x{} exceeds the addressable size",
                    width, height
                )))
            }
        };

        let mut canvas = RgbaImage::new(width, height);

        for tile in &self.tiles {
            // In range: the canvas fits u32 and every tile lies inside it
            let px = (tile.col - min_col) as u32 * self.tile_width;
            let py = (tile.row - min_row) as u32 * self.tile_height;
            let rgba = tile.image.to_rgba8();

            // Clip to the tile cell
            let copy_w = rgba.width().min(self.tile_width);
            let copy_h = rgba.height().min(self.tile_height);

            for y in 0..copy_h {
                for x in 0..copy_w {
                    let src = rgba.get_pixel(x, y);
                    let dst = canvas.get_pixel_mut(px + x, py + y);
                    if src.0[3] != 0 || dst.0[3] == 0 {
                        *dst = *src;
                    }
                }
            }
        }

        Ok(canvas)
    }
}

/// Composite `(col, row, image)` triples in one call.
pub fn compose(
    range: TileIndexRange,
    level: &Level,
    origin: GridOrigin,
    crs: Option<Crs>,
    tiles: impl IntoIterator<Item = (i64, i64, TileImage)>,
) -> RenderResult<Option<CompositeResult>> {
    let mut mosaic = Mosaic::new(range, level, origin, crs);
    for (col, row, image) in tiles {
        mosaic.place(col, row, image);
    }
    mosaic.finish()
}
