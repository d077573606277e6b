//! Common pyramid fixtures.
//!
//! Every fixture uses square ground pixels and a pyramid envelope that the
//! finest level's matrix covers exactly, so tile envelopes come out on round
//! numbers.

use mosaic_common::{BoundingBox, Level, Pyramid};

/// Common envelopes for testing.
pub mod bbox {
    use mosaic_common::BoundingBox;

    /// Envelope of [`super::example_pyramid`].
    pub const EXAMPLE: BoundingBox = BoundingBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 100.0,
        max_y: 100.0,
    };

    /// Envelope of [`super::three_level_pyramid`].
    pub const THREE_LEVEL: BoundingBox = BoundingBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 160.0,
        max_y: 160.0,
    };

    /// Web Mercator world extent.
    pub const WEB_MERCATOR: BoundingBox = BoundingBox {
        min_x: -20037508.342789244,
        min_y: -20037508.342789244,
        max_x: 20037508.342789244,
        max_y: 20037508.342789244,
    };
}

/// A level with square pixels and square tiles. `tile_count` is left at 0;
/// stores fill it in from their contents.
pub fn level(zoom: u32, pixel_size: f64, tile_size: u32, matrix: u32) -> Level {
    Level {
        zoom,
        pixel_size_x: pixel_size,
        pixel_size_y: pixel_size,
        tile_width: tile_size,
        tile_height: tile_size,
        matrix_width: matrix,
        matrix_height: matrix,
        tile_count: 0,
    }
}

/// Single level pyramid over (0,0)-(100,100): pixel size 1.0, 10x10 pixel
/// tiles, 10x10 matrix.
pub fn example_pyramid(name: &str) -> Pyramid {
    Pyramid::new(name, 3857, bbox::EXAMPLE, vec![level(0, 1.0, 10, 10)])
        .expect("example pyramid is valid")
}

/// Three levels over (0,0)-(160,160) with 10x10 pixel tiles:
///
/// | zoom | pixel size | matrix |
/// |------|------------|--------|
/// | 0    | 4.0        | 4x4    |
/// | 1    | 2.0        | 8x8    |
/// | 2    | 1.0        | 16x16  |
pub fn three_level_pyramid(name: &str) -> Pyramid {
    Pyramid::new(
        name,
        3857,
        bbox::THREE_LEVEL,
        vec![
            level(0, 4.0, 10, 4),
            level(1, 2.0, 10, 8),
            level(2, 1.0, 10, 16),
        ],
    )
    .expect("three level pyramid is valid")
}

/// Same layout as [`example_pyramid`] with a caller-chosen EPSG identifier.
pub fn pyramid_with_srid(name: &str, srid: i32) -> Pyramid {
    Pyramid::new(name, srid, bbox::EXAMPLE, vec![level(0, 1.0, 10, 10)])
        .expect("example pyramid is valid")
}

/// A power-of-two Web Mercator pyramid with 256 pixel tiles, `levels` deep.
pub fn web_mercator_pyramid(name: &str, levels: u32) -> Pyramid {
    let world = bbox::WEB_MERCATOR.width();
    let levels = (0..levels)
        .map(|zoom| {
            let matrix = 1u32 << zoom;
            level(zoom, world / (256.0 * matrix as f64), 256, matrix)
        })
        .collect();
    Pyramid::new(name, 3857, bbox::WEB_MERCATOR, levels).expect("mercator pyramid is valid")
}

/// Envelope of the tile at `col`/`row` of `pyramid`'s level `zoom`.
pub fn tile_bbox(pyramid: &Pyramid, zoom: u32, col: i64, row: i64) -> BoundingBox {
    let level = pyramid.level(zoom).expect("zoom level exists");
    level.tile_span().tile_envelope(pyramid.origin(), col, row)
}
