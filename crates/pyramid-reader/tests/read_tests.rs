//! End-to-end reads through memory and directory stores.

use std::sync::Arc;

use mosaic_common::{
    BoundingBox, Crs, CrsCode, CrsResolver, EpsgRegistry, MosaicError, MosaicResult,
    TileIndexRange,
};
use mosaic_renderer::{ColorModel, ImageTileDecoder, TileDecoder, TileImage};
use pyramid_reader::{PyramidReader, ReadOutcome, ReadRequest, ReaderConfig, ReaderError};
use tempfile::TempDir;
use test_utils::{
    assert_bbox_approx_eq, coordinate_rgba_png, corrupt_tile, directory_store, example_pyramid,
    fill_range, memory_store, pyramid_with_srid, solid_gray_png, solid_indexed_png, solid_jpeg,
    solid_rgb_png, solid_rgba_png, striped_indexed_png, three_level_pyramid,
};
use tile_storage::{MemoryTileStore, StorageError, TileFormat};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 3] = [0, 255, 0];

fn reader_for(store: &Arc<MemoryTileStore>) -> PyramidReader {
    PyramidReader::with_defaults(store.clone()).unwrap()
}

fn reader_with_config(store: &Arc<MemoryTileStore>, config: ReaderConfig) -> PyramidReader {
    PyramidReader::open(
        store.clone(),
        Arc::new(ImageTileDecoder::new()),
        &EpsgRegistry,
        config,
    )
    .unwrap()
}

/// Example pyramid with every one of its 100 tiles stored.
fn full_example_store() -> Arc<MemoryTileStore> {
    let mut store = memory_store(example_pyramid("example"), []);
    fill_range(
        &mut store,
        "example",
        0,
        TileIndexRange::new(0, 0, 9, 9),
        |col, row| coordinate_rgba_png(10, 10, (row * 10 + col) as u8),
    );
    Arc::new(store)
}

fn expect_coverage(outcome: ReadOutcome) -> mosaic_renderer::CompositeResult {
    match outcome {
        ReadOutcome::Coverage(result) => result,
        ReadOutcome::Empty => panic!("expected a coverage, got Empty"),
    }
}

// ============================================================================
// Catalog and metadata
// ============================================================================

#[test]
fn test_metadata_accessors() {
    let store = Arc::new(memory_store(
        three_level_pyramid("levels"),
        [(1, 0, 0, solid_rgb_png(10, 10, GREEN))],
    ));
    let reader = reader_for(&store);

    assert_eq!(reader.coverage_names(), vec!["levels"]);
    assert_eq!(reader.coverage_count(), 1);
    assert_eq!(reader.default_coverage(), "levels");
    assert_eq!(
        reader.original_envelope("levels").unwrap(),
        BoundingBox::new(0.0, 0.0, 160.0, 160.0)
    );
    assert_eq!(reader.original_grid_range("levels").unwrap(), Some((160, 160)));
    assert_eq!(reader.highest_resolution("levels").unwrap(), Some((1.0, 1.0)));
    assert_eq!(
        reader.crs("levels").unwrap(),
        Some(Crs::new(CrsCode::Epsg3857))
    );
}

#[test]
fn test_empty_store_is_rejected() {
    let store: Arc<MemoryTileStore> = Arc::new(MemoryTileStore::new());
    let err = PyramidReader::with_defaults(store).err().unwrap();
    assert!(matches!(err, ReaderError::InvalidCoverageName(_)));
}

#[test]
fn test_invalid_coverage_name_before_store_access() {
    let store = full_example_store();
    let reader = reader_for(&store);

    let err = reader
        .read_coverage("nope", &ReadRequest::full())
        .unwrap_err();
    assert!(matches!(err, ReaderError::InvalidCoverageName(ref n) if n == "nope"));
    assert!(matches!(
        reader.original_envelope("nope"),
        Err(ReaderError::InvalidCoverageName(_))
    ));
    assert_eq!(store.cursors_opened(), 0);
}

#[test]
fn test_default_coverage_is_first_in_catalog() {
    let mut store = MemoryTileStore::new();
    store.add_coverage(example_pyramid("first"));
    store.add_coverage(example_pyramid("second"));
    store
        .insert_tile("second", 0, 0, 0, solid_rgb_png(10, 10, GREEN))
        .unwrap();
    let store = Arc::new(store);
    let reader = reader_for(&store);

    assert_eq!(reader.default_coverage(), "first");
    assert!(reader.read(&ReadRequest::full()).unwrap().is_empty());
    assert!(!reader
        .read_coverage("second", &ReadRequest::full())
        .unwrap()
        .is_empty());
}

// ============================================================================
// Zoom selection
// ============================================================================

#[test]
fn test_full_read_uses_finest_populated_level() {
    // Zoom 2 is declared but holds no tiles
    let store = Arc::new(memory_store(
        three_level_pyramid("levels"),
        [
            (0, 0, 0, solid_rgb_png(10, 10, GREEN)),
            (1, 0, 0, solid_rgb_png(10, 10, GREEN)),
            (1, 1, 0, solid_rgb_png(10, 10, GREEN)),
        ],
    ));
    let reader = reader_for(&store);

    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());
    assert_eq!(result.zoom, 1);
    assert_eq!((result.width(), result.height()), (20, 10));
}

#[test]
fn test_requested_resolution_picks_matching_level() {
    let mut store = memory_store(three_level_pyramid("levels"), []);
    for zoom in 0..3 {
        store
            .insert_tile("levels", zoom, 0, 0, solid_rgb_png(10, 10, GREEN))
            .unwrap();
    }
    let store = Arc::new(store);
    let reader = reader_for(&store);
    let envelope = BoundingBox::new(0.0, 0.0, 160.0, 160.0);

    for (width, zoom) in [(40, 0), (80, 1), (160, 2), (1000, 2), (10, 0)] {
        let request = ReadRequest::for_envelope(envelope).with_width(width);
        let result = expect_coverage(reader.read(&request).unwrap());
        assert_eq!(result.zoom, zoom, "width {}", width);
    }
}

#[test]
fn test_no_populated_level_is_empty_without_cursor() {
    let store = Arc::new(memory_store(example_pyramid("example"), []));
    let reader = reader_for(&store);

    assert!(reader.read(&ReadRequest::full()).unwrap().is_empty());
    assert_eq!(store.cursors_opened(), 0);
}

#[test]
fn test_zero_width_is_invalid_request() {
    let store = full_example_store();
    let reader = reader_for(&store);
    let request = ReadRequest::for_envelope(BoundingBox::new(0.0, 0.0, 10.0, 10.0)).with_width(0);

    assert!(matches!(
        reader.read(&request),
        Err(ReaderError::InvalidRequest(_))
    ));
}

// ============================================================================
// Tile ranges
// ============================================================================

#[test]
fn test_explicit_request_reads_trimmed_range() {
    let store = full_example_store();
    let reader = reader_for(&store);
    let request = ReadRequest::for_envelope(BoundingBox::new(5.0, 5.0, 15.0, 15.0));

    let result = expect_coverage(reader.read(&request).unwrap());

    // Columns {0, 1}, rows {8, 9}
    assert_eq!(result.envelope, BoundingBox::new(0.0, 0.0, 20.0, 20.0));
    assert_eq!((result.width(), result.height()), (20, 20));

    // Canvas (0, 0) is tile (0, 8); coordinate tiles carry their seed in blue
    let rgba = result.image.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 80, 255]);
    assert_eq!(rgba.get_pixel(13, 4).0, [3, 4, 81, 255]);
    assert_eq!(rgba.get_pixel(19, 19).0, [9, 9, 91, 255]);
}

#[test]
fn test_full_read_covers_whole_matrix() {
    let store = full_example_store();
    let reader = reader_for(&store);

    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());

    assert_eq!(result.envelope, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!((result.width(), result.height()), (100, 100));
    assert_eq!(result.resolution(), (1.0, 1.0));
    assert_eq!(result.image.to_rgba8().get_pixel(95, 95).0, [5, 5, 99, 255]);
}

#[test]
fn test_partial_pixel_overlap_keeps_edge_tile() {
    let store = full_example_store();
    let reader = reader_for(&store);
    // Reaches 0.5 units into column 9
    let request = ReadRequest::for_envelope(BoundingBox::new(80.0, 40.0, 90.5, 50.0));

    let result = expect_coverage(reader.read(&request).unwrap());
    assert_eq!(result.envelope.max_x, 100.0);
}

#[test]
fn test_request_outside_tiles_is_empty_and_releases_cursor() {
    let store = Arc::new(memory_store(
        example_pyramid("example"),
        [(0, 0, 0, solid_rgb_png(10, 10, GREEN))],
    ));
    let reader = reader_for(&store);
    let request = ReadRequest::for_envelope(BoundingBox::new(50.0, 50.0, 60.0, 60.0));

    assert!(matches!(reader.read(&request).unwrap(), ReadOutcome::Empty));
    assert_eq!(store.cursors_opened(), 1);
    assert_eq!(store.open_cursors(), 0);
}

// ============================================================================
// Compositing
// ============================================================================

#[test]
fn test_single_tile_is_returned_unchanged() {
    let bytes = striped_indexed_png(10, 10, [10, 20, 30, 255], [200, 100, 0, 128], 3);
    let store = Arc::new(memory_store(
        example_pyramid("example"),
        [(0, 1, 8, bytes.clone())],
    ));
    let reader = reader_for(&store);
    let request = ReadRequest::for_envelope(BoundingBox::new(12.0, 12.0, 18.0, 18.0));

    let result = expect_coverage(reader.read(&request).unwrap());

    assert_eq!(result.envelope, BoundingBox::new(10.0, 10.0, 20.0, 20.0));
    assert_eq!(result.image.color_model(), ColorModel::Paletted);
    let expected = ImageTileDecoder::new().decode(&bytes).unwrap();
    match (&result.image, &expected) {
        (TileImage::Paletted(got), TileImage::Paletted(want)) => assert_eq!(got, want),
        _ => panic!("palette was not preserved"),
    }
}

#[test]
fn test_mixed_colour_models_overlay_at_their_offsets() {
    let store = Arc::new(memory_store(
        example_pyramid("example"),
        [
            (0, 0, 0, solid_indexed_png(10, 10, RED)),
            (0, 1, 0, solid_rgb_png(10, 10, GREEN)),
            (0, 0, 1, solid_gray_png(10, 10, 77)),
            (0, 1, 1, solid_rgba_png(10, 10, [0, 0, 255, 128])),
        ],
    ));
    let reader = reader_for(&store);

    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());

    assert_eq!(result.envelope, BoundingBox::new(0.0, 80.0, 20.0, 100.0));
    let rgba = result.image.to_rgba8();
    assert_eq!(rgba.dimensions(), (20, 20));
    assert_eq!(rgba.get_pixel(5, 5).0, RED);
    assert_eq!(rgba.get_pixel(15, 5).0, [0, 255, 0, 255]);
    assert_eq!(rgba.get_pixel(5, 15).0, [77, 77, 77, 255]);
    assert_eq!(rgba.get_pixel(15, 15).0, [0, 0, 255, 128]);
}

#[test]
fn test_gap_between_tiles_stays_transparent() {
    let store = Arc::new(memory_store(
        example_pyramid("example"),
        [
            (0, 0, 0, solid_indexed_png(10, 10, RED)),
            (0, 2, 0, solid_rgb_png(10, 10, GREEN)),
        ],
    ));
    let reader = reader_for(&store);

    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());
    let rgba = result.image.to_rgba8();

    assert_eq!(rgba.dimensions(), (30, 10));
    assert_eq!(rgba.get_pixel(15, 5).0, [0, 0, 0, 0]);
    assert_eq!(rgba.get_pixel(25, 5).0, [0, 255, 0, 255]);
}

#[test]
fn test_envelope_reaching_far_past_pyramid_composites_stored_tiles() {
    let store = Arc::new(memory_store(
        example_pyramid("example"),
        [
            (0, 0, 0, solid_indexed_png(10, 10, RED)),
            (0, 1, 0, solid_rgb_png(10, 10, GREEN)),
        ],
    ));
    let reader = reader_for(&store);

    let request = ReadRequest::for_envelope(BoundingBox::new(-1e300, 0.0, 100.0, 100.0));
    let result = expect_coverage(reader.read(&request).unwrap());
    let rgba = result.image.to_rgba8();

    assert_eq!(rgba.dimensions(), (20, 10));
    assert_eq!(rgba.get_pixel(0, 0).0, RED);
    assert_eq!(rgba.get_pixel(19, 9).0, [0, 255, 0, 255]);
    assert_bbox_approx_eq!(result.envelope, BoundingBox::new(0.0, 90.0, 20.0, 100.0), 1e-9);
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn test_parallel_decode_matches_sequential() {
    let mut store = memory_store(three_level_pyramid("levels"), []);
    fill_range(
        &mut store,
        "levels",
        2,
        TileIndexRange::new(0, 0, 15, 15),
        |col, row| {
            if (col + row) % 3 == 0 {
                solid_indexed_png(10, 10, [col as u8 * 10, row as u8 * 10, 7, 255])
            } else {
                coordinate_rgba_png(10, 10, (col * 16 + row) as u8)
            }
        },
    );
    let store = Arc::new(store);

    let parallel = reader_with_config(
        &store,
        ReaderConfig {
            parallel_decode: true,
            parallel_threshold: 1,
            ..Default::default()
        },
    );
    let sequential = reader_with_config(
        &store,
        ReaderConfig {
            parallel_decode: false,
            ..Default::default()
        },
    );

    let a = expect_coverage(parallel.read(&ReadRequest::full()).unwrap());
    let b = expect_coverage(sequential.read(&ReadRequest::full()).unwrap());

    assert_eq!(a.envelope, b.envelope);
    assert_eq!(a.image.to_rgba8().as_raw(), b.image.to_rgba8().as_raw());
    assert_eq!((a.width(), a.height()), (160, 160));
}

#[test]
fn test_output_budget_enforced_before_reading() {
    let store = full_example_store();
    let reader = reader_with_config(
        &store,
        ReaderConfig {
            max_output_pixels: 100,
            ..Default::default()
        },
    );

    let err = reader.read(&ReadRequest::full()).unwrap_err();
    assert!(matches!(
        err,
        ReaderError::OutputTooLarge {
            width: 100,
            height: 100,
            limit: 100
        }
    ));
    assert_eq!(store.cursors_opened(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_decode_failure_fails_read_and_releases_cursor() {
    for parallel_decode in [false, true] {
        let store = Arc::new(memory_store(
            example_pyramid("example"),
            [
                (0, 0, 0, solid_rgb_png(10, 10, GREEN)),
                (0, 1, 0, corrupt_tile()),
            ],
        ));
        let reader = reader_with_config(
            &store,
            ReaderConfig {
                parallel_decode,
                parallel_threshold: 1,
                ..Default::default()
            },
        );

        let err = reader.read(&ReadRequest::full()).unwrap_err();
        match err {
            ReaderError::TileDecode { coord, .. } => assert_eq!((coord.x, coord.y), (1, 0)),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.cursors_opened(), 1);
        assert_eq!(store.open_cursors(), 0);
    }
}

#[test]
fn test_storage_failure_fails_read_and_releases_cursor() {
    let mut store = memory_store(
        example_pyramid("example"),
        [
            (0, 0, 0, solid_rgb_png(10, 10, GREEN)),
            (0, 1, 0, solid_rgb_png(10, 10, GREEN)),
        ],
    );
    store.fail_tile("example", 0, 1, 0).unwrap();
    let store = Arc::new(store);
    let reader = reader_for(&store);

    let err = reader.read(&ReadRequest::full()).unwrap_err();
    assert!(matches!(
        err,
        ReaderError::Storage(StorageError::TileRead { .. })
    ));
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn test_unknown_srid_reads_without_crs() {
    let store = Arc::new(memory_store(
        pyramid_with_srid("osgb", 27700),
        [(0, 0, 0, solid_rgb_png(10, 10, GREEN))],
    ));
    let reader = reader_for(&store);

    assert_eq!(reader.crs("osgb").unwrap(), None);
    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());
    assert!(result.crs.is_none());
    assert!(result.metadata().crs.is_none());
}

struct FailingResolver;

impl CrsResolver for FailingResolver {
    fn resolve(&self, srid: i32) -> MosaicResult<Crs> {
        Err(MosaicError::UnresolvableCrs(srid))
    }
}

#[test]
fn test_failing_resolver_degrades_to_no_crs() {
    let store = Arc::new(memory_store(
        pyramid_with_srid("geo", 4326),
        [(0, 0, 0, solid_rgb_png(10, 10, GREEN))],
    ));
    let reader = PyramidReader::open(
        store.clone(),
        Arc::new(ImageTileDecoder::new()),
        &FailingResolver,
        ReaderConfig::default(),
    )
    .unwrap();

    let result = expect_coverage(reader.read(&ReadRequest::full()).unwrap());
    assert!(result.crs.is_none());

    let resolved = reader_for(&store);
    let result = expect_coverage(resolved.read(&ReadRequest::full()).unwrap());
    assert_eq!(result.crs, Some(Crs::new(CrsCode::Epsg4326)));
}

// ============================================================================
// Directory store
// ============================================================================

#[test]
fn test_directory_store_jpeg_read() {
    let dir = TempDir::new().unwrap();
    let pyramid = example_pyramid("photos");
    let store = directory_store(
        dir.path(),
        &pyramid,
        TileFormat::Jpeg,
        [
            (0, 0, 9, solid_jpeg(10, 10, [200, 30, 30])),
            (0, 1, 9, solid_jpeg(10, 10, [30, 30, 200])),
        ],
    );
    let reader = PyramidReader::with_defaults(Arc::new(store)).unwrap();

    // Overhang keeps the trailing column and row whose edge is on the request
    let request = ReadRequest::for_envelope(BoundingBox::new(0.0, 0.0, 20.0, 10.0));
    let result = expect_coverage(reader.read(&request).unwrap());

    assert_bbox_approx_eq!(result.envelope, BoundingBox::new(0.0, 0.0, 20.0, 10.0), 1e-9);
    let rgba = result.image.to_rgba8();
    assert_eq!(rgba.dimensions(), (20, 10));
    let left = rgba.get_pixel(4, 4).0;
    let right = rgba.get_pixel(15, 4).0;
    assert!(left[0] > 180 && left[2] < 50, "{:?}", left);
    assert!(right[2] > 180 && right[0] < 50, "{:?}", right);
    assert_eq!(left[3], 255);
}
