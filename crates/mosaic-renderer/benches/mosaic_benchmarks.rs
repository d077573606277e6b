//! Benchmarks for tile compositing, PNG encoding and indexed PNG decoding.
//!
//! Run with: cargo bench --package mosaic-renderer -- compose
//! Or: cargo bench --package mosaic-renderer --bench mosaic_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{DynamicImage, RgbImage};
use mosaic_common::{GridOrigin, Level, TileIndexRange};
use mosaic_renderer::{compose, png, PalettedImage, TileImage};

const TILE: u32 = 256;

fn level() -> Level {
    Level {
        zoom: 4,
        pixel_size_x: 1.0,
        pixel_size_y: 1.0,
        tile_width: TILE,
        tile_height: TILE,
        matrix_width: 16,
        matrix_height: 16,
        tile_count: 256,
    }
}

/// Banded paletted tile, the typical shape of classified raster tiles.
fn paletted_tile(seed: usize) -> TileImage {
    let palette: Vec<[u8; 4]> = (0..32)
        .map(|i| [(i * 8) as u8, (255 - i * 8) as u8, (seed * 40 % 256) as u8, 255])
        .collect();
    let indices = (0..(TILE * TILE) as usize)
        .map(|i| (((i / TILE as usize) / 8 + seed) % 32) as u8)
        .collect();
    TileImage::Paletted(PalettedImage::new(TILE, TILE, palette, indices).unwrap())
}

fn rgb_tile(seed: usize) -> TileImage {
    TileImage::Direct(DynamicImage::ImageRgb8(RgbImage::from_fn(TILE, TILE, |x, y| {
        image::Rgb([(x as usize + seed) as u8, y as u8, (x ^ y) as u8])
    })))
}

fn tile_grid(side: i64) -> Vec<(i64, i64, TileImage)> {
    let mut tiles = Vec::new();
    for row in 0..side {
        for col in 0..side {
            let seed = (row * side + col) as usize;
            let image = if seed % 2 == 0 {
                paletted_tile(seed)
            } else {
                rgb_tile(seed)
            };
            tiles.push((col, row, image));
        }
    }
    tiles
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let level = level();
    let origin = GridOrigin::new(0.0, 4096.0);

    for side in [2i64, 3, 4] {
        let tiles = tile_grid(side);
        let range = TileIndexRange::new(0, 0, side - 1, side - 1);

        group.throughput(Throughput::Elements((side * side) as u64));
        group.bench_with_input(
            BenchmarkId::new("mixed_tiles", format!("{}x{}", side, side)),
            &tiles,
            |b, tiles| {
                b.iter(|| {
                    compose(range, &level, origin, None, black_box(tiles.clone())).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_png_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_png");

    let TileImage::Paletted(tile) = paletted_tile(3) else {
        unreachable!()
    };
    let encoded =
        png::create_png_indexed(TILE as usize, TILE as usize, tile.palette(), tile.indices())
            .unwrap();

    group.throughput(Throughput::Bytes((TILE * TILE) as u64));
    group.bench_function("encode_256", |b| {
        b.iter(|| {
            png::create_png_indexed(
                TILE as usize,
                TILE as usize,
                black_box(tile.palette()),
                black_box(tile.indices()),
            )
        });
    });
    group.bench_function("decode_256", |b| {
        b.iter(|| png::decode_indexed(black_box(&encoded)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_compose, bench_png_roundtrip);
criterion_main!(benches);
