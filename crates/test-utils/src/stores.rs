//! Store builders.

use std::path::Path;

use mosaic_common::{Pyramid, TileIndexRange};
use tile_storage::{DirectoryTileStore, DirectoryTileWriter, MemoryTileStore, TileFormat};

/// One tile to seed a store with: `(zoom, col, row, bytes)`.
pub type SeedTile = (u32, i64, i64, Vec<u8>);

/// A memory store holding one coverage.
pub fn memory_store(pyramid: Pyramid, tiles: impl IntoIterator<Item = SeedTile>) -> MemoryTileStore {
    let name = pyramid.name.clone();
    let mut store = MemoryTileStore::new();
    store.add_coverage(pyramid);
    for (zoom, col, row, data) in tiles {
        store
            .insert_tile(&name, zoom, col, row, data)
            .expect("seed tile lies on a defined level");
    }
    store
}

/// Seed every position of `range` at `zoom` with `make(col, row)`.
pub fn fill_range(
    store: &mut MemoryTileStore,
    name: &str,
    zoom: u32,
    range: TileIndexRange,
    make: impl Fn(i64, i64) -> Vec<u8>,
) {
    for row in range.rows() {
        for col in range.columns() {
            store
                .insert_tile(name, zoom, col, row, make(col, row))
                .expect("seed tile lies on a defined level");
        }
    }
}

/// Write one coverage to `root` in the directory layout and open it.
pub fn directory_store(
    root: &Path,
    pyramid: &Pyramid,
    format: TileFormat,
    tiles: impl IntoIterator<Item = SeedTile>,
) -> DirectoryTileStore {
    let mut writer = DirectoryTileWriter::create(root).expect("create pyramid directory");
    writer
        .add_coverage(pyramid, format)
        .expect("coverage name is usable");
    for (zoom, col, row, data) in tiles {
        writer
            .put_tile(&pyramid.name, zoom, col, row, &data)
            .expect("write tile");
    }
    writer.finish().expect("write catalog")
}
