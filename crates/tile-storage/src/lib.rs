//! Tile storage for raster pyramids.
//!
//! Provides the [`TileStore`] / [`TileCursor`] seam the reader pulls tiles
//! through, plus two stores:
//! - [`MemoryTileStore`]: tiles held in memory, tracks open cursors
//! - [`DirectoryTileStore`]: `catalog.json` plus `{table}/{zoom}/{col}/{row}.{ext}` files

pub mod directory;
pub mod error;
pub mod memory;
pub mod store;

pub use directory::{
    CatalogFile, CoverageEntry, DirectoryTileStore, DirectoryTileWriter, TileFormat, CATALOG_FILE,
};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryTileStore;
pub use store::{CursorGuard, StoredTile, TileCursor, TileStore};
