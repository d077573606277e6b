//! Multi-resolution tile pyramid reader.
//!
//! Turns a read request (an optional envelope plus an optional output size)
//! into one composited raster: pick the zoom level, compute the tile window,
//! pull the tiles through a [`tile_storage::TileStore`] cursor, decode them and
//! overlay them with [`mosaic_renderer::Mosaic`].
//!
//! # Example
//!
//! ```ignore
//! use pyramid_reader::{PyramidReader, ReadOutcome, ReadRequest};
//! use tile_storage::DirectoryTileStore;
//!
//! let store = DirectoryTileStore::open("/data/pyramid")?;
//! let reader = PyramidReader::with_defaults(std::sync::Arc::new(store))?;
//! match reader.read(&ReadRequest::full())? {
//!     ReadOutcome::Coverage(result) => println!("{:?}", result.envelope),
//!     ReadOutcome::Empty => println!("no tiles"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod reader;
pub mod request;

pub use config::ReaderConfig;
pub use error::{ReaderError, ReaderResult};
pub use reader::PyramidReader;
pub use request::{ReadOutcome, ReadRequest};
