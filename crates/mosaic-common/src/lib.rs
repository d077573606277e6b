//! Common types shared across the tile mosaic crates.
//!
//! - [`bbox`]: envelopes in pyramid-native units
//! - [`crs`]: reference system codes and the resolver seam
//! - [`pyramid`]: levels, pyramids and zoom selection
//! - [`tile`]: tile coordinates and the envelope-to-tile-range conversion

pub mod bbox;
pub mod crs;
pub mod error;
pub mod pyramid;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::{Crs, CrsCode, CrsResolver, EpsgRegistry};
pub use error::{MosaicError, MosaicResult};
pub use pyramid::{Level, Pyramid};
pub use tile::{tile_range, EdgeTrim, GridOrigin, TileCoord, TileIndexRange, TileSpan};
