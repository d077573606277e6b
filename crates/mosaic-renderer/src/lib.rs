//! Raster side of the tile mosaic reader.
//!
//! - [`raster`]: paletted and direct-colour tile buffers, RGBA normalisation
//! - [`decode`]: the [`TileDecoder`] seam and its default implementation
//! - [`mosaic`]: placement and overlay of decoded tiles
//! - [`png`]: PNG encoding of composites and palette-preserving PNG decoding

pub mod decode;
pub mod error;
pub mod mosaic;
pub mod png;
pub mod raster;

pub use decode::{ImageTileDecoder, TileDecoder};
pub use error::{RenderError, RenderResult};
pub use mosaic::{compose, CompositeMetadata, CompositeResult, Mosaic};
pub use raster::{ColorModel, PalettedImage, TileImage};
