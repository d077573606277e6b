//! Tile payload decoding.

use crate::png::{decode_indexed, is_indexed_png};
use crate::{RenderResult, TileImage};

/// Turns stored tile bytes into a [`TileImage`].
pub trait TileDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> RenderResult<TileImage>;
}

/// Default decoder.
///
/// Indexed PNGs are decoded in-house so their palette is preserved; every
/// other format (RGB/RGBA/grey PNG, JPEG) goes through the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageTileDecoder {
    keep_palette: bool,
}

impl ImageTileDecoder {
    pub fn new() -> Self {
        Self { keep_palette: true }
    }

    /// Expand indexed PNGs to direct colour instead of keeping the palette.
    pub fn expanding_palettes() -> Self {
        Self {
            keep_palette: false,
        }
    }
}

impl Default for ImageTileDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TileDecoder for ImageTileDecoder {
    fn decode(&self, data: &[u8]) -> RenderResult<TileImage> {
        if self.keep_palette && is_indexed_png(data) {
            if let Some(paletted) = decode_indexed(data)? {
                return Ok(TileImage::Paletted(paletted));
            }
        }

        let image = image::load_from_memory(data)?;
        Ok(TileImage::Direct(image))
    }
}
