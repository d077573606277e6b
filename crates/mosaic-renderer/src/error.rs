//! Error types for decoding and compositing.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Tile bytes could not be turned into pixels.
    #[error("failed to decode tile: {0}")]
    Decode(String),

    /// A pixel buffer whose length does not match its dimensions.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Decode(err.to_string())
    }
}
