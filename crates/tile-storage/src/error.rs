//! Error types for tile stores.

use std::path::PathBuf;

use mosaic_common::{MosaicError, TileCoord};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown coverage: {0}")]
    UnknownCoverage(String),

    #[error("Zoom level {zoom} is not defined for coverage '{coverage}'")]
    UnknownLevel { coverage: String, zoom: u32 },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read tile {coord}: {message}")]
    TileRead { coord: TileCoord, message: String },

    #[error(transparent)]
    InvalidPyramid(#[from] MosaicError),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tile_read(coord: TileCoord, message: impl Into<String>) -> Self {
        Self::TileRead {
            coord,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Catalog(err.to_string())
    }
}
