//! Error types for pyramid reads.

use mosaic_common::TileCoord;
use mosaic_renderer::RenderError;
use thiserror::Error;
use tile_storage::StorageError;

pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors that abort a read.
///
/// An empty result is not an error, see [`crate::ReadOutcome::Empty`]. An
/// unresolvable reference system is not one either; it only leaves the
/// composite without a CRS.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The coverage is not in the store's catalog.
    #[error("invalid coverage name '{0}'")]
    InvalidCoverageName(String),

    /// Zero output size or an unusable envelope.
    #[error("invalid read request: {0}")]
    InvalidRequest(String),

    /// The composite would exceed the configured pixel budget.
    #[error("composite of {width}x{height} pixels exceeds the limit of {limit} pixels")]
    OutputTooLarge { width: u64, height: u64, limit: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    /// A tile payload could not be decoded. The whole read fails.
    #[error("failed to decode tile {coord}: {source}")]
    TileDecode {
        coord: TileCoord,
        #[source]
        source: RenderError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
