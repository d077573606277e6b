//! Error types for pyramid metadata and reference systems.

use thiserror::Error;

/// Result type alias using MosaicError.
pub type MosaicResult<T> = Result<T, MosaicError>;

#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("Invalid pyramid '{name}': {message}")]
    InvalidPyramid { name: String, message: String },

    #[error("Cannot resolve reference system EPSG:{0}")]
    UnresolvableCrs(i32),
}

impl MosaicError {
    pub fn invalid_pyramid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPyramid {
            name: name.into(),
            message: message.into(),
        }
    }
}
