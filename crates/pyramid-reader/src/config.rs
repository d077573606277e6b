//! Configuration for the pyramid reader.

use serde::{Deserialize, Serialize};

use crate::{ReaderError, ReaderResult};

/// Reader tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Decode tiles on the rayon pool.
    pub parallel_decode: bool,

    /// Minimum number of tiles in a read before decoding goes parallel.
    pub parallel_threshold: usize,

    /// Largest composite (width * height) a read may produce.
    pub max_output_pixels: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            parallel_decode: true,
            parallel_threshold: 8,
            max_output_pixels: 16384 * 16384,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MOSAIC_PARALLEL_DECODE") {
            config.parallel_decode = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("MOSAIC_PARALLEL_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                config.parallel_threshold = threshold;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_MAX_OUTPUT_PIXELS") {
            if let Ok(pixels) = val.parse() {
                config.max_output_pixels = pixels;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ReaderResult<()> {
        if self.parallel_threshold == 0 {
            return Err(ReaderError::Config(
                "parallel_threshold must be > 0".to_string(),
            ));
        }

        if self.max_output_pixels == 0 {
            return Err(ReaderError::Config(
                "max_output_pixels must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a read of `tiles` tiles should decode in parallel.
    pub fn decode_in_parallel(&self, tiles: usize) -> bool {
        self.parallel_decode && tiles >= self.parallel_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ReaderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = ReaderConfig {
            parallel_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_decode_in_parallel() {
        let config = ReaderConfig {
            parallel_decode: true,
            parallel_threshold: 4,
            ..Default::default()
        };
        assert!(!config.decode_in_parallel(3));
        assert!(config.decode_in_parallel(4));

        let sequential = ReaderConfig {
            parallel_decode: false,
            ..config
        };
        assert!(!sequential.decode_in_parallel(100));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(ReaderConfig::default()).unwrap();
        assert_eq!(json["parallel_threshold"], 8);
        assert_eq!(json["parallel_decode"], true);
    }
}
