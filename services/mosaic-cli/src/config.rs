//! Turning command line options into reader settings and requests.

use anyhow::{bail, Context, Result};
use mosaic_common::BoundingBox;
use pyramid_reader::{ReadRequest, ReaderConfig};

/// Reader configuration from the environment, with command line overrides.
pub fn reader_config(sequential: bool, max_output_pixels: Option<u64>) -> Result<ReaderConfig> {
    let mut config = ReaderConfig::from_env();

    if sequential {
        config.parallel_decode = false;
    }
    if let Some(pixels) = max_output_pixels {
        config.max_output_pixels = pixels;
    }

    config.validate()?;
    Ok(config)
}

/// Build a read request from `--bbox`, `--width` and `--height`.
pub fn read_request(
    bbox: Option<&str>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<ReadRequest> {
    let mut request = match bbox {
        Some(bbox) => ReadRequest::for_envelope(
            BoundingBox::parse(bbox).with_context(|| format!("invalid --bbox '{}'", bbox))?,
        ),
        None => ReadRequest::full(),
    };

    if request.is_full() && width.is_some() {
        bail!("--width only selects a resolution together with --bbox");
    }

    request = match (width, height) {
        (Some(width), Some(height)) => request.with_size(width, height),
        (Some(width), None) => request.with_width(width),
        (None, height) => ReadRequest { height, ..request },
    };
    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_bbox_is_full() {
        let request = read_request(None, None, None).unwrap();
        assert!(request.is_full());
    }

    #[test]
    fn test_request_with_bbox_and_size() {
        let request = read_request(Some("0,0,100,50"), Some(200), Some(100)).unwrap();
        assert_eq!(request.envelope, Some(BoundingBox::new(0.0, 0.0, 100.0, 50.0)));
        assert_eq!(request.width, Some(200));
        assert_eq!(request.height, Some(100));
    }

    #[test]
    fn test_request_with_width_only() {
        let request = read_request(Some("0,0,100,50"), Some(64), None).unwrap();
        assert_eq!(request.width, Some(64));
        assert_eq!(request.height, None);
    }

    #[test]
    fn test_width_without_bbox_rejected() {
        assert!(read_request(None, Some(256), None).is_err());
    }

    #[test]
    fn test_bad_bbox_rejected() {
        let err = read_request(Some("1,2,3"), None, None).unwrap_err();
        assert!(err.to_string().contains("--bbox"));
        assert!(read_request(Some("0,0,10,10"), Some(0), None).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let config = reader_config(true, Some(1024)).unwrap();
        assert!(!config.parallel_decode);
        assert_eq!(config.max_output_pixels, 1024);
        assert!(reader_config(false, Some(0)).is_err());
    }
}
