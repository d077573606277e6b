//! Read requests and outcomes.

use mosaic_common::BoundingBox;
use mosaic_renderer::CompositeResult;
use serde::{Deserialize, Serialize};

use crate::{ReaderError, ReaderResult};

/// What to read from a pyramid.
///
/// Without an envelope the whole pyramid is read. The output width, when
/// given together with an envelope, drives the zoom level choice; on its
/// own it has no effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Area to read, in the pyramid's native reference system
    pub envelope: Option<BoundingBox>,
    /// Requested output width in pixels
    pub width: Option<u32>,
    /// Requested output height in pixels
    pub height: Option<u32>,
}

impl ReadRequest {
    /// The whole pyramid at its finest populated level.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn for_envelope(envelope: BoundingBox) -> Self {
        Self {
            envelope: Some(envelope),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn is_full(&self) -> bool {
        self.envelope.is_none()
    }

    pub fn validate(&self) -> ReaderResult<()> {
        if self.width == Some(0) || self.height == Some(0) {
            return Err(ReaderError::InvalidRequest(format!(
                "output size must be positive, got {:?}x{:?}",
                self.width, self.height
            )));
        }

        if let Some(envelope) = &self.envelope {
            if !envelope.is_valid() {
                return Err(ReaderError::InvalidRequest(format!(
                    "envelope {:?} is inverted or not finite",
                    envelope
                )));
            }
        }

        Ok(())
    }
}

/// Result of a read.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Coverage(CompositeResult),
    /// No stored tile intersects the request.
    Empty,
}

impl ReadOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReadOutcome::Empty)
    }

    pub fn coverage(self) -> Option<CompositeResult> {
        match self {
            ReadOutcome::Coverage(result) => Some(result),
            ReadOutcome::Empty => None,
        }
    }
}
