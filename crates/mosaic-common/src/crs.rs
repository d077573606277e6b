//! Coordinate Reference System types and the resolver seam.
//!
//! Pyramids declare their reference system as a bare EPSG integer. Resolving
//! it is allowed to fail: readers keep working in pyramid-native units and
//! simply report no CRS.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BoundingBox, MosaicError, MosaicResult};

/// Well-known CRS codes the bundled registry can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Albers Equal Area (CONUS)
    Epsg5070,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Map a numeric EPSG identifier to a known code.
    pub fn from_srid(srid: i32) -> Option<Self> {
        match srid {
            4326 => Some(CrsCode::Epsg4326),
            3857 | 900913 => Some(CrsCode::Epsg3857),
            4269 => Some(CrsCode::Epsg4269),
            5070 => Some(CrsCode::Epsg5070),
            3413 => Some(CrsCode::Epsg3413),
            3031 => Some(CrsCode::Epsg3031),
            _ => None,
        }
    }

    pub fn srid(&self) -> i32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg4269 => 4269,
            CrsCode::Epsg5070 => 5070,
            CrsCode::Epsg3413 => 3413,
            CrsCode::Epsg3031 => 3031,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.srid())
    }
}

/// A resolved reference system handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    pub code: CrsCode,
}

impl Crs {
    pub fn new(code: CrsCode) -> Self {
        Self { code }
    }

    /// Get the valid bounds for this CRS.
    pub fn valid_bounds(&self) -> BoundingBox {
        match self.code {
            CrsCode::Epsg4326 | CrsCode::Epsg4269 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            CrsCode::Epsg3857 => {
                // Web Mercator bounds (approx ±85.06° latitude)
                let max_extent = 20037508.342789244;
                BoundingBox::new(-max_extent, -max_extent, max_extent, max_extent)
            }
            CrsCode::Epsg5070 => BoundingBox::new(-2500000.0, -2500000.0, 2500000.0, 2500000.0),
            CrsCode::Epsg3413 | CrsCode::Epsg3031 => {
                BoundingBox::new(-4000000.0, -4000000.0, 4000000.0, 4000000.0)
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code.fmt(f)
    }
}

/// Turns a pyramid's declared EPSG identifier into a [`Crs`].
pub trait CrsResolver: Send + Sync {
    fn resolve(&self, srid: i32) -> MosaicResult<Crs>;
}

/// Resolver over the fixed table of [`CrsCode`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpsgRegistry;

impl CrsResolver for EpsgRegistry {
    fn resolve(&self, srid: i32) -> MosaicResult<Crs> {
        CrsCode::from_srid(srid)
            .map(Crs::new)
            .ok_or(MosaicError::UnresolvableCrs(srid))
    }
}
