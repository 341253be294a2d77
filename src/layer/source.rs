//! Raster image source contract, the raster analogue of
//! `VectorSource`. An external collaborator in production (a WMTS/XYZ
//! tile fetcher, a COG reader); this crate depends only on the trait.

use crate::error::Result;
use crate::extent::Extent;

/// One fetchable unit covering part of a paint extent.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub id: u64,
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub id: u64,
    /// RGBA8 for color/mask layers, or two f32 channels (value, nodata
    /// mask) packed as `[value, mask, value, mask, ...]` for elevation.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub trait ImageSource: Send + Sync {
    /// `true` if this source's fetch completes inline (no `RequestQueue`
    /// round-trip needed) — the source-synchronous path.
    fn synchronous(&self) -> bool {
        false
    }

    /// Splits `paint_extent` at `(width, height)` resolution into the
    /// `(id, request)` pairs the layer pipeline will route through the
    /// `RequestQueue` (or run inline, if `synchronous()`).
    fn requests_for(&self, paint_extent: &Extent, width: u32, height: u32) -> Vec<ImageRequest>;

    fn fetch(&self, request: &ImageRequest) -> Result<DecodedImage>;

    /// The full extent this source can serve; outside it, `processTarget`
    /// short-circuits to an empty texture.
    fn extent(&self) -> Option<Extent> {
        None
    }
}
