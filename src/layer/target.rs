//! Per-node raster paint slot.

use crate::extent::{Extent, OffsetScale};
use crate::renderer::RenderTargetId;
use crate::tile::arena::TileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Processing,
    Complete,
}

/// Relates a node's geometric extent to its slightly margin-enlarged paint
/// extent; sampled in the fragment shader (glossary: "Pitch").
pub type Pitch = OffsetScale;

pub struct Target {
    pub node: TileId,
    pub extent: Extent,
    pub geometry_extent: Extent,
    pub pitch: Pitch,
    pub width: u32,
    pub height: u32,
    pub image_ids: Vec<u64>,
    pub render_target: Option<RenderTargetId>,
    pub state: TargetState,
    pub cancelled: bool,
    pub paint_count: u32,
}

impl Target {
    pub fn new(node: TileId, geometry_extent: Extent, margin_fraction: f64, margin_fixed: f64, width: u32, height: u32) -> Self {
        let extent = geometry_extent.with_margin(margin_fraction, margin_fixed);
        let pitch = geometry_extent.offset_to_parent(&extent);
        Self {
            node,
            extent,
            geometry_extent,
            pitch,
            width,
            height,
            image_ids: Vec::new(),
            render_target: None,
            state: TargetState::Pending,
            cancelled: false,
            paint_count: 0,
        }
    }

    /// Aborts in-flight work for this target: node went invisible, the
    /// target was reset, or the owning layer cleared.
    /// Downstream code must observe this and take no action — no retry, no
    /// logging (mirrors `AbortError`/`EngineError::Cancelled`).
    pub fn abort(&mut self) {
        self.cancelled = true;
    }

    pub fn reset(&mut self) {
        self.cancelled = false;
        self.state = TargetState::Pending;
        self.image_ids.clear();
        self.paint_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::EPSG_3857;

    #[test]
    fn pitch_maps_geometry_extent_inside_the_enlarged_paint_extent() {
        let geom = Extent::new(EPSG_3857, 0.0, 100.0, 0.0, 100.0).unwrap();
        let target = Target::new(TileId::placeholder(), geom, 0.05, 4.0, 256, 256);
        assert!(target.pitch.offset_x > 0.0 && target.pitch.offset_x < 1.0);
        assert!(target.pitch.scale_x > 0.0 && target.pitch.scale_x < 1.0);
    }
}
