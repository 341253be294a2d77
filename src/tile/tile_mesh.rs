//! A single quadtree node of a [`crate::tile::map::Map`].

use crate::extent::Extent;
use crate::view::frustum::BoundingBox;

use super::arena::TileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Normal,
    Picking,
}

/// Minimum/maximum elevation of the tile's terrain, refined as elevation
/// textures arrive; seeds the tile's bounding box before real data exists
/// so culling works from frame zero.
#[derive(Debug, Clone, Copy)]
pub struct ElevationRange {
    pub min: f32,
    pub max: f32,
}

impl Default for ElevationRange {
    fn default() -> Self {
        Self { min: 0.0, max: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct TileMesh {
    pub id: TileId,
    pub parent: Option<TileId>,
    /// Morton-ordered: `[sw, se, nw, ne]`.
    pub children: Option<[TileId; 4]>,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub extent: Extent,
    pub elevation_range: ElevationRange,
    pub visible: bool,
    pub disposed: bool,
    pub render_state: RenderState,
}

impl TileMesh {
    pub fn new_root(extent: Extent, level: u32, x: u32, y: u32) -> Self {
        Self {
            id: TileId::placeholder(),
            parent: None,
            children: None,
            level,
            x,
            y,
            extent,
            elevation_range: ElevationRange::default(),
            visible: false,
            disposed: false,
            render_state: RenderState::Normal,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        use cgmath::Point3;
        let min = Point3::new(self.extent.west, self.extent.south, self.elevation_range.min as f64);
        let max = Point3::new(self.extent.east, self.extent.north, self.elevation_range.max as f64);
        BoundingBox::from_min_max(min, max)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Swaps in a picking-shader render state, returning the previous one so
    /// the caller can restore it once picking is done.
    pub fn push_render_state(&mut self, state: RenderState) -> RenderState {
        std::mem::replace(&mut self.render_state, state)
    }

    pub fn restore_render_state(&mut self, previous: RenderState) {
        self.render_state = previous;
    }
}

