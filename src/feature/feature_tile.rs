//! A single vector tile node: fetch state plus the meshes
//! produced from its features.

use crate::extent::Extent;
use crate::layer::update_state::{LayerUpdateState, State};
use crate::view::frustum::BoundingBox;

use super::geometry_converter::GeometryMesh;

pub struct FeatureTile {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub extent: Extent,
    pub state: LayerUpdateState,
    pub meshes: Vec<GeometryMesh>,
    /// Expanded around the tile's actual feature meshes as they arrive,
    /// starting at the tile's own geometric extent.
    pub mesh_bounds: BoundingBox,
}

impl FeatureTile {
    pub fn new(level: u32, x: u32, y: u32, extent: Extent) -> Self {
        let bounds = BoundingBox::from_min_max(
            cgmath::Point3::new(extent.west, extent.south, 0.0),
            cgmath::Point3::new(extent.east, extent.north, 0.0),
        );
        Self { level, x, y, extent, state: LayerUpdateState::default(), meshes: Vec::new(), mesh_bounds: bounds }
    }

    /// `true` once this tile's fetch has finished and needs no further
    /// update calls.
    pub fn is_finished(&self) -> bool {
        matches!(self.state.state, State::Finished)
    }

    pub fn add_mesh(&mut self, mesh: GeometryMesh, mesh_min: [f64; 2], mesh_max: [f64; 2]) {
        self.meshes.push(mesh);
        let min = cgmath::Point3::new(self.mesh_bounds.min.x.min(mesh_min[0]), self.mesh_bounds.min.y.min(mesh_min[1]), self.mesh_bounds.min.z);
        let max = cgmath::Point3::new(self.mesh_bounds.max.x.max(mesh_max[0]), self.mesh_bounds.max.y.max(mesh_max[1]), self.mesh_bounds.max.z);
        self.mesh_bounds = BoundingBox::from_min_max(min, max);
    }
}
