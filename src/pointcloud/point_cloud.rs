//! `PointCloud` entity: octree traversal driven by SSE,
//! per-node state machine, point-budget decimation, and an optional raster
//! `'layer'` coloring overlay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3};

use crate::context::Context;
use crate::error::Result;
use crate::extent::Extent;
use crate::layer::Layer;
use crate::view::{BoundingBox, View};

use super::node_info::{compute_decimation, NodeInfo, NodeState};
use super::source::{NodeDataRequest, PointCloudNode, PointCloudSource};

/// `preSSE`, computed once per camera pose: the screen-space scale
/// factor later multiplied by `geometricError / distance`.
#[derive(Debug, Clone, Copy)]
pub enum ProjectionModel {
    Perspective { screen_height_px: f64, vertical_fov_radians: f64 },
    Orthographic { screen_height_px: f64, near: f64, top_minus_bottom: f64 },
}

impl ProjectionModel {
    pub fn pre_sse(&self) -> f64 {
        match *self {
            ProjectionModel::Perspective { screen_height_px, vertical_fov_radians } => screen_height_px / (2.0 * (vertical_fov_radians / 2.0).tan()),
            ProjectionModel::Orthographic { screen_height_px, near, top_minus_bottom } => screen_height_px * near / top_minus_bottom,
        }
    }
}

#[derive(Clone)]
pub enum ColoringMode {
    Attribute(String),
    /// Hosts a raster [`Layer`] that paints a texture sampled by XY per
    /// point.
    Layer,
}

fn node_bounding_box(node: &PointCloudNode) -> BoundingBox {
    let min = Point3::new(node.bounds.west, node.bounds.south, node.elevation_min);
    let max = Point3::new(node.bounds.east, node.bounds.north, node.elevation_max);
    BoundingBox::from_min_max(min, max)
}

pub struct PointCloud {
    pub source: Arc<dyn PointCloudSource>,
    pub hierarchy: PointCloudNode,
    pub nodes: HashMap<u64, NodeInfo>,
    pub point_budget: Option<u64>,
    pub cleanup_delay: Duration,
    pub subdivision_threshold: f64,
    pub point_size: f64,
    pub coloring: ColoringMode,
    pub layer: Option<Layer>,
    pub decimation: u64,
}

impl PointCloud {
    pub fn new(source: Arc<dyn PointCloudSource>, hierarchy: PointCloudNode, point_budget: Option<u64>, subdivision_threshold: f64, point_size: f64) -> Self {
        Self {
            source,
            hierarchy,
            nodes: HashMap::new(),
            point_budget,
            cleanup_delay: Duration::from_secs(5),
            subdivision_threshold,
            point_size,
            coloring: ColoringMode::Attribute("rgb".to_string()),
            layer: None,
            decimation: 1,
        }
    }

    fn node_info_mut(&mut self, id: u64) -> &mut NodeInfo {
        self.nodes.entry(id).or_insert_with(|| NodeInfo::new(id))
    }

    /// Descends the hierarchy, keeping nodes whose AABB is visible and whose
    /// on-screen spacing still exceeds threshold; requests data for newly
    /// kept nodes and hides subtrees under a node that fails either test.
    pub fn pre_update(&mut self, view: &View, projection: ProjectionModel) -> Result<()> {
        let camera_position = view.world.w.truncate();
        let pre_sse = projection.pre_sse();
        let root = self.hierarchy.clone();
        self.traverse(&root, view, camera_position, pre_sse)?;
        self.apply_decimation();
        Ok(())
    }

    fn traverse(&mut self, node: &PointCloudNode, view: &View, camera_position: cgmath::Vector3<f64>, pre_sse: f64) -> Result<()> {
        let bb = node_bounding_box(node);
        if !view.is_box_visible(&bb) {
            self.hide_subtree(node);
            return Ok(());
        }

        let center = Point3::new(
            (node.bounds.west + node.bounds.east) / 2.0,
            (node.bounds.south + node.bounds.north) / 2.0,
            (node.elevation_min + node.elevation_max) / 2.0,
        );
        let distance = (center.to_vec() - camera_position).magnitude().max(1e-6);
        let on_screen_spacing = pre_sse * node.geometric_error / distance;
        let worth_descending = on_screen_spacing - self.point_size / 2.0 > self.subdivision_threshold;

        self.show(node.id)?;
        self.node_info_mut(node.id).point_count = node.point_count;
        if worth_descending {
            for child in &node.children {
                self.traverse(child, view, camera_position, pre_sse)?;
            }
        } else {
            for child in &node.children {
                self.hide_subtree(child);
            }
        }
        Ok(())
    }

    fn show(&mut self, id: u64) -> Result<()> {
        let needs_position = self.node_info_mut(id).needs_position();
        let state = self.node_info_mut(id).state;
        match state {
            NodeState::Empty | NodeState::Hidden => self.node_info_mut(id).transition(NodeState::Loading),
            NodeState::Loading | NodeState::Displayed => {
                let _ = needs_position;
                Ok(())
            }
        }
    }

    fn hide_subtree(&mut self, node: &PointCloudNode) {
        if let Some(info) = self.nodes.get_mut(&node.id) {
            if matches!(info.state, NodeState::Displayed | NodeState::Loading) {
                let _ = info.transition(NodeState::Hidden);
            }
        }
        for child in &node.children {
            self.hide_subtree(child);
        }
    }

    /// Issues the source fetch for every node currently `Loading`, setting
    /// `Displayed` on success. Positions are only requested when
    /// [`NodeInfo::needs_position`] holds.
    pub fn fetch_pending(&mut self, attribute: Option<&str>) -> Result<()> {
        let pending: Vec<u64> = self.nodes.iter().filter(|(_, n)| n.state == NodeState::Loading).map(|(id, _)| *id).collect();
        for id in pending {
            let info = self.nodes.get(&id).unwrap();
            let request = NodeDataRequest {
                node: id,
                position: info.needs_position(),
                attribute: attribute.map(str::to_string),
                token: info.token.clone().unwrap_or_default(),
            };
            let data = self.source.node_data(&request)?;
            let info = self.nodes.get_mut(&id).unwrap();
            if data.positions.is_some() {
                info.mesh_exists = true;
                info.position_dirty = false;
            }
            info.transition(NodeState::Displayed)?;
        }
        Ok(())
    }

    /// Re-sums visible point counts and updates `self.decimation`.
    fn apply_decimation(&mut self) {
        let total: u64 = self.nodes.values().filter(|n| n.state == NodeState::Displayed).map(|n| n.point_count).sum();
        if let Some(d) = compute_decimation(total, self.point_budget) {
            self.decimation = d;
        }
    }

    /// Hysteresis sweep, called on a ~1s cadence by the host loop.
    pub fn sweep_hidden(&mut self) -> Result<()> {
        for info in self.nodes.values_mut() {
            info.sweep_hidden(self.cleanup_delay)?;
        }
        Ok(())
    }

    pub fn set_active_attribute(&mut self, name: impl Into<String>) -> Result<()> {
        self.coloring = ColoringMode::Attribute(name.into());
        for info in self.nodes.values_mut() {
            info.set_active_attribute()?;
        }
        Ok(())
    }

    /// `'layer'` coloring mode: routes every displayed node's extent through
    /// the hosted raster layer so its shader can sample a painted texture.
    pub fn update_layer_overlay(&mut self, ctx: &Context, paint_size: (u32, u32)) -> Result<()> {
        let Some(layer) = self.layer.as_mut() else { return Ok(()) };
        if !matches!(self.coloring, ColoringMode::Layer) {
            return Ok(());
        }
        let displayed: Vec<(u64, Extent)> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.state == NodeState::Displayed)
            .filter_map(|(id, _)| find_bounds(&self.hierarchy, *id).map(|e| (*id, e)))
            .collect();
        for (id, extent) in displayed {
            layer.update(ctx, crate::tile::TileId::placeholder(), &extent, paint_size, true)?;
            let _ = id;
        }
        Ok(())
    }
}

fn find_bounds(node: &PointCloudNode, id: u64) -> Option<Extent> {
    if node.id == id {
        return Some(node.bounds.clone());
    }
    node.children.iter().find_map(|c| find_bounds(c, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::EPSG_3857;
    use crate::pointcloud::source::{CancellationToken, PointCloudMetadata, PointCloudNodeData};
    use cgmath::{Deg, PerspectiveFov};

    struct StubSource;
    impl PointCloudSource for StubSource {
        fn initialize(&self) -> Result<()> {
            Ok(())
        }
        fn hierarchy(&self) -> Result<PointCloudNode> {
            unreachable!()
        }
        fn metadata(&self) -> Result<PointCloudMetadata> {
            unreachable!()
        }
        fn node_data(&self, _request: &NodeDataRequest) -> Result<PointCloudNodeData> {
            Ok(PointCloudNodeData { positions: Some(vec![[0.0, 0.0, 0.0]]), attribute_values: None })
        }
    }

    fn leaf_node(id: u64) -> PointCloudNode {
        PointCloudNode {
            id,
            geometric_error: 1.0,
            point_count: 1000,
            bounds: Extent::new(EPSG_3857, -1.0, 1.0, -1.0, 1.0).unwrap(),
            elevation_min: 0.0,
            elevation_max: 0.0,
            children: Vec::new(),
        }
    }

    fn identity_view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(90.0).into(), aspect: 1.0, near: 1.0, far: 1000.0 }.into();
        View::new(proj, Matrix4::from_translation(cgmath::Vector3::new(0.0, 0.0, 10.0)), 1.0, 1000.0)
    }

    #[test]
    fn visible_node_transitions_to_loading_then_displayed() {
        let mut pc = PointCloud::new(Arc::new(StubSource), leaf_node(1), None, 1.0, 1.0);
        let view = identity_view();
        pc.pre_update(&view, ProjectionModel::Perspective { screen_height_px: 800.0, vertical_fov_radians: 1.2 }).unwrap();
        assert_eq!(pc.nodes.get(&1).unwrap().state, NodeState::Loading);
        pc.fetch_pending(None).unwrap();
        assert_eq!(pc.nodes.get(&1).unwrap().state, NodeState::Displayed);
    }

    #[test]
    fn decimation_reflects_real_point_counts_once_displayed() {
        let mut pc = PointCloud::new(Arc::new(StubSource), leaf_node(1), Some(100), 1.0, 1.0);
        let view = identity_view();
        pc.pre_update(&view, ProjectionModel::Perspective { screen_height_px: 800.0, vertical_fov_radians: 1.2 }).unwrap();
        pc.fetch_pending(None).unwrap();
        pc.apply_decimation();
        assert_eq!(pc.decimation, 10, "a displayed node's real point_count (1000) over a 100 budget must decimate by 10");
    }

    #[test]
    fn node_becoming_invisible_aborts_and_hides() {
        let mut pc = PointCloud::new(Arc::new(StubSource), leaf_node(1), None, 1.0, 1.0);
        pc.nodes.insert(1, {
            let mut n = NodeInfo::new(1);
            n.transition(NodeState::Loading).unwrap();
            n
        });
        pc.hide_subtree(&leaf_node(1));
        assert_eq!(pc.nodes.get(&1).unwrap().state, NodeState::Hidden);
    }
}
