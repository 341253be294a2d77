//! `PointCloudSource`: the external collaborator that serves hierarchy and
//! per-node point data.

use crate::error::Result;
use crate::extent::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeInterpretation {
    Color,
    Classification,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PointAttribute {
    pub name: String,
    pub interpretation: AttributeInterpretation,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PointCloudMetadata {
    pub volume: Extent,
    pub point_count: Option<u64>,
    pub attributes: Vec<PointAttribute>,
    pub crs: Option<String>,
}

/// One node of the source's own hierarchy (usually an octree), described
/// independently of [`crate::tile::TileMesh`] since point cloud formats
/// (potree, COPC, EPT) each define their own node addressing scheme.
#[derive(Debug, Clone)]
pub struct PointCloudNode {
    pub id: u64,
    pub geometric_error: f64,
    pub point_count: u64,
    pub bounds: Extent,
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub children: Vec<PointCloudNode>,
}

#[derive(Debug, Clone)]
pub struct PointCloudNodeData {
    pub positions: Option<Vec<[f32; 3]>>,
    pub attribute_values: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy)]
pub struct CancellationToken {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self { flag: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)) }
    }
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

pub struct NodeDataRequest {
    pub node: u64,
    /// Set iff the node's mesh does not exist yet or `positionDirty`; an
    /// attribute-only hot-swap must not refetch positions.
    pub position: bool,
    pub attribute: Option<String>,
    pub token: CancellationToken,
}

pub trait PointCloudSource: Send + Sync {
    fn initialize(&self) -> Result<()>;
    fn hierarchy(&self) -> Result<PointCloudNode>;
    fn metadata(&self) -> Result<PointCloudMetadata>;
    fn node_data(&self, request: &NodeDataRequest) -> Result<PointCloudNodeData>;
}
