//! Streaming octree point cloud pipeline.

pub mod node_info;
pub mod point_cloud;
pub mod source;

pub use node_info::{compute_decimation, NodeInfo, NodeState};
pub use point_cloud::{ColoringMode, PointCloud, ProjectionModel};
pub use source::{
    AttributeInterpretation, CancellationToken, NodeDataRequest, PointAttribute, PointCloudMetadata, PointCloudNode, PointCloudNodeData,
    PointCloudSource,
};
