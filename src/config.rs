//! Engine-wide configuration. Loadable from TOML/JSON via `serde`, or
//! constructed directly by the host application.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for the on-disk HTTP response cache. Relative paths are
    /// resolved against the current working directory.
    pub cache_dir: String,

    /// Max in-flight requests dispatched by the [`crate::request_queue::RequestQueue`]
    /// at once; the default matches typical browser HTTP parallelism.
    pub request_concurrency: usize,

    /// SSE threshold above which a map/feature tile subdivides.
    pub subdivision_threshold: f64,

    /// Hard cap on map quadtree depth.
    pub max_subdivision_level: u32,

    /// Point budget for the point cloud pipeline; `None` disables decimation.
    pub point_budget: Option<u64>,

    /// `hidden -> empty` cleanup delay for point cloud nodes.
    pub point_cloud_cleanup_delay_secs: f64,

    /// Enables terrain neighbour stitching.
    pub terrain_stitching: bool,

    /// Soft cap on the [`crate::render_target_pool::RenderTargetPool`].
    pub render_target_pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: "./tile_cache".to_string(),
            request_concurrency: 6,
            subdivision_threshold: 1.0,
            max_subdivision_level: 20,
            point_budget: Some(2_000_000),
            point_cloud_cleanup_delay_secs: 5.0,
            terrain_stitching: true,
            render_target_pool_capacity: 256,
        }
    }
}

pub fn load_config(path: &str) -> crate::error::Result<EngineConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| crate::error::EngineError::Io(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| crate::error::EngineError::Parse(e.to_string()))
}
