//! Quadtree raster map.

pub mod arena;
pub mod map;
pub mod picking;
pub mod stitching;
pub mod subdivision;
pub mod tile_mesh;

pub use arena::{TileArena, TileId};
pub use map::Map;
pub use picking::{pick_circle, raycast_pick, MapPickResult, Ray};
pub use stitching::TileIndex;
pub use subdivision::{base_image_size, needs_subdivision, select_best_subdivisions, subdivide, SubdivisionContext};
pub use tile_mesh::{ElevationRange, RenderState, TileMesh};
