//! External 3D Tiles hierarchy streaming.

pub mod bounding_volume;
pub mod tileset;
pub mod tiles3d;

pub use bounding_volume::OrientedBoundingBox;
pub use tileset::{BoundingVolume, ContentKind, Refine, Tile, TileContent, TileKey, Tileset};
pub use tiles3d::{refine, ContentDecoder, LoadedTile, PendingFetch, RefinementQuery, Tiles3D};
