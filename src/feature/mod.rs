//! Vector tile (feature collection) pipeline.

pub mod feature_collection;
pub mod feature_tile;
pub mod geometry_converter;
pub mod vector_source;

pub use feature_collection::FeatureCollection;
pub use feature_tile::FeatureTile;
pub use geometry_converter::{Extrusion, Geometry, GeometryConverter, GeometryMesh, MaterialCache, MaterialId, Point2, Style, StyleValue};
pub use vector_source::{Feature, VectorSource};
