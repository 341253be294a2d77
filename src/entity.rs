//! `Entity`: the top-level tagged variant a [`crate::main_loop::MainLoop`]
//! drives every frame.

use crate::feature::FeatureCollection;
use crate::pointcloud::PointCloud;
use crate::tile::Map;
use crate::tiles3d::Tiles3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

pub enum Entity {
    Map(Map),
    FeatureCollection(FeatureCollection),
    PointCloud(PointCloud),
    Tiles3D(Tiles3D),
}

impl Entity {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::Map(_) => "Map",
            Entity::FeatureCollection(_) => "FeatureCollection",
            Entity::PointCloud(_) => "PointCloud",
            Entity::Tiles3D(_) => "Tiles3D",
        }
    }
}
