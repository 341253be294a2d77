//! `FeatureCollection` entity: a vector-tile quadtree
//! sharing the raster pipeline's SSE machinery but with its own fixed
//! 384px subdivision heuristic, entity-wide feature deduplication, and a
//! [`GlobalCache`]-backed per-tile result cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use cgmath::Point3;

use crate::cache::GlobalCache;
use crate::extent::Extent;
use crate::helpers::combine_hash;
use crate::view::frustum::BoundingBox;
use crate::view::{ScreenSpaceError, SseMode, View};

use super::feature_tile::FeatureTile;
use super::geometry_converter::{Geometry, GeometryConverter, Style};
use super::vector_source::{Feature, VectorSource};

/// Minimum screen-space footprint (in either axis) a tile must exceed to
/// subdivide, mirroring the raster pipeline's 384px heuristic.
pub const SUBDIVISION_PIXELS: f64 = 384.0;

pub struct FeatureCollection {
    pub id: u64,
    pub source: Arc<dyn VectorSource>,
    pub tiles: HashMap<(u32, u32, u32), FeatureTile>,
    pub root_extent: Extent,
    pub min_level: u32,
    pub max_level: u32,
    pub sse_scale: f64,
    pub data_projection: Option<String>,
    pub style: Style,
    /// Entity-wide: a feature's synthetic stable id is dropped once seen in
    /// any tile so overlapping tiles don't duplicate it.
    pub seen_feature_ids: HashSet<String>,
    pub converter: GeometryConverter,
    pub cache: Arc<GlobalCache<u64, Vec<Feature>>>,
    next_synthetic_id: u64,
}

impl FeatureCollection {
    pub fn new(id: u64, source: Arc<dyn VectorSource>, root_extent: Extent, min_level: u32, max_level: u32) -> Self {
        Self {
            id,
            source,
            tiles: HashMap::new(),
            root_extent,
            min_level,
            max_level,
            sse_scale: 1.0,
            data_projection: None,
            style: Style::new(),
            seen_feature_ids: HashSet::new(),
            converter: GeometryConverter::new(),
            cache: Arc::new(GlobalCache::new(10_000)),
            next_synthetic_id: 0,
        }
    }

    fn cache_key(&self, tile_uuid: u64) -> u64 {
        combine_hash(self.id, tile_uuid)
    }

    fn tile_uuid(level: u32, x: u32, y: u32) -> u64 {
        crate::helpers::hash_str(&format!("{level}:{x}:{y}"))
    }

    /// `true` iff `extent` should split: both screen-space dimensions of its
    /// bounding box exceed `384 * sseScale` pixels.
    fn needs_subdivision(&self, extent: &Extent, view: &View, level: u32) -> bool {
        if level >= self.max_level {
            return false;
        }
        let bb = BoundingBox::from_min_max(Point3::new(extent.west, extent.south, 0.0), Point3::new(extent.east, extent.north, 0.0));
        let Some(sse) = ScreenSpaceError::compute_from_box3(view, &bb, &cgmath::Matrix4::from_scale(1.0), SseMode::TwoD) else {
            return false;
        };
        let threshold = SUBDIVISION_PIXELS * self.sse_scale;
        sse.lengths.x > threshold && sse.lengths.y > threshold
    }

    /// Descends from the root, subdividing by SSE, and returns the set of
    /// leaf `(level, x, y)` keys that should be fetched/rendered this frame.
    pub fn pre_update(&mut self, view: &View) -> Vec<(u32, u32, u32)> {
        let mut leaves = Vec::new();
        self.descend(0, 0, 0, self.root_extent.clone(), view, &mut leaves);
        leaves
    }

    fn descend(&mut self, level: u32, x: u32, y: u32, extent: Extent, view: &View, leaves: &mut Vec<(u32, u32, u32)>) {
        let subdivide = level < self.min_level || self.needs_subdivision(&extent, view, level);
        if subdivide && level < self.max_level {
            let parts = extent.split(2, 2);
            let coords = [(2 * x, 2 * y), (2 * x + 1, 2 * y), (2 * x, 2 * y + 1), (2 * x + 1, 2 * y + 1)];
            for (part, (cx, cy)) in parts.into_iter().zip(coords) {
                self.descend(level + 1, cx, cy, part, view, leaves);
            }
        } else {
            self.tiles.entry((level, x, y)).or_insert_with(|| FeatureTile::new(level, x, y, extent));
            leaves.push((level, x, y));
        }
    }

    /// Fetches uncompleted leaves, applying the cache short-circuit and
    /// entity-wide dedup. A synchronous stand-in for the source's
    /// async query: callers running under a `RequestQueue` should instead
    /// fetch off-thread and call [`Self::ingest_features`] on completion.
    ///
    /// A fetch error is routed through the tile's [`LayerUpdateState`]
    /// rather than propagated: a transient failure arms the
    /// `[1, 3, 7, 60]`s backoff schedule and is retried on a later call once
    /// `can_try_update` allows it again, while a definitive failure blocks
    /// the tile until it's explicitly reset.
    pub async fn update(&mut self, leaves: &[(u32, u32, u32)]) -> crate::error::Result<()> {
        let now = Instant::now();
        for &(level, x, y) in leaves {
            let skip = self
                .tiles
                .get(&(level, x, y))
                .map(|t| t.is_finished() || !t.state.can_try_update(now))
                .unwrap_or(false);
            if skip {
                continue;
            }
            let tile_uuid = Self::tile_uuid(level, x, y);
            let key = self.cache_key(tile_uuid);
            let features = if let Some(cached) = self.cache.get(&key) {
                cached
            } else {
                let extent = self.tiles.get(&(level, x, y)).unwrap().extent.clone();
                let crs = self.data_projection.clone().unwrap_or_else(|| extent.crs.clone());
                self.tiles.get_mut(&(level, x, y)).unwrap().state.begin_pending();
                match self.source.load(&extent, 1.0, &crs).await {
                    Ok(features) => {
                        self.cache.insert(key, features.clone());
                        features
                    }
                    Err(err) => {
                        let tile = self.tiles.get_mut(&(level, x, y)).unwrap();
                        if err.is_definitive() {
                            tile.state.record_definitive_error();
                        } else {
                            tile.state.record_transient_error(now);
                        }
                        continue;
                    }
                }
            };
            self.ingest_features(level, x, y, features);
        }
        Ok(())
    }

    fn ingest_features(&mut self, level: u32, x: u32, y: u32, features: Vec<Feature>) {
        let Some(tile) = self.tiles.get_mut(&(level, x, y)) else { return };
        for mut feature in features {
            // Synthetic stable id: avoids the vector source's slow
            // `setId`. Assigned once via a reserved property so repeated
            // passes over the same feature (re-fetch, overlapping tiles)
            // agree on its identity.
            if feature.get("__stable_id").is_none() {
                self.next_synthetic_id += 1;
                feature.set("__stable_id", format!("synthetic:{}", self.next_synthetic_id));
            }
            let stable_id = feature.get("__stable_id").unwrap().to_string();
            if !self.seen_feature_ids.insert(stable_id) {
                continue; // first-seen tile wins; drop the duplicate
            }
            let meshes = self.converter.convert(feature.geometry(), &self.style, None);
            let (min, max) = geometry_bounds(feature.geometry());
            for mesh in meshes {
                tile.add_mesh(mesh, min, max);
            }
        }
        tile.state.finish();
    }
}

fn geometry_bounds(geometry: &Geometry) -> ([f64; 2], [f64; 2]) {
    let mut min = [f64::INFINITY, f64::INFINITY];
    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    let mut extend = |p: crate::feature::geometry_converter::Point2| {
        min[0] = min[0].min(p.x);
        min[1] = min[1].min(p.y);
        max[0] = max[0].max(p.x);
        max[1] = max[1].max(p.y);
    };
    match geometry {
        Geometry::Point(p) => extend(*p),
        Geometry::MultiPoint(points) | Geometry::LineString(points) => points.iter().for_each(|p| extend(*p)),
        Geometry::MultiLineString(lines) => lines.iter().flatten().for_each(|p| extend(*p)),
        Geometry::Polygon { rings } => rings.iter().flatten().for_each(|p| extend(*p)),
        Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(|p| extend(*p)),
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::EPSG_3857;
    use crate::feature::geometry_converter::Point2;
    use cgmath::{Deg, Matrix4, PerspectiveFov};
    use std::future::Future;
    use std::pin::Pin;

    struct EmptySource;
    impl VectorSource for EmptySource {
        fn load(&self, _extent: &Extent, _resolution: f64, _target_crs: &str) -> Pin<Box<dyn Future<Output = crate::error::Result<Vec<Feature>>> + Send>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn far_view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 1e9 }.into();
        View::new(proj, Matrix4::from_translation(cgmath::Vector3::new(0.0, 0.0, 1e8)), 1.0, 1e9)
    }

    #[test]
    fn distant_camera_keeps_min_level_roots() {
        let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
        let mut fc = FeatureCollection::new(1, Arc::new(EmptySource), extent, 0, 10);
        let leaves = fc.pre_update(&far_view());
        assert_eq!(leaves, vec![(0, 0, 0)]);
    }

    struct FailingSource;
    impl VectorSource for FailingSource {
        fn load(&self, _extent: &Extent, _resolution: f64, _target_crs: &str) -> Pin<Box<dyn Future<Output = crate::error::Result<Vec<Feature>>> + Send>> {
            Box::pin(async { Err(crate::error::EngineError::Network("connection reset".into())) })
        }
    }

    #[tokio::test]
    async fn transient_fetch_error_arms_backoff_instead_of_failing_update() {
        let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
        let mut fc = FeatureCollection::new(1, Arc::new(FailingSource), extent, 0, 0);
        let leaves = fc.pre_update(&far_view());

        fc.update(&leaves).await.unwrap();
        let tile = &fc.tiles[&(0, 0, 0)];
        assert!(!tile.is_finished());
        assert!(!tile.state.can_try_update(std::time::Instant::now()), "a transient error must arm backoff");

        // Retrying immediately while still backed off must not re-fetch.
        fc.update(&leaves).await.unwrap();
        assert_eq!(fc.tiles[&(0, 0, 0)].state.error_count, 1);
    }

    #[test]
    fn duplicate_feature_across_tiles_is_ingested_once() {
        let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
        let mut fc = FeatureCollection::new(1, Arc::new(EmptySource), extent, 0, 10);
        fc.tiles.insert((0, 0, 0), FeatureTile::new(0, 0, 0, Extent::new(EPSG_3857, -100.0, 0.0, -100.0, 100.0).unwrap()));
        fc.tiles.insert((0, 1, 0), FeatureTile::new(0, 1, 0, Extent::new(EPSG_3857, 0.0, 100.0, -100.0, 100.0).unwrap()));

        let mut feature = Feature::new(Geometry::Point(Point2 { x: 1.0, y: 1.0 }));
        feature.set("__stable_id", "shared-feature");
        fc.ingest_features(0, 0, 0, vec![feature.clone()]);
        fc.ingest_features(0, 1, 0, vec![feature]);

        let total_meshes: usize = fc.tiles.values().map(|t| t.meshes.len()).sum();
        assert_eq!(total_meshes, 1);
    }
}
