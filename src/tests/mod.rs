//! Cross-module scenario tests exercising more than one pipeline at once.
//! Per-module unit tests already cover each subsystem in isolation; these
//! check the seams between them.

use std::collections::HashSet;
use std::sync::Arc;

use cgmath::{Deg, InnerSpace, Matrix4, PerspectiveFov, Point3, Vector3};

use crate::config::EngineConfig;
use crate::context::Context;
use crate::crs::{BuiltinCrs, EPSG_3857};
use crate::entity::{Entity, EntityId};
use crate::extent::Extent;
use crate::feature::{Feature, FeatureCollection};
use crate::layer::{DecodedImage, ImageRequest, ImageSource, Layer};
use crate::main_loop::{Instance, MainLoop};
use crate::renderer::NullRenderer;
use crate::tile::picking::{raycast_pick, Ray};
use crate::tile::Map;
use crate::view::View;

fn ctx() -> Context {
    Context::new(Arc::new(NullRenderer::new((800, 600))), Arc::new(BuiltinCrs), EngineConfig::default())
}

fn close_view(z: f64) -> View {
    let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 1e9 }.into();
    View::new(proj, Matrix4::from_translation(Vector3::new(0.0, 0.0, z)), 1.0, 1e9)
}

/// Scenario #1: a map with no layers still renders, allocating zero targets.
#[test]
fn background_only_map_allocates_no_targets() {
    let context = ctx();
    let extent = Extent::new(EPSG_3857, -2.0e7, 2.0e7, -2.0e7, 2.0e7).unwrap();
    let mut map = Map::new(extent, 256, false);
    let visible = map.pre_update(&close_view(2.0e7), 1.0, 20);
    map.update(&context, &visible).unwrap();
    map.post_update(&context);
    assert_eq!(context.render_target_pool.free_count(), 0);
}

struct FixedColorSource {
    synchronous: bool,
}

impl ImageSource for FixedColorSource {
    fn synchronous(&self) -> bool {
        self.synchronous
    }

    fn requests_for(&self, paint_extent: &Extent, width: u32, height: u32) -> Vec<ImageRequest> {
        vec![ImageRequest { id: crate::helpers::hash_str(&format!("{paint_extent:?}")), extent: paint_extent.clone(), width, height }]
    }

    fn fetch(&self, request: &ImageRequest) -> crate::error::Result<DecodedImage> {
        Ok(DecodedImage { id: request.id, pixels: vec![255u8; (request.width * request.height * 4) as usize], width: request.width, height: request.height })
    }
}

/// Scenario #2 (synchronous-source simplification): a color layer's first
/// `update` for a node acquires a render target and completes immediately;
/// a second `update` for the same node reuses the same target rather than
/// re-acquiring.
#[test]
fn color_layer_reuses_its_target_across_frames() {
    let context = ctx();
    let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
    let mut map = Map::new(extent, 64, false);
    map.add_layer(Layer::Color { id: 1, source: Arc::new(FixedColorSource { synchronous: true }), state: Default::default() });

    let view = close_view(500.0);
    let visible = map.pre_update(&view, 1.0, 20);
    map.update(&context, &visible).unwrap();
    let first_target = match &map.layers[0] {
        Layer::Color { state, .. } => state.targets.get(&visible[0]).unwrap().render_target,
        _ => unreachable!(),
    };
    assert!(first_target.is_some());

    map.update(&context, &visible).unwrap();
    let second_target = match &map.layers[0] {
        Layer::Color { state, .. } => state.targets.get(&visible[0]).unwrap().render_target,
        _ => unreachable!(),
    };
    assert_eq!(first_target, second_target);
}

struct FixedElevationSource;

impl ImageSource for FixedElevationSource {
    fn synchronous(&self) -> bool {
        true
    }

    fn requests_for(&self, paint_extent: &Extent, width: u32, height: u32) -> Vec<ImageRequest> {
        vec![ImageRequest { id: crate::helpers::hash_str(&format!("{paint_extent:?}")), extent: paint_extent.clone(), width, height }]
    }

    fn fetch(&self, request: &ImageRequest) -> crate::error::Result<DecodedImage> {
        let mut pixels = Vec::with_capacity((request.width * request.height * 8) as usize);
        for i in 0..(request.width * request.height) {
            let value = 10.0 + (i % 50) as f32;
            pixels.extend_from_slice(&value.to_le_bytes());
            pixels.extend_from_slice(&1.0f32.to_le_bytes());
        }
        Ok(DecodedImage { id: request.id, pixels, width: request.width, height: request.height })
    }
}

/// Scenario #2b: an async-source color layer paints an immortal fallback
/// texture synchronously, before its real fetch has any chance to resolve.
#[test]
fn async_color_layer_paints_fallback_before_the_real_fetch_resolves() {
    let context = ctx();
    let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
    let mut map = Map::new(extent, 64, false);
    map.add_layer(Layer::Color { id: 1, source: Arc::new(FixedColorSource { synchronous: false }), state: Default::default() });

    let view = close_view(500.0);
    let visible = map.pre_update(&view, 1.0, 20);
    map.update(&context, &visible).unwrap();

    match &map.layers[0] {
        Layer::Color { state, .. } => {
            let target = state.targets.get(&visible[0]).unwrap();
            assert_eq!(target.state, crate::layer::TargetState::Pending, "the real image hasn't landed yet");
            assert!(!target.image_ids.is_empty());
            assert!(state.composer.all_images().count() >= 1, "a fallback image must be painted while the async fetch is outstanding");
        }
        _ => unreachable!(),
    }
}

/// Scenario #3: subdivision is gated on `elevation_ready`, which the map now
/// derives from whether the elevation layer's target for that tile is
/// `Complete`, and a completed fetch refines the layer's min/max range.
#[test]
fn elevation_minmax_seeds_range_and_gates_subdivision() {
    let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
    let mut map = Map::new(extent, 256, false);
    map.add_layer(Layer::Elevation { id: 1, source: Arc::new(FixedElevationSource), range: Default::default(), state: Default::default() });

    let view = close_view(10.0);
    let context = ctx();

    // Frame 1: no target is registered yet, so elevation isn't ready and
    // subdivision must not happen even though the camera is close.
    let not_ready = map.pre_update(&view, 1.0, 20);
    assert_eq!(not_ready.len(), map.roots.len(), "subdivision must not happen while elevation data isn't ready");
    map.update(&context, &not_ready).unwrap();

    if let Layer::Elevation { range, .. } = &map.layers[0] {
        assert!(range.max > range.min, "a completed elevation fetch must refine the range");
    }

    // Frame 2: the elevation target is now Complete, so subdivision proceeds.
    let ready = map.pre_update(&view, 1.0, 20);
    assert!(ready.len() > map.roots.len(), "a close camera should subdivide once elevation is ready");
}

struct TileSource {
    features: Vec<crate::feature::geometry_converter::Point2>,
}

impl crate::feature::VectorSource for TileSource {
    fn load(
        &self,
        _extent: &Extent,
        _resolution: f64,
        _target_crs: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = crate::error::Result<Vec<Feature>>> + Send>> {
        let points = self.features.clone();
        Box::pin(async move {
            Ok(points
                .into_iter()
                .map(|p| {
                    let mut f = Feature::new(crate::feature::Geometry::Point(p));
                    f.set("__stable_id", format!("{},{}", p.x, p.y));
                    f
                })
                .collect())
        })
    }
}

/// Scenario #4, driven through `MainLoop`: the same feature id returned by
/// neighbouring tiles is meshed exactly once across the whole entity.
#[test]
fn feature_collection_dedups_across_tiles_through_main_loop() {
    let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
    let shared = crate::feature::geometry_converter::Point2 { x: 0.0, y: 0.0 };
    let source = Arc::new(TileSource { features: vec![shared] });
    let fc = FeatureCollection::new(1, source, extent, 1, 1);

    let mut instance = Instance::new(ctx());
    instance.add_entity(Entity::FeatureCollection(fc));
    let mut main_loop = MainLoop::new(instance);
    main_loop.frame(&close_view(1e8)).unwrap();

    let total_meshes: usize = main_loop
        .instance
        .entities()
        .map(|(_, e)| match e {
            Entity::FeatureCollection(fc) => fc.tiles.values().map(|t| t.meshes.len()).sum(),
            _ => 0,
        })
        .sum();
    assert_eq!(total_meshes, 1);
}

/// Scenario #6: raycast picking visits hits in increasing distance order.
#[test]
fn raycast_picking_orders_hits_by_distance() {
    let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
    let mut map = Map::new(extent, 64, false);
    let view = close_view(10.0);
    map.pre_update(&view, 1.0, 20);

    let ray = Ray { origin: Point3::new(0.0, 0.0, -1000.0), direction: Vector3::new(0.0, 0.0, 1.0) };
    let hits = raycast_pick(&map.arena, &ray);
    let mut distances: Vec<f64> = hits.iter().map(|h| (h.world - ray.origin).magnitude2().sqrt()).collect();
    let sorted = {
        let mut d = distances.clone();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        d
    };
    assert_eq!(distances, sorted);
    distances.dedup();
}

/// `EntityId` is just a stable key; make sure two distinct registrations
/// never collide, per the main loop's registry invariant.
#[test]
fn entity_ids_are_unique_per_registration() {
    let mut instance = Instance::new(ctx());
    let extent = Extent::new(EPSG_3857, -1.0, 1.0, -1.0, 1.0).unwrap();
    let a = instance.add_entity(Entity::Map(Map::new(extent.clone(), 64, false)));
    let b = instance.add_entity(Entity::Map(Map::new(extent, 64, false)));
    assert_ne!(a, b);
    let ids: HashSet<EntityId> = [a, b].into_iter().collect();
    assert_eq!(ids.len(), 2);
}
