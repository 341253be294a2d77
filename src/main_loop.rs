//! Top-level entity registry and frame scheduler: drives an arbitrary
//! registry of [`Entity`] variants through `preUpdate → update → postUpdate`
//! each frame and hands the aggregated scene summary to the renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug_span, warn};

use crate::context::Context;
use crate::entity::{Entity, EntityId};
use crate::error::Result;
use crate::helpers::async_helper::runtime_handle;
use crate::helpers::frame_clock::FrameClock;
use crate::pointcloud::{ColoringMode, NodeState, ProjectionModel};
use crate::renderer::SceneRef;
use crate::view::View;

/// Everything one running engine owns: the entity registry plus the
/// collaborators threaded through every update call. Replaces the source's
/// global singletons (`GlobalCache`, `GlobalRenderTargetPool`, `DefaultQueue`)
/// with state scoped to one `Instance`.
pub struct Instance {
    pub ctx: Context,
    /// Screen-space projection used to drive point cloud SSE this frame;
    /// hosts update it when the camera's fov or the canvas is resized.
    pub projection: ProjectionModel,
    entities: HashMap<EntityId, Entity>,
    next_entity_id: AtomicU64,
}

impl Instance {
    pub fn new(ctx: Context) -> Self {
        let (_, height) = ctx.renderer.canvas_size();
        let projection = ProjectionModel::Perspective { screen_height_px: height as f64, vertical_fov_radians: 60f64.to_radians() };
        Self { ctx, projection, entities: HashMap::new(), next_entity_id: AtomicU64::new(1) }
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_entity_id.fetch_add(1, Ordering::SeqCst));
        self.entities.insert(id, entity);
        id
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}

/// Drives one [`Instance`] through `preUpdate → update → postUpdate →
/// render` every frame. `schedule_update` coalesces repeated
/// notifications into the next frame unless `immediate` is set.
pub struct MainLoop {
    pub instance: Instance,
    clock: FrameClock,
    dirty: bool,
}

impl MainLoop {
    pub fn new(instance: Instance) -> Self {
        Self { instance, clock: FrameClock::default(), dirty: true }
    }

    /// Marks the instance dirty for the next [`Self::frame`] call, or runs it
    /// synchronously right away if `immediate` is set.
    pub fn schedule_update(&mut self, view: &View, immediate: bool) -> Result<()> {
        self.dirty = true;
        if immediate {
            return self.frame(view);
        }
        Ok(())
    }

    /// Runs one `preUpdate → update → postUpdate → render` pass if dirty,
    /// otherwise only advances the frame clock. A single entity's update
    /// failing (other than cancellation) is logged and does not block its
    /// siblings or the render call: every entity is isolated from its
    /// neighbors' failures.
    pub fn frame(&mut self, view: &View) -> Result<()> {
        self.clock.tick();
        if !self.dirty {
            return Ok(());
        }
        let _span = debug_span!("main_loop.frame").entered();

        let ctx = self.instance.ctx.clone();
        let projection = self.instance.projection;
        let mut visible_tile_count = 0usize;
        let mut visible_point_count = 0u64;

        for (id, entity) in self.instance.entities.iter_mut() {
            let _span = debug_span!("main_loop.entity", id = id.0, kind = entity.kind_name()).entered();
            let outcome = drive_entity(entity, &ctx, view, projection);
            match outcome {
                Ok((tiles, points)) => {
                    visible_tile_count += tiles;
                    visible_point_count += points;
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => warn!(entity = id.0, kind = entity.kind_name(), error = %err, "entity update failed"),
            }
        }

        let scene = SceneRef::new(visible_tile_count, visible_point_count);
        self.instance.ctx.renderer.render(&scene, view)?;
        self.dirty = false;
        Ok(())
    }
}

/// Per-entity `preUpdate → update → postUpdate` dispatch. Returns
/// `(visible_tile_count, visible_point_count)` for the scene summary.
fn drive_entity(entity: &mut Entity, ctx: &Context, view: &View, projection: ProjectionModel) -> Result<(usize, u64)> {
    match entity {
        Entity::Map(map) => {
            let visible = map.pre_update(view, ctx.config.subdivision_threshold, ctx.config.max_subdivision_level);
            let count = visible.len();
            map.update(ctx, &visible)?;
            map.post_update(ctx);
            Ok((count, 0))
        }
        Entity::FeatureCollection(fc) => {
            let leaves = fc.pre_update(view);
            // `update` awaits its `VectorSource`; this entity has no
            // dedicated `RequestQueue` wiring yet, so the frame thread blocks
            // on the shared background runtime rather than fanning the fetch
            // out and resuming next frame.
            runtime_handle().block_on(fc.update(&leaves))?;
            Ok((0, 0))
        }
        Entity::PointCloud(pc) => {
            pc.pre_update(view, projection)?;
            pc.fetch_pending(None)?;
            if matches!(pc.coloring, ColoringMode::Layer) {
                pc.update_layer_overlay(ctx, ctx.renderer.canvas_size())?;
            }
            let points = pc.nodes.values().filter(|n| n.state == NodeState::Displayed).map(|n| n.point_count).sum();
            Ok((0, points))
        }
        Entity::Tiles3D(_) => {
            // Driven by `load_root`/`process_tile` at fetch time rather than
            // an incremental per-frame walk; nothing to do here.
            Ok((0, 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::crs::{BuiltinCrs, EPSG_3857};
    use crate::extent::Extent;
    use crate::renderer::NullRenderer;
    use crate::tile::Map;
    use cgmath::{Deg, Matrix4, PerspectiveFov};
    use std::sync::Arc;

    fn test_ctx() -> Context {
        Context::new(Arc::new(NullRenderer::new((800, 600))), Arc::new(BuiltinCrs), EngineConfig::default())
    }

    fn test_view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 1e9 }.into();
        View::new(proj, Matrix4::from_translation(cgmath::Vector3::new(0.0, 0.0, 1e8)), 1.0, 1e9)
    }

    #[test]
    fn empty_map_renders_with_zero_targets() {
        let mut instance = Instance::new(test_ctx());
        let map = Map::new(Extent::new(EPSG_3857, -2.0e7, 2.0e7, -2.0e7, 2.0e7).unwrap(), 256, false);
        instance.add_entity(Entity::Map(map));
        let mut main_loop = MainLoop::new(instance);
        main_loop.frame(&test_view()).unwrap();
        assert_eq!(main_loop.instance.ctx.render_target_pool.free_count(), 0);
    }

    #[test]
    fn frame_is_a_no_op_once_clean() {
        let instance = Instance::new(test_ctx());
        let mut main_loop = MainLoop::new(instance);
        main_loop.frame(&test_view()).unwrap();
        assert!(!main_loop.dirty);
        main_loop.frame(&test_view()).unwrap();
    }

    #[test]
    fn immediate_schedule_runs_synchronously() {
        let instance = Instance::new(test_ctx());
        let mut main_loop = MainLoop::new(instance);
        main_loop.schedule_update(&test_view(), true).unwrap();
        assert!(!main_loop.dirty);
    }
}
