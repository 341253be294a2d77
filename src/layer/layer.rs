//! `Layer`: the producer of a texture per node. A tagged-variant family
//! rather than a duck-typed `isColorLayer`/`isMaskLayer`.

use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;
use crate::error::Result;
use crate::extent::Extent;
use crate::renderer::{DataType, FilterMode, PixelFormat, RenderTargetDescriptor};
use crate::tile::arena::TileId;

use super::atlas::{box_size, Atlas, LayerKey};
use super::composer::LayerComposer;
use super::source::{DecodedImage, ImageSource};
use super::target::{Target, TargetState};
use super::update_state::LayerUpdateState;

pub const DEFAULT_MARGIN_FRACTION: f64 = 0.05;
pub const DEFAULT_MARGIN_PIXELS: f64 = 4.0;

/// Salt XORed into a layer's id to derive its fallback image's id, kept
/// distinct from any real `ImageRequest::id` the layer's source can hand out.
const FALLBACK_IMAGE_ID_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// A color layer repacks its locked images into `state.atlas` once a single
/// target is compositing more images than this many texture units.
const ATLAS_REPACK_THRESHOLD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColoringRole {
    Color,
    Mask,
}

pub struct ElevationRangeTracker {
    pub min: f32,
    pub max: f32,
}

impl Default for ElevationRangeTracker {
    fn default() -> Self {
        Self { min: f32::INFINITY, max: f32::NEG_INFINITY }
    }
}

impl ElevationRangeTracker {
    pub fn refine(&mut self, min: f32, max: f32) {
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }
}

pub enum Layer {
    Color { id: u64, source: Arc<dyn ImageSource>, state: LayerState },
    /// Cannot be unloaded per-tile: must stay defined over the whole map
    /// surface for masking semantics to hold.
    Mask { id: u64, source: Arc<dyn ImageSource>, state: LayerState },
    Elevation { id: u64, source: Arc<dyn ImageSource>, range: ElevationRangeTracker, state: LayerState },
}

/// Shelf width an atlas repack packs into; wide enough that a handful of
/// per-tile color sources rarely spill past a second shelf.
const ATLAS_MAX_WIDTH: u32 = 2048;

pub struct LayerState {
    pub composer: LayerComposer,
    pub targets: std::collections::HashMap<TileId, Target>,
    pub update_states: std::collections::HashMap<TileId, LayerUpdateState>,
    pub atlas: Atlas,
}

impl Default for LayerState {
    fn default() -> Self {
        Self { composer: LayerComposer::default(), targets: Default::default(), update_states: Default::default(), atlas: Atlas::new(ATLAS_MAX_WIDTH) }
    }
}

impl Layer {
    pub fn id(&self) -> u64 {
        match self {
            Layer::Color { id, .. } | Layer::Mask { id, .. } | Layer::Elevation { id, .. } => *id,
        }
    }

    fn source(&self) -> &Arc<dyn ImageSource> {
        match self {
            Layer::Color { source, .. } | Layer::Mask { source, .. } | Layer::Elevation { source, .. } => source,
        }
    }

    fn state_mut(&mut self) -> &mut LayerState {
        match self {
            Layer::Color { state, .. } | Layer::Mask { state, .. } | Layer::Elevation { state, .. } => state,
        }
    }

    fn pixel_format(&self) -> (PixelFormat, DataType) {
        match self {
            Layer::Color { .. } | Layer::Mask { .. } => (PixelFormat::Rgba8, DataType::U8),
            Layer::Elevation { .. } => (PixelFormat::Rg32Float, DataType::F32),
        }
    }

    /// The node's current paint state, or `None` if it has never been
    /// registered with this layer — callers gating on readiness (e.g. the
    /// map's elevation-ready subdivision check) must treat that the same as
    /// "not complete".
    pub fn target_state(&self, node: TileId) -> Option<TargetState> {
        match self {
            Layer::Color { state, .. } | Layer::Mask { state, .. } | Layer::Elevation { state, .. } => state.targets.get(&node).map(|t| t.state),
        }
    }

    /// The layer-wide elevation range refined so far from arrived textures,
    /// or `None` before any `Layer::Elevation` texture has completed.
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        match self {
            Layer::Elevation { range, .. } if range.max > range.min => Some((range.min, range.max)),
            _ => None,
        }
    }

    fn fallback_image_id(&self) -> u64 {
        self.id() ^ FALLBACK_IMAGE_ID_SALT
    }

    /// A 1x1 placeholder in the layer's own pixel format: a neutral gray for
    /// color/mask layers, a "no data" sample for elevation so it never
    /// masquerades as a real height.
    fn fallback_image(&self, format: PixelFormat, data_type: DataType) -> DecodedImage {
        let pixels = match (format, data_type) {
            (PixelFormat::Rg32Float, DataType::F32) => {
                let mut bytes = Vec::with_capacity(8);
                bytes.extend_from_slice(&0f32.to_le_bytes());
                bytes.extend_from_slice(&0f32.to_le_bytes());
                bytes
            }
            _ => vec![128, 128, 128, 255],
        };
        DecodedImage { id: self.fallback_image_id(), pixels, width: 1, height: 1 }
    }

    /// Idempotent per-node update, called every frame for visible nodes.
    pub fn update(&mut self, ctx: &Context, node: TileId, geometry_extent: &Extent, paint_size: (u32, u32), visible: bool) -> Result<()> {
        let synchronous = self.source().synchronous();
        let source_extent = self.source().extent();
        let (format, data_type) = self.pixel_format();
        let state = self.state_mut();

        if !state.targets.contains_key(&node) {
            let target = Target::new(node, geometry_extent.clone(), DEFAULT_MARGIN_FRACTION, DEFAULT_MARGIN_PIXELS, paint_size.0, paint_size.1);
            state.targets.insert(node, target);
        }

        let paint_extent = state.targets.get(&node).unwrap().extent.clone();
        if let Some(source_extent) = &source_extent {
            if !paint_extent.intersects(source_extent) {
                let target = state.targets.get_mut(&node).unwrap();
                target.state = TargetState::Complete;
                return Ok(());
            }
        }

        if synchronous {
            return self.update_synchronous(ctx, node, &paint_extent, paint_size, format, data_type);
        }

        self.update_async(ctx, node, &paint_extent, paint_size, format, data_type, visible)
    }

    fn update_synchronous(
        &mut self,
        ctx: &Context,
        node: TileId,
        paint_extent: &Extent,
        paint_size: (u32, u32),
        format: PixelFormat,
        data_type: DataType,
    ) -> Result<()> {
        let requests = self.source().requests_for(paint_extent, paint_size.0, paint_size.1);
        let source_arc = self.source().clone();
        let state = self.state_mut();
        for req in &requests {
            if !state.composer.has(req.id) {
                let image = source_arc.fetch(req)?;
                state.composer.add(image, false);
            }
            state.composer.lock(req.id, node);
        }
        self.acquire_and_finalize(ctx, node, format, data_type)
    }

    fn update_async(
        &mut self,
        ctx: &Context,
        node: TileId,
        paint_extent: &Extent,
        paint_size: (u32, u32),
        format: PixelFormat,
        data_type: DataType,
        visible: bool,
    ) -> Result<()> {
        let requests = self.source().requests_for(paint_extent, paint_size.0, paint_size.1);
        let source_arc = self.source().clone();
        let fallback_image = self.fallback_image(format, data_type);
        let fallback_id = fallback_image.id;
        let state = self.state_mut();
        let target = state.targets.get_mut(&node).unwrap();
        target.state = TargetState::Processing;
        target.image_ids = requests.iter().map(|r| r.id).collect();

        // Paint whatever is available now: an immortal solid-color fallback,
        // shared by every node of this layer, while the real fetch resolves.
        if state.composer.does_not_have(fallback_id) {
            state.composer.add(fallback_image, true);
        }
        state.composer.lock(fallback_id, node);

        for req in requests {
            if state.composer.has(req.id) {
                state.composer.lock(req.id, node);
                continue;
            }
            let source = source_arc.clone();
            let image_cache = ctx.image_cache.clone();
            let req_id = req.id;
            let fut_req = req.clone();
            let _ = ctx.image_requests.enqueue(req_id, move || visible, move || {
                let source = source.clone();
                let image_cache = image_cache.clone();
                async move {
                    if let Some(cached) = image_cache.get(&req_id) {
                        return Ok(cached);
                    }
                    let decoded = source.fetch(&fut_req)?;
                    image_cache.insert(req_id, decoded.clone());
                    Ok(decoded)
                }
            });
        }

        self.acquire_and_finalize(ctx, node, format, data_type)
    }

    fn acquire_and_finalize(&mut self, ctx: &Context, node: TileId, format: PixelFormat, data_type: DataType) -> Result<()> {
        let is_elevation = matches!(self, Layer::Elevation { .. });
        let is_color = matches!(self, Layer::Color { .. });

        let state = self.state_mut();
        let target = state.targets.get_mut(&node).unwrap();
        if target.render_target.is_none() {
            let desc = RenderTargetDescriptor { width: target.width, height: target.height, format, data_type, filter: FilterMode::Linear };
            target.render_target = Some(ctx.render_target_pool.acquire(desc)?);
        }
        let composite = state.composer.render(target, ctx.renderer.as_ref())?;
        target.paint_count += 1;
        target.state = if composite.is_last_render { TargetState::Complete } else { TargetState::Pending };
        let image_count = target.image_ids.len();

        let refined_range = if is_elevation && composite.is_last_render {
            elevation_pixel_range(&state.composer, &target.image_ids)
        } else {
            None
        };

        if is_color && image_count > ATLAS_REPACK_THRESHOLD {
            let sizes: Vec<(LayerKey, u32, u32)> = state
                .composer
                .all_images()
                .map(|image| {
                    let (w, h) = box_size((image.width, image.height), 1.0);
                    (LayerKey(image.id), w, h)
                })
                .collect();
            state.atlas.repack(sizes);
        }

        if let Some((min, max)) = refined_range {
            if let Layer::Elevation { range, .. } = self {
                range.refine(min, max);
            }
        }
        Ok(())
    }

    /// `deleteUnusedTargets`: sweeps targets smallest (highest-LOD) first,
    /// releasing any that are invisible, deep enough (`level > 0`), not on
    /// a "sticky" level (`level % 3 == 0` retains fallback data), and whose
    /// ancestor chain has at least one loaded fallback.
    pub fn delete_unused_targets(&mut self, ctx: &Context, is_visible: impl Fn(TileId) -> bool, level_of: impl Fn(TileId) -> u32, has_loaded_ancestor: impl Fn(TileId) -> bool) {
        let state = self.state_mut();
        let mut candidates: Vec<TileId> = state.targets.keys().copied().collect();
        candidates.sort_by_key(|id| std::cmp::Reverse(level_of(*id)));

        for id in candidates {
            let level = level_of(id);
            if is_visible(id) || level == 0 || level % 3 == 0 || !has_loaded_ancestor(id) {
                continue;
            }
            self.unregister_node(ctx, id);
        }
    }

    pub fn unregister_node(&mut self, ctx: &Context, node: TileId) {
        let state = self.state_mut();
        if let Some(target) = state.targets.remove(&node) {
            if let Some(rt) = target.render_target {
                let desc = RenderTargetDescriptor {
                    width: target.width,
                    height: target.height,
                    format: PixelFormat::Rgba8,
                    data_type: DataType::U8,
                    filter: FilterMode::Linear,
                };
                ctx.render_target_pool.release(desc, rt);
            }
        }
        state.composer.unlock_all_for(node);
        state.update_states.remove(&node);
    }

    pub fn abort_node(&mut self, node: TileId) {
        if let Some(target) = self.state_mut().targets.get_mut(&node) {
            target.abort();
        }
    }

    pub fn now() -> Instant {
        Instant::now()
    }
}

/// Scans every locked image among `image_ids` for its `[value, mask, ...]`
/// f32 pairs and returns the min/max of samples with a non-zero mask, or
/// `None` if nothing has a valid sample yet.
fn elevation_pixel_range(composer: &LayerComposer, image_ids: &[u64]) -> Option<(f32, f32)> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut found = false;
    for id in image_ids {
        let Some(image) = composer.image(*id) else { continue };
        for chunk in image.pixels.chunks_exact(8) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let mask = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            if mask != 0.0 {
                min = min.min(value);
                max = max.max(value);
                found = true;
            }
        }
    }
    found.then_some((min, max))
}
