//! Map picking: GPU-encoded pixel readback and CPU raycast,
//! both walking screen pixels in the same "closest-first" circular order.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::error::Result;
use crate::renderer::{PixelBuffer, Renderer, SceneRef};
use crate::view::View;

use super::arena::{TileArena, TileId};
use super::tile_mesh::TileMesh;

#[derive(Debug, Clone, Copy)]
pub struct MapPickResult {
    pub tile: TileId,
    pub world: Point3<f64>,
}

/// Visits integer pixel offsets around the origin in order of increasing
/// ring radius `0..=max_radius`, so the closest pixels are reported first.
/// `visitor(x, y, linear_index_into_a_(2*max_radius+1)^2_grid)` returning
/// `false` stops the walk early (enough hits collected).
pub fn pick_circle(max_radius: i32, mut visitor: impl FnMut(i32, i32, usize) -> bool) {
    let side = 2 * max_radius + 1;
    let to_linear = |x: i32, y: i32| -> usize { ((y + max_radius) * side + (x + max_radius)) as usize };

    if !visitor(0, 0, to_linear(0, 0)) {
        return;
    }
    for r in 1..=max_radius {
        let r_sq = r * r;
        let prev_sq = (r - 1) * (r - 1);
        for y in -r..=r {
            for x in -r..=r {
                let d = x * x + y * y;
                if d <= r_sq && d > prev_sq {
                    if !visitor(x, y, to_linear(x, y)) {
                        return;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Slab-method ray/AABB intersection; returns the entry distance.
    fn intersect_aabb(&self, min: Point3<f64>, max: Point3<f64>) -> Option<f64> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let (o, d, lo, hi) = match axis {
                0 => (self.origin.x, self.direction.x, min.x, max.x),
                1 => (self.origin.y, self.direction.y, min.y, max.y),
                _ => (self.origin.z, self.direction.z, min.z, max.z),
            };
            if d.abs() < 1e-12 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let mut t1 = (lo - o) / d;
            let mut t2 = (hi - o) / d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            None
        } else {
            Some(t_min.max(0.0))
        }
    }
}

/// Raycasts `ray` against every visible tile's bounding box, nearest first.
pub fn raycast_pick(arena: &TileArena, ray: &Ray) -> Vec<MapPickResult> {
    let mut hits: Vec<(f64, TileId, &TileMesh)> = arena
        .iter()
        .filter(|(_, t)| t.visible && !t.disposed && t.is_leaf())
        .filter_map(|(id, t)| {
            let bb = t.bounding_box();
            ray.intersect_aabb(bb.min, bb.max).map(|dist| (dist, id, t))
        })
        .collect();
    hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    hits.into_iter()
        .map(|(dist, id, _)| MapPickResult { tile: id, world: ray.origin + ray.direction.normalize() * dist })
        .collect()
}

/// GPU-based picking: renders the map into a small offscreen buffer, then
/// walks the pick radius in closest-first order decoding each pixel's
/// `(tileId, u, v)` channels. `decode` maps a raw pixel into a tile id plus
/// normalized `(u, v)` inside that tile, since the encoding is owned by the
/// renderer implementation, not this crate.
pub fn gpu_pick(
    renderer: &dyn Renderer,
    view: &View,
    radius: i32,
    target: crate::renderer::RenderTargetId,
    decode: impl Fn(&PixelBuffer, usize) -> Option<(TileId, f32, f32)>,
    arena: &TileArena,
    mut max_hits: usize,
) -> Result<Vec<MapPickResult>> {
    let scene = SceneRef::new(arena.len(), 0);
    let buffer = renderer.render_to_buffer(&scene, view, target)?;

    let mut results = Vec::new();
    pick_circle(radius, |_x, _y, linear| {
        if let Some((tile_id, u, v)) = decode(&buffer, linear) {
            if let Some(tile) = arena.get(tile_id) {
                let world_x = tile.extent.west + u as f64 * tile.extent.width();
                let world_y = tile.extent.south + v as f64 * tile.extent.height();
                results.push(MapPickResult { tile: tile_id, world: Point3::new(world_x, world_y, 0.0) });
                max_hits = max_hits.saturating_sub(1);
            }
        }
        max_hits > 0
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_circle_visits_origin_first() {
        let mut order = Vec::new();
        pick_circle(2, |x, y, _| {
            order.push((x, y));
            true
        });
        assert_eq!(order[0], (0, 0));
    }

    #[test]
    fn pick_circle_respects_early_abort() {
        let mut count = 0;
        pick_circle(5, |_, _, _| {
            count += 1;
            count < 3
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn ray_hits_box_it_passes_through() {
        let ray = Ray { origin: Point3::new(0.0, 0.0, -10.0), direction: Vector3::new(0.0, 0.0, 1.0) };
        let dist = ray.intersect_aabb(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(dist, Some(9.0));
    }

    #[test]
    fn ray_misses_box_to_the_side() {
        let ray = Ray { origin: Point3::new(5.0, 5.0, -10.0), direction: Vector3::new(0.0, 0.0, 1.0) };
        assert!(ray.intersect_aabb(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)).is_none());
    }
}
