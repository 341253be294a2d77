//! Root layout and per-tile subdivision decisions.

use crate::extent::Extent;
use crate::view::{ScreenSpaceError, SseMode, View};

use super::arena::{TileArena, TileId};
use super::tile_mesh::TileMesh;

pub const MAX_ASPECT_RATIO: u32 = 10;

/// Picks `(x, y)` root subdivisions as square as possible while keeping
/// `x * y <= MAX_ASPECT_RATIO`.
pub fn select_best_subdivisions(extent: &Extent) -> (u32, u32) {
    let aspect = extent.width() / extent.height();
    let mut best = (1, 1);
    let mut best_score = f64::INFINITY;
    for y in 1..=MAX_ASPECT_RATIO {
        for x in 1..=MAX_ASPECT_RATIO {
            if x * y > MAX_ASPECT_RATIO {
                continue;
            }
            let candidate_aspect = (x as f64 / y as f64) / aspect.max(1e-12);
            let score = (candidate_aspect.ln()).abs();
            if score < best_score {
                best_score = score;
                best = (x, y);
            }
        }
    }
    best
}

/// Proportional root image size: longer axis gets more pixels, so every
/// root tile ends up with roughly square texels.
pub fn base_image_size(extent: &Extent, base_pixels: u32) -> (u32, u32) {
    if extent.width() >= extent.height() {
        let h = base_pixels;
        let w = (base_pixels as f64 * (extent.width() / extent.height())).round() as u32;
        (w.max(1), h)
    } else {
        let w = base_pixels;
        let h = (base_pixels as f64 * (extent.height() / extent.width())).round() as u32;
        (w, h.max(1))
    }
}

pub struct SubdivisionContext<'a> {
    pub view: &'a View,
    pub subdivision_threshold: f64,
    pub max_subdivision_level: u32,
    pub image_size: (u32, u32),
    pub elevation_ready: bool,
}

/// `true` iff `tile` should subdivide this frame.
pub fn needs_subdivision(tile: &TileMesh, ctx: &SubdivisionContext<'_>) -> bool {
    if tile.level >= ctx.max_subdivision_level {
        return false;
    }
    if !ctx.elevation_ready {
        return false;
    }
    let bb = tile.bounding_box();
    let Some(sse) = ScreenSpaceError::compute_from_box3(ctx.view, &bb, &cgmath::Matrix4::from_scale(1.0), SseMode::TwoD) else {
        return false;
    };
    let projected = (sse.lengths.x * sse.ratio).max(sse.lengths.y * sse.ratio);
    let threshold = ctx.subdivision_threshold * ctx.image_size.0.max(ctx.image_size.1) as f64;
    projected >= threshold
}

/// Creates 4 children in Morton order `[sw, se, nw, ne]`, inserts them into
/// `arena`, wires `parent.children`, and inherits the parent's elevation
/// range as a placeholder until real data arrives.
pub fn subdivide(arena: &mut TileArena, parent_id: TileId) -> [TileId; 4] {
    let parent = arena.get(parent_id).expect("subdivide called on missing tile");
    let parts = parent.extent.split(2, 2);
    let (px, py, level, elevation_range) = (parent.x, parent.y, parent.level, parent.elevation_range);

    // `Extent::split` is row-major south-to-north then west-to-east:
    // index 0=sw, 1=se, 2=nw, 3=se... actually 0=sw,1=se,2=nw,3=ne for a 2x2
    // split, which already matches Morton order for quadtrees.
    let coords = [(2 * px, 2 * py), (2 * px + 1, 2 * py), (2 * px, 2 * py + 1), (2 * px + 1, 2 * py + 1)];

    let mut children = [TileId::placeholder(); 4];
    for i in 0..4 {
        let mut child = TileMesh::new_root(parts[i].clone(), level + 1, coords[i].0, coords[i].1);
        child.parent = Some(parent_id);
        child.elevation_range = elevation_range;
        children[i] = arena.insert(child);
    }

    arena.get_mut(parent_id).unwrap().children = Some(children);
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::EPSG_3857;

    #[test]
    fn square_extent_splits_one_by_one() {
        let e = Extent::new(EPSG_3857, 0.0, 1.0, 0.0, 1.0).unwrap();
        assert_eq!(select_best_subdivisions(&e), (1, 1));
    }

    #[test]
    fn wide_extent_prefers_more_x_subdivisions() {
        let e = Extent::new(EPSG_3857, 0.0, 4.0, 0.0, 1.0).unwrap();
        let (x, y) = select_best_subdivisions(&e);
        assert!(x >= y);
        assert!(x * y <= MAX_ASPECT_RATIO);
    }

    #[test]
    fn subdivide_produces_four_morton_ordered_children() {
        let mut arena = TileArena::new();
        let root = arena.insert(TileMesh::new_root(Extent::new(EPSG_3857, 0.0, 2.0, 0.0, 2.0).unwrap(), 0, 0, 0));
        let children = subdivide(&mut arena, root);
        let coords: Vec<(u32, u32)> = children.iter().map(|id| {
            let t = arena.get(*id).unwrap();
            (t.x, t.y)
        }).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(arena.get(root).unwrap().children, Some(children));
    }
}
