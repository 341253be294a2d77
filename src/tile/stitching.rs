//! Neighbour lookup and terrain edge stitching.

use std::collections::HashMap;

use super::arena::{TileArena, TileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    level: u32,
    x: i64,
    y: i64,
}

/// Hash index keyed by `(level, x, y)`, maintained alongside the arena so
/// stitching can find a tile's neighbours in O(1) instead of walking the
/// quadtree.
#[derive(Default)]
pub struct TileIndex {
    map: HashMap<Key, TileId>,
}

impl TileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: u32, x: u32, y: u32, id: TileId) {
        self.map.insert(Key { level, x: x as i64, y: y as i64 }, id);
    }

    pub fn remove(&mut self, level: u32, x: u32, y: u32) {
        self.map.remove(&Key { level, x: x as i64, y: y as i64 });
    }

    pub fn get(&self, level: u32, x: i64, y: i64) -> Option<TileId> {
        self.map.get(&Key { level, x, y }).copied()
    }

    /// The 8 neighbours (N, S, E, W, NE, NW, SE, SW) of `(level, x, y)`, in
    /// that order; entries are `None` when no tile occupies that slot.
    pub fn neighbours(&self, level: u32, x: u32, y: u32) -> [Option<TileId>; 8] {
        let (x, y) = (x as i64, y as i64);
        [
            self.get(level, x, y + 1),     // N
            self.get(level, x, y - 1),     // S
            self.get(level, x + 1, y),     // E
            self.get(level, x - 1, y),     // W
            self.get(level, x + 1, y + 1), // NE
            self.get(level, x - 1, y + 1), // NW
            self.get(level, x + 1, y - 1), // SE
            self.get(level, x - 1, y - 1), // SW
        ]
    }
}

/// After the update pass, walks visible tiles and collects only the
/// neighbours eligible to stitch against: visible, non-disposed, and
/// carrying a loaded elevation texture (approximated here by a non-zero
/// elevation range, since texture load state lives in the layer pipeline).
pub fn eligible_neighbours(arena: &TileArena, index: &TileIndex, tile_id: TileId) -> Vec<TileId> {
    let Some(tile) = arena.get(tile_id) else { return Vec::new() };
    index
        .neighbours(tile.level, tile.x, tile.y)
        .into_iter()
        .flatten()
        .filter(|id| {
            arena.get(*id).map(|n| n.visible && !n.disposed && n.elevation_range.max > n.elevation_range.min).unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;
    use crate::tile::tile_mesh::TileMesh;

    #[test]
    fn neighbours_found_across_the_index() {
        let mut arena = TileArena::new();
        let mut index = TileIndex::new();
        let e = Extent::new(crate::crs::EPSG_3857, 0.0, 1.0, 0.0, 1.0).unwrap();

        let mut center = TileMesh::new_root(e.clone(), 1, 1, 1);
        center.visible = true;
        let center_id = arena.insert(center);
        index.insert(1, 1, 1, center_id);

        let mut north = TileMesh::new_root(e, 1, 1, 2);
        north.visible = true;
        north.elevation_range.max = 1.0;
        let north_id = arena.insert(north);
        index.insert(1, 1, 2, north_id);

        let found = eligible_neighbours(&arena, &index, center_id);
        assert_eq!(found, vec![north_id]);
    }
}
