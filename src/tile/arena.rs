//! Arena owning every [`TileMesh`] in a [`crate::tile::map::Map`]'s quadtree.
//! Generalizes the "cyclic scene graph" design note: instead
//! of parent/child `Rc`/`Weak` cycles, every tile is a plain value living in
//! one `Vec`, addressed by a typed index. Freed slots are recycled via a
//! free list so repeated subdivide/collapse cycles don't leak arena space.

use super::tile_mesh::TileMesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u32);

impl TileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Sentinel used only to construct a [`TileMesh`](super::tile_mesh::TileMesh)
    /// before it has a home; [`TileArena::insert`] always overwrites it.
    pub(crate) fn placeholder() -> Self {
        TileId(u32::MAX)
    }
}

enum Slot {
    Occupied(TileMesh),
    Free(Option<u32>),
}

pub struct TileArena {
    slots: Vec<Slot>,
    free_head: Option<u32>,
}

impl TileArena {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free_head: None }
    }

    pub fn insert(&mut self, mut tile: TileMesh) -> TileId {
        let id = if let Some(free) = self.free_head {
            let Slot::Free(next) = self.slots[free as usize] else {
                unreachable!("free list corrupted")
            };
            self.free_head = next;
            TileId(free)
        } else {
            self.slots.push(Slot::Free(None));
            TileId(self.slots.len() as u32 - 1)
        };
        tile.id = id;
        self.slots[id.index()] = Slot::Occupied(tile);
        id
    }

    pub fn remove(&mut self, id: TileId) -> Option<TileMesh> {
        match std::mem::replace(&mut self.slots[id.index()], Slot::Free(self.free_head)) {
            Slot::Occupied(tile) => {
                self.free_head = Some(id.0);
                Some(tile)
            }
            occupied_or_already_free @ Slot::Free(_) => {
                // Put back the slot we just clobbered; nothing was removed.
                self.slots[id.index()] = occupied_or_already_free;
                None
            }
        }
    }

    pub fn get(&self, id: TileId) -> Option<&TileMesh> {
        match self.slots.get(id.index())? {
            Slot::Occupied(t) => Some(t),
            Slot::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut TileMesh> {
        match self.slots.get_mut(id.index())? {
            Slot::Occupied(t) => Some(t),
            Slot::Free(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &TileMesh)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied(t) => Some((TileId(i as u32), t)),
            Slot::Free(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Occupied(_))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TileArena {
    fn default() -> Self {
        Self::new()
    }
}
