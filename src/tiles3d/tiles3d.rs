//! `Tiles3D` entity: streams an external 3D Tiles
//! hierarchy, refining by `ADD`/`REPLACE` via a recursive descent that
//! resolves content URLs and gates on screen-space error, and prioritizes the
//! resulting fetch backlog by distance to the camera.

use std::sync::Arc;

use cgmath::{InnerSpace, Vector3};

use crate::error::{EngineError, Result};
use crate::view::frustum::{is_bounding_volume_visible, FrustumPlanes5};

use super::bounding_volume::OrientedBoundingBox;
use super::tileset::{classify_content, is_nested_tileset, resolve_url, ContentKind, Refine, Tile, TileKey, Tileset};

/// Decodes `b3dm`/`pnts` payload bytes into renderer-consumable vertex
/// buffers; decoding is an external collaborator's concern, so this is only
/// a trait.
pub trait ContentDecoder: Send + Sync {
    fn decode_b3dm(&self, bytes: &[u8]) -> Result<()>;
    fn decode_pnts(&self, bytes: &[u8]) -> Result<()>;
}

/// Per-frame camera inputs to the refinement test, kept independent of any
/// concrete `Camera` type.
#[derive(Debug, Clone, Copy)]
pub struct RefinementQuery {
    pub camera_position: Vector3<f64>,
    pub screen_height_px: f64,
    pub vertical_fov_radians: f64,
    pub sse_threshold: f64,
    pub frustum_planes: FrustumPlanes5,
}

/// `true` iff `tile` should be refined (its children considered) at the
/// current camera pose. A non-finite/huge geometric error always refines
/// (root sentinel), and distance is floored to 1% of the bounding box
/// diagonal to avoid a division blow-up when the camera sits inside the
/// volume.
pub fn refine(tile: &Tile, query: &RefinementQuery) -> bool {
    if !tile.geometric_error.is_finite() || tile.geometric_error > 1e20 {
        return true;
    }
    let obb = tile.bounding_volume.to_obb();
    let closest = obb.closest_point(query.camera_position);
    let is_inside = (closest - query.camera_position).magnitude() < f64::EPSILON;
    let dist = if is_inside { 0.0 } else { (closest - query.camera_position).magnitude().max(obb.diagonal() * 0.01) };

    let sse = (tile.geometric_error * query.screen_height_px) / (dist.max(1e-9) * (query.vertical_fov_radians * 0.5).tan() * 2.0);
    sse > query.sse_threshold
}

/// One entry in the pending-fetch backlog: url + bounding volume center +
/// in-frustum flag, enough to prioritize without re-walking the tree.
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub key: TileKey,
    pub url: String,
    pub center: Vector3<f64>,
    pub in_frustum: bool,
}

/// Orders `backlog` for dispatch: in-frustum tiles first, each group sorted
/// by ascending distance to `camera_position`. A pure comparator rather than
/// a channel-draining loop, since this crate submits work through
/// [`crate::request_queue::RequestQueue`] rather than its own worker loop.
pub fn prioritize(backlog: &mut [PendingFetch], camera_position: Vector3<f64>) {
    backlog.sort_by(|a, b| {
        match (a.in_frustum, b.in_frustum) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => {
                let da = (a.center - camera_position).magnitude2();
                let db = (b.center - camera_position).magnitude2();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            }
        }
    });
}

/// One loaded node of the 3D Tiles hierarchy, resolved against its parent
/// tileset's base URL.
pub struct LoadedTile {
    pub tile: Tile,
    pub resolved_content_url: Option<String>,
    pub refine: Refine,
    pub visible: bool,
}

/// Streams a 3D Tiles hierarchy rooted at `root_url`. Holds only resolved
/// metadata; actual geometry lives wherever the [`ContentDecoder`] places it.
pub struct Tiles3D {
    pub root_url: String,
    pub decoder: Arc<dyn ContentDecoder>,
    pub loaded: Vec<LoadedTile>,
    pub pending: Vec<PendingFetch>,
}

impl Tiles3D {
    pub fn new(root_url: impl Into<String>, decoder: Arc<dyn ContentDecoder>) -> Self {
        Self { root_url: root_url.into(), decoder, loaded: Vec::new(), pending: Vec::new() }
    }

    /// Parses the root tileset document and walks it once, gating descent by
    /// [`refine`] and collecting leaf/sub-tileset fetches into `self.pending`.
    /// The actual HTTP round-trip is left to the caller's
    /// `RequestQueue`/`ImageSource`-style source.
    pub fn load_root(&mut self, root_json: &[u8], query: &RefinementQuery) -> Result<()> {
        let tileset: Tileset = serde_json::from_slice(root_json).map_err(|e| EngineError::DefinitiveData(format!("invalid tileset root: {e}")))?;
        self.process_tile(tileset.root, &self.root_url.clone(), query)
    }

    fn process_tile(&mut self, tile: Tile, tileset_url: &str, query: &RefinementQuery) -> Result<()> {
        let needs_refinement = refine(&tile, query);
        let obb = tile.bounding_volume.to_obb();
        let in_frustum = is_bounding_volume_visible(&query.frustum_planes, &obb.to_aabb());
        let mut added_geometry = false;

        if let Some(content) = &tile.content {
            let resolved = resolve_url(tileset_url, &content.uri)?;
            let refine_mode = tile.refine_or_default();

            if is_nested_tileset(&resolved) {
                self.pending.push(PendingFetch { key: super::tileset::tile_key(&resolved), url: resolved, center: obb.center, in_frustum });
            } else if refine_mode == Refine::Add || tile.children.is_none() || !needs_refinement {
                added_geometry = true;
                self.pending.push(PendingFetch { key: super::tileset::tile_key(&resolved), url: resolved.clone(), center: obb.center, in_frustum });
                self.loaded.push(LoadedTile { tile: tile.clone(), resolved_content_url: Some(resolved), refine: refine_mode, visible: true });
            }
        }

        if needs_refinement || !added_geometry {
            if let Some(children) = tile.children.clone() {
                for child in children {
                    self.process_tile(child, tileset_url, query)?;
                }
            }
        }
        Ok(())
    }

    /// Applies decoded content once its fetch resolves, dispatching by the
    /// classified content kind. Dead content (unrecognized magic) is
    /// dropped with a warning.
    pub fn apply_content(&self, uri: &str, bytes: &[u8]) -> Result<()> {
        match classify_content(uri, bytes) {
            Some(ContentKind::Batched3dModel) => self.decoder.decode_b3dm(bytes),
            Some(ContentKind::Points) => self.decoder.decode_pnts(bytes),
            Some(ContentKind::SubTileset) => Ok(()),
            None => {
                tracing::warn!(uri, "unrecognized 3D Tiles content, dropping");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles3d::tileset::{BoundingVolume, TileContent};
    use cgmath::{Matrix4, SquareMatrix};

    fn huge_root_tile() -> Tile {
        Tile {
            bounding_volume: BoundingVolume { bounding_box: [0.0; 12] },
            geometric_error: f64::INFINITY,
            refine: None,
            content: None,
            children: None,
        }
    }

    fn sees_everything() -> FrustumPlanes5 {
        crate::view::frustum::extract_frustum_planes_5(&Matrix4::identity())
    }

    fn default_query() -> RefinementQuery {
        RefinementQuery { camera_position: Vector3::new(0.0, 0.0, 100.0), screen_height_px: 1024.0, vertical_fov_radians: 1.0, sse_threshold: 16.0, frustum_planes: sees_everything() }
    }

    #[test]
    fn root_sentinel_with_infinite_error_always_refines() {
        assert!(refine(&huge_root_tile(), &default_query()));
    }

    #[test]
    fn distant_small_tile_does_not_refine() {
        let tile = Tile {
            bounding_volume: BoundingVolume { bounding_box: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0] },
            geometric_error: 0.001,
            refine: None,
            content: None,
            children: None,
        };
        let query = RefinementQuery { camera_position: Vector3::new(0.0, 0.0, 1_000_000.0), ..default_query() };
        assert!(!refine(&tile, &query));
    }

    struct NoopDecoder;
    impl ContentDecoder for NoopDecoder {
        fn decode_b3dm(&self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
        fn decode_pnts(&self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn process_tile_marks_tiles_outside_the_frustum() {
        let tile = Tile {
            bounding_volume: BoundingVolume { bounding_box: [1000.0, 1000.0, 1000.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0] },
            geometric_error: 0.0,
            refine: None,
            content: Some(TileContent { uri: "leaf.b3dm".into() }),
            children: None,
        };
        let proj: Matrix4<f64> = cgmath::PerspectiveFov { fovy: cgmath::Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 100.0 }.into();
        let query = RefinementQuery { frustum_planes: crate::view::frustum::extract_frustum_planes_5(&proj), ..default_query() };

        let mut engine = Tiles3D::new("https://example.com/tileset.json", Arc::new(NoopDecoder));
        engine.process_tile(tile, "https://example.com/tileset.json", &query).unwrap();

        assert_eq!(engine.pending.len(), 1);
        assert!(!engine.pending[0].in_frustum);
    }

    #[test]
    fn prioritize_puts_in_frustum_tiles_first() {
        let mut backlog = vec![
            PendingFetch { key: super::super::tileset::tile_key("a"), url: "a".into(), center: Vector3::new(0.0, 0.0, 0.0), in_frustum: false },
            PendingFetch { key: super::super::tileset::tile_key("b"), url: "b".into(), center: Vector3::new(0.0, 0.0, 0.0), in_frustum: true },
        ];
        prioritize(&mut backlog, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(backlog[0].url, "b");
    }
}
