//! 3D Tiles JSON schema and URI resolution, generalized to an arbitrary
//! tileset root rather than one hardcoded endpoint.

use serde::Deserialize;
use url::Url;

use crate::error::{EngineError, Result};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    #[serde(rename = "box")]
    pub bounding_box: [f64; 12],
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Refine {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "REPLACE")]
    Replace,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TileContent {
    pub uri: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tile {
    #[serde(rename = "boundingVolume")]
    pub bounding_volume: BoundingVolume,
    #[serde(rename = "geometricError")]
    pub geometric_error: f64,
    pub refine: Option<Refine>,
    pub content: Option<TileContent>,
    pub children: Option<Vec<Tile>>,
}

impl Tile {
    /// `REPLACE` is the 3D Tiles default when a tile omits `refine`.
    pub fn refine_or_default(&self) -> Refine {
        self.refine.unwrap_or(Refine::Replace)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Asset {
    pub version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tileset {
    pub asset: Asset,
    pub root: Tile,
}

/// A stable key for a leaf content payload, used to dedupe in-flight fetches
/// in the [`crate::request_queue::RequestQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey(u64);

pub fn tile_key(resolved_url: &str) -> TileKey {
    TileKey(crate::helpers::hash_str(resolved_url))
}

/// Resolves `relative` against `base`: absolute `http(s)` URIs pass through
/// unchanged, everything else is joined onto `base` with any query string
/// stripped first.
pub fn resolve_url(base: &str, relative: &str) -> Result<String> {
    if relative.starts_with("http") {
        return Ok(relative.to_string());
    }
    let mut base_url = Url::parse(base).map_err(|e| EngineError::DefinitiveData(format!("invalid tileset base url: {e}")))?;
    base_url.set_query(None);
    base_url
        .join(relative)
        .map(|u| u.to_string())
        .map_err(|e| EngineError::DefinitiveData(format!("failed to resolve tile uri: {e}")))
}

/// `true` iff `uri` points at a nested tileset JSON document rather than leaf
/// content.
pub fn is_nested_tileset(uri: &str) -> bool {
    Url::parse(uri).map(|u| u.path().ends_with(".json")).unwrap_or_else(|_| uri.split('?').next().map_or(false, |p| p.ends_with(".json")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    SubTileset,
    Batched3dModel,
    Points,
}

/// Classifies content by magic bytes per the 3D Tiles format: `{` for
/// sub-tileset JSON, `b3dm`/`pnts` four-byte magic for binary payloads.
pub fn classify_content(uri: &str, first_bytes: &[u8]) -> Option<ContentKind> {
    if is_nested_tileset(uri) {
        return Some(ContentKind::SubTileset);
    }
    match first_bytes.get(0..4)? {
        b"b3dm" => Some(ContentKind::Batched3dModel),
        b"pnts" => Some(ContentKind::Points),
        b"{\"as" | b"{\r\n" | b"{\n  " => Some(ContentKind::SubTileset),
        _ if first_bytes.first() == Some(&b'{') => Some(ContentKind::SubTileset),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uri_resolves_against_base() {
        let resolved = resolve_url("https://example.com/tileset.json?key=abc", "sub/tileset.json").unwrap();
        assert_eq!(resolved, "https://example.com/sub/tileset.json");
    }

    #[test]
    fn absolute_http_uri_passes_through() {
        let resolved = resolve_url("https://example.com/a.json", "https://other.com/b.json").unwrap();
        assert_eq!(resolved, "https://other.com/b.json");
    }

    #[test]
    fn nested_tileset_detected_by_json_extension() {
        assert!(is_nested_tileset("https://example.com/a/tileset.json"));
        assert!(!is_nested_tileset("https://example.com/a/tile.b3dm"));
    }

    #[test]
    fn classify_content_recognizes_b3dm_magic() {
        assert_eq!(classify_content("tile.glb", b"b3dm0000"), Some(ContentKind::Batched3dModel));
    }
}
