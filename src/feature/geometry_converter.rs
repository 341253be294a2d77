//! Converts vector-source geometries into GPU meshes.
//! Tagged `Geometry`/`GeometryMesh` variants, not duck-typed
//! `isPolygon`/`isPoint` flags.

use std::collections::HashMap;

use crate::helpers::hash_str;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub enum Geometry {
    Point(Point2),
    MultiPoint(Vec<Point2>),
    LineString(Vec<Point2>),
    MultiLineString(Vec<Vec<Point2>>),
    /// `rings[0]` is the exterior ring, the rest are holes.
    Polygon { rings: Vec<Vec<Point2>> },
    MultiPolygon(Vec<Vec<Vec<Point2>>>),
}

/// A closed hash domain for style values: anything outside
/// `{null, string, number, boolean, color, uuid}` is a programmer error,
/// enforced here by the type system rather than a runtime duck-type check.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Null,
    Str(String),
    Number(f64),
    Bool(bool),
    /// An RGBA color, equivalent to the source's `{getHexString}` objects.
    Color(u32),
    /// A generator-owned resource's stable identity, equivalent to the
    /// source's `{uuid}` objects (e.g. a shared texture or geometry).
    Uuid(String),
}

#[derive(Debug, Clone, Default)]
pub struct Style {
    fields: Vec<(String, StyleValue)>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: StyleValue) {
        self.fields.push((key.into(), value));
    }
}

/// A stable textual hash over the style's sorted fields, used as the
/// material cache key.
pub fn style_hash(style: &Style) -> u64 {
    let mut fields = style.fields.clone();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    let mut text = String::new();
    for (key, value) in fields {
        text.push_str(&key);
        text.push('=');
        match value {
            StyleValue::Null => text.push_str("null"),
            StyleValue::Str(s) => text.push_str(&s),
            StyleValue::Number(n) => text.push_str(&n.to_bits().to_string()),
            StyleValue::Bool(b) => text.push_str(if b { "true" } else { "false" }),
            StyleValue::Color(c) => text.push_str(&format!("#{c:08x}")),
            StyleValue::Uuid(u) => text.push_str(&u),
        }
        text.push(';');
    }
    hash_str(&text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u64);

/// Every unique style yields exactly one material instance, shared across
/// all meshes using that style. Mutating a shared material affects
/// all its consumers, by design.
#[derive(Default)]
pub struct MaterialCache {
    by_hash: HashMap<u64, MaterialId>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, style: &Style) -> MaterialId {
        let hash = style_hash(style);
        *self.by_hash.entry(hash).or_insert(MaterialId(hash))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Extrusion {
    pub uniform_height: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum GeometryMesh {
    Polygon { vertices: Vec<[f32; 3]>, normals: Vec<[f32; 3]>, indices: Vec<u32>, material: MaterialId },
    /// A ring or line string rendered as a thick line; `width` is in pixels
    /// unless `world_units` is set.
    Line { vertices: Vec<[f32; 3]>, width: f32, world_units: bool, material: MaterialId },
    /// A camera-facing sprite; `scale` is filled in by the pre-render scale
    /// hook, not at conversion time (depends on live camera distance).
    Sprite { position: [f32; 3], material: MaterialId },
}

pub struct GeometryConverter {
    pub materials: MaterialCache,
}

impl GeometryConverter {
    pub fn new() -> Self {
        Self { materials: MaterialCache::new() }
    }

    pub fn convert(&mut self, geometry: &Geometry, style: &Style, extrusion: Option<Extrusion>) -> Vec<GeometryMesh> {
        let material = self.materials.get_or_insert(style);
        match geometry {
            Geometry::Point(p) => vec![sprite_mesh(*p, material)],
            Geometry::MultiPoint(points) => points.iter().map(|p| sprite_mesh(*p, material)).collect(),
            Geometry::LineString(points) => vec![line_mesh(points, material)],
            Geometry::MultiLineString(lines) => lines.iter().map(|l| line_mesh(l, material)).collect(),
            Geometry::Polygon { rings } => vec![polygon_mesh(rings, extrusion, material)],
            Geometry::MultiPolygon(polys) => polys.iter().map(|rings| polygon_mesh(rings, extrusion, material)).collect(),
        }
    }
}

impl Default for GeometryConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn sprite_mesh(p: Point2, material: MaterialId) -> GeometryMesh {
    GeometryMesh::Sprite { position: [p.x as f32, p.y as f32, 0.0], material }
}

fn line_mesh(points: &[Point2], material: MaterialId) -> GeometryMesh {
    GeometryMesh::Line { vertices: points.iter().map(|p| [p.x as f32, p.y as f32, 0.0]).collect(), width: 2.0, world_units: false, material }
}

/// Builds the render mesh for one polygon: ear-clips the (hole-bridged)
/// exterior into a flat mesh, then optionally extrudes it along +Z with
/// duplicated side-wall vertices for faceted normals.
fn polygon_mesh(rings: &[Vec<Point2>], extrusion: Option<Extrusion>, material: MaterialId) -> GeometryMesh {
    let merged = bridge_holes(rings);
    let indices = ear_clip(&merged);

    match extrusion {
        None => {
            let vertices: Vec<[f32; 3]> = merged.iter().map(|p| [p.x as f32, p.y as f32, 0.0]).collect();
            let normals = vec![[0.0, 0.0, 1.0]; vertices.len()];
            GeometryMesh::Polygon { vertices, normals, indices, material }
        }
        Some(ext) => extrude(&merged, &indices, ext.uniform_height.unwrap_or(1.0), material),
    }
}

/// Connects each hole to the exterior ring via its nearest vertex pair,
/// producing one simple (self-touching) polygon ear clipping can consume
/// directly. A standard technique for hole-aware ear clipping without a
/// full constrained-triangulation library.
fn bridge_holes(rings: &[Vec<Point2>]) -> Vec<Point2> {
    let Some((exterior, holes)) = rings.split_first() else { return Vec::new() };
    let mut merged = exterior.clone();
    for hole in holes {
        if hole.is_empty() {
            continue;
        }
        let (ext_idx, hole_idx) = nearest_pair(&merged, hole);
        let mut bridged = Vec::with_capacity(merged.len() + hole.len() + 2);
        bridged.extend_from_slice(&merged[..=ext_idx]);
        bridged.extend(hole[hole_idx..].iter().chain(hole[..=hole_idx].iter()).cloned());
        bridged.extend_from_slice(&merged[ext_idx..]);
        merged = bridged;
    }
    merged
}

fn nearest_pair(exterior: &[Point2], hole: &[Point2]) -> (usize, usize) {
    let mut best = (0, 0, f64::INFINITY);
    for (i, e) in exterior.iter().enumerate() {
        for (j, h) in hole.iter().enumerate() {
            let d = (e.x - h.x).powi(2) + (e.y - h.y).powi(2);
            if d < best.2 {
                best = (i, j, d);
            }
        }
    }
    (best.0, best.1)
}

fn signed_area(ring: &[Point2]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

fn point_in_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let sign = |p1: Point2, p2: Point2, p3: Point2| (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y);
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Classic O(n^2) ear-clipping triangulation of a single simple polygon.
fn ear_clip(ring: &[Point2]) -> Vec<u32> {
    if ring.len() < 3 {
        return Vec::new();
    }
    let ccw = signed_area(ring) > 0.0;
    let mut remaining: Vec<usize> = (0..ring.len()).collect();
    let mut indices = Vec::with_capacity((ring.len() - 2) * 3);

    let mut guard = 0;
    while remaining.len() > 2 && guard < ring.len() * ring.len() + 8 {
        guard += 1;
        let n = remaining.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = remaining[(i + n - 1) % n];
            let cur = remaining[i];
            let next = remaining[(i + 1) % n];
            let (a, b, c) = (ring[prev], ring[cur], ring[next]);

            let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            let is_convex = if ccw { cross > 0.0 } else { cross < 0.0 };
            if !is_convex {
                continue;
            }

            let any_inside = remaining
                .iter()
                .filter(|&&idx| idx != prev && idx != cur && idx != next)
                .any(|&idx| point_in_triangle(ring[idx], a, b, c));
            if any_inside {
                continue;
            }

            indices.push(prev as u32);
            indices.push(cur as u32);
            indices.push(next as u32);
            remaining.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            break;
        }
    }
    indices
}

/// Extrudes a flat polygon `uniform_height` along +Z: top cap keeps the flat
/// winding, bottom cap is reversed, and side walls get their own duplicated
/// vertices so each quad's normal is faceted rather than smoothed.
fn extrude(ring: &[Point2], cap_indices: &[u32], uniform_height: f64, material: MaterialId) -> GeometryMesh {
    let n = ring.len();
    let mut vertices = Vec::with_capacity(n * 2 + n * 4);
    let mut normals = Vec::with_capacity(vertices.capacity());
    let mut indices = Vec::with_capacity(cap_indices.len() * 2 + n * 6);

    for p in ring {
        vertices.push([p.x as f32, p.y as f32, uniform_height as f32]);
        normals.push([0.0, 0.0, 1.0]);
    }
    for p in ring {
        vertices.push([p.x as f32, p.y as f32, 0.0]);
        normals.push([0.0, 0.0, -1.0]);
    }
    indices.extend(cap_indices.iter().copied());
    for chunk in cap_indices.chunks(3) {
        if let [a, b, c] = *chunk {
            indices.extend([c + n as u32, b + n as u32, a + n as u32]);
        }
    }

    for i in 0..n {
        let j = (i + 1) % n;
        let base = vertices.len() as u32;
        let top_a = ring[i];
        let top_b = ring[j];
        vertices.push([top_a.x as f32, top_a.y as f32, uniform_height as f32]);
        vertices.push([top_b.x as f32, top_b.y as f32, uniform_height as f32]);
        vertices.push([top_b.x as f32, top_b.y as f32, 0.0]);
        vertices.push([top_a.x as f32, top_a.y as f32, 0.0]);

        let edge = [top_b.x - top_a.x, top_b.y - top_a.y];
        let len = (edge[0] * edge[0] + edge[1] * edge[1]).sqrt().max(1e-12);
        let normal = [(edge[1] / len) as f32, (-edge[0] / len) as f32, 0.0];
        for _ in 0..4 {
            normals.push(normal);
        }

        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    GeometryMesh::Polygon { vertices, normals, indices, material }
}

/// `0.75 * (pointSize / spriteHeightInPixels)`: a pre-render hook recomputes
/// this every frame off the live camera distance, so a pixel-sized point
/// stays a constant size on screen.
pub fn sprite_world_scale(point_size: f64, sprite_height_px: f64) -> f64 {
    0.75 * (point_size / sprite_height_px.max(1e-9))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![Point2 { x: 0.0, y: 0.0 }, Point2 { x: 1.0, y: 0.0 }, Point2 { x: 1.0, y: 1.0 }, Point2 { x: 0.0, y: 1.0 }]
    }

    #[test]
    fn ear_clip_triangulates_a_square_into_two_triangles() {
        let indices = ear_clip(&square());
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn style_hash_is_stable_and_order_independent() {
        let mut a = Style::new();
        a.set("color", StyleValue::Color(0xff0000ff));
        a.set("width", StyleValue::Number(2.0));
        let mut b = Style::new();
        b.set("width", StyleValue::Number(2.0));
        b.set("color", StyleValue::Color(0xff0000ff));
        assert_eq!(style_hash(&a), style_hash(&b));
    }

    #[test]
    fn material_cache_shares_one_id_per_unique_style() {
        let mut cache = MaterialCache::new();
        let mut s1 = Style::new();
        s1.set("color", StyleValue::Color(1));
        let mut s2 = Style::new();
        s2.set("color", StyleValue::Color(1));
        assert_eq!(cache.get_or_insert(&s1), cache.get_or_insert(&s2));
    }

    #[test]
    fn extrusion_produces_top_bottom_and_side_walls() {
        let ring = square();
        let cap = ear_clip(&ring);
        let mesh = extrude(&ring, &cap, 3.0, MaterialId(0));
        if let GeometryMesh::Polygon { vertices, .. } = mesh {
            // 2 caps (4 verts each) + 4 side quads (4 verts each)
            assert_eq!(vertices.len(), 8 + 16);
        } else {
            panic!("expected polygon mesh");
        }
    }

    #[test]
    fn sprite_scale_shrinks_as_sprite_texture_grows() {
        let small = sprite_world_scale(10.0, 16.0);
        let large = sprite_world_scale(10.0, 64.0);
        assert!(large < small);
    }
}
