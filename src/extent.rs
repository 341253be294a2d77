//! Axis-aligned rectangle in a named CRS. The fundamental
//! addressing unit for the map and feature pipelines' quadtrees.

use crate::crs::Crs;
use crate::error::{programmer_error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    pub crs: String,
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

/// `(offset, scale)` mapping a child rectangle's UV space into its parent's,
/// i.e. `parent_uv = child_uv * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetScale {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Extent {
    pub fn new(crs: impl Into<String>, west: f64, east: f64, south: f64, north: f64) -> Result<Self> {
        if !(west <= east && south <= north) {
            return Err(programmer_error!(
                "invalid extent: west={west} east={east} south={south} north={north}"
            ));
        }
        Ok(Self { crs: crs.into(), west, east, south, north })
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    /// Overlap test (inclusive of shared edges, matching the conservative
    /// semantics `processTarget` relies on to decide "fully outside").
    pub fn intersects(&self, other: &Extent) -> bool {
        debug_assert_eq!(self.crs, other.crs, "intersects on mismatched CRS");
        self.west <= other.east && self.east >= other.west && self.south <= other.north && self.north >= other.south
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }
        Some(Extent {
            crs: self.crs.clone(),
            west: self.west.max(other.west),
            east: self.east.min(other.east),
            south: self.south.max(other.south),
            north: self.north.min(other.north),
        })
    }

    /// Union bounding rectangle; used by the `Extent.split` round-trip law
    ///.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            crs: self.crs.clone(),
            west: self.west.min(other.west),
            east: self.east.max(other.east),
            south: self.south.min(other.south),
            north: self.north.max(other.north),
        }
    }

    /// Splits into `x * y` equal sub-rectangles, row-major, south-to-north
    /// then west-to-east (matching the quadtree child ordering used
    /// elsewhere: index `j * x + i`).
    pub fn split(&self, x: u32, y: u32) -> Vec<Extent> {
        debug_assert!(x > 0 && y > 0);
        let dw = self.width() / x as f64;
        let dh = self.height() / y as f64;
        let mut out = Vec::with_capacity((x * y) as usize);
        for j in 0..y {
            for i in 0..x {
                let west = self.west + i as f64 * dw;
                let south = self.south + j as f64 * dh;
                out.push(Extent {
                    crs: self.crs.clone(),
                    west,
                    east: west + dw,
                    south,
                    north: south + dh,
                });
            }
        }
        out
    }

    /// Expands the extent by `fraction` of its own size on each side, plus
    /// a fixed amount in source units (used by the layer pipeline's paint
    /// margin "5% + 4px on each side" once `pixels_per_unit` has
    /// converted pixels into extent units).
    pub fn with_margin(&self, fraction: f64, fixed: f64) -> Extent {
        let mx = self.width() * fraction + fixed;
        let my = self.height() * fraction + fixed;
        Extent {
            crs: self.crs.clone(),
            west: self.west - mx,
            east: self.east + mx,
            south: self.south - my,
            north: self.north + my,
        }
    }

    pub fn reproject(&self, crs: &dyn Crs, target: &str) -> Result<Extent> {
        if self.crs == target {
            return Ok(self.clone());
        }
        let corners = [
            crs.project(self.west, self.south, &self.crs, target)?,
            crs.project(self.east, self.south, &self.crs, target)?,
            crs.project(self.east, self.north, &self.crs, target)?,
            crs.project(self.west, self.north, &self.crs, target)?,
        ];
        let west = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let east = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let south = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let north = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
        Ok(Extent { crs: target.to_string(), west, east, south, north })
    }

    /// Offset+scale mapping `self` (assumed a sub-rectangle of `parent`, e.g.
    /// one of `parent.split(..)`'s outputs) into `parent`'s UV space.
    pub fn offset_to_parent(&self, parent: &Extent) -> OffsetScale {
        let scale_x = self.width() / parent.width();
        let scale_y = self.height() / parent.height();
        OffsetScale {
            offset_x: (self.west - parent.west) / parent.width(),
            offset_y: (self.south - parent.south) / parent.height(),
            scale_x,
            scale_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{BuiltinCrs, EPSG_3857};

    fn e(w: f64, e_: f64, s: f64, n: f64) -> Extent {
        Extent::new(EPSG_3857, w, e_, s, n).unwrap()
    }

    #[test]
    fn rejects_invalid_extent() {
        assert!(Extent::new(EPSG_3857, 10.0, -10.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn split_then_union_round_trips() {
        let original = e(-180.0, 180.0, -90.0, 90.0);
        let parts = original.split(3, 2);
        assert_eq!(parts.len(), 6);
        let mut acc = parts[0].clone();
        for p in &parts[1..] {
            acc = acc.union(p);
        }
        assert!((acc.west - original.west).abs() < 1e-9);
        assert!((acc.east - original.east).abs() < 1e-9);
        assert!((acc.south - original.south).abs() < 1e-9);
        assert!((acc.north - original.north).abs() < 1e-9);
    }

    #[test]
    fn offset_to_parent_maps_child_into_unit_square() {
        let parent = e(0.0, 100.0, 0.0, 100.0);
        let children = parent.split(2, 2);
        // bottom-left child
        let os = children[0].offset_to_parent(&parent);
        assert!((os.offset_x - 0.0).abs() < 1e-9);
        assert!((os.offset_y - 0.0).abs() < 1e-9);
        assert!((os.scale_x - 0.5).abs() < 1e-9);
        // top-right child (index 3 in row-major j*x+i with x=2,y=2)
        let os = children[3].offset_to_parent(&parent);
        assert!((os.offset_x - 0.5).abs() < 1e-9);
        assert!((os.offset_y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn intersection_none_when_disjoint() {
        let a = e(0.0, 1.0, 0.0, 1.0);
        let b = e(2.0, 3.0, 2.0, 3.0);
        assert!(a.intersection(&b).is_none());
        assert!(!a.intersects(&b));
    }

    #[test]
    fn reproject_identity() {
        let a = e(0.0, 1.0, 0.0, 1.0);
        let crs = BuiltinCrs;
        let b = a.reproject(&crs, EPSG_3857).unwrap();
        assert_eq!(a, b);
    }
}
