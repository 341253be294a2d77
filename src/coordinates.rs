//! A single point in a named CRS, distinguishing geographic
//! (lon/lat/elevation) from geocentric (ECEF) and planar systems.

use crate::crs::Crs;
use crate::error::Result;
use crate::helpers::geodetic_to_ecef;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub crs: &'static str,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    pub fn new(crs: &'static str, x: f64, y: f64, z: f64) -> Self {
        Self { crs, x, y, z }
    }

    /// Reprojects into `target`, delegating the planar part to the `Crs`
    /// collaborator. Geocentric targets are out of scope for `Crs::project`
    /// (it only handles 2D planar/geographic pairs); callers needing ECEF go
    /// through [`Coordinates::to_ecef`] directly.
    pub fn as_crs(&self, crs: &dyn Crs, target: &'static str) -> Result<Coordinates> {
        if self.crs == target {
            return Ok(*self);
        }
        let (x, y) = crs.project(self.x, self.y, self.crs, target)?;
        Ok(Coordinates { crs: target, x, y, z: self.z })
    }

    /// Valid only when `self.crs` is geographic (lon/lat in degrees).
    pub fn to_ecef(&self, crs: &dyn Crs) -> cgmath::Point3<f64> {
        debug_assert!(crs.is_geographic(self.crs), "to_ecef on non-geographic coordinates");
        geodetic_to_ecef(self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{BuiltinCrs, EPSG_3857, EPSG_4326};

    #[test]
    fn reprojects_geographic_to_mercator_and_back() {
        let crs = BuiltinCrs;
        let a = Coordinates::new(EPSG_4326, 2.35, 48.85, 35.0);
        let b = a.as_crs(&crs, EPSG_3857).unwrap();
        assert_eq!(b.crs, EPSG_3857);
        let c = b.as_crs(&crs, EPSG_4326).unwrap();
        assert!((c.x - a.x).abs() < 1e-9);
        assert!((c.y - a.y).abs() < 1e-9);
        // elevation is carried through untouched by a planar reprojection
        assert_eq!(c.z, a.z);
    }

    #[test]
    fn same_crs_is_a_no_op() {
        let crs = BuiltinCrs;
        let a = Coordinates::new(EPSG_3857, 1.0, 2.0, 3.0);
        let b = a.as_crs(&crs, EPSG_3857).unwrap();
        assert_eq!(a, b);
    }
}
