//! `Crs` is the trigonometric-projection service this crate treats as an
//! external collaborator: a full implementation would wrap a
//! proj4 port. This crate ships only enough of one to round-trip its own
//! tests and the two reference systems the map pipeline actually uses:
//! WGS84 geodetic (`EPSG:4326`) and spherical Web Mercator (`EPSG:3857`).

use crate::error::{EngineError, Result};
use crate::helpers::{lonlat_to_web_mercator, web_mercator_to_lonlat};

pub const EPSG_4326: &str = "EPSG:4326";
pub const EPSG_3857: &str = "EPSG:3857";

/// Projects a planar `(x, y)` point from one CRS to another.
pub trait Crs: Send + Sync {
    fn project(&self, x: f64, y: f64, from: &str, to: &str) -> Result<(f64, f64)>;
    fn is_geographic(&self, crs: &str) -> bool;
    fn is_geocentric(&self, crs: &str) -> bool;
}

/// The minimal built-in projection service: WGS84 <-> Web Mercator, plus the
/// identity when `from == to`. Anything else is a `DefinitiveData` error,
/// matching "invalid CRS" in the error taxonomy rather than a panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCrs;

impl Crs for BuiltinCrs {
    fn project(&self, x: f64, y: f64, from: &str, to: &str) -> Result<(f64, f64)> {
        if from == to {
            return Ok((x, y));
        }
        match (from, to) {
            (EPSG_4326, EPSG_3857) => Ok(lonlat_to_web_mercator(x, y)),
            (EPSG_3857, EPSG_4326) => Ok(web_mercator_to_lonlat(x, y)),
            _ => Err(EngineError::DefinitiveData(format!(
                "unsupported CRS pair: {from} -> {to}"
            ))),
        }
    }

    fn is_geographic(&self, crs: &str) -> bool {
        crs == EPSG_4326
    }

    fn is_geocentric(&self, crs: &str) -> bool {
        crs.eq_ignore_ascii_case("geocentric")
    }
}
