//! Minimal geodesy used by this crate's own tests and by the default `Crs`
//! implementation.

use cgmath::{Point3, Vector3};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Geodetic (lon, lat in degrees, elevation in meters) to geocentric ECEF, Z-up.
pub fn geodetic_to_ecef(lon_deg: f64, lat_deg: f64, elevation_m: f64) -> Point3<f64> {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let sin_lon = lon.sin();
    let cos_lon = lon.cos();

    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    let x = (n + elevation_m) * cos_lat * cos_lon;
    let y = (n + elevation_m) * cos_lat * sin_lon;
    let z = (n * (1.0 - WGS84_E2) + elevation_m) * sin_lat;

    Point3::new(x, y, z)
}

/// Inverse of [`geodetic_to_ecef`] via Bowring's method (a couple of fixed
/// iterations is plenty for the precision this engine needs).
pub fn ecef_to_geodetic(ecef: Point3<f64>) -> (f64, f64, f64) {
    let (x, y, z) = (ecef.x, ecef.y, ecef.z);
    let lon = y.atan2(x);

    let p = (x * x + y * y).sqrt();
    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..5 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt = p / lat.cos() - n;
        lat = (z + n * WGS84_E2 * sin_lat).atan2(p);
        let _ = alt;
    }
    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let alt = p / lat.cos() - n;

    (lon.to_degrees(), lat.to_degrees(), alt)
}

/// Lon/lat (degrees, WGS84) to spherical Web Mercator (EPSG:3857) meters.
pub fn lonlat_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let x = lon_deg.to_radians() * WGS84_A;
    let lat_clamped = lat_deg.clamp(-85.051_128, 85.051_128).to_radians();
    let y = WGS84_A * ((std::f64::consts::FRAC_PI_4 + lat_clamped / 2.0).tan()).ln();
    (x, y)
}

/// Inverse of [`lonlat_to_web_mercator`].
pub fn web_mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

pub fn hpr_to_forward_up(heading_deg: f64, pitch_deg: f64, roll_deg: f64) -> (Vector3<f64>, Vector3<f64>) {
    use cgmath::{Matrix3, Rad};

    let (h, p, r) = (
        Rad(heading_deg.to_radians()),
        Rad(pitch_deg.to_radians()),
        Rad(roll_deg.to_radians()),
    );

    let rh = Matrix3::from_angle_y(h);
    let rp = Matrix3::from_angle_x(p);
    let rr = Matrix3::from_angle_z(r);
    let rot = rh * rp * rr;

    let forward = rot * Vector3::new(0.0, 0.0, -1.0);
    let up = rot * Vector3::new(0.0, 1.0, 0.0);

    (forward, up)
}
