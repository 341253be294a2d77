//! Oriented bounding box derived from a 3D Tiles `box` bounding volume.

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use super::tileset::BoundingVolume;
use crate::view::frustum::BoundingBox;

/// `[center(3), half_axis_x(3), half_axis_y(3), half_axis_z(3)]` per the 3D
/// Tiles `box` encoding.
#[derive(Debug, Clone, Copy)]
pub struct OrientedBoundingBox {
    pub center: Vector3<f64>,
    pub half_axes: [Vector3<f64>; 3],
}

impl BoundingVolume {
    pub fn to_obb(&self) -> OrientedBoundingBox {
        let b = &self.bounding_box;
        OrientedBoundingBox {
            center: Vector3::new(b[0], b[1], b[2]),
            half_axes: [
                Vector3::new(b[3], b[4], b[5]),
                Vector3::new(b[6], b[7], b[8]),
                Vector3::new(b[9], b[10], b[11]),
            ],
        }
    }
}

impl OrientedBoundingBox {
    /// Clamps `point` onto the box in its own local axes.
    pub fn closest_point(&self, point: Vector3<f64>) -> Vector3<f64> {
        let d = point - self.center;
        let mut closest = self.center;
        for axis in &self.half_axes {
            let len = axis.magnitude();
            if len < f64::EPSILON {
                continue;
            }
            let unit = axis / len;
            let projection = d.dot(unit).clamp(-len, len);
            closest += unit * projection;
        }
        closest
    }

    pub fn diagonal(&self) -> f64 {
        self.half_axes.iter().map(|a| a.magnitude()).sum::<f64>() * 2.0
    }

    /// Axis-aligned box enclosing this (possibly rotated) box: each world
    /// axis's half-extent is the sum of that axis's component across all
    /// three local half-axes, which bounds the box regardless of rotation.
    pub fn to_aabb(&self) -> BoundingBox {
        let extent = Vector3::new(
            self.half_axes.iter().map(|a| a.x.abs()).sum::<f64>(),
            self.half_axes.iter().map(|a| a.y.abs()).sum::<f64>(),
            self.half_axes.iter().map(|a| a.z.abs()).sum::<f64>(),
        );
        let min = Point3::from_vec(self.center - extent);
        let max = Point3::from_vec(self.center + extent);
        BoundingBox::from_min_max(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_point_of_point_inside_box_is_itself() {
        let obb = OrientedBoundingBox {
            center: Vector3::new(0.0, 0.0, 0.0),
            half_axes: [Vector3::new(10.0, 0.0, 0.0), Vector3::new(0.0, 10.0, 0.0), Vector3::new(0.0, 0.0, 10.0)],
        };
        let p = obb.closest_point(Vector3::new(1.0, 2.0, 3.0));
        assert!((p - Vector3::new(1.0, 2.0, 3.0)).magnitude() < 1e-9);
    }

    #[test]
    fn to_aabb_encloses_a_rotated_box() {
        let obb = OrientedBoundingBox { center: Vector3::new(1.0, 2.0, 3.0), half_axes: [Vector3::new(1.0, 1.0, 0.0), Vector3::new(-1.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0)] };
        let aabb = obb.to_aabb();
        assert!((aabb.min.x - -1.0).abs() < 1e-9);
        assert!((aabb.max.x - 3.0).abs() < 1e-9);
        assert!((aabb.min.z - 2.0).abs() < 1e-9);
        assert!((aabb.max.z - 4.0).abs() < 1e-9);
    }

    #[test]
    fn closest_point_of_point_outside_box_clamps_to_face() {
        let obb = OrientedBoundingBox {
            center: Vector3::new(0.0, 0.0, 0.0),
            half_axes: [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0)],
        };
        let p = obb.closest_point(Vector3::new(5.0, 0.0, 0.0));
        assert!((p - Vector3::new(1.0, 0.0, 0.0)).magnitude() < 1e-9);
    }
}
