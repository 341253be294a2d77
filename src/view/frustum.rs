//! Frustum plane extraction and box visibility, generalized to work off any
//! `Matrix4<f64>` view-projection rather than one fixed reverse-Z projection.

use cgmath::{InnerSpace, Matrix4, Point3, Vector3, Vector4};

/// Left, Right, Bottom, Top, Near — no far plane; far culling is handled by
/// `View::far` directly.
pub type FrustumPlanes5 = [(Vector3<f64>, f64); 5];

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
    pub corners: [Point3<f64>; 8],
}

impl BoundingBox {
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        let corners = [
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(min.x, max.y, max.z),
            Point3::new(max.x, max.y, max.z),
        ];
        Self { min, max, corners }
    }
}

pub fn extract_frustum_planes_5(mat: &Matrix4<f64>) -> FrustumPlanes5 {
    let rows = [mat.row(0), mat.row(1), mat.row(2), mat.row(3)];

    let raw: [Vector4<f64>; 5] = [
        rows[3] + rows[0], // left
        rows[3] - rows[0], // right
        rows[3] + rows[1], // bottom
        rows[3] - rows[1], // top
        rows[3] + rows[2], // near
    ];

    let mut planes: FrustumPlanes5 = [(Vector3::new(0.0, 0.0, 0.0), 0.0); 5];
    for (i, p) in raw.iter().enumerate() {
        let normal = Vector3::new(p.x, p.y, p.z);
        let len = normal.magnitude();
        if len > 0.0 {
            planes[i] = (normal / len, p.w / len);
        }
    }
    planes
}

/// True iff `bb` intersects or lies inside every plane's positive half-space.
/// Uses the standard min/max-corner AABB-vs-plane test: if the corner most
/// aligned with the plane normal ("positive" corner) is outside, the whole
/// box is outside; if the corner least aligned ("negative" corner) is also
/// outside, the box straddles the plane and the exact corner set decides.
pub fn is_bounding_volume_visible(planes: &FrustumPlanes5, bb: &BoundingBox) -> bool {
    for &(normal, d) in planes {
        let p = Vector3::new(
            if normal.x >= 0.0 { bb.max.x } else { bb.min.x },
            if normal.y >= 0.0 { bb.max.y } else { bb.min.y },
            if normal.z >= 0.0 { bb.max.z } else { bb.min.z },
        );
        let n = Vector3::new(
            if normal.x < 0.0 { bb.max.x } else { bb.min.x },
            if normal.y < 0.0 { bb.max.y } else { bb.min.y },
            if normal.z < 0.0 { bb.max.z } else { bb.min.z },
        );

        if normal.dot(p) + d < 0.0 {
            return false;
        }
        if normal.dot(n) + d < 0.0 {
            let all_outside = bb
                .corners
                .iter()
                .all(|c| normal.dot(Vector3::new(c.x, c.y, c.z)) + d < 0.0);
            if all_outside {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, PerspectiveFov, SquareMatrix};

    #[test]
    fn identity_projection_sees_everything_within_clip_space() {
        let planes = extract_frustum_planes_5(&Matrix4::identity());
        let bb = BoundingBox::from_min_max(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
        assert!(is_bounding_volume_visible(&planes, &bb));
    }

    #[test]
    fn box_outside_perspective_frustum_is_culled() {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 100.0 }.into();
        let planes = extract_frustum_planes_5(&proj);
        // Far off to the side of a narrow frustum, in front of the camera.
        let bb = BoundingBox::from_min_max(Point3::new(500.0, 500.0, -10.0), Point3::new(501.0, 501.0, -9.0));
        assert!(!is_bounding_volume_visible(&planes, &bb));
    }
}
