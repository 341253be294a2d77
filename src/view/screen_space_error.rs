//! Projects a world-space box into camera space to estimate its on-screen
//! geometric error, reusing the same frustum-plane math but producing
//! per-axis NDC-space lengths instead of a boolean visibility test.

use cgmath::{EuclideanSpace, Matrix4, Point3, Transform, Vector3};

use super::{frustum::BoundingBox, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseMode {
    /// Only x/y lengths matter (map tile subdivision).
    TwoD,
    /// x/y/z lengths all computed (point cloud / 3D Tiles refinement).
    ThreeD,
}

#[derive(Debug, Clone, Copy)]
pub struct AxisLengths {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenSpaceError {
    pub origin: (f64, f64),
    pub lengths: AxisLengths,
    /// Anisotropy correction: `max(lengths) / min(lengths)`, floored at 1.0.
    /// Used so a box foreshortened along one screen axis doesn't
    /// under-report its true on-screen size.
    pub ratio: f64,
    /// NDC-space footprint area of the box's projected bounding rectangle.
    pub area: f64,
}

impl ScreenSpaceError {
    /// `None` when every corner of `bb` (after applying `world_matrix`) lies
    /// behind the near plane — the box is definitionally not on screen.
    pub fn compute_from_box3(view: &View, bb: &BoundingBox, world_matrix: &Matrix4<f64>, mode: SseMode) -> Option<Self> {
        let view_matrix = view.view_matrix();
        let to_camera = view_matrix * world_matrix;

        let corners_cam: Vec<Point3<f64>> = bb.corners.iter().map(|c| to_camera.transform_point(*c)).collect();

        // Camera looks down -Z; "in front of near" means z <= -near.
        let any_in_front = corners_cam.iter().any(|c| c.z <= -view.near);
        if !any_in_front {
            return None;
        }

        let center = Point3::from_vec(
            (Vector3::new(bb.min.x, bb.min.y, bb.min.z) + Vector3::new(bb.max.x, bb.max.y, bb.max.z)) / 2.0,
        );
        let half = Vector3::new(
            (bb.max.x - bb.min.x) / 2.0,
            (bb.max.y - bb.min.y) / 2.0,
            (bb.max.z - bb.min.z) / 2.0,
        );

        let origin_cam = to_camera.transform_point(center);
        let x_edge_cam = to_camera.transform_point(center + Vector3::new(half.x, 0.0, 0.0));
        let y_edge_cam = to_camera.transform_point(center + Vector3::new(0.0, half.y, 0.0));
        let z_edge_cam = to_camera.transform_point(center + Vector3::new(0.0, 0.0, half.z));

        let clamp_near = |mut p: Point3<f64>| {
            if p.z > -view.near {
                p.z = -view.near;
            }
            p
        };

        let origin_cam = clamp_near(origin_cam);
        let x_edge_cam = clamp_near(x_edge_cam);
        let y_edge_cam = clamp_near(y_edge_cam);
        let z_edge_cam = clamp_near(z_edge_cam);

        let project = |p: Point3<f64>| -> (f64, f64) {
            let clip = view.projection.transform_point(p);
            (clip.x, clip.y)
        };

        let origin_ndc = project(origin_cam);
        let x_ndc = project(x_edge_cam);
        let y_ndc = project(y_edge_cam);

        let len_x = ((x_ndc.0 - origin_ndc.0).powi(2) + (x_ndc.1 - origin_ndc.1).powi(2)).sqrt();
        let len_y = ((y_ndc.0 - origin_ndc.0).powi(2) + (y_ndc.1 - origin_ndc.1).powi(2)).sqrt();

        let z = if mode == SseMode::ThreeD {
            let z_ndc = project(z_edge_cam);
            Some(((z_ndc.0 - origin_ndc.0).powi(2) + (z_ndc.1 - origin_ndc.1).powi(2)).sqrt())
        } else {
            None
        };

        let lo = len_x.min(len_y).max(1e-12);
        let hi = len_x.max(len_y);
        let ratio = (hi / lo).max(1.0);

        Some(ScreenSpaceError {
            origin: origin_ndc,
            lengths: AxisLengths { x: len_x, y: len_y, z },
            ratio,
            area: (len_x * 2.0) * (len_y * 2.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::View;
    use cgmath::{Deg, PerspectiveFov, SquareMatrix};

    fn view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov { fovy: Deg(60.0).into(), aspect: 1.0, near: 1.0, far: 1000.0 }.into();
        View::new(proj, Matrix4::from_scale(1.0), 1.0, 1000.0)
    }

    #[test]
    fn box_entirely_behind_near_plane_is_null() {
        let v = view();
        let bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, 2.0), Point3::new(1.0, 1.0, 3.0));
        let sse = ScreenSpaceError::compute_from_box3(&v, &bb, &Matrix4::identity(), SseMode::TwoD);
        assert!(sse.is_none());
    }

    #[test]
    fn closer_box_has_larger_projected_lengths() {
        let v = view();
        let near_bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, -6.0), Point3::new(1.0, 1.0, -4.0));
        let far_bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, -51.0), Point3::new(1.0, 1.0, -49.0));
        let near_sse = ScreenSpaceError::compute_from_box3(&v, &near_bb, &Matrix4::identity(), SseMode::TwoD).unwrap();
        let far_sse = ScreenSpaceError::compute_from_box3(&v, &far_bb, &Matrix4::identity(), SseMode::TwoD).unwrap();
        assert!(near_sse.lengths.x > far_sse.lengths.x);
        assert!(near_sse.area > far_sse.area);
    }

    #[test]
    fn two_d_mode_does_not_populate_z_length() {
        let v = view();
        let bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, -11.0), Point3::new(1.0, 1.0, -9.0));
        let sse = ScreenSpaceError::compute_from_box3(&v, &bb, &Matrix4::identity(), SseMode::TwoD).unwrap();
        assert!(sse.lengths.z.is_none());
    }
}
