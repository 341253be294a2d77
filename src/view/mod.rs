//! Camera + frustum + screen-space-error helpers.

pub mod frustum;
pub mod screen_space_error;

pub use frustum::{BoundingBox, FrustumPlanes5};
pub use screen_space_error::{ScreenSpaceError, SseMode};

use cgmath::{Matrix4, SquareMatrix};

/// `minNearPlane`/`maxFarPlane` clamps.
pub const MIN_NEAR_PLANE: f64 = 2.0;
pub const MAX_FAR_PLANE: f64 = 2.0e9;

/// A camera's projection and world transform, plus the frustum derived from
/// their product. Rebuilt once per frame by the caller; generalized off any
/// projection matrix rather than one hardcoded backend.
#[derive(Debug, Clone)]
pub struct View {
    pub projection: Matrix4<f64>,
    /// World matrix of the camera (inverse of the view matrix).
    pub world: Matrix4<f64>,
    pub near: f64,
    pub far: f64,
    planes: FrustumPlanes5,
}

impl View {
    pub fn new(projection: Matrix4<f64>, world: Matrix4<f64>, near: f64, far: f64) -> Self {
        let near = near.clamp(MIN_NEAR_PLANE, MAX_FAR_PLANE);
        let far = far.clamp(near, MAX_FAR_PLANE);
        let view = world.invert().unwrap_or(Matrix4::from_scale(1.0));
        let planes = frustum::extract_frustum_planes_5(&(projection * view));
        Self { projection, world, near, far, planes }
    }

    /// Recomputes the frustum after `near`/`far`/`projection`/`world` are
    /// mutated in place by the caller.
    pub fn reset_planes(&mut self) {
        self.near = self.near.clamp(MIN_NEAR_PLANE, MAX_FAR_PLANE);
        self.far = self.far.clamp(self.near, MAX_FAR_PLANE);
        let view = self.world.invert().unwrap_or(Matrix4::from_scale(1.0));
        self.planes = frustum::extract_frustum_planes_5(&(self.projection * view));
    }

    pub fn is_box_visible(&self, bb: &BoundingBox) -> bool {
        frustum::is_bounding_volume_visible(&self.planes, bb)
    }

    pub fn view_matrix(&self) -> Matrix4<f64> {
        self.world.invert().unwrap_or(Matrix4::from_scale(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, PerspectiveFov, Point3};

    // cgmath's `PerspectiveFov` looks down -Z in view space; with the
    // camera's world matrix at the identity, world space and view space
    // coincide, so "in front" means negative Z.
    fn identity_view() -> View {
        let proj: Matrix4<f64> = PerspectiveFov {
            fovy: Deg(60.0).into(),
            aspect: 1.0,
            near: 1.0,
            far: 1000.0,
        }
        .into();
        View::new(proj, Matrix4::from_scale(1.0), 1.0, 1000.0)
    }

    #[test]
    fn near_and_far_are_clamped() {
        let v = View::new(Matrix4::from_scale(1.0), Matrix4::from_scale(1.0), 0.0, 1e20);
        assert_eq!(v.near, MIN_NEAR_PLANE);
        assert_eq!(v.far, MAX_FAR_PLANE);
    }

    #[test]
    fn box_in_front_of_camera_is_visible() {
        let v = identity_view();
        let bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, -11.0), Point3::new(1.0, 1.0, -9.0));
        assert!(v.is_box_visible(&bb));
    }

    #[test]
    fn box_behind_camera_is_not_visible() {
        let v = identity_view();
        let bb = BoundingBox::from_min_max(Point3::new(-1.0, -1.0, 9.0), Point3::new(1.0, 1.0, 11.0));
        assert!(!v.is_box_visible(&bb));
    }
}
