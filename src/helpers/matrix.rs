use cgmath::{InnerSpace, Matrix, Matrix4, Vector3, Vector4, Zero};

/// A frustum plane as `(normal, distance)` with the convention that a point
/// `p` is inside the half-space iff `normal.dot(p) + distance >= 0`.
pub type Plane = (Vector3<f64>, f64);
pub type FrustumPlanes = [Plane; 6];

/// Extracts the six clip planes (left, right, bottom, top, near, far) from a
/// combined projection*view matrix, Gribb/Hartmann style.
pub fn extract_frustum_planes(mat: &Matrix4<f64>) -> FrustumPlanes {
    let rows = [mat.row(0), mat.row(1), mat.row(2), mat.row(3)];

    let raw: [Vector4<f64>; 6] = [
        rows[3] + rows[0], // left
        rows[3] - rows[0], // right
        rows[3] + rows[1], // bottom
        rows[3] - rows[1], // top
        rows[3] + rows[2], // near
        rows[3] - rows[2], // far
    ];

    let mut planes: FrustumPlanes = [(Vector3::zero(), 0.0); 6];
    for (i, p) in raw.iter().enumerate() {
        let normal = Vector3::new(p.x, p.y, p.z);
        let len = normal.magnitude();
        if len > 0.0 {
            planes[i] = (normal / len, p.w / len);
        }
    }
    planes
}

/// Zero out the translation of a column-major `Matrix4<f64>`, used when a
/// renderer wants a rotation-only view matrix (GPU model matrices carry their
/// own pretranslation relative to the eye).
pub fn remove_translation(mut v: Matrix4<f64>) -> Matrix4<f64> {
    v.w = Vector4::new(0.0, 0.0, 0.0, v.w.w);
    v
}
