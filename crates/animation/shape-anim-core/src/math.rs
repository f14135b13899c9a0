//! nalgebra aliases and local-transform assembly.
//!
//! Keyframe data is stored as plain `[f32; N]` arrays (xyzw quaternions) and
//! converted here; the evaluator works on nalgebra types throughout.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};

pub type Quat = UnitQuaternion<f32>;
pub type Vec3 = Vector3<f32>;
pub type Mat4 = Matrix4<f32>;
pub type Iso3 = Isometry3<f32>;

/// Quaternion from (x, y, z, w) components. A zero quaternion maps to identity.
#[inline]
pub fn quat_from_xyzw(q: [f32; 4]) -> Quat {
    let raw = Quaternion::new(q[3], q[0], q[1], q[2]);
    if raw.norm_squared() > 0.0 {
        UnitQuaternion::new_normalize(raw)
    } else {
        UnitQuaternion::identity()
    }
}

#[inline]
pub fn quat_to_xyzw(q: &Quat) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

#[inline]
pub fn vec3_from_array(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Local transform `T · R` from components.
#[inline]
pub fn compose(rotation: &Quat, translation: &Vec3) -> Mat4 {
    Iso3::from_parts(Translation3::from(*translation), *rotation).to_homogeneous()
}

/// Translation column of an affine matrix.
#[inline]
pub fn translation_of(m: &Mat4) -> Vec3 {
    Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Length of each basis column, i.e. the axis scale folded into `m`.
pub fn basis_scale(m: &Mat4) -> [f32; 3] {
    let column = |c: usize| Vec3::new(m[(0, c)], m[(1, c)], m[(2, c)]).norm();
    [column(0), column(1), column(2)]
}

/// Split an affine matrix back into rotation and translation. Basis columns
/// are normalized first, so axis scale folded into the matrix is discarded.
pub fn decompose(m: &Mat4) -> (Quat, Vec3) {
    let mut basis = Matrix3::from_fn(|r, c| m[(r, c)]);
    for mut column in basis.column_iter_mut() {
        let len = column.norm();
        if len > f32::EPSILON {
            column.unscale_mut(len);
        }
    }
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));
    (rotation, translation_of(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_then_decompose() {
        let q = quat_from_xyzw([0.0, 0.0, 0.38268343, 0.9238795]);
        let t = Vec3::new(1.0, -2.0, 0.5);
        let m = compose(&q, &t);
        let (q2, t2) = decompose(&m);
        assert_relative_eq!(q2.angle_to(&q), 0.0, epsilon = 1e-5);
        assert_relative_eq!(t2, t);
    }

    #[test]
    fn decompose_strips_uniform_scale() {
        let q = quat_from_xyzw([0.0, 0.70710677, 0.0, 0.70710677]);
        let m = compose(&q, &Vec3::zeros()) * Mat4::new_scaling(3.0);
        let (q2, _) = decompose(&m);
        assert_relative_eq!(q2.angle_to(&q), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn basis_scale_reads_axis_factors() {
        let q = quat_from_xyzw([0.0, 0.0, 0.38268343, 0.9238795]);
        let m = compose(&q, &Vec3::new(1.0, 2.0, 3.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 0.5, 4.0));
        let axes = basis_scale(&m);
        assert_relative_eq!(axes[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(axes[1], 0.5, epsilon = 1e-5);
        assert_relative_eq!(axes[2], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_quaternion_is_identity() {
        assert_eq!(quat_from_xyzw([0.0; 4]), Quat::identity());
    }
}
