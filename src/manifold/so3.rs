//! SO(3) - Special Orthogonal Group in 3D
//!
//! SO(3) elements are represented using nalgebra's UnitQuaternion internally.
//! Tangent vectors are rotation vectors ω = θu (axis-angle, radians).

use crate::manifold::{lie_local, lie_retract, skew, LieGroup, Manifold, ManifoldResult};
use nalgebra::{DMatrix, DVector, Matrix3, UnitQuaternion, Vector3};
use std::fmt;

/// Squared angles below this use Taylor expansions in the Jacobians.
const SMALL_ANGLE_SQ: f64 = 1e-10;

/// SO(3) group element representing rotations in 3D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

impl SO3 {
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from roll, pitch and yaw in radians.
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from a rotation vector.
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Rotate a point: R p.
    pub fn rotate(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * point
    }
}

impl Manifold for SO3 {
    fn tangent_dim(&self) -> usize {
        3
    }

    fn local(
        &self,
        other: &Self,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> ManifoldResult<DVector<f64>> {
        Ok(lie_local(self, other, jacobian_other))
    }

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        lie_retract(self, delta)
    }
}

impl LieGroup for SO3 {
    type TangentVector = Vector3<f64>;
    type JacobianMatrix = Matrix3<f64>;

    const DOF: usize = 3;

    fn identity() -> Self {
        SO3::new(UnitQuaternion::identity())
    }

    /// R⁻¹ = Rᵀ, with J_R⁻¹_R = -R.
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO3::new(self.quaternion.inverse())
    }

    /// R1 R2, with J_R1 = R2ᵀ and J_R2 = I.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        SO3::new(self.quaternion * other.quaternion)
    }

    /// C = R1ᵀ R2, with J_R1 = -Cᵀ and J_R2 = I.
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = SO3::new(self.quaternion.inverse() * other.quaternion);
        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        result
    }

    fn log(&self) -> Vector3<f64> {
        self.quaternion.scaled_axis()
    }

    fn exp(tangent: &Vector3<f64>) -> Self {
        SO3::from_scaled_axis(*tangent)
    }

    /// Ad(R) = R
    fn adjoint(&self) -> Self::JacobianMatrix {
        self.rotation_matrix()
    }

    /// Jr(ω) = I - (1 - cos θ)/θ² [ω]× + (θ - sin θ)/θ³ [ω]×²
    fn right_jacobian(tangent: &Vector3<f64>) -> Self::JacobianMatrix {
        let theta_sq = tangent.norm_squared();
        let w = skew(tangent);
        if theta_sq < SMALL_ANGLE_SQ {
            return Matrix3::identity() - 0.5 * w + (w * w) / 6.0;
        }
        let theta = theta_sq.sqrt();
        Matrix3::identity() - ((1.0 - theta.cos()) / theta_sq) * w
            + ((theta - theta.sin()) / (theta_sq * theta)) * (w * w)
    }

    /// Jr⁻¹(ω) = I + ½[ω]× + (1/θ² - (1 + cos θ)/(2θ sin θ)) [ω]×²
    fn right_jacobian_inv(tangent: &Vector3<f64>) -> Self::JacobianMatrix {
        let theta_sq = tangent.norm_squared();
        let w = skew(tangent);
        if theta_sq < SMALL_ANGLE_SQ {
            return Matrix3::identity() + 0.5 * w + (w * w) / 12.0;
        }
        let theta = theta_sq.sqrt();
        let coefficient = 1.0 / theta_sq - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());
        Matrix3::identity() + 0.5 * w + coefficient * (w * w)
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix3::zeros()
    }

    fn jacobian_to_dmatrix(jacobian: &Self::JacobianMatrix) -> DMatrix<f64> {
        DMatrix::from_column_slice(3, 3, jacobian.as_slice())
    }

    fn tangent_to_dvector(tangent: &Vector3<f64>) -> DVector<f64> {
        DVector::from_column_slice(tangent.as_slice())
    }

    fn tangent_from_slice(values: &[f64]) -> Vector3<f64> {
        Vector3::new(values[0], values[1], values[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::test_utils::numerical_jacobian;

    const TOLERANCE: f64 = 1e-9;
    const FD_TOLERANCE: f64 = 1e-6;

    fn assert_matrix_close(analytic: &Matrix3<f64>, numeric: &DMatrix<f64>) {
        let analytic = SO3::jacobian_to_dmatrix(analytic);
        let diff = (&analytic - numeric).abs().max();
        assert!(diff < FD_TOLERANCE, "max diff {diff}\n{analytic}\n{numeric}");
    }

    #[test]
    fn test_so3_exp_log_consistency() {
        let tangent = Vector3::new(0.1, -0.4, 0.25);
        let recovered = SO3::exp(&tangent).log();
        assert!((recovered - tangent).norm() < TOLERANCE);
    }

    #[test]
    fn test_so3_right_jacobian_inverse() {
        for tangent in [Vector3::new(0.3, 0.2, -0.9), Vector3::new(1e-7, 0.0, 2e-7)] {
            let product = SO3::right_jacobian(&tangent) * SO3::right_jacobian_inv(&tangent);
            assert!((product - Matrix3::identity()).norm() < 1e-9);
        }
    }

    #[test]
    fn test_so3_group_jacobians() {
        let a = SO3::from_euler_angles(0.1, -0.5, 0.8);
        let b = SO3::from_euler_angles(-0.7, 0.2, 1.9);

        let mut ja = SO3::zero_jacobian();
        let mut jb = SO3::zero_jacobian();
        let between = a.between(&b, Some(&mut ja), Some(&mut jb));
        let num_a = numerical_jacobian(&a, |x| {
            between.local(&x.between(&b, None, None), None).unwrap()
        });
        let num_b = numerical_jacobian(&b, |x| {
            between.local(&a.between(x, None, None), None).unwrap()
        });
        assert_matrix_close(&ja, &num_a);
        assert_matrix_close(&jb, &num_b);

        let mut jc = SO3::zero_jacobian();
        let composed = a.compose(&b, Some(&mut jc), None);
        let num_c = numerical_jacobian(&a, |x| {
            composed.local(&x.compose(&b, None, None), None).unwrap()
        });
        assert_matrix_close(&jc, &num_c);

        let mut jinv = SO3::zero_jacobian();
        let inverse = a.inverse(Some(&mut jinv));
        let num_inv = numerical_jacobian(&a, |x| inverse.local(&x.inverse(None), None).unwrap());
        assert_matrix_close(&jinv, &num_inv);
    }

    #[test]
    fn test_so3_local_jacobian() {
        let z = SO3::from_euler_angles(0.3, 0.1, -0.2);
        let y = SO3::from_euler_angles(-0.4, 0.6, 1.1);
        let mut jac = DMatrix::zeros(3, 3);
        z.local(&y, Some(&mut jac)).unwrap();
        let num = numerical_jacobian(&y, |x| z.local(x, None).unwrap());
        let diff = (&jac - &num).abs().max();
        assert!(diff < FD_TOLERANCE);
    }
}
