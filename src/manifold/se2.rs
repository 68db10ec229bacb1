//! SE(2) - Special Euclidean Group in 2D
//!
//! SE(2) elements are a rotation (UnitComplex) plus a 2D translation.
//! Tangent vectors are ordered [ρx, ρy, θ]: translation part first, then angle.
//!
//! Closed forms follow Sola et al., "A micro Lie theory for state estimation
//! in robotics", section on SE(2).

use crate::manifold::{lie_local, lie_retract, LieGroup, Manifold, ManifoldResult};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix2x3, Matrix3, UnitComplex, Vector2, Vector3};
use std::fmt;

/// Angles below this use Taylor expansions in exp and the Jacobians.
const SMALL_ANGLE: f64 = 1e-10;

/// SE(2) group element representing rigid body transformations in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SE2 {
    translation: Vector2<f64>,
    rotation: UnitComplex<f64>,
}

impl fmt::Display for SE2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.translation.x,
            self.translation.y,
            self.rotation.angle()
        )
    }
}

/// sin(θ)/θ and (1 - cos(θ))/θ, the entries of the V matrix.
fn v_coefficients(theta: f64) -> (f64, f64) {
    let theta_sq = theta * theta;
    if theta_sq < SMALL_ANGLE {
        (1.0 - theta_sq / 6.0, theta / 2.0 - theta * theta_sq / 24.0)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

impl SE2 {
    pub fn new(translation: Vector2<f64>, rotation: UnitComplex<f64>) -> Self {
        SE2 {
            translation,
            rotation,
        }
    }

    /// Create SE(2) from x, y and heading in radians.
    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        SE2::new(Vector2::new(x, y), UnitComplex::from_angle(theta))
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Express a world point in this frame: Rᵀ(p - t).
    ///
    /// # Arguments
    /// * `point` - Point in the world frame
    /// * `jacobian_self` - Optional 2×3 Jacobian with respect to this pose
    /// * `jacobian_point` - Optional 2×2 Jacobian with respect to the point
    pub fn transform_to(
        &self,
        point: &Vector2<f64>,
        jacobian_self: Option<&mut Matrix2x3<f64>>,
        jacobian_point: Option<&mut Matrix2<f64>>,
    ) -> Vector2<f64> {
        let rt = self.rotation_matrix().transpose();
        let local = rt * (point - self.translation);
        if let Some(jac) = jacobian_self {
            *jac = Matrix2x3::new(-1.0, 0.0, local.y, 0.0, -1.0, -local.x);
        }
        if let Some(jac) = jacobian_point {
            *jac = rt;
        }
        local
    }

    /// Map a point in this frame to the world frame: R p + t.
    pub fn transform_from(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation * point + self.translation
    }
}

impl Manifold for SE2 {
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

impl LieGroup for SE2 {
    type TangentVector = Vector3<f64>;
    type JacobianMatrix = Matrix3<f64>;

    const DOF: usize = 3;

    fn identity() -> Self {
        SE2::new(Vector2::zeros(), UnitComplex::identity())
    }

    /// M⁻¹ = [Rᵀ, -Rᵀt; 0, 1], with J = -Ad(M).
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rotation = self.rotation.inverse();
        SE2::new(-(rotation * self.translation), rotation)
    }

    /// M1 M2 = [R1 R2, t1 + R1 t2; 0, 1]
    ///
    /// # Notes
    /// J_M1 = Ad(M2⁻¹), J_M2 = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        SE2::new(
            self.translation + self.rotation * other.translation,
            self.rotation * other.rotation,
        )
    }

    /// C = M1⁻¹ M2, with J_M1 = -Ad(C⁻¹) and J_M2 = I.
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = self.inverse(None).compose(other, None, None);
        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        result
    }

    /// τ = [V⁻¹ t, θ]
    fn log(&self) -> Vector3<f64> {
        let theta = self.rotation.angle();
        let (a, b) = v_coefficients(theta);
        let den = a * a + b * b;
        let t = self.translation;
        Vector3::new((a * t.x + b * t.y) / den, (-b * t.x + a * t.y) / den, theta)
    }

    /// M = [exp(θ), V ρ; 0, 1] with V = [A, -B; B, A]
    fn exp(tangent: &Vector3<f64>) -> Self {
        let theta = tangent.z;
        let (a, b) = v_coefficients(theta);
        SE2::new(
            Vector2::new(a * tangent.x - b * tangent.y, b * tangent.x + a * tangent.y),
            UnitComplex::from_angle(theta),
        )
    }

    /// Ad(M) = [R, [y, -x]ᵀ; 0, 1]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let r = self.rotation_matrix();
        Matrix3::new(
            r[(0, 0)],
            r[(0, 1)],
            self.translation.y,
            r[(1, 0)],
            r[(1, 1)],
            -self.translation.x,
            0.0,
            0.0,
            1.0,
        )
    }

    fn right_jacobian(tangent: &Vector3<f64>) -> Self::JacobianMatrix {
        let (x, y, theta) = (tangent.x, tangent.y, tangent.z);
        let (a, b) = v_coefficients(theta);
        let theta_sq = theta * theta;

        let (j02, j12) = if theta_sq < SMALL_ANGLE {
            (-y / 2.0 + theta * x / 6.0, x / 2.0 + theta * y / 6.0)
        } else {
            let (sin_theta, cos_theta) = theta.sin_cos();
            (
                (-y + theta * x + y * cos_theta - x * sin_theta) / theta_sq,
                (x + theta * y - x * cos_theta - y * sin_theta) / theta_sq,
            )
        };

        Matrix3::new(a, b, j02, -b, a, j12, 0.0, 0.0, 1.0)
    }

    /// Jr is block upper-triangular with det = A² + B² > 0 inside (-2π, 2π),
    /// so the inverse exists for every angle `log` can return.
    fn right_jacobian_inv(tangent: &Vector3<f64>) -> Self::JacobianMatrix {
        Self::right_jacobian(tangent)
            .try_inverse()
            .unwrap_or_else(Matrix3::identity)
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
