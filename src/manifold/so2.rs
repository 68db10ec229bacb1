//! SO(2) - Special Orthogonal Group in 2D
//!
//! SO(2) elements are represented using nalgebra's UnitComplex internally.
//! SO(2) tangent elements are a single angle in radians.

use crate::manifold::{lie_local, lie_retract, LieGroup, Manifold, ManifoldResult};
use nalgebra::{DMatrix, DVector, Matrix1, Matrix2, UnitComplex};
use std::fmt;

/// SO(2) group element representing rotations in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO2 {
    /// Internal representation as a unit complex number
    complex: UnitComplex<f64>,
}

impl fmt::Display for SO2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO2(angle: {:.4})", self.complex.angle())
    }
}

impl SO2 {
    /// Create a new SO(2) element from a unit complex number.
    pub fn new(complex: UnitComplex<f64>) -> Self {
        SO2 { complex }
    }

    /// Create SO(2) from an angle in radians.
    pub fn from_angle(angle: f64) -> Self {
        SO2::new(UnitComplex::from_angle(angle))
    }

    /// Get the underlying unit complex number.
    pub fn complex(&self) -> UnitComplex<f64> {
        self.complex
    }

    /// Get the rotation angle in radians, in (-π, π].
    pub fn angle(&self) -> f64 {
        self.complex.angle()
    }

    /// Get the rotation matrix (2x2).
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.complex.to_rotation_matrix().into_inner()
    }
}

impl Manifold for SO2 {
    fn tangent_dim(&self) -> usize {
        1
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

impl LieGroup for SO2 {
    type TangentVector = f64;
    type JacobianMatrix = Matrix1<f64>;

    const DOF: usize = 1;

    fn identity() -> Self {
        SO2 {
            complex: UnitComplex::identity(),
        }
    }

    /// SO2 inverse.
    ///
    /// # Notes
    /// R(θ)⁻¹ = R(-θ), J_R⁻¹_R = -1
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO2 {
            complex: self.complex.inverse(),
        }
    }

    /// SO2 composition. Both Jacobians are 1 since SO(2) is abelian.
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
            *jac_other = Matrix1::identity();
        }
        SO2 {
            complex: self.complex * other.complex,
        }
    }

    /// R1⁻¹ R2, with J_R1 = -1 and J_R2 = 1.
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = -Matrix1::identity();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix1::identity();
        }
        SO2 {
            complex: self.complex.inverse() * other.complex,
        }
    }

    /// θ = atan2(R(1,0), R(0,0))
    fn log(&self) -> f64 {
        self.complex.angle()
    }

    fn exp(tangent: &f64) -> Self {
        SO2::from_angle(*tangent)
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn right_jacobian(_tangent: &f64) -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn right_jacobian_inv(_tangent: &f64) -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix1::zeros()
    }

    fn jacobian_to_dmatrix(jacobian: &Self::JacobianMatrix) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, jacobian[(0, 0)])
    }

    fn tangent_to_dvector(tangent: &f64) -> DVector<f64> {
        DVector::from_element(1, *tangent)
    }

    fn tangent_from_slice(values: &[f64]) -> f64 {
        values[0]
    }
}
