//! Euclidean vector spaces as (trivial) manifolds.
//!
//! Fixed-size vectors (`Vector2`, `Vector3`, ...) form the translation group Rⁿ
//! under addition, so they also implement [`LieGroup`] with identity Jacobians.
//! `DVector` carries its dimension at runtime and only implements [`Manifold`].

use crate::manifold::{check_tangent_dim, LieGroup, Manifold, ManifoldResult};
use nalgebra::{DMatrix, DVector, SMatrix, SVector};

impl Manifold for DVector<f64> {
    fn tangent_dim(&self) -> usize {
        self.len()
    }

    /// y - z, with identity Jacobian.
    fn local(
        &self,
        other: &Self,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> ManifoldResult<DVector<f64>> {
        check_tangent_dim(self.len(), other.len())?;
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(self.len(), self.len());
        }
        Ok(other - self)
    }

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        check_tangent_dim(self.len(), delta.len())?;
        Ok(self + delta)
    }
}

impl<const D: usize> Manifold for SVector<f64, D> {
    fn tangent_dim(&self) -> usize {
        D
    }

    fn local(
        &self,
        other: &Self,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> ManifoldResult<DVector<f64>> {
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(D, D);
        }
        Ok(DVector::from_column_slice((other - self).as_slice()))
    }

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        check_tangent_dim(D, delta.len())?;
        Ok(self + SVector::<f64, D>::from_column_slice(delta.as_slice()))
    }
}

impl<const D: usize> LieGroup for SVector<f64, D> {
    type TangentVector = SVector<f64, D>;
    type JacobianMatrix = SMatrix<f64, D, D>;

    const DOF: usize = D;

    fn identity() -> Self {
        SVector::zeros()
    }

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -SMatrix::<f64, D, D>::identity();
        }
        -self
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = SMatrix::identity();
        }
        if let Some(jac) = jacobian_other {
            *jac = SMatrix::identity();
        }
        self + other
    }

    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = -SMatrix::<f64, D, D>::identity();
        }
        if let Some(jac) = jacobian_other {
            *jac = SMatrix::identity();
        }
        other - self
    }

    fn log(&self) -> Self::TangentVector {
        *self
    }

    fn exp(tangent: &Self::TangentVector) -> Self {
        *tangent
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        SMatrix::identity()
    }

    fn right_jacobian(_tangent: &Self::TangentVector) -> Self::JacobianMatrix {
        SMatrix::identity()
    }

    fn right_jacobian_inv(_tangent: &Self::TangentVector) -> Self::JacobianMatrix {
        SMatrix::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        SMatrix::zeros()
    }

    fn jacobian_to_dmatrix(jacobian: &Self::JacobianMatrix) -> DMatrix<f64> {
        DMatrix::from_column_slice(D, D, jacobian.as_slice())
    }

    fn tangent_to_dvector(tangent: &Self::TangentVector) -> DVector<f64> {
        DVector::from_column_slice(tangent.as_slice())
    }

    fn tangent_from_slice(values: &[f64]) -> Self::TangentVector {
        SVector::from_column_slice(values)
    }
}
