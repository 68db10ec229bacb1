//! Manifold value types used as factor measurements and variables.
//!
//! Lie group M,° | dim | X ∈ M            | Exp(τ)          | Comp. | Chart used by factors
//! ------------- | --- | ---------------- | --------------- | ----- | ----------------------
//! n-D vector    | n   | v ∈ Rⁿ           | v               | v₁+v₂ | y - z
//! Rotation      | 1   | R ∈ SO(2)        | R = exp([θ]x)   | R₁R₂  | log(z⁻¹y)
//! Rigid motion  | 3   | M = [R t; 0 1]   | Exp([ρ θ])      | M₁M₂  | log(z⁻¹y)
//! Rotation      | 3   | R ∈ SO(3)        | R = exp([ω]x)   | R₁R₂  | log(z⁻¹y)
//!
//! Two traits split the interface:
//!
//! - [`Manifold`] is the dynamically sized view that the expression and factor
//!   machinery needs: a tangent dimension, the local chart with its Jacobian, and
//!   the retraction. Every measurement type implements it, including `DVector`.
//! - [`LieGroup`] adds the fixed-size group operations with analytic Jacobians
//!   (compose, inverse, between) that expression helpers chain together.
//!
//! All Jacobians follow the right-perturbation convention: for an element X, a
//! perturbation δ acts as X ∘ exp(δ). The conventions and closed forms follow
//! the [manif](https://github.com/artivis/manif) C++ library.
//!
//! # Chart
//!
//! `z.local(y)` returns y ⊖ z = log(z⁻¹ ∘ y), so `z.local(&z.retract(δ)) == δ`
//! inside the injectivity radius. Its Jacobian with respect to `y` is Jr⁻¹(τ).

use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;
use thiserror::Error;

pub mod se2;
pub mod so2;
pub mod so3;
pub mod vector;

pub use se2::SE2;
pub use so2::SO2;
pub use so3::SO3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Fail unless a tangent vector has the expected length.
pub(crate) fn check_tangent_dim(expected: usize, actual: usize) -> ManifoldResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ManifoldError::InvalidTangentDimension { expected, actual })
    }
}

/// A value living on a differentiable manifold with a local chart.
///
/// This is the only interface the factor machinery needs from a measurement type.
pub trait Manifold: Clone + Debug + Send + Sync + 'static {
    /// Dimension of the tangent space at this element.
    fn tangent_dim(&self) -> usize;

    /// Local coordinates of `other` around `self`: other ⊖ self.
    ///
    /// # Arguments
    /// * `other` - The element to express in the chart centred at `self`
    /// * `jacobian_other` - Optional Jacobian ∂(other ⊖ self)/∂other, `dim × dim`
    ///
    /// # Errors
    /// `InvalidTangentDimension` when the two elements have different dimensions.
    fn local(
        &self,
        other: &Self,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> ManifoldResult<DVector<f64>>;

    /// Retraction: self ⊕ delta.
    ///
    /// # Errors
    /// `InvalidTangentDimension` when `delta` has the wrong length.
    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self>;

    /// Whether two elements are within `tolerance` in local coordinates.
    fn equals(&self, other: &Self, tolerance: f64) -> bool {
        self.local(other, None)
            .map(|delta| delta.iter().all(|v| v.abs() <= tolerance))
            .unwrap_or(false)
    }
}

/// Core trait for Lie group operations.
///
/// Group operations take optional mutable Jacobian outputs in the manif style:
/// pass `Some(&mut jac)` to have the derivative written, `None` to skip it.
///
/// # Type Parameters
///
/// - `TangentVector`: fixed-size tangent vector (e.g. `Vector3<f64>` for SE(2))
/// - `JacobianMatrix`: fixed-size `DOF × DOF` matrix
pub trait LieGroup: Manifold + PartialEq {
    /// The tangent space vector type
    type TangentVector: Clone + Debug + PartialEq;

    /// The Jacobian matrix type
    type JacobianMatrix: Clone + Debug + PartialEq;

    /// Degrees of freedom - dimension of the tangent space
    const DOF: usize;

    /// Get the identity element of the group.
    fn identity() -> Self;

    /// Compute the inverse of this element.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂(g⁻¹)/∂g
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// Compose this element with another (group multiplication).
    ///
    /// # Arguments
    /// * `other` - The right operand for composition
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₁
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₂
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Compute g₁⁻¹ ∘ g₂ (relative transformation).
    ///
    /// # Arguments
    /// * `other` - The target element g₂
    /// * `jacobian_self` - Optional Jacobian with respect to g₁
    /// * `jacobian_other` - Optional Jacobian with respect to g₂
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Logarithmic map to the tangent space.
    fn log(&self) -> Self::TangentVector;

    /// Exponential map from the tangent space.
    fn exp(tangent: &Self::TangentVector) -> Self;

    /// Adjoint matrix Ad(g).
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Right Jacobian Jr(τ).
    fn right_jacobian(tangent: &Self::TangentVector) -> Self::JacobianMatrix;

    /// Inverse of the right Jacobian, Jr⁻¹(τ).
    fn right_jacobian_inv(tangent: &Self::TangentVector) -> Self::JacobianMatrix;

    /// A `DOF × DOF` zero matrix, used as scratch space for Jacobian outputs.
    fn zero_jacobian() -> Self::JacobianMatrix;

    fn jacobian_to_dmatrix(jacobian: &Self::JacobianMatrix) -> DMatrix<f64>;

    fn tangent_to_dvector(tangent: &Self::TangentVector) -> DVector<f64>;

    /// Build a tangent vector from a slice of exactly `DOF` entries.
    fn tangent_from_slice(values: &[f64]) -> Self::TangentVector;
}

/// Chart shared by every Lie group: log(self⁻¹ ∘ other), with Jacobian Jr⁻¹.
pub(crate) fn lie_local<G: LieGroup>(
    origin: &G,
    other: &G,
    jacobian_other: Option<&mut DMatrix<f64>>,
) -> DVector<f64> {
    let tangent = origin.between(other, None, None).log();
    if let Some(jac) = jacobian_other {
        *jac = G::jacobian_to_dmatrix(&G::right_jacobian_inv(&tangent));
    }
    G::tangent_to_dvector(&tangent)
}

/// Retraction shared by every Lie group: self ∘ exp(delta).
pub(crate) fn lie_retract<G: LieGroup>(origin: &G, delta: &DVector<f64>) -> ManifoldResult<G> {
    check_tangent_dim(G::DOF, delta.len())?;
    let tangent = G::tangent_from_slice(delta.as_slice());
    Ok(origin.compose(&G::exp(&tangent), None, None))
}

/// 3×3 skew-symmetric matrix [v]×.
pub(crate) fn skew(v: &nalgebra::Vector3<f64>) -> nalgebra::Matrix3<f64> {
    nalgebra::Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
