//! Nonlinear factors and factor graphs
//!
//! - [`expression_factor`]: a measurement model given as an
//!   [`Expression`](crate::expression::Expression), linearized with reverse-mode
//!   differentiation
//! - [`graph`]: a collection of factors linearized together, optionally in parallel

use crate::core::key::Key;
use crate::core::values::Values;
use crate::error::FactorResult;
use crate::linalg::JacobianFactor;
use nalgebra::DVector;
use std::fmt;

pub mod expression_factor;
pub mod graph;

pub use expression_factor::ExpressionFactor;
pub use graph::{LinearizationConfig, NonlinearFactorGraph};

/// Interface every nonlinear factor exposes to graphs and optimizers.
///
/// Factors are immutable after construction and may be linearized from
/// several threads at once.
pub trait Factor: fmt::Debug + Send + Sync {
    /// Variables this factor depends on, sorted.
    fn keys(&self) -> &[Key];

    /// Residual dimension.
    fn dim(&self) -> usize;

    /// Whether the factor contributes at this assignment.
    fn active(&self, _values: &Values) -> bool {
        true
    }

    /// Tangent-space residual before whitening.
    fn unwhitened_error(&self, values: &Values) -> FactorResult<DVector<f64>>;

    /// Residual after whitening.
    fn whitened_error(&self, values: &Values) -> FactorResult<DVector<f64>>;

    /// Scalar cost `½‖r‖²_Σ` (0 when inactive).
    fn error(&self, values: &Values) -> FactorResult<f64>;

    /// Whitened linear factor at `values`, or `None` when inactive.
    fn linearize(&self, values: &Values) -> FactorResult<Option<JacobianFactor>>;
}
