//! Factors whose measurement model is an [`Expression`].
//!
//! Given a measurement `z` and a prediction `h(x)`, the residual is taken on
//! the tangent space at the measurement: `r = local(z, h(x)) = h(x) ⊖ z`.
//! Linearizing produces the whitened system
//!
//! ```text
//! W [ ∂r/∂x₁ … ∂r/∂xₙ | −r ]
//! ```
//!
//! where every Jacobian block comes out of one reverse pass over the
//! expression, seeded with the chart derivative `∂local(z, ŷ)/∂ŷ`.
//!
//! # Sign convention
//!
//! With `x = z ⊕ δ` and `h(x) = x`, the residual is `+δ`, the Jacobian is the
//! identity and the right-hand side is `−δ`. Solving `A δx = b` therefore
//! moves the estimate back onto the measurement.

use crate::core::key::Key;
use crate::core::values::Values;
use crate::error::{FactorError, FactorResult};
use crate::expression::{Expression, JacobianMap};
use crate::factors::Factor;
use crate::linalg::{JacobianFactor, SharedNoiseModel, VerticalBlockMatrix};
use crate::manifold::Manifold;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Predicate deciding whether a factor contributes at a given assignment.
pub type ActivityFn = Arc<dyn Fn(&Values) -> bool + Send + Sync>;

/// A nonlinear factor `‖h(x) ⊖ z‖²_Σ` defined by an expression.
pub struct ExpressionFactor<T> {
    measurement: T,
    expression: Expression<T>,
    noise_model: SharedNoiseModel,
    keys: Vec<Key>,
    dims: Vec<usize>,
    activity: Option<ActivityFn>,
}

impl<T: Manifold> ExpressionFactor<T> {
    /// Create a factor for measurement `measurement` predicted by `expression`.
    ///
    /// # Errors
    /// `InvalidArgument` if no noise model is given, or if its dimension differs
    /// from the tangent dimension of the measurement.
    pub fn new(
        noise_model: Option<SharedNoiseModel>,
        measurement: T,
        expression: Expression<T>,
    ) -> FactorResult<Self> {
        let noise_model = noise_model.ok_or_else(|| {
            FactorError::InvalidArgument("ExpressionFactor requires a noise model".to_string())
        })?;
        if noise_model.dim() != measurement.tangent_dim() {
            return Err(FactorError::InvalidArgument(format!(
                "noise model has dimension {} but the measurement has tangent dimension {}",
                noise_model.dim(),
                measurement.tangent_dim()
            )));
        }

        let (keys, dims): (Vec<Key>, Vec<usize>) = expression.keys_and_dims().into_iter().unzip();
        debug!(
            "ExpressionFactor over {} keys: {} x {}",
            keys.len(),
            noise_model.dim(),
            dims.iter().sum::<usize>() + 1
        );

        Ok(Self {
            measurement,
            expression,
            noise_model,
            keys,
            dims,
            activity: None,
        })
    }

    /// Gate the factor on a predicate over the assignment.
    pub fn with_activity(mut self, activity: ActivityFn) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn measurement(&self) -> &T {
        &self.measurement
    }

    pub fn expression(&self) -> &Expression<T> {
        &self.expression
    }

    pub fn noise_model(&self) -> &SharedNoiseModel {
        &self.noise_model
    }

    /// Column width of each key, in key order.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Residual `h(x) ⊖ z`, optionally with one Jacobian block per key.
    ///
    /// When `jacobians` is given it is overwritten with `keys().len()` blocks of
    /// shape `dim × dims()[i]`, in key order.
    ///
    /// # Errors
    /// - `NotFound` / `TypeMismatch` if the assignment lacks a variable the
    ///   expression reads.
    /// - `InvalidArgument` if a variable's dimension differs from the width its
    ///   leaf declared.
    pub fn unwhitened_error_with_jacobians(
        &self,
        values: &Values,
        jacobians: Option<&mut Vec<DMatrix<f64>>>,
    ) -> FactorResult<DVector<f64>> {
        let Some(jacobians) = jacobians else {
            let prediction = self.expression.value(values)?;
            return Ok(self.measurement.local(&prediction, None)?);
        };

        let mut residual = DVector::zeros(0);
        let mut blocks: BTreeMap<Key, DMatrix<f64>> = BTreeMap::new();
        self.expression.value_into(
            values,
            |prediction| {
                let mut chart = DMatrix::zeros(0, 0);
                residual = self.measurement.local(prediction, Some(&mut chart))?;
                Ok(chart)
            },
            &mut blocks,
        )?;

        let rows = residual.len();
        *jacobians = self
            .keys
            .iter()
            .zip(&self.dims)
            .map(|(key, &width)| {
                blocks.remove(key).unwrap_or_else(|| DMatrix::zeros(rows, width))
            })
            .collect();
        Ok(residual)
    }
}

impl<T: Manifold> fmt::Debug for ExpressionFactor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionFactor")
            .field("measurement", &self.measurement)
            .field("keys", &self.keys)
            .field("dims", &self.dims)
            .field("noise_model", &self.noise_model)
            .field("gated", &self.activity.is_some())
            .finish()
    }
}

impl<T: Manifold> Factor for ExpressionFactor<T> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        self.noise_model.dim()
    }

    fn active(&self, values: &Values) -> bool {
        self.activity.as_ref().map_or(true, |predicate| predicate(values))
    }

    fn unwhitened_error(&self, values: &Values) -> FactorResult<DVector<f64>> {
        self.unwhitened_error_with_jacobians(values, None)
    }

    fn whitened_error(&self, values: &Values) -> FactorResult<DVector<f64>> {
        Ok(self.noise_model.whiten(&self.unwhitened_error(values)?))
    }

    fn error(&self, values: &Values) -> FactorResult<f64> {
        if !self.active(values) {
            return Ok(0.0);
        }
        let residual = self.unwhitened_error(values)?;
        Ok(0.5 * self.noise_model.squared_mahalanobis_distance(&residual))
    }

    fn linearize(&self, values: &Values) -> FactorResult<Option<JacobianFactor>> {
        if !self.active(values) {
            trace!("ExpressionFactor over {:?} inactive, skipping", self.keys);
            return Ok(None);
        }

        let dim = self.noise_model.dim();
        let mut ab = VerticalBlockMatrix::new(&self.dims, dim);

        let mut residual = DVector::zeros(0);
        self.expression.value_into(
            values,
            |prediction| {
                let mut chart = DMatrix::zeros(dim, dim);
                residual = self.measurement.local(prediction, Some(&mut chart))?;
                Ok(chart)
            },
            &mut JacobianMap::new(&self.keys, &mut ab),
        )?;
        ab.rhs_mut().copy_from(&(-residual));

        // Hard rows stay unscaled; the unit model marks them for the solver.
        self.noise_model.whiten_system(ab.matrix_mut());
        let model = self.noise_model.unit();

        Ok(Some(JacobianFactor::from_block_matrix(self.keys.clone(), ab, model)))
    }
}
