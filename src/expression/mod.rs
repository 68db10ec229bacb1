//! Measurement functions with reverse-mode automatic differentiation.
//!
//! An [`Expression<T>`] is an immutable tree whose leaves read variables from a
//! [`Values`] assignment and whose inner nodes apply functions with analytic
//! local Jacobians. A single forward pass records those local Jacobians in a
//! [`Trace`]; a single reverse pass then yields `∂root/∂key` for every leaf key
//! at once, regardless of how many variables the expression touches.
//!
//! # Example
//!
//! ```
//! use expression_factor::core::key::symbol;
//! use expression_factor::core::values::Values;
//! use expression_factor::expression::{between, Expression};
//! use expression_factor::manifold::SE2;
//!
//! let x0 = Expression::<SE2>::leaf(symbol('x', 0));
//! let x1 = Expression::<SE2>::leaf(symbol('x', 1));
//! let odometry = between(&x0, &x1);
//!
//! let mut values = Values::new();
//! values.insert(symbol('x', 0), SE2::from_xy_angle(0.0, 0.0, 0.0)).unwrap();
//! values.insert(symbol('x', 1), SE2::from_xy_angle(1.0, 0.0, 0.0)).unwrap();
//!
//! let (relative, jacobians) = odometry.value_with_jacobians(&values).unwrap();
//! assert!((relative.x() - 1.0).abs() < 1e-12);
//! assert_eq!(jacobians.len(), 2);
//! ```

use crate::core::key::Key;
use crate::core::values::{ManifoldValue, Values};
use crate::core::vector_values::Dims;
use crate::error::FactorResult;
use crate::manifold::{LieGroup, Manifold};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

pub mod functions;
pub mod jacobian_map;
pub mod nodes;

pub use functions::{between, compose, difference, inverse, linear, scale, sum, transform_to};
pub use jacobian_map::{JacobianMap, JacobianSink};
pub use nodes::{ExpressionNode, Trace};

use nodes::{BinaryNode, ConstantNode, LeafNode, UnaryNode};

/// A differentiable function of the variables in a [`Values`] assignment.
///
/// Cloning is cheap: subtrees are shared.
pub struct Expression<T> {
    root: Arc<dyn ExpressionNode<T>>,
}

impl<T> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
        }
    }
}

impl<T: ManifoldValue + LieGroup> Expression<T> {
    /// The variable stored under `key`, with its fixed tangent dimension.
    pub fn leaf(key: Key) -> Self {
        Self::leaf_with_dim(key, T::DOF)
    }
}

impl<T: ManifoldValue> Expression<T> {
    /// The variable stored under `key`, for types whose dimension is only
    /// known at runtime (e.g. `DVector<f64>`).
    pub fn leaf_with_dim(key: Key, dim: usize) -> Self {
        Self {
            root: Arc::new(LeafNode {
                key,
                dim,
                _marker: PhantomData,
            }),
        }
    }
}

impl<T: Manifold> Expression<T> {
    /// A value that does not depend on any variable.
    pub fn constant(value: T) -> Self {
        Self {
            root: Arc::new(ConstantNode { value }),
        }
    }

    /// Apply `function` to one sub-expression.
    ///
    /// When asked, `function` must write `∂output/∂a` (`dim(T) × dim(A)`).
    pub fn unary<A, F>(function: F, arg: &Expression<A>) -> Self
    where
        A: Manifold,
        F: Fn(&A, Option<&mut DMatrix<f64>>) -> T + Send + Sync + 'static,
    {
        Self {
            root: Arc::new(UnaryNode {
                function: Arc::new(function),
                arg: arg.clone(),
            }),
        }
    }

    /// Apply `function` to two sub-expressions.
    ///
    /// When asked, `function` must write `∂output/∂a` and `∂output/∂b`.
    pub fn binary<A, B, F>(function: F, arg_a: &Expression<A>, arg_b: &Expression<B>) -> Self
    where
        A: Manifold,
        B: Manifold,
        F: Fn(&A, &B, Option<&mut DMatrix<f64>>, Option<&mut DMatrix<f64>>) -> T
            + Send
            + Sync
            + 'static,
    {
        Self {
            root: Arc::new(BinaryNode {
                function: Arc::new(function),
                arg_a: arg_a.clone(),
                arg_b: arg_b.clone(),
            }),
        }
    }

    /// Every variable this expression reads, with its tangent dimension, in key order.
    pub fn keys_and_dims(&self) -> Dims {
        let mut dims = BTreeMap::new();
        self.root.collect_keys(&mut dims);
        dims
    }

    /// Evaluate without derivatives.
    ///
    /// # Errors
    /// `NotFound` / `TypeMismatch` if a leaf variable is missing or mistyped.
    pub fn value(&self, values: &Values) -> FactorResult<T> {
        self.root.value(values)
    }

    /// Forward pass keeping the trace for a later reverse pass.
    pub fn trace(&self, values: &Values) -> FactorResult<(T, Box<dyn Trace>)> {
        self.root.trace(values)
    }

    /// Evaluate and differentiate in one forward and one reverse pass.
    ///
    /// `seed` receives the value and returns the matrix that starts the reverse
    /// pass; each block delivered to `sink` is then `seed · ∂value/∂key`.
    ///
    /// # Errors
    /// Anything the forward pass or `seed` reports. Nothing reaches `sink`
    /// unless both succeed.
    pub fn value_into<F>(
        &self,
        values: &Values,
        seed: F,
        sink: &mut dyn JacobianSink,
    ) -> FactorResult<T>
    where
        F: FnOnce(&T) -> FactorResult<DMatrix<f64>>,
    {
        let (value, trace) = self.trace(values)?;
        trace.reverse(&seed(&value)?, sink);
        Ok(value)
    }

    /// Evaluate together with `∂value/∂key` for every leaf key.
    pub fn value_with_jacobians(
        &self,
        values: &Values,
    ) -> FactorResult<(T, BTreeMap<Key, DMatrix<f64>>)> {
        let mut jacobians = BTreeMap::new();
        let value = self.value_into(
            values,
            |value| {
                let dim = value.tangent_dim();
                Ok(DMatrix::identity(dim, dim))
            },
            &mut jacobians,
        )?;
        Ok((value, jacobians))
    }
}
