//! Expression tree nodes and their reverse-mode traces.
//!
//! Evaluating a node with [`ExpressionNode::trace`] runs the forward pass and
//! records, for every function application, the local Jacobian of its output
//! with respect to each argument. The resulting [`Trace`] tree is then walked
//! once in reverse: each node right-multiplies the incoming adjoint by its
//! local Jacobian and hands the product to its children, and each leaf hands
//! the final product to a [`JacobianSink`].

use crate::core::key::{format_key, Key};
use crate::core::values::{ManifoldValue, Values};
use crate::error::{FactorError, FactorResult};
use crate::expression::JacobianSink;
use crate::manifold::{check_tangent_dim, Manifold};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::Expression;

/// Recorded forward pass of one node, ready for adjoint propagation.
pub trait Trace {
    /// Propagate `adjoint = ∂root/∂(this node)` down to the leaves.
    fn reverse(&self, adjoint: &DMatrix<f64>, sink: &mut dyn JacobianSink);
}

/// One node of an expression tree producing a `T`.
pub trait ExpressionNode<T>: Send + Sync {
    /// Add every leaf key and its tangent dimension to `dims`.
    fn collect_keys(&self, dims: &mut BTreeMap<Key, usize>);

    /// Forward pass without derivatives.
    fn value(&self, values: &Values) -> FactorResult<T>;

    /// Forward pass recording local Jacobians.
    fn trace(&self, values: &Values) -> FactorResult<(T, Box<dyn Trace>)>;
}

pub(crate) type UnaryFn<A, T> = dyn Fn(&A, Option<&mut DMatrix<f64>>) -> T + Send + Sync;
pub(crate) type BinaryFn<A, B, T> =
    dyn Fn(&A, &B, Option<&mut DMatrix<f64>>, Option<&mut DMatrix<f64>>) -> T + Send + Sync;

struct LeafTrace {
    key: Key,
}

impl Trace for LeafTrace {
    fn reverse(&self, adjoint: &DMatrix<f64>, sink: &mut dyn JacobianSink) {
        sink.accumulate(self.key, adjoint);
    }
}

struct ConstantTrace;

impl Trace for ConstantTrace {
    fn reverse(&self, _adjoint: &DMatrix<f64>, _sink: &mut dyn JacobianSink) {}
}

struct UnaryTrace {
    jacobian: DMatrix<f64>,
    child: Box<dyn Trace>,
}

impl Trace for UnaryTrace {
    fn reverse(&self, adjoint: &DMatrix<f64>, sink: &mut dyn JacobianSink) {
        self.child.reverse(&(adjoint * &self.jacobian), sink);
    }
}

struct BinaryTrace {
    jacobian_a: DMatrix<f64>,
    jacobian_b: DMatrix<f64>,
    child_a: Box<dyn Trace>,
    child_b: Box<dyn Trace>,
}

impl Trace for BinaryTrace {
    fn reverse(&self, adjoint: &DMatrix<f64>, sink: &mut dyn JacobianSink) {
        self.child_a.reverse(&(adjoint * &self.jacobian_a), sink);
        self.child_b.reverse(&(adjoint * &self.jacobian_b), sink);
    }
}

/// A variable read from the assignment.
pub(crate) struct LeafNode<T> {
    pub(crate) key: Key,
    pub(crate) dim: usize,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: ManifoldValue> ExpressionNode<T> for LeafNode<T> {
    fn collect_keys(&self, dims: &mut BTreeMap<Key, usize>) {
        dims.insert(self.key, self.dim);
    }

    fn value(&self, values: &Values) -> FactorResult<T> {
        let value = values.at::<T>(self.key)?;
        check_tangent_dim(self.dim, value.tangent_dim()).map_err(|err| {
            FactorError::InvalidArgument(format!("variable '{}': {err}", format_key(self.key)))
        })?;
        Ok(value.clone())
    }

    fn trace(&self, values: &Values) -> FactorResult<(T, Box<dyn Trace>)> {
        Ok((self.value(values)?, Box::new(LeafTrace { key: self.key })))
    }
}

/// A fixed value with no dependence on any variable.
pub(crate) struct ConstantNode<T> {
    pub(crate) value: T,
}

impl<T: Manifold> ExpressionNode<T> for ConstantNode<T> {
    fn collect_keys(&self, _dims: &mut BTreeMap<Key, usize>) {}

    fn value(&self, _values: &Values) -> FactorResult<T> {
        Ok(self.value.clone())
    }

    fn trace(&self, _values: &Values) -> FactorResult<(T, Box<dyn Trace>)> {
        Ok((self.value.clone(), Box::new(ConstantTrace)))
    }
}

/// `f(a)` with an analytic Jacobian `∂f/∂a`.
pub(crate) struct UnaryNode<A, T> {
    pub(crate) function: Arc<UnaryFn<A, T>>,
    pub(crate) arg: Expression<A>,
}

impl<A: Manifold, T: Manifold> ExpressionNode<T> for UnaryNode<A, T> {
    fn collect_keys(&self, dims: &mut BTreeMap<Key, usize>) {
        self.arg.root.collect_keys(dims);
    }

    fn value(&self, values: &Values) -> FactorResult<T> {
        let a = self.arg.value(values)?;
        Ok((self.function)(&a, None))
    }

    fn trace(&self, values: &Values) -> FactorResult<(T, Box<dyn Trace>)> {
        let (a, child) = self.arg.root.trace(values)?;
        let mut jacobian = DMatrix::zeros(0, 0);
        let result = (self.function)(&a, Some(&mut jacobian));
        Ok((result, Box::new(UnaryTrace { jacobian, child })))
    }
}

/// `f(a, b)` with analytic Jacobians `∂f/∂a` and `∂f/∂b`.
pub(crate) struct BinaryNode<A, B, T> {
    pub(crate) function: Arc<BinaryFn<A, B, T>>,
    pub(crate) arg_a: Expression<A>,
    pub(crate) arg_b: Expression<B>,
}

impl<A: Manifold, B: Manifold, T: Manifold> ExpressionNode<T> for BinaryNode<A, B, T> {
    fn collect_keys(&self, dims: &mut BTreeMap<Key, usize>) {
        self.arg_a.root.collect_keys(dims);
        self.arg_b.root.collect_keys(dims);
    }

    fn value(&self, values: &Values) -> FactorResult<T> {
        let a = self.arg_a.value(values)?;
        let b = self.arg_b.value(values)?;
        Ok((self.function)(&a, &b, None, None))
    }

    fn trace(&self, values: &Values) -> FactorResult<(T, Box<dyn Trace>)> {
        let (a, child_a) = self.arg_a.root.trace(values)?;
        let (b, child_b) = self.arg_b.root.trace(values)?;
        let mut jacobian_a = DMatrix::zeros(0, 0);
        let mut jacobian_b = DMatrix::zeros(0, 0);
        let result = (self.function)(&a, &b, Some(&mut jacobian_a), Some(&mut jacobian_b));
        Ok((
            result,
            Box::new(BinaryTrace {
                jacobian_a,
                jacobian_b,
                child_a,
                child_b,
            }),
        ))
    }
}
