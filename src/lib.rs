//! # Expression Factor
//!
//! The linearization core of a factor-graph nonlinear least-squares solver.
//!
//! ## Features
//!
//! - **Block Vectors**: [`VectorValues`] stores one tangent-space block per variable key in a
//!   single contiguous buffer, with block-wise arithmetic and flattening
//! - **Expressions**: measurement models composed from differentiable building blocks, with all
//!   variable Jacobians produced by one reverse-mode pass
//! - **Expression Factors**: residuals on the measurement's tangent space, whitened by a noise
//!   model and assembled into a [`JacobianFactor`]
//! - **Parallel Linearization**: whole graphs linearized on the rayon thread pool and assembled
//!   into a faer sparse Jacobian
//!
//! ## Manifolds
//!
//! - **Rⁿ**: `DVector<f64>` with runtime dimension and fixed-size `SVector<f64, D>`
//! - **SO(2) / SE(2)**: planar rotations and rigid motions
//! - **SO(3)**: 3D rotations

pub mod core;
pub mod error;
pub mod expression;
pub mod factors;
pub mod linalg;
pub mod logger;
pub mod manifold;

// Re-export core types
pub use core::concurrent::ConcurrentVectorValues;
pub use core::key::{format_key, symbol, Key};
pub use core::values::{Value, Values};
pub use core::vector_values::{Dims, VectorValues};
pub use error::{FactorError, FactorResult};

// Re-export expression and factor types
pub use expression::{Expression, JacobianMap, JacobianSink};
pub use factors::{ExpressionFactor, Factor, LinearizationConfig, NonlinearFactorGraph};

// Re-export linear algebra types
pub use linalg::{GaussianFactorGraph, JacobianFactor, NoiseModel, SharedNoiseModel};

// Re-export logger
pub use logger::{init_logger, init_logger_with_level};

// Re-export manifold types
pub use manifold::{LieGroup, Manifold, SE2, SO2, SO3};
