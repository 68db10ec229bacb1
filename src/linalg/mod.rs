//! Linear algebra for linearized factors.
//!
//! This module holds everything downstream of the nonlinear evaluation:
//! - [`block_matrix`]: column-partitioned augmented matrices `[A₁ … Aₙ | b]`
//! - [`noise_model`]: whitening of residuals and Jacobians
//! - [`jacobian_factor`]: one whitened block row of the global linear system
//! - [`gaussian_factor_graph`]: a set of linear factors and its sparse assembly using faer

use thiserror::Error;

pub mod block_matrix;
pub mod gaussian_factor_graph;
pub mod jacobian_factor;
pub mod noise_model;

pub use block_matrix::VerticalBlockMatrix;
pub use gaussian_factor_graph::GaussianFactorGraph;
pub use jacobian_factor::JacobianFactor;
pub use noise_model::{NoiseModel, SharedNoiseModel};

/// Type alias for sparse matrices using faer
pub type SparseMatrix = faer::sparse::SparseColMat<usize, f64>;

/// Errors raised by linear algebra routines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// A covariance or information matrix failed Cholesky factorization
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    /// Malformed input such as negative sigmas or a non-square matrix
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sparse matrix assembly failed
    #[error("Sparse assembly failed: {0}")]
    SparseAssembly(String),
}
