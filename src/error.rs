//! Error types for the expression-factor library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use crate::{linalg::LinAlgError, manifold::ManifoldError};
use thiserror::Error;

/// Main result type used throughout the library
pub type FactorResult<T> = Result<T, FactorError>;

/// Main error type for the library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    /// A key was requested that is not present in a container
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A key was inserted that is already present in a container
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Construction-time misconfiguration (noise model, dimensions, sigmas)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value was requested as a different manifold type than it was stored with
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Manifold operations errors
    #[error("Manifold error: {0}")]
    Manifold(String),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Thread synchronization errors
    #[error("Thread synchronization error: {0}")]
    ThreadError(String),
}

impl From<ManifoldError> for FactorError {
    fn from(err: ManifoldError) -> Self {
        FactorError::Manifold(err.to_string())
    }
}

impl From<LinAlgError> for FactorError {
    fn from(err: LinAlgError) -> Self {
        FactorError::LinearAlgebra(err.to_string())
    }
}
