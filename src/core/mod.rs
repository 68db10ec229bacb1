//! Core containers for variables and linear updates
//!
//! - [`key`]: variable identifiers and symbol formatting
//! - [`vector_values`]: block-structured linear vectors
//! - [`concurrent`]: thread-safe incremental builder for block vectors
//! - [`values`]: nonlinear variable assignments on manifolds

pub mod concurrent;
pub mod key;
pub mod values;
pub mod vector_values;
