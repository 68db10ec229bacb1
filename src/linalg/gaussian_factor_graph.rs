//! Collections of linear factors.
//!
//! A [`GaussianFactorGraph`] is the output of linearizing a nonlinear graph.
//! Besides evaluating the quadratic error it can assemble the stacked system
//! `A δx = b` as a faer sparse matrix, with variable columns in key order.

use crate::core::key::format_key;
use crate::core::vector_values::{Dims, VectorValues};
use crate::error::{FactorError, FactorResult};
use crate::linalg::{JacobianFactor, LinAlgError, SparseMatrix};
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianFactorGraph {
    factors: Vec<JacobianFactor>,
}

impl GaussianFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, factor: JacobianFactor) {
        self.factors.push(factor);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn factors(&self) -> &[JacobianFactor] {
        &self.factors
    }

    pub fn iter(&self) -> impl Iterator<Item = &JacobianFactor> {
        self.factors.iter()
    }

    /// Column width of every variable involved in the graph.
    ///
    /// # Errors
    /// `InvalidArgument` if two factors disagree on a variable's width.
    pub fn keys(&self) -> FactorResult<Dims> {
        let mut dims = Dims::new();
        for factor in &self.factors {
            for &key in factor.keys() {
                let width = factor.get_a(key)?.ncols();
                match dims.insert(key, width) {
                    Some(previous) if previous != width => {
                        return Err(FactorError::InvalidArgument(format!(
                            "variable '{}' has width {} in one factor and {} in another",
                            format_key(key),
                            previous,
                            width
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(dims)
    }

    /// Total rows of the stacked system.
    pub fn rows(&self) -> usize {
        self.factors.iter().map(JacobianFactor::rows).sum()
    }

    /// Sum of the factor errors at `x`.
    pub fn error(&self, x: &VectorValues) -> FactorResult<f64> {
        self.factors.iter().map(|f| f.error(x)).sum()
    }

    /// Gradient of the total error at zero, `−Aᵀ b`, over every variable.
    pub fn gradient_at_zero(&self) -> FactorResult<VectorValues> {
        let mut gradient = VectorValues::zero_from_dims(&self.keys()?);
        for factor in &self.factors {
            gradient.add_in_place_allow_missing(&factor.gradient_at_zero());
        }
        Ok(gradient)
    }

    /// Stack every factor into `(A, b)` with columns ordered by key.
    ///
    /// Exact zeros inside blocks are skipped so the sparsity pattern only
    /// contains structurally meaningful entries.
    pub fn sparse_jacobian(&self) -> FactorResult<(SparseMatrix, Mat<f64>)> {
        let dims = self.keys()?;
        let mut col_offsets = BTreeMap::new();
        let mut cols = 0;
        for (&key, &dim) in &dims {
            col_offsets.insert(key, cols);
            cols += dim;
        }

        let rows = self.rows();
        let mut triplets = Vec::new();
        let mut rhs = Mat::<f64>::zeros(rows, 1);
        let mut row_offset = 0;

        for factor in &self.factors {
            for &key in factor.keys() {
                let block = factor.get_a(key)?;
                let col_offset = col_offsets[&key];
                for c in 0..block.ncols() {
                    for r in 0..block.nrows() {
                        let value = block[(r, c)];
                        if value != 0.0 {
                            triplets.push(Triplet::new(row_offset + r, col_offset + c, value));
                        }
                    }
                }
            }
            for (r, &value) in factor.rhs().iter().enumerate() {
                rhs[(row_offset + r, 0)] = value;
            }
            row_offset += factor.rows();
        }

        let jacobian = SparseColMat::try_new_from_triplets(rows, cols, &triplets)
            .map_err(|e| LinAlgError::SparseAssembly(format!("{e:?}")))?;
        Ok((jacobian, rhs))
    }
}

impl FromIterator<JacobianFactor> for GaussianFactorGraph {
    fn from_iter<I: IntoIterator<Item = JacobianFactor>>(iter: I) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}
