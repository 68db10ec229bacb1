//! Linear factors: one whitened block row of a least-squares system.
//!
//! A [`JacobianFactor`] represents `‖Σⱼ Aⱼ δxⱼ − b‖²` over a fixed list of keys.
//! Factors produced by linearization are already whitened, so their noise
//! model is absent (unit) unless the source model was constrained, in which
//! case the constrained unit model is kept so solvers can recognise hard rows.

use crate::core::key::{format_key, Key};
use crate::core::vector_values::VectorValues;
use crate::error::{FactorError, FactorResult};
use crate::linalg::{NoiseModel, VerticalBlockMatrix};
use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    ab: VerticalBlockMatrix,
    model: Option<NoiseModel>,
}

impl JacobianFactor {
    /// Build from explicit `(key, Aⱼ)` terms and a right-hand side.
    ///
    /// # Errors
    /// - `DuplicateKey` if a key appears twice.
    /// - `InvalidArgument` if a block or the model disagrees with `b` in row count.
    pub fn new(
        terms: Vec<(Key, DMatrix<f64>)>,
        b: DVector<f64>,
        model: Option<NoiseModel>,
    ) -> FactorResult<Self> {
        let rows = b.len();
        let mut seen = BTreeSet::new();
        for (key, a) in &terms {
            if !seen.insert(*key) {
                return Err(FactorError::DuplicateKey(format!(
                    "variable '{}' appears twice in a linear factor",
                    format_key(*key)
                )));
            }
            if a.nrows() != rows {
                return Err(FactorError::InvalidArgument(format!(
                    "block for '{}' has {} rows, expected {}",
                    format_key(*key),
                    a.nrows(),
                    rows
                )));
            }
        }
        if let Some(model) = &model {
            if model.dim() != rows {
                return Err(FactorError::InvalidArgument(format!(
                    "noise model dimension {} does not match {} rows",
                    model.dim(),
                    rows
                )));
            }
        }

        let dims: Vec<usize> = terms.iter().map(|(_, a)| a.ncols()).collect();
        let mut ab = VerticalBlockMatrix::new(&dims, rows);
        for (i, (_, a)) in terms.iter().enumerate() {
            ab.block_mut(i).copy_from(a);
        }
        ab.rhs_mut().copy_from(&b);

        Ok(Self {
            keys: terms.into_iter().map(|(key, _)| key).collect(),
            ab,
            model,
        })
    }

    /// Wrap an already assembled augmented matrix. `keys[i]` names block `i`.
    pub(crate) fn from_block_matrix(
        keys: Vec<Key>,
        ab: VerticalBlockMatrix,
        model: Option<NoiseModel>,
    ) -> Self {
        debug_assert_eq!(keys.len(), ab.n_variable_blocks());
        Self { keys, ab, model }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn rows(&self) -> usize {
        self.ab.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Jacobian block for `key`.
    pub fn get_a(&self, key: Key) -> FactorResult<DMatrixView<'_, f64>> {
        self.position(key).map(|i| self.ab.block(i))
    }

    /// Right-hand side `b`.
    pub fn rhs(&self) -> DVectorView<'_, f64> {
        self.ab.rhs()
    }

    /// Dense `(A, b)` with blocks in factor key order.
    pub fn jacobian(&self) -> (DMatrix<f64>, DVector<f64>) {
        (self.ab.jacobian().into_owned(), self.ab.rhs().into_owned())
    }

    /// Dense `[A | b]`.
    pub fn augmented_jacobian(&self) -> DMatrix<f64> {
        self.ab.matrix().clone()
    }

    pub fn noise_model(&self) -> Option<&NoiseModel> {
        self.model.as_ref()
    }

    pub fn is_constrained(&self) -> bool {
        self.model.as_ref().is_some_and(NoiseModel::is_constrained)
    }

    fn position(&self, key: Key) -> FactorResult<usize> {
        self.keys.iter().position(|&k| k == key).ok_or_else(|| {
            FactorError::NotFound(format!(
                "variable '{}' is not involved in this factor",
                format_key(key)
            ))
        })
    }

    fn check_width(&self, block: usize, key: Key, dim: usize) -> FactorResult<()> {
        let width = self.ab.block_width(block);
        if dim != width {
            return Err(FactorError::InvalidArgument(format!(
                "variable '{}' has dimension {}, but its column block is {} wide",
                format_key(key),
                dim,
                width
            )));
        }
        Ok(())
    }

    /// `A x`.
    ///
    /// # Errors
    /// - `NotFound` if `x` lacks one of the factor's keys.
    /// - `InvalidArgument` if a block of `x` differs in size from its column block.
    pub fn multiply(&self, x: &VectorValues) -> FactorResult<DVector<f64>> {
        let mut result = DVector::zeros(self.rows());
        for (i, &key) in self.keys.iter().enumerate() {
            let block = x.at(key)?;
            self.check_width(i, key, block.len())?;
            result += self.ab.block(i) * block;
        }
        Ok(result)
    }

    /// `A x − b`.
    pub fn residual(&self, x: &VectorValues) -> FactorResult<DVector<f64>> {
        Ok(self.multiply(x)? - self.ab.rhs())
    }

    /// `½‖A x − b‖²`, weighted by the constrained model when present.
    pub fn error(&self, x: &VectorValues) -> FactorResult<f64> {
        let residual = self.residual(x)?;
        Ok(0.5
            * match &self.model {
                Some(model) => model.squared_mahalanobis_distance(&residual),
                None => residual.norm_squared(),
            })
    }

    /// `x += alpha · Aᵀ e`, inserting blocks for keys that `x` does not have yet.
    ///
    /// # Errors
    /// `InvalidArgument` if an existing block of `x` differs in size from its
    /// column block, or `e` does not have one entry per row.
    pub fn transpose_multiply_add(
        &self,
        alpha: f64,
        e: &DVector<f64>,
        x: &mut VectorValues,
    ) -> FactorResult<()> {
        if e.len() != self.rows() {
            return Err(FactorError::InvalidArgument(format!(
                "error vector has {} entries, expected {}",
                e.len(),
                self.rows()
            )));
        }
        for (i, &key) in self.keys.iter().enumerate() {
            let contribution = self.ab.block(i).tr_mul(e) * alpha;
            if x.exists(key) {
                self.check_width(i, key, x.dim(key)?)?;
                let mut block = x.at_mut(key)?;
                block += &contribution;
            } else {
                x.insert(key, contribution)?;
            }
        }
        Ok(())
    }

    /// Gradient of `½‖A x − b‖²` at `x = 0`, which is `−Aᵀ b`.
    pub fn gradient_at_zero(&self) -> VectorValues {
        let b = self.ab.rhs();
        let pairs = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, &key)| (key, -self.ab.block(i).tr_mul(&b)));
        // Keys are unique by construction.
        VectorValues::from_pairs(pairs).unwrap_or_default()
    }
}
