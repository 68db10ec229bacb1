//! Column-partitioned augmented matrices.
//!
//! A [`VerticalBlockMatrix`] stores `[A₁ A₂ … Aₙ | b]` as one contiguous
//! `rows × (Σ widths + 1)` matrix. Block `i < n` is the Jacobian of variable `i`;
//! the trailing single-column block is the right-hand side. Column starts are
//! precomputed so block access is a constant-time view.

use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, DVectorView, DVectorViewMut};

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalBlockMatrix {
    matrix: DMatrix<f64>,
    /// Start column of every block, plus one past the last column.
    variable_col_starts: Vec<usize>,
}

impl VerticalBlockMatrix {
    /// Zero matrix with one column block per entry of `dims` and a trailing RHS column.
    pub fn new(dims: &[usize], rows: usize) -> Self {
        let mut variable_col_starts = Vec::with_capacity(dims.len() + 2);
        variable_col_starts.push(0);
        let mut end = 0;
        for &dim in dims.iter().chain(std::iter::once(&1)) {
            end += dim;
            variable_col_starts.push(end);
        }
        Self {
            matrix: DMatrix::zeros(rows, end),
            variable_col_starts,
        }
    }

    /// Number of variable blocks, excluding the RHS column.
    pub fn n_variable_blocks(&self) -> usize {
        self.variable_col_starts.len() - 2
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// First column of block `block`.
    pub fn offset(&self, block: usize) -> usize {
        self.variable_col_starts[block]
    }

    /// Width of block `block`.
    pub fn block_width(&self, block: usize) -> usize {
        self.variable_col_starts[block + 1] - self.variable_col_starts[block]
    }

    /// Jacobian block of variable `block`. Panics if out of range.
    pub fn block(&self, block: usize) -> DMatrixView<'_, f64> {
        self.matrix.columns(self.offset(block), self.block_width(block))
    }

    pub fn block_mut(&mut self, block: usize) -> DMatrixViewMut<'_, f64> {
        let (start, width) = (self.offset(block), self.block_width(block));
        self.matrix.columns_mut(start, width)
    }

    /// All variable blocks side by side, without the RHS column.
    pub fn jacobian(&self) -> DMatrixView<'_, f64> {
        self.matrix.columns(0, self.cols() - 1)
    }

    pub fn rhs(&self) -> DVectorView<'_, f64> {
        self.matrix.column(self.cols() - 1)
    }

    pub fn rhs_mut(&mut self) -> DVectorViewMut<'_, f64> {
        let last = self.cols() - 1;
        self.matrix.column_mut(last)
    }

    /// The full augmented matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.matrix
    }

    pub fn set_zero(&mut self) {
        self.matrix.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let ab = VerticalBlockMatrix::new(&[3, 2], 4);
        assert_eq!(ab.n_variable_blocks(), 2);
        assert_eq!(ab.rows(), 4);
        assert_eq!(ab.cols(), 6);
        assert_eq!(ab.offset(1), 3);
        assert_eq!(ab.block_width(0), 3);
        assert_eq!(ab.block_width(2), 1);
        assert_eq!(ab.jacobian().ncols(), 5);
    }

    #[test]
    fn test_block_writes_land_in_place() {
        let mut ab = VerticalBlockMatrix::new(&[2, 1], 2);
        ab.block_mut(1).fill(7.0);
        ab.rhs_mut()[1] = -1.0;

        assert_eq!(ab.matrix()[(0, 2)], 7.0);
        assert_eq!(ab.matrix()[(1, 3)], -1.0);
        assert_eq!(ab.block(0).iter().filter(|&&v| v != 0.0).count(), 0);

        ab.set_zero();
        assert_eq!(ab.matrix().norm(), 0.0);
    }

    #[test]
    fn test_no_variables_has_only_rhs() {
        let ab = VerticalBlockMatrix::new(&[], 3);
        assert_eq!(ab.n_variable_blocks(), 0);
        assert_eq!(ab.cols(), 1);
        assert_eq!(ab.rhs().len(), 3);
    }
}
