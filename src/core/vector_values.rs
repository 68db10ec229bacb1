//! Block-structured vectors keyed by variable.
//!
//! [`VectorValues`] holds one numeric sub-vector per [`Key`] and represents a
//! single element of the direct sum of the per-key vector spaces. It is the
//! container used for linear steps, gradients and tangent-space deltas.
//!
//! # Storage and performance
//!
//! All blocks live in one contiguous arena. A key index maps each key to an
//! `(offset, dim)` window inside the arena, so once a `VectorValues` has been
//! allocated, reading or writing a block is a map lookup plus a slice.
//!
//! There are two ways to build one:
//! - **Pre-allocated (fast)**: [`VectorValues::from_flat`], [`VectorValues::from_pairs`],
//!   [`VectorValues::zero`] and [`VectorValues::zero_from_dims`] size the arena once.
//! - **Incremental (slow)**: [`VectorValues::insert`] reallocates the whole arena on
//!   every call, and [`VectorValues::erase`] compacts it. Use these in tests and
//!   examples, not inside solver loops.
//!
//! # Structure contract
//!
//! Binary arithmetic (`add`, `subtract`, `dot`, `axpy`, ...) requires both operands
//! to have the same structure: identical key sets and identical per-key dimensions.
//! This is checked with `debug_assert!` only. Violating it in a release build gives
//! unspecified (but memory-safe) results.
//!
//! # Example
//!
//! ```
//! use expression_factor::core::vector_values::VectorValues;
//! use nalgebra::DVector;
//!
//! let mut values = VectorValues::new();
//! values.insert(0, DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
//! values.insert(1, DVector::from_vec(vec![4.0, 5.0])).unwrap();
//!
//! assert_eq!(values.len(), 2);
//! assert_eq!(values.vector().as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
//!
//! let doubled = values.scale(2.0);
//! assert_eq!(&doubled[1], &[8.0, 10.0]);
//! ```

use crate::core::key::{format_key, Key};
use crate::error::{FactorError, FactorResult};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, MulAssign, Neg, Range, Sub, SubAssign};

/// Per-key block dimensions, ordered by key.
pub type Dims = BTreeMap<Key, usize>;

/// Location of one block inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    offset: usize,
    dim: usize,
}

impl Block {
    fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.dim
    }
}

/// A collection of vector-valued blocks, one per key.
#[derive(Clone)]
pub struct VectorValues {
    data: DVector<f64>,
    blocks: BTreeMap<Key, Block>,
}

fn not_found(key: Key) -> FactorError {
    FactorError::NotFound(format!(
        "Requested variable '{}' is not in this VectorValues",
        format_key(key)
    ))
}

fn duplicate(key: Key) -> FactorError {
    FactorError::DuplicateKey(format!(
        "Requested to insert variable '{}' already in this VectorValues",
        format_key(key)
    ))
}

impl Default for VectorValues {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorValues {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            data: DVector::zeros(0),
            blocks: BTreeMap::new(),
        }
    }

    /// Slice a flat vector into blocks laid out in key order.
    ///
    /// This is the pre-allocated path: the arena is `vector` itself.
    ///
    /// # Errors
    /// `InvalidArgument` if the dimensions do not sum to `vector.len()`.
    pub fn from_flat(vector: &DVector<f64>, dims: &Dims) -> FactorResult<Self> {
        let total: usize = dims.values().sum();
        if total != vector.len() {
            return Err(FactorError::InvalidArgument(format!(
                "dimensions sum to {} but the flat vector has {} entries",
                total,
                vector.len()
            )));
        }

        let mut offset = 0;
        let blocks = dims
            .iter()
            .map(|(&key, &dim)| {
                let block = Block { offset, dim };
                offset += dim;
                (key, block)
            })
            .collect();

        Ok(Self {
            data: vector.clone(),
            blocks,
        })
    }

    /// Build from `(key, vector)` pairs with a single arena allocation.
    ///
    /// # Errors
    /// `DuplicateKey` if a key appears twice.
    pub fn from_pairs<I>(pairs: I) -> FactorResult<Self>
    where
        I: IntoIterator<Item = (Key, DVector<f64>)>,
    {
        let mut sorted: BTreeMap<Key, DVector<f64>> = BTreeMap::new();
        for (key, value) in pairs {
            if sorted.insert(key, value).is_some() {
                return Err(duplicate(key));
            }
        }

        let total: usize = sorted.values().map(|v| v.len()).sum();
        let mut buffer = Vec::with_capacity(total);
        let mut blocks = BTreeMap::new();
        for (key, value) in sorted {
            blocks.insert(
                key,
                Block {
                    offset: buffer.len(),
                    dim: value.len(),
                },
            );
            buffer.extend_from_slice(value.as_slice());
        }

        Ok(Self {
            data: DVector::from_vec(buffer),
            blocks,
        })
    }

    /// Merge two containers with disjoint keys into one.
    ///
    /// # Errors
    /// `DuplicateKey` if the key sets overlap.
    pub fn merge(first: &VectorValues, second: &VectorValues) -> FactorResult<Self> {
        Self::from_pairs(
            first
                .iter()
                .chain(second.iter())
                .map(|(key, block)| (key, block.into_owned())),
        )
    }

    /// A container with the same structure as `other`, filled with zeros.
    pub fn zero(other: &VectorValues) -> Self {
        Self {
            data: DVector::zeros(other.data.len()),
            blocks: other.blocks.clone(),
        }
    }

    /// A zero-filled container with the given block dimensions.
    pub fn zero_from_dims(dims: &Dims) -> Self {
        let mut offset = 0;
        let blocks = dims
            .iter()
            .map(|(&key, &dim)| {
                let block = Block { offset, dim };
                offset += dim;
                (key, block)
            })
            .collect();

        Self {
            data: DVector::zeros(offset),
            blocks,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of all block dimensions.
    pub fn total_dim(&self) -> usize {
        self.data.len()
    }

    /// Dimension of the block stored under `key`.
    pub fn dim(&self, key: Key) -> FactorResult<usize> {
        self.block(key).map(|b| b.dim)
    }

    /// Whether `key` is present.
    pub fn exists(&self, key: Key) -> bool {
        self.blocks.contains_key(&key)
    }

    fn block(&self, key: Key) -> FactorResult<Block> {
        self.blocks.get(&key).copied().ok_or_else(|| not_found(key))
    }

    /// Read access to a block.
    pub fn at(&self, key: Key) -> FactorResult<DVectorView<'_, f64>> {
        let block = self.block(key)?;
        Ok(self.data.rows(block.offset, block.dim))
    }

    /// Write access to a block.
    pub fn at_mut(&mut self, key: Key) -> FactorResult<DVectorViewMut<'_, f64>> {
        let block = self.block(key)?;
        Ok(self.data.rows_mut(block.offset, block.dim))
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.blocks.keys().copied()
    }

    /// `(key, block)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, DVectorView<'_, f64>)> + '_ {
        self.blocks
            .iter()
            .map(|(&key, block)| (key, self.data.rows(block.offset, block.dim)))
    }

    /// Per-key dimensions.
    pub fn dims(&self) -> Dims {
        self.blocks.iter().map(|(&k, b)| (k, b.dim)).collect()
    }

    /// Insert a new block. Reallocates the arena (slow path).
    ///
    /// # Errors
    /// `DuplicateKey` if `key` is already present.
    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> FactorResult<()> {
        if self.exists(key) {
            return Err(duplicate(key));
        }
        self.append(std::iter::once((key, value.as_slice())));
        Ok(())
    }

    /// Insert unless the key exists. Returns `true` when the block was inserted.
    pub fn try_insert(&mut self, key: Key, value: DVector<f64>) -> bool {
        self.insert(key, value).is_ok()
    }

    /// Insert every block of `other`. Nothing is inserted if any key collides.
    ///
    /// # Errors
    /// `DuplicateKey` on the first colliding key.
    pub fn insert_all(&mut self, other: &VectorValues) -> FactorResult<()> {
        if let Some(key) = other.keys().find(|&k| self.exists(k)) {
            return Err(duplicate(key));
        }
        self.append(
            other
                .blocks
                .iter()
                .map(|(&key, b)| (key, &other.data.as_slice()[b.range()])),
        );
        Ok(())
    }

    fn append<'a, I>(&mut self, new_blocks: I)
    where
        I: IntoIterator<Item = (Key, &'a [f64])>,
    {
        let mut buffer: Vec<f64> = self.data.as_slice().to_vec();
        for (key, values) in new_blocks {
            self.blocks.insert(
                key,
                Block {
                    offset: buffer.len(),
                    dim: values.len(),
                },
            );
            buffer.extend_from_slice(values);
        }
        self.data = DVector::from_vec(buffer);
    }

    /// Overwrite the blocks of this container with those of `other`.
    ///
    /// Keys not mentioned in `other` are left unchanged. No block is written
    /// unless every key in `other` is present here with the same dimension.
    ///
    /// # Errors
    /// - `NotFound` if a key of `other` is absent here.
    /// - `InvalidArgument` if a block would change dimension.
    pub fn update(&mut self, other: &VectorValues) -> FactorResult<()> {
        for (&key, theirs) in &other.blocks {
            let ours = self.block(key)?;
            if ours.dim != theirs.dim {
                return Err(FactorError::InvalidArgument(format!(
                    "update of '{}' would change its dimension from {} to {}",
                    format_key(key),
                    ours.dim,
                    theirs.dim
                )));
            }
        }

        for (&key, theirs) in &other.blocks {
            let ours = self.blocks[&key];
            self.data.as_mut_slice()[ours.range()]
                .copy_from_slice(&other.data.as_slice()[theirs.range()]);
        }
        Ok(())
    }

    /// Remove a block and compact the arena.
    ///
    /// # Errors
    /// `NotFound` if `key` is absent.
    pub fn erase(&mut self, key: Key) -> FactorResult<()> {
        let removed = self.blocks.remove(&key).ok_or_else(|| not_found(key))?;

        let mut buffer = Vec::with_capacity(self.data.len() - removed.dim);
        buffer.extend_from_slice(&self.data.as_slice()[..removed.offset]);
        buffer.extend_from_slice(&self.data.as_slice()[removed.offset + removed.dim..]);
        self.data = DVector::from_vec(buffer);

        for block in self.blocks.values_mut() {
            if block.offset > removed.offset {
                block.offset -= removed.dim;
            }
        }
        Ok(())
    }

    /// Set every entry to zero, keeping the structure.
    pub fn set_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Concatenate all blocks in ascending key order.
    pub fn vector(&self) -> DVector<f64> {
        let mut buffer = Vec::with_capacity(self.data.len());
        for block in self.blocks.values() {
            buffer.extend_from_slice(&self.data.as_slice()[block.range()]);
        }
        DVector::from_vec(buffer)
    }

    /// Concatenate the blocks of `keys`, in the order given.
    ///
    /// # Errors
    /// `NotFound` if any requested key is absent.
    pub fn vector_for_keys(&self, keys: &[Key]) -> FactorResult<DVector<f64>> {
        let blocks = keys
            .iter()
            .map(|&key| self.block(key))
            .collect::<FactorResult<Vec<_>>>()?;

        let total: usize = blocks.iter().map(|b| b.dim).sum();
        let mut buffer = Vec::with_capacity(total);
        for block in blocks {
            buffer.extend_from_slice(&self.data.as_slice()[block.range()]);
        }
        Ok(DVector::from_vec(buffer))
    }

    /// Concatenate the blocks named by `dims`, in key order.
    ///
    /// # Errors
    /// - `NotFound` if a key is absent.
    /// - `InvalidArgument` if a stored block has a different dimension than requested.
    pub fn vector_for_dims(&self, dims: &Dims) -> FactorResult<DVector<f64>> {
        for (&key, &dim) in dims {
            let stored = self.dim(key)?;
            if stored != dim {
                return Err(FactorError::InvalidArgument(format!(
                    "variable '{}' has dimension {} but {} was requested",
                    format_key(key),
                    stored,
                    dim
                )));
            }
        }
        let keys: Vec<Key> = dims.keys().copied().collect();
        self.vector_for_keys(&keys)
    }

    /// Same key set and same per-key dimensions.
    pub fn has_same_structure(&self, other: &VectorValues) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|((k1, b1), (k2, b2))| k1 == k2 && b1.dim == b2.dim)
    }

    /// Same structure and every entry within `tolerance`.
    pub fn equals(&self, other: &VectorValues, tolerance: f64) -> bool {
        self.has_same_structure(other)
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|((_, b1), (_, b2))| {
                    self.data.as_slice()[b1.range()]
                        .iter()
                        .zip(&other.data.as_slice()[b2.range()])
                        .all(|(a, b)| (a - b).abs() <= tolerance)
                })
    }

    /// Apply `op(ours, theirs)` to every entry of matching blocks.
    fn zip_apply<F>(&mut self, other: &VectorValues, op: F)
    where
        F: Fn(&mut f64, f64),
    {
        debug_assert!(
            self.has_same_structure(other),
            "VectorValues arithmetic requires identical structure"
        );
        let data = self.data.as_mut_slice();
        for ((k1, ours), (k2, theirs)) in self.blocks.iter().zip(other.blocks.iter()) {
            debug_assert_eq!(k1, k2);
            let src = &other.data.as_slice()[theirs.range()];
            for (dst, &s) in data[ours.range()].iter_mut().zip(src) {
                op(dst, s);
            }
        }
    }

    /// Dot product of the concatenated vectors.
    pub fn dot(&self, other: &VectorValues) -> f64 {
        debug_assert!(
            self.has_same_structure(other),
            "VectorValues::dot requires identical structure"
        );
        self.blocks
            .values()
            .zip(other.blocks.values())
            .map(|(ours, theirs)| {
                self.data.as_slice()[ours.range()]
                    .iter()
                    .zip(&other.data.as_slice()[theirs.range()])
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
            })
            .sum()
    }

    /// L2 norm of the concatenated vector.
    pub fn norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Squared L2 norm of the concatenated vector.
    pub fn squared_norm(&self) -> f64 {
        self.data.norm_squared()
    }

    /// Element-wise `self + other`.
    pub fn add(&self, other: &VectorValues) -> VectorValues {
        let mut result = self.clone();
        result.add_in_place(other);
        result
    }

    /// Element-wise `self += other`.
    pub fn add_in_place(&mut self, other: &VectorValues) -> &mut Self {
        self.zip_apply(other, |a, b| *a += b);
        self
    }

    /// Element-wise addition that inserts blocks missing from `self`.
    ///
    /// Slower than [`add_in_place`](Self::add_in_place): every new key reallocates.
    pub fn add_in_place_allow_missing(&mut self, other: &VectorValues) -> &mut Self {
        let mut missing = Vec::new();
        for (&key, theirs) in &other.blocks {
            let src = &other.data.as_slice()[theirs.range()];
            match self.blocks.get(&key) {
                Some(ours) => {
                    debug_assert_eq!(ours.dim, theirs.dim);
                    for (dst, &s) in self.data.as_mut_slice()[ours.range()].iter_mut().zip(src) {
                        *dst += s;
                    }
                }
                None => missing.push((key, src)),
            }
        }
        if !missing.is_empty() {
            self.append(missing);
        }
        self
    }

    /// Element-wise `self - other`.
    pub fn subtract(&self, other: &VectorValues) -> VectorValues {
        let mut result = self.clone();
        result.subtract_in_place(other);
        result
    }

    /// Element-wise `self -= other`.
    pub fn subtract_in_place(&mut self, other: &VectorValues) -> &mut Self {
        self.zip_apply(other, |a, b| *a -= b);
        self
    }

    /// Scale-and-add: `self += alpha * other`.
    pub fn axpy(&mut self, alpha: f64, other: &VectorValues) -> &mut Self {
        self.zip_apply(other, |a, b| *a += alpha * b);
        self
    }

    /// Element-wise `alpha * self`.
    pub fn scale(&self, alpha: f64) -> VectorValues {
        let mut result = self.clone();
        result.scale_in_place(alpha);
        result
    }

    /// Element-wise `self *= alpha`.
    pub fn scale_in_place(&mut self, alpha: f64) -> &mut Self {
        self.data *= alpha;
        self
    }
}

impl PartialEq for VectorValues {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, 0.0)
    }
}

impl fmt::Debug for VectorValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(key, block)| (format_key(key), block.as_slice().to_vec())),
            )
            .finish()
    }
}

impl fmt::Display for VectorValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VectorValues: {} elements", self.len())?;
        for (key, block) in self.iter() {
            let entries: Vec<String> = block.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(f, "  {}: [{}]", format_key(key), entries.join(", "))?;
        }
        Ok(())
    }
}

impl Index<Key> for VectorValues {
    type Output = [f64];

    /// Panics if `key` is absent; use [`VectorValues::at`] for a fallible lookup.
    fn index(&self, key: Key) -> &[f64] {
        match self.blocks.get(&key) {
            Some(block) => &self.data.as_slice()[block.range()],
            None => panic!("{}", not_found(key)),
        }
    }
}

impl IndexMut<Key> for VectorValues {
    fn index_mut(&mut self, key: Key) -> &mut [f64] {
        match self.blocks.get(&key) {
            Some(block) => &mut self.data.as_mut_slice()[block.range()],
            None => panic!("{}", not_found(key)),
        }
    }
}

impl Add<&VectorValues> for &VectorValues {
    type Output = VectorValues;

    fn add(self, rhs: &VectorValues) -> VectorValues {
        VectorValues::add(self, rhs)
    }
}

impl Add<&VectorValues> for VectorValues {
    type Output = VectorValues;

    fn add(mut self, rhs: &VectorValues) -> VectorValues {
        self.add_in_place(rhs);
        self
    }
}

impl Sub<&VectorValues> for &VectorValues {
    type Output = VectorValues;

    fn sub(self, rhs: &VectorValues) -> VectorValues {
        self.subtract(rhs)
    }
}

impl Sub<&VectorValues> for VectorValues {
    type Output = VectorValues;

    fn sub(mut self, rhs: &VectorValues) -> VectorValues {
        self.subtract_in_place(rhs);
        self
    }
}

impl AddAssign<&VectorValues> for VectorValues {
    fn add_assign(&mut self, rhs: &VectorValues) {
        self.add_in_place(rhs);
    }
}

impl SubAssign<&VectorValues> for VectorValues {
    fn sub_assign(&mut self, rhs: &VectorValues) {
        self.subtract_in_place(rhs);
    }
}

impl Mul<f64> for &VectorValues {
    type Output = VectorValues;

    fn mul(self, alpha: f64) -> VectorValues {
        self.scale(alpha)
    }
}

impl Mul<f64> for VectorValues {
    type Output = VectorValues;

    fn mul(mut self, alpha: f64) -> VectorValues {
        self.scale_in_place(alpha);
        self
    }
}

impl Mul<&VectorValues> for f64 {
    type Output = VectorValues;

    fn mul(self, values: &VectorValues) -> VectorValues {
        values.scale(self)
    }
}

impl MulAssign<f64> for VectorValues {
    fn mul_assign(&mut self, alpha: f64) {
        self.scale_in_place(alpha);
    }
}

impl Neg for &VectorValues {
    type Output = VectorValues;

    fn neg(self) -> VectorValues {
        self.scale(-1.0)
    }
}

impl Neg for VectorValues {
    type Output = VectorValues;

    fn neg(self) -> VectorValues {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn dv(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    fn sample() -> VectorValues {
        let mut values = VectorValues::new();
        values.insert(0, dv(&[1.0, 2.0, 3.0])).unwrap();
        values.insert(1, dv(&[4.0, 5.0])).unwrap();
        values
    }

    #[test]
    fn test_basic_accessors() {
        let values = sample();
        assert_eq!(values.len(), 2);
        assert_eq!(values.dim(0).unwrap(), 3);
        assert_eq!(values.dim(1).unwrap(), 2);
        assert_eq!(values.total_dim(), 5);
        assert!(values.exists(1));
        assert!(!values.exists(2));
        assert_eq!(values.vector().as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_scale_by_two() {
        let scaled = sample().scale(2.0);
        assert_eq!(&scaled[0], &[2.0, 4.0, 6.0]);
        assert_eq!(&scaled[1], &[8.0, 10.0]);

        let via_operator = 2.0 * &sample();
        assert_eq!(via_operator, scaled);
    }

    #[test]
    fn test_insert_out_of_key_order_keeps_vector_in_key_order() {
        let mut values = VectorValues::new();
        values.insert(5, dv(&[5.0])).unwrap();
        values.insert(2, dv(&[2.0, 2.5])).unwrap();
        values.insert(9, dv(&[9.0])).unwrap();

        assert_eq!(values.vector().as_slice(), &[2.0, 2.5, 5.0, 9.0]);
        assert_eq!(values.keys().collect::<Vec<_>>(), vec![2, 5, 9]);
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let mut values = sample();
        let err = values.insert(0, dv(&[0.0])).unwrap_err();
        assert!(matches!(err, FactorError::DuplicateKey(_)));
        assert_eq!(&values[0], &[1.0, 2.0, 3.0]);
        assert!(!values.try_insert(1, dv(&[0.0, 0.0])));
        assert!(values.try_insert(2, dv(&[7.0])));
    }

    #[test]
    fn test_at_missing_key_is_not_found() {
        let mut values = sample();
        assert!(matches!(values.at(7), Err(FactorError::NotFound(_))));
        assert!(matches!(values.at_mut(7), Err(FactorError::NotFound(_))));
        assert!(matches!(values.dim(7), Err(FactorError::NotFound(_))));
    }

    #[test]
    fn test_at_mut_writes_through() {
        let mut values = sample();
        values.at_mut(1).unwrap()[0] = -4.0;
        values[0][2] = 30.0;
        assert_eq!(values.vector().as_slice(), &[1.0, 2.0, 30.0, -4.0, 5.0]);
    }

    #[test]
    fn test_erase() {
        let mut values = sample();
        values.insert(2, dv(&[6.0])).unwrap();
        values.erase(1).unwrap();

        assert!(!values.exists(1));
        assert_eq!(values.total_dim(), 4);
        assert_eq!(&values[2], &[6.0]);
        assert_eq!(values.vector().as_slice(), &[1.0, 2.0, 3.0, 6.0]);

        assert!(matches!(values.erase(1), Err(FactorError::NotFound(_))));
    }

    #[test]
    fn test_update_overwrites_only_given_keys() {
        let mut values = sample();
        let mut patch = VectorValues::new();
        patch.insert(1, dv(&[-1.0, -2.0])).unwrap();

        values.update(&patch).unwrap();
        assert_eq!(&values[0], &[1.0, 2.0, 3.0]);
        assert_eq!(&values[1], &[-1.0, -2.0]);
    }

    #[test]
    fn test_update_missing_key_leaves_target_untouched() {
        let mut values = sample();
        let patch = VectorValues::from_pairs(vec![(0, dv(&[9.0, 9.0, 9.0])), (3, dv(&[1.0]))])
            .unwrap();

        let err = values.update(&patch).unwrap_err();
        assert!(matches!(err, FactorError::NotFound(_)));
        assert_eq!(values, sample());
    }

    #[test]
    fn test_update_dimension_change_rejected() {
        let mut values = sample();
        let patch = VectorValues::from_pairs(vec![(1, dv(&[1.0]))]).unwrap();
        assert!(matches!(
            values.update(&patch),
            Err(FactorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_flat() {
        let dims: Dims = [(0, 3), (1, 2)].into_iter().collect();
        let flat = dv(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let values = VectorValues::from_flat(&flat, &dims).unwrap();
        assert_eq!(values, sample());

        let bad_dims: Dims = [(0, 3), (1, 3)].into_iter().collect();
        assert!(matches!(
            VectorValues::from_flat(&flat, &bad_dims),
            Err(FactorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_pairs_rejects_duplicates() {
        let result = VectorValues::from_pairs(vec![(1, dv(&[1.0])), (1, dv(&[2.0]))]);
        assert!(matches!(result, Err(FactorError::DuplicateKey(_))));
    }

    #[test]
    fn test_merge_and_insert_all() {
        let first = sample();
        let second = VectorValues::from_pairs(vec![(7, dv(&[7.0]))]).unwrap();
        let merged = VectorValues::merge(&first, &second).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.vector().as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 7.0]);

        assert!(matches!(
            VectorValues::merge(&first, &first),
            Err(FactorError::DuplicateKey(_))
        ));

        let mut target = first.clone();
        target.insert_all(&second).unwrap();
        assert_eq!(target, merged);
        assert!(target.insert_all(&second).is_err());
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn test_zero_has_same_structure() {
        let values = sample();
        let zero = VectorValues::zero(&values);
        assert!(zero.has_same_structure(&values));
        assert!(zero.iter().all(|(_, block)| block.iter().all(|&v| v == 0.0)));

        let from_dims = VectorValues::zero_from_dims(&values.dims());
        assert_eq!(from_dims, zero);
    }

    #[test]
    fn test_structure_predicate() {
        let a = sample();
        let mut b = sample();
        assert!(a.has_same_structure(&b));

        b.erase(1).unwrap();
        b.insert(1, dv(&[1.0, 2.0, 3.0])).unwrap();
        assert!(!a.has_same_structure(&b));

        let c = VectorValues::from_pairs(vec![(0, dv(&[0.0; 3])), (2, dv(&[0.0; 2]))]).unwrap();
        assert!(!a.has_same_structure(&c));
    }

    #[test]
    fn test_arithmetic_with_different_arena_layout() {
        let a = sample();
        // Same structure, blocks inserted in reverse order.
        let mut b = VectorValues::new();
        b.insert(1, dv(&[10.0, 20.0])).unwrap();
        b.insert(0, dv(&[1.0, 1.0, 1.0])).unwrap();

        let sum = &a + &b;
        assert_eq!(sum.vector().as_slice(), &[2.0, 3.0, 4.0, 14.0, 25.0]);

        let difference = &sum - &b;
        assert!(difference.equals(&a, TOLERANCE));

        let dot = a.dot(&b);
        assert!((dot - (1.0 + 2.0 + 3.0 + 40.0 + 100.0)).abs() < TOLERANCE);
    }

    #[test]
    fn test_norms() {
        let values = sample();
        assert!((values.squared_norm() - 55.0).abs() < TOLERANCE);
        assert!((values.norm() - 55.0_f64.sqrt()).abs() < TOLERANCE);
    }

    #[test]
    fn test_in_place_operations() {
        let mut values = sample();
        let other = sample();

        values.add_in_place(&other);
        assert_eq!(&values[0], &[2.0, 4.0, 6.0]);

        values.subtract_in_place(&other);
        assert_eq!(values, sample());

        values.axpy(-2.0, &other);
        assert_eq!(values, -&sample());

        values *= -3.0;
        assert_eq!(&values[1], &[12.0, 15.0]);
    }

    #[test]
    fn test_add_in_place_allow_missing() {
        let mut values = VectorValues::from_pairs(vec![(0, dv(&[1.0, 1.0, 1.0]))]).unwrap();
        values.add_in_place_allow_missing(&sample());
        assert_eq!(&values[0], &[2.0, 3.0, 4.0]);
        assert_eq!(&values[1], &[4.0, 5.0]);
    }

    #[test]
    fn test_vector_subsets() {
        let values = sample();
        let subset = values.vector_for_keys(&[1, 0]).unwrap();
        assert_eq!(subset.as_slice(), &[4.0, 5.0, 1.0, 2.0, 3.0]);

        assert!(matches!(
            values.vector_for_keys(&[0, 4]),
            Err(FactorError::NotFound(_))
        ));

        let dims: Dims = [(1, 2)].into_iter().collect();
        assert_eq!(values.vector_for_dims(&dims).unwrap().as_slice(), &[4.0, 5.0]);
        let wrong: Dims = [(1, 3)].into_iter().collect();
        assert!(values.vector_for_dims(&wrong).is_err());
    }

    #[test]
    fn test_set_zero_and_equals_tolerance() {
        let mut values = sample();
        let mut nudged = sample();
        nudged[1][1] += 1e-10;
        assert!(values.equals(&nudged, 1e-9));
        assert!(!values.equals(&nudged, 1e-11));

        values.set_zero();
        assert_eq!(values.squared_norm(), 0.0);
        assert!(values.has_same_structure(&nudged));
    }

    #[test]
    fn test_display() {
        let text = sample().to_string();
        assert!(text.starts_with("VectorValues: 2 elements"));
        assert!(text.contains("1: [4.000000, 5.000000]"));
    }

    #[test]
    #[should_panic]
    fn test_index_missing_key_panics() {
        let values = sample();
        let _ = &values[42];
    }
}
