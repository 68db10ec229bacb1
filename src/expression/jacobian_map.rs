//! Destinations for Jacobian blocks produced by the reverse pass.

use crate::core::key::{format_key, Key};
use crate::linalg::VerticalBlockMatrix;
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use tracing::warn;

/// Receives `∂output/∂key` blocks from leaves during the reverse pass.
///
/// A key reached through several paths is reported several times; sinks
/// must add contributions rather than overwrite them.
pub trait JacobianSink {
    fn accumulate(&mut self, key: Key, jacobian: &DMatrix<f64>);
}

/// Writes blocks straight into the column blocks of an augmented matrix.
///
/// `keys` must be sorted and name the column blocks of `ab` in order.
pub struct JacobianMap<'a> {
    keys: &'a [Key],
    ab: &'a mut VerticalBlockMatrix,
}

impl<'a> JacobianMap<'a> {
    pub fn new(keys: &'a [Key], ab: &'a mut VerticalBlockMatrix) -> Self {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(keys.len(), ab.n_variable_blocks());
        Self { keys, ab }
    }
}

impl JacobianSink for JacobianMap<'_> {
    fn accumulate(&mut self, key: Key, jacobian: &DMatrix<f64>) {
        match self.keys.binary_search(&key) {
            Ok(block) => {
                let mut target = self.ab.block_mut(block);
                debug_assert_eq!(target.shape(), jacobian.shape());
                target += jacobian;
            }
            Err(_) => warn!(
                "Jacobian for '{}' has no column block in this factor, dropping it",
                format_key(key)
            ),
        }
    }
}

impl JacobianSink for BTreeMap<Key, DMatrix<f64>> {
    fn accumulate(&mut self, key: Key, jacobian: &DMatrix<f64>) {
        self.entry(key)
            .and_modify(|existing| *existing += jacobian)
            .or_insert_with(|| jacobian.clone());
    }
}
