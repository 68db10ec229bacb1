//! Thread-safe incremental construction of block vectors.
//!
//! [`VectorValues`] itself is a plain value type: shared reads are fine, but
//! concurrent mutation needs external synchronization. When many threads each
//! produce a few blocks (for example one per factor or per variable), they can
//! insert into a [`ConcurrentVectorValues`] and convert it once at the end.

use crate::core::key::{format_key, Key};
use crate::core::vector_values::VectorValues;
use crate::error::{FactorError, FactorResult};
use nalgebra::DVector;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Concurrent map from keys to vector blocks.
#[derive(Debug, Default)]
pub struct ConcurrentVectorValues {
    blocks: RwLock<BTreeMap<Key, DVector<f64>>>,
}

fn poisoned<E>(_: E) -> FactorError {
    FactorError::ThreadError("ConcurrentVectorValues lock poisoned".to_string())
}

impl ConcurrentVectorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block from any thread.
    ///
    /// # Errors
    /// `DuplicateKey` if another insert already claimed `key`.
    pub fn insert(&self, key: Key, value: DVector<f64>) -> FactorResult<()> {
        let mut blocks = self.blocks.write().map_err(poisoned)?;
        if blocks.contains_key(&key) {
            return Err(FactorError::DuplicateKey(format!(
                "Requested to insert variable '{}' already in this VectorValues",
                format_key(key)
            )));
        }
        blocks.insert(key, value);
        Ok(())
    }

    /// Copy of the block stored under `key`.
    pub fn at(&self, key: Key) -> FactorResult<DVector<f64>> {
        let blocks = self.blocks.read().map_err(poisoned)?;
        blocks.get(&key).cloned().ok_or_else(|| {
            FactorError::NotFound(format!(
                "Requested variable '{}' is not in this VectorValues",
                format_key(key)
            ))
        })
    }

    pub fn exists(&self, key: Key) -> FactorResult<bool> {
        Ok(self.blocks.read().map_err(poisoned)?.contains_key(&key))
    }

    pub fn len(&self) -> FactorResult<usize> {
        Ok(self.blocks.read().map_err(poisoned)?.len())
    }

    /// Pack all blocks into a single-arena [`VectorValues`].
    pub fn into_vector_values(self) -> FactorResult<VectorValues> {
        let blocks = self.blocks.into_inner().map_err(poisoned)?;
        VectorValues::from_pairs(blocks)
    }
}
