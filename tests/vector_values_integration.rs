//! Integration tests for the block vector container
//!
//! These exercise `VectorValues` through the public API only:
//! - construction from pairs and from a flat buffer
//! - lookups, insert / update / erase failure modes
//! - block-wise linear algebra and flattening
//! - concurrent accumulation of distinct keys

#![allow(clippy::unwrap_used)]

use expression_factor::{ConcurrentVectorValues, Dims, FactorError, VectorValues};
use nalgebra::DVector;
use rayon::prelude::*;

const TOLERANCE: f64 = 1e-12;

fn dv(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}

fn two_blocks() -> VectorValues {
    VectorValues::from_pairs([(0, dv(&[1.0, 2.0, 3.0])), (1, dv(&[4.0, 5.0]))]).unwrap()
}

#[test]
fn test_two_block_scenario() {
    let v = two_blocks();

    assert_eq!(v.dim(0).unwrap(), 3);
    assert_eq!(v.dim(1).unwrap(), 2);
    assert_eq!(v.len(), 2);
    assert_eq!(v.vector().as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(v.vector_for_keys(&[0, 1]).unwrap(), v.vector());

    let doubled = v.scale(2.0);
    assert_eq!(&doubled[0], &[2.0, 4.0, 6.0]);
    assert_eq!(&doubled[1], &[8.0, 10.0]);
}

#[test]
fn test_flattening_follows_requested_order() {
    let v = two_blocks();
    assert_eq!(
        v.vector_for_keys(&[1, 0]).unwrap().as_slice(),
        &[4.0, 5.0, 1.0, 2.0, 3.0]
    );
    assert_eq!(v.vector_for_keys(&[1]).unwrap().as_slice(), &[4.0, 5.0]);
    assert!(matches!(
        v.vector_for_keys(&[0, 7]),
        Err(FactorError::NotFound(_))
    ));

    let total: usize = v.keys().map(|k| v.dim(k).unwrap()).sum();
    assert_eq!(v.vector().len(), total);
    assert_eq!(v.total_dim(), total);
}

#[test]
fn test_flat_and_incremental_construction_agree() {
    let dims: Dims = [(0, 3), (1, 2)].into_iter().collect();
    let flat = VectorValues::from_flat(&dv(&[1.0, 2.0, 3.0, 4.0, 5.0]), &dims).unwrap();

    let mut incremental = VectorValues::new();
    incremental.insert(1, dv(&[4.0, 5.0])).unwrap();
    incremental.insert(0, dv(&[1.0, 2.0, 3.0])).unwrap();

    assert_eq!(flat, incremental);
    assert_eq!(flat, two_blocks());
}

#[test]
fn test_mutation_contract() {
    let mut v = two_blocks();

    assert!(matches!(
        v.insert(0, dv(&[0.0])),
        Err(FactorError::DuplicateKey(_))
    ));
    v.insert(5, dv(&[9.0])).unwrap();
    assert_eq!(v.at(5).unwrap().as_slice(), &[9.0]);

    let patch = VectorValues::from_pairs([(1, dv(&[-1.0, -2.0]))]).unwrap();
    v.update(&patch).unwrap();
    assert_eq!(&v[1], &[-1.0, -2.0]);
    assert_eq!(&v[0], &[1.0, 2.0, 3.0]);

    let stray = VectorValues::from_pairs([(1, dv(&[7.0, 7.0])), (42, dv(&[1.0]))]).unwrap();
    assert!(matches!(v.update(&stray), Err(FactorError::NotFound(_))));
    assert_eq!(&v[1], &[-1.0, -2.0]);

    v.erase(5).unwrap();
    assert!(!v.exists(5));
    assert!(matches!(v.erase(5), Err(FactorError::NotFound(_))));
    assert!(matches!(v.at(5), Err(FactorError::NotFound(_))));
    assert!(matches!(v.dim(5), Err(FactorError::NotFound(_))));
}

#[test]
fn test_linear_algebra_properties() {
    let a = two_blocks();
    let b = VectorValues::from_pairs([(0, dv(&[0.5, -1.0, 2.0])), (1, dv(&[3.0, 0.25]))]).unwrap();
    let c = VectorValues::from_pairs([(0, dv(&[1.0, 1.0, -1.0])), (1, dv(&[2.0, -3.0]))]).unwrap();

    let zero = VectorValues::zero(&a);
    assert!(zero.has_same_structure(&a));
    assert_eq!(zero.squared_norm(), 0.0);

    assert!(((&a + &b) - &b).equals(&a, TOLERANCE));
    assert!((&a + &b).equals(&(&b + &a), TOLERANCE));
    let lhs = (&a + &b).dot(&c);
    let rhs = a.dot(&c) + b.dot(&c);
    assert!((lhs - rhs).abs() < TOLERANCE);

    assert!((a.norm() - 55.0_f64.sqrt()).abs() < TOLERANCE);

    let mut y = a.clone();
    y.axpy(2.0, &b);
    assert!(y.equals(&(&a + &(&b * 2.0)), TOLERANCE));
}

#[test]
fn test_concurrent_accumulation_of_distinct_keys() {
    let shared = ConcurrentVectorValues::new();
    (0..64u64).into_par_iter().for_each(|key| {
        shared.insert(key, dv(&[key as f64, 1.0])).unwrap();
    });
    assert_eq!(shared.len().unwrap(), 64);

    let collected = shared.into_vector_values().unwrap();
    assert_eq!(collected.total_dim(), 128);
    assert_eq!(&collected[17], &[17.0, 1.0]);
}
