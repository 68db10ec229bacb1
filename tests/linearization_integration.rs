//! End-to-end linearization tests
//!
//! Builds small factor graphs from expressions, linearizes them and checks the
//! resulting linear systems:
//! - identity factor sign convention and whitening
//! - activity gating
//! - a planar pose chain with landmark observations, assembled into a sparse Jacobian
//! - a Gauss-Newton step on the assembled system reduces the nonlinear cost

#![allow(clippy::unwrap_used)]

use expression_factor::expression::{between, transform_to};
use expression_factor::{
    symbol, Expression, ExpressionFactor, Factor, FactorError, LinearizationConfig, NoiseModel,
    NonlinearFactorGraph, Values, VectorValues, SE2,
};
use nalgebra::{DMatrix, DVector, Vector2};
use std::sync::Arc;

const TOLERANCE: f64 = 1e-9;

#[test]
fn test_identity_factor_sign_convention() {
    let n = 4;
    let z = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
    let factor = ExpressionFactor::new(
        Some(Arc::new(NoiseModel::unit_with_dim(n))),
        z.clone(),
        Expression::leaf_with_dim(0, n),
    )
    .unwrap();

    let mut values = Values::new();
    values.insert(0, z.clone()).unwrap();
    assert!(factor.unwhitened_error(&values).unwrap().norm() < TOLERANCE);

    let delta = DVector::from_vec(vec![0.1, 0.2, -0.3, 0.4]);
    values.update(0, &z + &delta).unwrap();
    let residual = factor.unwhitened_error(&values).unwrap();
    assert!((&residual - &delta).norm() < TOLERANCE);

    let linear = factor.linearize(&values).unwrap().unwrap();
    assert_eq!(linear.keys(), &[0]);
    assert_eq!(linear.get_a(0).unwrap().into_owned(), DMatrix::identity(n, n));
    assert!((linear.rhs().into_owned() + &residual).norm() < TOLERANCE);

    // The correction solving A dx = b brings the estimate back to z.
    let dx = VectorValues::from_pairs([(0, linear.rhs().into_owned())]).unwrap();
    let corrected = values.retract(&dx).unwrap();
    assert!(factor.unwhitened_error(&corrected).unwrap().norm() < TOLERANCE);
}

#[test]
fn test_inactive_factor_is_skipped_by_graph() {
    let gated = ExpressionFactor::new(
        Some(Arc::new(NoiseModel::unit_with_dim(1))),
        DVector::from_vec(vec![0.0]),
        Expression::leaf_with_dim(0, 1),
    )
    .unwrap()
    .with_activity(Arc::new(|_: &Values| false));

    let mut graph = NonlinearFactorGraph::new();
    graph.add(gated);

    let mut values = Values::new();
    values.insert(0, DVector::from_vec(vec![2.0])).unwrap();

    let linear = graph.linearize(&values, &LinearizationConfig::default()).unwrap();
    assert!(linear.is_empty());
    assert_eq!(graph.error(&values).unwrap(), 0.0);
}

#[test]
fn test_construction_errors() {
    let missing = ExpressionFactor::new(
        None,
        SE2::from_xy_angle(0.0, 0.0, 0.0),
        Expression::leaf(symbol('x', 0)),
    );
    assert!(matches!(missing, Err(FactorError::InvalidArgument(_))));

    let wrong_dim = ExpressionFactor::new(
        Some(Arc::new(NoiseModel::unit_with_dim(2))),
        SE2::from_xy_angle(0.0, 0.0, 0.0),
        Expression::leaf(symbol('x', 0)),
    );
    assert!(matches!(wrong_dim, Err(FactorError::InvalidArgument(_))));
}

/// Three poses along the x axis observing two landmarks, with perturbed estimates.
fn planar_slam() -> (NonlinearFactorGraph, Values) {
    let x = |i| symbol('x', i);
    let l = |j| symbol('l', j);

    let odometry_model =
        Arc::new(NoiseModel::diagonal(DVector::from_vec(vec![0.2, 0.2, 0.1])).unwrap());
    let landmark_model = Arc::new(NoiseModel::isotropic(2, 0.1).unwrap());
    let prior_model = Arc::new(NoiseModel::isotropic(3, 0.01).unwrap());

    let mut graph = NonlinearFactorGraph::new();
    graph.add(
        ExpressionFactor::new(
            Some(prior_model),
            SE2::from_xy_angle(0.0, 0.0, 0.0),
            Expression::leaf(x(0)),
        )
        .unwrap(),
    );
    for i in 0..2 {
        graph.add(
            ExpressionFactor::new(
                Some(odometry_model.clone()),
                SE2::from_xy_angle(2.0, 0.0, 0.0),
                between(&Expression::leaf(x(i)), &Expression::leaf(x(i + 1))),
            )
            .unwrap(),
        );
    }

    let landmarks = [Vector2::new(2.0, 2.0), Vector2::new(4.0, -2.0)];
    for i in 0..3u64 {
        for (j, landmark) in landmarks.iter().enumerate() {
            let truth = SE2::from_xy_angle(2.0 * i as f64, 0.0, 0.0);
            graph.add(
                ExpressionFactor::new(
                    Some(landmark_model.clone()),
                    truth.transform_to(landmark, None, None),
                    transform_to(&Expression::leaf(x(i)), &Expression::leaf(l(j as u64))),
                )
                .unwrap(),
            );
        }
    }

    let mut values = Values::new();
    values.insert(x(0), SE2::from_xy_angle(0.05, -0.02, 0.01)).unwrap();
    values.insert(x(1), SE2::from_xy_angle(2.1, 0.1, -0.05)).unwrap();
    values.insert(x(2), SE2::from_xy_angle(3.9, -0.1, 0.04)).unwrap();
    values.insert(l(0), Vector2::new(2.1, 1.9)).unwrap();
    values.insert(l(1), Vector2::new(3.8, -2.2)).unwrap();

    (graph, values)
}

#[test]
fn test_planar_slam_sparse_jacobian() {
    let (graph, values) = planar_slam();
    assert_eq!(graph.len(), 9);

    let linear = graph
        .linearize(&values, &LinearizationConfig::new().with_parallel_threshold(1))
        .unwrap();
    assert_eq!(linear.len(), 9);
    assert_eq!(linear.rows(), 3 + 2 * 3 + 6 * 2);

    let dims = linear.keys().unwrap();
    assert_eq!(dims.values().sum::<usize>(), 3 * 3 + 2 * 2);

    let (jacobian, rhs) = linear.sparse_jacobian().unwrap();
    assert_eq!(jacobian.nrows(), 21);
    assert_eq!(jacobian.ncols(), 13);
    assert_eq!(rhs.nrows(), 21);

    // Each factor row block only touches the columns of its own keys.
    let nnz: usize = (0..jacobian.ncols())
        .map(|col| jacobian.symbolic().row_idx_of_col_raw(col).len())
        .sum();
    assert!(nnz <= 3 * 3 + 2 * (3 * 6) + 6 * (2 * 3 + 2 * 2));
    assert!(nnz > 0);
}

#[test]
fn test_gauss_newton_step_reduces_cost() {
    let (graph, values) = planar_slam();
    let linear = graph.linearize(&values, &LinearizationConfig::default()).unwrap();

    // Dense normal equations are enough for a 13-dimensional problem.
    let dims = linear.keys().unwrap();
    let mut a = DMatrix::<f64>::zeros(linear.rows(), dims.values().sum());
    let mut b = DVector::<f64>::zeros(linear.rows());
    let mut offsets = std::collections::BTreeMap::new();
    let mut col = 0;
    for (&key, &dim) in &dims {
        offsets.insert(key, col);
        col += dim;
    }
    let mut row = 0;
    for factor in linear.iter() {
        for &key in factor.keys() {
            let block = factor.get_a(key).unwrap();
            a.view_mut((row, offsets[&key]), block.shape()).copy_from(&block);
        }
        b.rows_mut(row, factor.rows()).copy_from(&factor.rhs());
        row += factor.rows();
    }

    let normal = a.tr_mul(&a);
    let dx = normal.cholesky().unwrap().solve(&a.tr_mul(&b));
    let delta = VectorValues::from_flat(&dx, &dims).unwrap();

    let before = graph.error(&values).unwrap();
    let after = graph.error(&values.retract(&delta).unwrap()).unwrap();
    assert!(after < before, "cost went from {before} to {after}");
    assert!(after < 0.1 * before);
}
