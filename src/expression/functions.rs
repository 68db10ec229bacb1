//! Common expression building blocks with analytic Jacobians.

use crate::expression::Expression;
use crate::manifold::{LieGroup, SE2};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix2x3, Vector2};

/// Relative element `a⁻¹ ∘ b`, the usual odometry / between measurement.
pub fn between<T: LieGroup>(a: &Expression<T>, b: &Expression<T>) -> Expression<T> {
    Expression::binary(
        |a: &T, b: &T, ha: Option<&mut DMatrix<f64>>, hb: Option<&mut DMatrix<f64>>| {
            let mut ja = T::zero_jacobian();
            let mut jb = T::zero_jacobian();
            let result = a.between(b, Some(&mut ja), Some(&mut jb));
            if let Some(h) = ha {
                *h = T::jacobian_to_dmatrix(&ja);
            }
            if let Some(h) = hb {
                *h = T::jacobian_to_dmatrix(&jb);
            }
            result
        },
        a,
        b,
    )
}

/// Group composition `a ∘ b`.
pub fn compose<T: LieGroup>(a: &Expression<T>, b: &Expression<T>) -> Expression<T> {
    Expression::binary(
        |a: &T, b: &T, ha: Option<&mut DMatrix<f64>>, hb: Option<&mut DMatrix<f64>>| {
            let mut ja = T::zero_jacobian();
            let mut jb = T::zero_jacobian();
            let result = a.compose(b, Some(&mut ja), Some(&mut jb));
            if let Some(h) = ha {
                *h = T::jacobian_to_dmatrix(&ja);
            }
            if let Some(h) = hb {
                *h = T::jacobian_to_dmatrix(&jb);
            }
            result
        },
        a,
        b,
    )
}

/// Group inverse `a⁻¹`.
pub fn inverse<T: LieGroup>(a: &Expression<T>) -> Expression<T> {
    Expression::unary(
        |a: &T, h: Option<&mut DMatrix<f64>>| {
            let mut jac = T::zero_jacobian();
            let result = a.inverse(Some(&mut jac));
            if let Some(h) = h {
                *h = T::jacobian_to_dmatrix(&jac);
            }
            result
        },
        a,
    )
}

/// A world point expressed in the frame of a 2D pose.
pub fn transform_to(
    pose: &Expression<SE2>,
    point: &Expression<Vector2<f64>>,
) -> Expression<Vector2<f64>> {
    Expression::binary(
        |pose: &SE2,
         point: &Vector2<f64>,
         h_pose: Option<&mut DMatrix<f64>>,
         h_point: Option<&mut DMatrix<f64>>| {
            let mut j_pose = Matrix2x3::zeros();
            let mut j_point = Matrix2::zeros();
            let local = pose.transform_to(point, Some(&mut j_pose), Some(&mut j_point));
            if let Some(h) = h_pose {
                *h = DMatrix::from_column_slice(2, 3, j_pose.as_slice());
            }
            if let Some(h) = h_point {
                *h = DMatrix::from_column_slice(2, 2, j_point.as_slice());
            }
            local
        },
        pose,
        point,
    )
}

/// `a + b` for vectors of equal length.
pub fn sum(a: &Expression<DVector<f64>>, b: &Expression<DVector<f64>>) -> Expression<DVector<f64>> {
    Expression::binary(
        |a: &DVector<f64>,
         b: &DVector<f64>,
         ha: Option<&mut DMatrix<f64>>,
         hb: Option<&mut DMatrix<f64>>| {
            let n = a.len();
            if let Some(h) = ha {
                *h = DMatrix::identity(n, n);
            }
            if let Some(h) = hb {
                *h = DMatrix::identity(n, n);
            }
            a + b
        },
        a,
        b,
    )
}

/// `a - b` for vectors of equal length.
pub fn difference(
    a: &Expression<DVector<f64>>,
    b: &Expression<DVector<f64>>,
) -> Expression<DVector<f64>> {
    Expression::binary(
        |a: &DVector<f64>,
         b: &DVector<f64>,
         ha: Option<&mut DMatrix<f64>>,
         hb: Option<&mut DMatrix<f64>>| {
            let n = a.len();
            if let Some(h) = ha {
                *h = DMatrix::identity(n, n);
            }
            if let Some(h) = hb {
                *h = -DMatrix::<f64>::identity(n, n);
            }
            a - b
        },
        a,
        b,
    )
}

/// `alpha · a`.
pub fn scale(alpha: f64, a: &Expression<DVector<f64>>) -> Expression<DVector<f64>> {
    Expression::unary(
        move |a: &DVector<f64>, h: Option<&mut DMatrix<f64>>| {
            if let Some(h) = h {
                *h = DMatrix::identity(a.len(), a.len()) * alpha;
            }
            a * alpha
        },
        a,
    )
}

/// `M · a` for a fixed matrix `M`.
pub fn linear(matrix: DMatrix<f64>, a: &Expression<DVector<f64>>) -> Expression<DVector<f64>> {
    Expression::unary(
        move |a: &DVector<f64>, h: Option<&mut DMatrix<f64>>| {
            if let Some(h) = h {
                *h = matrix.clone();
            }
            &matrix * a
        },
        a,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::symbol;
    use crate::core::values::Values;
    use crate::manifold::Manifold;
    use crate::manifold::SO3;

    const FD_EPSILON: f64 = 1e-6;
    const FD_TOLERANCE: f64 = 1e-6;

    /// Central differences of `local(ŷ₀, e(values ⊕ δ))` with respect to the block of `key`.
    fn numerical_jacobian<T: Manifold>(
        expression: &Expression<T>,
        values: &Values,
        key: u64,
    ) -> DMatrix<f64> {
        let reference = expression.value(values).unwrap();
        let dims = values.dims();
        let n = dims[&key];
        let mut jacobian = DMatrix::zeros(reference.tangent_dim(), n);
        for i in 0..n {
            let mut column = DVector::zeros(reference.tangent_dim());
            for sign in [1.0, -1.0] {
                let mut delta = values.zero_vectors();
                delta[key][i] = sign * FD_EPSILON;
                let moved = expression.value(&values.retract(&delta).unwrap()).unwrap();
                column += reference.local(&moved, None).unwrap() * sign;
            }
            jacobian.set_column(i, &(column / (2.0 * FD_EPSILON)));
        }
        jacobian
    }

    fn check_all_keys<T: Manifold>(expression: &Expression<T>, values: &Values) {
        let (_, jacobians) = expression.value_with_jacobians(values).unwrap();
        assert_eq!(jacobians.len(), expression.keys_and_dims().len());
        for (key, analytic) in &jacobians {
            let numeric = numerical_jacobian(expression, values, *key);
            let diff = (analytic - &numeric).abs().max();
            assert!(diff < FD_TOLERANCE, "key {key}: {analytic} vs {numeric}");
        }
    }

    #[test]
    fn test_se2_chain_jacobians() {
        let mut values = Values::new();
        values.insert(symbol('x', 0), SE2::from_xy_angle(0.3, -1.0, 0.4)).unwrap();
        values.insert(symbol('x', 1), SE2::from_xy_angle(2.0, 0.5, -2.2)).unwrap();
        values.insert(symbol('x', 2), SE2::from_xy_angle(-1.0, 1.5, 1.1)).unwrap();

        let x0 = Expression::<SE2>::leaf(symbol('x', 0));
        let x1 = Expression::<SE2>::leaf(symbol('x', 1));
        let x2 = Expression::<SE2>::leaf(symbol('x', 2));

        check_all_keys(&between(&x0, &x1), &values);
        check_all_keys(&compose(&inverse(&x2), &between(&x0, &x1)), &values);
    }

    #[test]
    fn test_so3_between_jacobians() {
        let mut values = Values::new();
        values.insert(0, SO3::from_euler_angles(0.2, 0.3, -0.1)).unwrap();
        values.insert(1, SO3::from_euler_angles(-1.0, 0.4, 2.0)).unwrap();

        let r0 = Expression::<SO3>::leaf(0);
        let r1 = Expression::<SO3>::leaf(1);
        check_all_keys(&between(&r0, &r1), &values);
    }

    #[test]
    fn test_transform_to_jacobians() {
        let mut values = Values::new();
        values.insert(symbol('x', 0), SE2::from_xy_angle(1.0, 2.0, 0.7)).unwrap();
        values.insert(symbol('l', 0), Vector2::new(4.0, -1.0)).unwrap();

        let pose = Expression::<SE2>::leaf(symbol('x', 0));
        let landmark = Expression::<Vector2<f64>>::leaf(symbol('l', 0));
        check_all_keys(&transform_to(&pose, &landmark), &values);
    }

    #[test]
    fn test_vector_functions() {
        let mut values = Values::new();
        values.insert(0, DVector::from_vec(vec![1.0, 2.0])).unwrap();
        values.insert(1, DVector::from_vec(vec![0.5, -0.5])).unwrap();

        let a = Expression::<DVector<f64>>::leaf_with_dim(0, 2);
        let b = Expression::<DVector<f64>>::leaf_with_dim(1, 2);
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let e = linear(m, &difference(&scale(3.0, &a), &b));

        let (value, jacobians) = e.value_with_jacobians(&values).unwrap();
        assert_eq!(value.as_slice(), &[2.5, 6.5, 9.0]);
        assert_eq!(jacobians[&0][(2, 1)], 3.0);
        assert_eq!(jacobians[&1][(0, 0)], -1.0);
        check_all_keys(&e, &values);
    }
}
