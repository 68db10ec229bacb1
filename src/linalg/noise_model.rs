//! Gaussian noise models and whitening.
//!
//! A noise model turns a residual `r` with covariance `Σ` into a whitened
//! residual `W r` with identity covariance, where `WᵀW = Σ⁻¹`. Whitening is
//! applied jointly to the augmented system `[A | b]` so that Jacobian columns
//! and the right-hand side stay consistent.
//!
//! The set of models is closed:
//!
//! | Variant | W | Notes |
//! |---|---|---|
//! | `Isotropic` | I/σ | one sigma for every row |
//! | `Diagonal` | diag(1/σᵢ) | independent rows |
//! | `Gaussian` | R, RᵀR = Σ⁻¹ | full covariance |
//! | `Constrained` | diag(1/σᵢ), σᵢ = 0 rows kept | hard constraints |
//!
//! Constrained rows (σᵢ = 0) have infinite precision, which no finite scale
//! can express. Whitening leaves them untouched and the linearized factor
//! carries [`NoiseModel::unit`] instead, so solvers can treat them as
//! equality constraints. The penalty `mu` weights those rows when a scalar
//! error is required.

use crate::error::{FactorError, FactorResult};
use crate::linalg::LinAlgError;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Default penalty applied to constrained rows in scalar errors.
pub const DEFAULT_CONSTRAINED_MU: f64 = 1000.0;

/// Noise models are shared between factors built from the same sensor.
pub type SharedNoiseModel = Arc<NoiseModel>;

#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    Isotropic {
        dim: usize,
        sigma: f64,
    },
    Diagonal {
        sigmas: DVector<f64>,
    },
    Gaussian {
        sqrt_information: DMatrix<f64>,
    },
    Constrained {
        sigmas: DVector<f64>,
        mu: DVector<f64>,
    },
}

fn check_sigmas(sigmas: &DVector<f64>) -> FactorResult<()> {
    if sigmas.is_empty() {
        return Err(FactorError::InvalidArgument(
            "noise model needs at least one sigma".to_string(),
        ));
    }
    if let Some(bad) = sigmas.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(FactorError::InvalidArgument(format!(
            "sigmas must be finite and non-negative, got {bad}"
        )));
    }
    Ok(())
}

impl NoiseModel {
    /// Identity covariance.
    pub fn unit_with_dim(dim: usize) -> Self {
        NoiseModel::Isotropic { dim, sigma: 1.0 }
    }

    /// The same `sigma` for every row.
    ///
    /// # Errors
    /// `InvalidArgument` if `sigma` is not finite and positive.
    pub fn isotropic(dim: usize, sigma: f64) -> FactorResult<Self> {
        if !(sigma.is_finite() && sigma > 0.0) || dim == 0 {
            return Err(FactorError::InvalidArgument(format!(
                "isotropic noise needs dim > 0 and sigma > 0, got dim {dim}, sigma {sigma}"
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    /// Independent per-row sigmas. A zero sigma makes the model constrained.
    ///
    /// # Errors
    /// `InvalidArgument` for empty, negative or non-finite sigmas.
    pub fn diagonal(sigmas: DVector<f64>) -> FactorResult<Self> {
        check_sigmas(&sigmas)?;
        if sigmas.iter().any(|&s| s == 0.0) {
            return Self::constrained(sigmas);
        }
        Ok(NoiseModel::Diagonal { sigmas })
    }

    /// Full covariance Σ, stored as the square-root information L⁻¹ with Σ = LLᵀ.
    ///
    /// # Errors
    /// `LinearAlgebra` if Σ is not square and positive definite.
    pub fn from_covariance(covariance: DMatrix<f64>) -> FactorResult<Self> {
        if !covariance.is_square() || covariance.is_empty() {
            return Err(LinAlgError::InvalidInput("covariance must be square".to_string()).into());
        }
        let dim = covariance.nrows();
        let l = covariance
            .cholesky()
            .ok_or(LinAlgError::NotPositiveDefinite)?
            .unpack();
        let sqrt_information = l
            .solve_lower_triangular(&DMatrix::identity(dim, dim))
            .ok_or(LinAlgError::NotPositiveDefinite)?;
        Ok(NoiseModel::Gaussian { sqrt_information })
    }

    /// Full information matrix Λ = Σ⁻¹, stored as Lᵀ with Λ = LLᵀ.
    ///
    /// # Errors
    /// `LinearAlgebra` if Λ is not square and positive definite.
    pub fn from_information(information: DMatrix<f64>) -> FactorResult<Self> {
        if !information.is_square() || information.is_empty() {
            return Err(LinAlgError::InvalidInput("information must be square".to_string()).into());
        }
        let l = information
            .cholesky()
            .ok_or(LinAlgError::NotPositiveDefinite)?
            .unpack();
        Ok(NoiseModel::Gaussian {
            sqrt_information: l.transpose(),
        })
    }

    /// Mixed model: rows with zero sigma are hard constraints.
    ///
    /// # Errors
    /// `InvalidArgument` for empty, negative or non-finite sigmas.
    pub fn constrained(sigmas: DVector<f64>) -> FactorResult<Self> {
        check_sigmas(&sigmas)?;
        let mu = DVector::from_element(sigmas.len(), DEFAULT_CONSTRAINED_MU);
        Ok(NoiseModel::Constrained { sigmas, mu })
    }

    /// Every row is a hard constraint.
    pub fn constrained_all(dim: usize) -> FactorResult<Self> {
        Self::constrained(DVector::zeros(dim))
    }

    /// Replace the constraint penalty. Other models are returned unchanged.
    pub fn with_mu(self, mu: f64) -> Self {
        match self {
            NoiseModel::Constrained { sigmas, .. } => NoiseModel::Constrained {
                mu: DVector::from_element(sigmas.len(), mu),
                sigmas,
            },
            other => other,
        }
    }

    /// Residual dimension.
    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal { sigmas } | NoiseModel::Constrained { sigmas, .. } => {
                sigmas.len()
            }
            NoiseModel::Gaussian { sqrt_information } => sqrt_information.nrows(),
        }
    }

    /// Whether any row is a hard constraint.
    pub fn is_constrained(&self) -> bool {
        matches!(self, NoiseModel::Constrained { .. })
    }

    /// Whether whitening is the identity.
    pub fn is_unit(&self) -> bool {
        match self {
            NoiseModel::Isotropic { sigma, .. } => *sigma == 1.0,
            NoiseModel::Diagonal { sigmas } => sigmas.iter().all(|&s| s == 1.0),
            _ => false,
        }
    }

    /// Per-row standard deviations (marginal, for the full Gaussian).
    pub fn sigmas(&self) -> DVector<f64> {
        match self {
            NoiseModel::Isotropic { dim, sigma } => DVector::from_element(*dim, *sigma),
            NoiseModel::Diagonal { sigmas } | NoiseModel::Constrained { sigmas, .. } => {
                sigmas.clone()
            }
            NoiseModel::Gaussian { sqrt_information } => {
                let information = sqrt_information.transpose() * sqrt_information;
                match information.try_inverse() {
                    Some(covariance) => covariance.diagonal().map(f64::sqrt),
                    None => DVector::from_element(sqrt_information.nrows(), f64::INFINITY),
                }
            }
        }
    }

    /// Whitened residual `W r`.
    pub fn whiten(&self, residual: &DVector<f64>) -> DVector<f64> {
        match self {
            NoiseModel::Isotropic { sigma, .. } => residual / *sigma,
            NoiseModel::Diagonal { sigmas } => residual.component_div(sigmas),
            NoiseModel::Gaussian { sqrt_information } => sqrt_information * residual,
            NoiseModel::Constrained { sigmas, .. } => residual.zip_map(sigmas, |r, s| {
                if s == 0.0 {
                    r
                } else {
                    r / s
                }
            }),
        }
    }

    /// Whiten every column of `matrix` in place; used on the augmented `[A | b]`.
    pub fn whiten_system(&self, matrix: &mut DMatrix<f64>) {
        match self {
            NoiseModel::Isotropic { sigma, .. } => {
                if *sigma != 1.0 {
                    *matrix /= *sigma;
                }
            }
            NoiseModel::Diagonal { sigmas } => {
                for (mut row, &sigma) in matrix.row_iter_mut().zip(sigmas.iter()) {
                    row /= sigma;
                }
            }
            NoiseModel::Gaussian { sqrt_information } => {
                *matrix = sqrt_information * &*matrix;
            }
            NoiseModel::Constrained { sigmas, .. } => {
                for (mut row, &sigma) in matrix.row_iter_mut().zip(sigmas.iter()) {
                    if sigma != 0.0 {
                        row /= sigma;
                    }
                }
            }
        }
    }

    /// Substitute model carried by a whitened linear factor.
    ///
    /// Only constrained models need one: the result keeps the hard rows
    /// (sigma 0) and the penalty, with every other sigma set to 1.
    pub fn unit(&self) -> Option<NoiseModel> {
        match self {
            NoiseModel::Constrained { sigmas, mu } => Some(NoiseModel::Constrained {
                sigmas: sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 }),
                mu: mu.clone(),
            }),
            _ => None,
        }
    }

    /// Squared Mahalanobis distance of an unwhitened residual.
    ///
    /// Constrained rows contribute `mu · r²`.
    pub fn squared_mahalanobis_distance(&self, residual: &DVector<f64>) -> f64 {
        match self {
            NoiseModel::Constrained { sigmas, mu } => residual
                .iter()
                .zip(sigmas.iter().zip(mu.iter()))
                .map(|(&r, (&s, &m))| if s == 0.0 { m * r * r } else { (r / s) * (r / s) })
                .sum(),
            _ => self.whiten(residual).norm_squared(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn dv(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn test_isotropic_whitening() {
        let model = NoiseModel::isotropic(2, 0.5).unwrap();
        assert_eq!(model.dim(), 2);
        assert!(!model.is_constrained());
        assert_eq!(model.whiten(&dv(&[1.0, -2.0])), dv(&[2.0, -4.0]));
        assert!((model.squared_mahalanobis_distance(&dv(&[1.0, 1.0])) - 8.0).abs() < TOLERANCE);

        assert!(NoiseModel::isotropic(2, 0.0).is_err());
        assert!(NoiseModel::isotropic(2, f64::NAN).is_err());
    }

    #[test]
    fn test_diagonal_whiten_system_matches_whiten() {
        let model = NoiseModel::diagonal(dv(&[0.1, 2.0])).unwrap();
        let mut ab = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let rhs = ab.column(2).into_owned();
        model.whiten_system(&mut ab);

        assert!((ab[(0, 0)] - 10.0).abs() < TOLERANCE);
        assert!((ab[(1, 1)] - 2.5).abs() < TOLERANCE);
        assert!((ab.column(2) - model.whiten(&rhs)).norm() < TOLERANCE);
    }

    #[test]
    fn test_zero_sigma_diagonal_becomes_constrained() {
        let model = NoiseModel::diagonal(dv(&[0.0, 1.0])).unwrap();
        assert!(model.is_constrained());
        assert!(NoiseModel::diagonal(dv(&[-1.0])).is_err());
        assert!(NoiseModel::diagonal(DVector::zeros(0)).is_err());
    }

    #[test]
    fn test_gaussian_from_covariance() {
        let covariance = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let model = NoiseModel::from_covariance(covariance.clone()).unwrap();
        let NoiseModel::Gaussian { sqrt_information } = &model else {
            panic!("expected a full Gaussian model");
        };

        let information = sqrt_information.transpose() * sqrt_information;
        let identity = &information * &covariance;
        assert!((identity - DMatrix::identity(2, 2)).norm() < 1e-12);
        assert!((model.sigmas() - dv(&[2.0, 3.0_f64.sqrt()])).norm() < 1e-12);

        let r = dv(&[0.3, -0.7]);
        let expected = (r.transpose() * &information * &r)[(0, 0)];
        assert!((model.squared_mahalanobis_distance(&r) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_from_information() {
        let information = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let model = NoiseModel::from_information(information.clone()).unwrap();
        let NoiseModel::Gaussian { sqrt_information } = &model else {
            panic!("expected a full Gaussian model");
        };
        assert!((sqrt_information.transpose() * sqrt_information - information).norm() < 1e-12);
    }

    #[test]
    fn test_not_positive_definite() {
        let covariance = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(matches!(
            NoiseModel::from_covariance(covariance),
            Err(FactorError::LinearAlgebra(_))
        ));
    }

    #[test]
    fn test_constrained_whitening_and_unit() {
        let model = NoiseModel::constrained(dv(&[0.0, 0.5])).unwrap().with_mu(50.0);
        let mut ab = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 3.0, 1.0]);
        model.whiten_system(&mut ab);
        assert_eq!(ab.row(0).iter().copied().collect::<Vec<_>>(), vec![3.0, 1.0]);
        assert_eq!(ab.row(1).iter().copied().collect::<Vec<_>>(), vec![6.0, 2.0]);

        let unit = model.unit().unwrap();
        assert!(unit.is_constrained());
        assert_eq!(unit.sigmas(), dv(&[0.0, 1.0]));

        let distance = model.squared_mahalanobis_distance(&dv(&[0.1, 1.0]));
        assert!((distance - (50.0 * 0.01 + 4.0)).abs() < 1e-12);

        assert!(NoiseModel::unit_with_dim(3).unit().is_none());
    }
}
