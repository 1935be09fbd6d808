//! Multivariate Normal over correlated observable blocks.

use ff_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, StandardNormal};

use crate::math::LN_2PI;

/// Sigma multiple defining the declared support along each axis.
const SUPPORT_SIGMAS: f64 = 6.0;

/// Correlated Gaussian `N(mean, cov)` in `n` dimensions.
///
/// The covariance is stored as given; positive-definiteness is only
/// required (and checked, via Cholesky) when evaluating or sampling. This
/// keeps construction infallible for covariance matrices produced by the
/// fast-fit degeneracy repair, whose validity is a property of the inputs.
#[derive(Debug, Clone)]
pub struct MultivariateNormal {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
}

impl MultivariateNormal {
    /// Create from a mean vector and a square covariance of matching size.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let n = mean.len();
        if n == 0 {
            return Err(Error::Numerical("empty multivariate Normal".into()));
        }
        if cov.nrows() != n || cov.ncols() != n {
            return Err(Error::Numerical(format!(
                "covariance shape {}x{} does not match mean length {}",
                cov.nrows(),
                cov.ncols(),
                n
            )));
        }
        Ok(Self { mean, cov })
    }

    /// Number of axes.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Mean vector.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Covariance matrix.
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Declared support `(lo, hi)` along `axis`: mean ± 6 sigma.
    pub fn support(&self, axis: usize) -> (f64, f64) {
        let sigma = self.cov[(axis, axis)].max(0.0).sqrt();
        (
            self.mean[axis] - SUPPORT_SIGMAS * sigma,
            self.mean[axis] + SUPPORT_SIGMAS * sigma,
        )
    }

    /// Joint log-density at `x` (length = `dim()`).
    pub fn logpdf(&self, x: &[f64]) -> Result<f64> {
        self.logpdf_excluding(x, &[])
    }

    /// Log-density of the marginal obtained by integrating out the axes in
    /// `exclude`, evaluated at the kept components of `x`.
    ///
    /// Marginalizing a Gaussian just drops the excluded rows and columns.
    /// Returns zero if every axis is excluded.
    pub fn logpdf_excluding(&self, x: &[f64], exclude: &[usize]) -> Result<f64> {
        let n = self.dim();
        if x.len() != n {
            return Err(Error::Numerical(format!(
                "value vector length {} does not match dimension {}",
                x.len(),
                n
            )));
        }
        let keep: Vec<usize> = (0..n).filter(|i| !exclude.contains(i)).collect();
        if keep.is_empty() {
            return Ok(0.0);
        }
        let k = keep.len();
        let diff = DVector::from_fn(k, |i, _| x[keep[i]] - self.mean[keep[i]]);
        let cov = DMatrix::from_fn(k, k, |i, j| self.cov[(keep[i], keep[j])]);

        let chol = cov.cholesky().ok_or_else(|| {
            Error::Numerical("covariance not positive definite (Cholesky failed)".into())
        })?;
        let logdet: f64 = chol.l().diagonal().iter().map(|d| 2.0 * d.ln()).sum();
        let quad = diff.dot(&chol.solve(&diff));
        Ok(-0.5 * (k as f64 * LN_2PI + logdet + quad))
    }

    /// Draw one sample via the Cholesky factor.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<DVector<f64>> {
        let chol = self.cov.clone().cholesky().ok_or_else(|| {
            Error::Numerical("covariance not positive definite (Cholesky failed)".into())
        })?;
        let l = chol.l();
        let z = DVector::from_fn(self.dim(), |_, _| StandardNormal.sample(rng));
        Ok(&self.mean + l * z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::univariate::Univariate;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mvn2(s1: f64, s2: f64, rho: f64) -> MultivariateNormal {
        let cov = DMatrix::from_row_slice(
            2,
            2,
            &[s1 * s1, rho * s1 * s2, rho * s1 * s2, s2 * s2],
        );
        MultivariateNormal::new(DVector::from_row_slice(&[1.0, -2.0]), cov).unwrap()
    }

    #[test]
    fn test_diagonal_factorizes() {
        let mvn = mvn2(0.3, 0.7, 0.0);
        let joint = mvn.logpdf(&[1.2, -1.5]).unwrap();
        let u1 = Univariate::normal(1.0, 0.3).unwrap().logpdf(1.2);
        let u2 = Univariate::normal(-2.0, 0.7).unwrap().logpdf(-1.5);
        assert_relative_eq!(joint, u1 + u2, epsilon = 1e-12);
    }

    #[test]
    fn test_marginal_matches_univariate() {
        let mvn = mvn2(0.3, 0.7, 0.6);
        let marg = mvn.logpdf_excluding(&[1.2, 0.0], &[1]).unwrap();
        let u1 = Univariate::normal(1.0, 0.3).unwrap().logpdf(1.2);
        assert_relative_eq!(marg, u1, epsilon = 1e-12);
    }

    #[test]
    fn test_all_excluded_is_zero() {
        let mvn = mvn2(0.3, 0.7, 0.6);
        assert_relative_eq!(mvn.logpdf_excluding(&[0.0, 0.0], &[0, 1]).unwrap(), 0.0);
    }

    #[test]
    fn test_singular_covariance_fails() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let mvn = MultivariateNormal::new(DVector::from_row_slice(&[0.0, 0.0]), cov).unwrap();
        assert!(mvn.logpdf(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let cov = DMatrix::from_row_slice(1, 1, &[1.0]);
        assert!(MultivariateNormal::new(DVector::from_row_slice(&[0.0, 0.0]), cov).is_err());
    }

    #[test]
    fn test_support_range() {
        let mvn = mvn2(0.3, 0.7, 0.0);
        let (lo, hi) = mvn.support(1);
        assert_relative_eq!(hi - lo, 12.0 * 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_mean() {
        let mvn = mvn2(0.3, 0.7, 0.5);
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let mut acc = DVector::zeros(2);
        for _ in 0..n {
            acc += mvn.sample(&mut rng).unwrap();
        }
        acc /= n as f64;
        assert_relative_eq!(acc[0], 1.0, epsilon = 0.02);
        assert_relative_eq!(acc[1], -2.0, epsilon = 0.03);
    }
}
