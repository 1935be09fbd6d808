//! Probability building blocks for flavfit.
//!
//! This crate hosts the probability math the fit engine contracts on:
//! - univariate and multivariate distributions (logpdf/sample/support)
//! - convolution of independent uncertainty sources
//! - small sample-moment helpers (empirical mean/covariance)

pub mod convolve;
pub mod math;
pub mod moments;
pub mod multivariate;
pub mod univariate;

pub use convolve::convolve;
pub use multivariate::MultivariateNormal;
pub use univariate::Univariate;

use ff_core::Result;
use rand::Rng;

/// A joint constraint distribution: univariate for a single observable,
/// multivariate Normal for a correlated block.
#[derive(Debug, Clone)]
pub enum Distribution {
    /// Distribution over a single axis.
    Univariate(Univariate),
    /// Correlated Gaussian over several axes.
    Multivariate(MultivariateNormal),
}

impl Distribution {
    /// Number of axes.
    pub fn dim(&self) -> usize {
        match self {
            Distribution::Univariate(_) => 1,
            Distribution::Multivariate(mvn) => mvn.dim(),
        }
    }

    /// Central value along `axis`.
    pub fn central(&self, axis: usize) -> f64 {
        match self {
            Distribution::Univariate(d) => d.central(),
            Distribution::Multivariate(mvn) => mvn.mean()[axis],
        }
    }

    /// Declared support `(lo, hi)` along `axis`.
    pub fn support(&self, axis: usize) -> (f64, f64) {
        match self {
            Distribution::Univariate(d) => d.support(),
            Distribution::Multivariate(mvn) => mvn.support(axis),
        }
    }

    /// Draw one sample of all axes.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        match self {
            Distribution::Univariate(d) => Ok(vec![d.sample(rng)]),
            Distribution::Multivariate(mvn) => Ok(mvn.sample(rng)?.iter().copied().collect()),
        }
    }

    /// Joint log-density at `x` (length = `dim()`), excluding the axes in
    /// `exclude`. Excluded axes are marginalized out; if every axis is
    /// excluded the contribution is zero.
    pub fn logpdf_excluding(&self, x: &[f64], exclude: &[usize]) -> Result<f64> {
        match self {
            Distribution::Univariate(d) => {
                if exclude.contains(&0) {
                    Ok(0.0)
                } else {
                    Ok(d.logpdf(x[0]))
                }
            }
            Distribution::Multivariate(mvn) => mvn.logpdf_excluding(x, exclude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_univariate_excluded_contributes_zero() {
        let d = Distribution::Univariate(Univariate::normal(1.0, 0.1).unwrap());
        let lp = d.logpdf_excluding(&[5.0], &[0]).unwrap();
        assert_relative_eq!(lp, 0.0);
    }

    #[test]
    fn test_dim_and_central() {
        let d = Distribution::Univariate(Univariate::normal(2.0, 0.5).unwrap());
        assert_eq!(d.dim(), 1);
        assert_relative_eq!(d.central(0), 2.0);
        let (lo, hi) = d.support(0);
        assert_relative_eq!(hi - lo, 6.0); // 12 sigma
    }
}
