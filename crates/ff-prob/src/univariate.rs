//! Univariate constraint distributions.

use ff_core::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution as RandDistribution, StandardNormal};

use crate::math::LN_SQRT_2PI;

/// How many standard deviations the declared support of a Normal extends
/// on each side of the central value.
const NORMAL_SUPPORT_SIGMAS: f64 = 6.0;

/// A one-dimensional probability distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Univariate {
    /// Gaussian `N(mu, sigma)`.
    Normal {
        /// Central value.
        mu: f64,
        /// Standard deviation, finite and positive.
        sigma: f64,
    },
    /// Flat on `[lo, hi]`.
    Uniform {
        /// Lower edge.
        lo: f64,
        /// Upper edge.
        hi: f64,
    },
    /// Point mass at `x` (degenerate, zero-width).
    Delta {
        /// Location of the point mass.
        x: f64,
    },
}

impl Univariate {
    /// Gaussian with validated width.
    pub fn normal(mu: f64, sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::Numerical(format!(
                "sigma must be finite and > 0, got {}",
                sigma
            )));
        }
        Ok(Univariate::Normal { mu, sigma })
    }

    /// Flat distribution with validated edges.
    pub fn uniform(lo: f64, hi: f64) -> Result<Self> {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(Error::Numerical(format!(
                "uniform edges must be finite with lo < hi, got ({}, {})",
                lo, hi
            )));
        }
        Ok(Univariate::Uniform { lo, hi })
    }

    /// Point mass at `x`.
    pub fn delta(x: f64) -> Self {
        Univariate::Delta { x }
    }

    /// Central value.
    pub fn central(&self) -> f64 {
        match *self {
            Univariate::Normal { mu, .. } => mu,
            Univariate::Uniform { lo, hi } => 0.5 * (lo + hi),
            Univariate::Delta { x } => x,
        }
    }

    /// Declared support `(lo, hi)`.
    ///
    /// For a Gaussian this is central ± 6 sigma; for a point mass it
    /// collapses to a single point.
    pub fn support(&self) -> (f64, f64) {
        match *self {
            Univariate::Normal { mu, sigma } => (
                mu - NORMAL_SUPPORT_SIGMAS * sigma,
                mu + NORMAL_SUPPORT_SIGMAS * sigma,
            ),
            Univariate::Uniform { lo, hi } => (lo, hi),
            Univariate::Delta { x } => (x, x),
        }
    }

    /// Log-density at `x`.
    ///
    /// The point mass returns `0.0` at its location and `-inf` elsewhere,
    /// so a pseudo-measurement built from a degenerate theory covariance
    /// stays evaluable.
    pub fn logpdf(&self, x: f64) -> f64 {
        match *self {
            Univariate::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
            Univariate::Uniform { lo, hi } => {
                if x >= lo && x <= hi {
                    -(hi - lo).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Univariate::Delta { x: c } => {
                if x == c {
                    0.0
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    /// Draw one sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Univariate::Normal { mu, sigma } => {
                let z: f64 = StandardNormal.sample(rng);
                mu + sigma * z
            }
            Univariate::Uniform { lo, hi } => lo + (hi - lo) * rng.gen::<f64>(),
            Univariate::Delta { x } => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normal_standard_at_zero() {
        let d = Univariate::normal(0.0, 1.0).unwrap();
        assert_relative_eq!(d.logpdf(0.0), -LN_SQRT_2PI, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_symmetry() {
        let d = Univariate::normal(0.0, 2.0).unwrap();
        assert_relative_eq!(d.logpdf(1.3), d.logpdf(-1.3), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(Univariate::normal(0.0, 0.0).is_err());
        assert!(Univariate::normal(0.0, -1.0).is_err());
        assert!(Univariate::normal(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_delta_logpdf() {
        let d = Univariate::delta(1.5);
        assert_relative_eq!(d.logpdf(1.5), 0.0);
        assert_eq!(d.logpdf(1.4999), f64::NEG_INFINITY);
    }

    #[test]
    fn test_uniform() {
        let d = Univariate::uniform(0.0, 2.0).unwrap();
        assert_relative_eq!(d.logpdf(1.0), -(2.0_f64).ln(), epsilon = 1e-12);
        assert_eq!(d.logpdf(3.0), f64::NEG_INFINITY);
        assert_relative_eq!(d.central(), 1.0);
        assert!(Univariate::uniform(2.0, 0.0).is_err());
    }

    #[test]
    fn test_normal_sample_moments() {
        let d = Univariate::normal(3.0, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| d.sample(&mut rng)).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 3.0, epsilon = 0.02);
    }

    #[test]
    fn test_delta_sample_is_constant() {
        let d = Univariate::delta(-2.5);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(d.sample(&mut rng), -2.5);
    }
}
