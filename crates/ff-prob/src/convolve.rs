//! Convolution of independent uncertainty sources.
//!
//! Combining an experimental constraint with a theory-uncertainty
//! distribution over the same observables. Both inputs must share their
//! central value; the result keeps it. A point mass acts as the identity.

use ff_core::{Error, Result};
use nalgebra::DVector;

use crate::math::close;
use crate::multivariate::MultivariateNormal;
use crate::univariate::Univariate;
use crate::Distribution;

fn central_mismatch(a: f64, b: f64) -> Error {
    Error::Numerical(format!(
        "cannot convolve distributions with different central values ({} vs {})",
        a, b
    ))
}

fn convolve_univariate(a: &Univariate, b: &Univariate) -> Result<Univariate> {
    if !close(a.central(), b.central()) {
        return Err(central_mismatch(a.central(), b.central()));
    }
    match (a, b) {
        // A point mass shifts by zero relative to the shared central value.
        (Univariate::Delta { .. }, other) => Ok(other.clone()),
        (other, Univariate::Delta { .. }) => Ok(other.clone()),
        (Univariate::Normal { mu, sigma: s1 }, Univariate::Normal { sigma: s2, .. }) => {
            Univariate::normal(*mu, (s1 * s1 + s2 * s2).sqrt())
        }
        (a, b) => Err(Error::Numerical(format!(
            "unsupported convolution of {:?} with {:?}",
            a, b
        ))),
    }
}

fn convolve_multivariate(
    a: &MultivariateNormal,
    b: &MultivariateNormal,
) -> Result<MultivariateNormal> {
    if a.dim() != b.dim() {
        return Err(Error::Numerical(format!(
            "cannot convolve distributions of dimension {} and {}",
            a.dim(),
            b.dim()
        )));
    }
    for i in 0..a.dim() {
        if !close(a.mean()[i], b.mean()[i]) {
            return Err(central_mismatch(a.mean()[i], b.mean()[i]));
        }
    }
    let mean = DVector::from_fn(a.dim(), |i, _| a.mean()[i]);
    MultivariateNormal::new(mean, a.cov() + b.cov())
}

/// Convolve two independent distributions over the same observables.
///
/// Supported combinations: Normal⊛Normal (widths add in quadrature),
/// anything⊛Delta (identity), MVN⊛MVN (covariances add). Everything else
/// is a fatal numerical error.
pub fn convolve(a: &Distribution, b: &Distribution) -> Result<Distribution> {
    match (a, b) {
        (Distribution::Univariate(a), Distribution::Univariate(b)) => {
            Ok(Distribution::Univariate(convolve_univariate(a, b)?))
        }
        (Distribution::Multivariate(a), Distribution::Multivariate(b)) => {
            Ok(Distribution::Multivariate(convolve_multivariate(a, b)?))
        }
        _ => Err(Error::Numerical(
            "cannot convolve univariate with multivariate distribution".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_normal_normal_widths_add_in_quadrature() {
        let a = Distribution::Univariate(Univariate::normal(1.0, 0.1).unwrap());
        let b = Distribution::Univariate(Univariate::normal(1.0, 0.3).unwrap());
        match convolve(&a, &b).unwrap() {
            Distribution::Univariate(Univariate::Normal { mu, sigma }) => {
                assert_relative_eq!(mu, 1.0);
                assert_relative_eq!(sigma, (0.01_f64 + 0.09).sqrt(), epsilon = 1e-12);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_delta_is_identity() {
        let a = Distribution::Univariate(Univariate::uniform(0.0, 2.0).unwrap());
        let b = Distribution::Univariate(Univariate::delta(1.0));
        match convolve(&a, &b).unwrap() {
            Distribution::Univariate(Univariate::Uniform { lo, hi }) => {
                assert_relative_eq!(lo, 0.0);
                assert_relative_eq!(hi, 2.0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_central_mismatch_fails() {
        let a = Distribution::Univariate(Univariate::normal(1.0, 0.1).unwrap());
        let b = Distribution::Univariate(Univariate::normal(2.0, 0.1).unwrap());
        assert!(convolve(&a, &b).is_err());
    }

    #[test]
    fn test_uniform_normal_unsupported() {
        let a = Distribution::Univariate(Univariate::uniform(0.0, 2.0).unwrap());
        let b = Distribution::Univariate(Univariate::normal(1.0, 0.1).unwrap());
        assert!(convolve(&a, &b).is_err());
    }

    #[test]
    fn test_mvn_covariances_add() {
        let mean = DVector::from_row_slice(&[1.0, 2.0]);
        let c1 = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
        let c2 = DMatrix::from_row_slice(2, 2, &[0.01, 0.0, 0.0, 0.01]);
        let a = Distribution::Multivariate(
            MultivariateNormal::new(mean.clone(), c1.clone()).unwrap(),
        );
        let b = Distribution::Multivariate(MultivariateNormal::new(mean, c2.clone()).unwrap());
        match convolve(&a, &b).unwrap() {
            Distribution::Multivariate(mvn) => {
                let expected = &c1 + &c2;
                assert_relative_eq!(mvn.cov()[(0, 0)], expected[(0, 0)], epsilon = 1e-12);
                assert_relative_eq!(mvn.cov()[(1, 1)], expected[(1, 1)], epsilon = 1e-12);
                assert_relative_eq!(mvn.cov()[(0, 1)], expected[(0, 1)], epsilon = 1e-12);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mixed_dimensionality_fails() {
        let a = Distribution::Univariate(Univariate::normal(0.0, 1.0).unwrap());
        let mvn = MultivariateNormal::new(
            DVector::from_row_slice(&[0.0, 0.0]),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        let b = Distribution::Multivariate(mvn);
        assert!(convolve(&a, &b).is_err());
    }
}
