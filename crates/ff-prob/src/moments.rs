//! Empirical moments of sampled prediction matrices.
//!
//! Matrices are laid out with one row per variable and one column per draw,
//! matching how the fast fit accumulates prediction samples.

use nalgebra::{DMatrix, DVector};

/// Row-wise mean of a `(variables × draws)` sample matrix.
pub fn sample_mean(samples: &DMatrix<f64>) -> DVector<f64> {
    let n = samples.ncols().max(1) as f64;
    DVector::from_fn(samples.nrows(), |i, _| samples.row(i).sum() / n)
}

/// Empirical covariance of a `(variables × draws)` sample matrix with the
/// unbiased `N-1` denominator.
///
/// With fewer than two draws the covariance is undefined; a zero matrix is
/// returned so that downstream degeneracy handling (point mass / diagonal
/// repair) applies instead of propagating NaN.
pub fn sample_covariance(samples: &DMatrix<f64>) -> DMatrix<f64> {
    let (nvar, ndraw) = samples.shape();
    if ndraw < 2 {
        return DMatrix::zeros(nvar, nvar);
    }
    let mean = sample_mean(samples);
    let mut centered = samples.clone();
    for i in 0..nvar {
        for j in 0..ndraw {
            centered[(i, j)] -= mean[i];
        }
    }
    let cov = &centered * centered.transpose();
    cov / (ndraw as f64 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        // var([1,2,3,4]) with N-1 denominator = 5/3
        let m = DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(sample_mean(&m)[0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(sample_covariance(&m)[(0, 0)], 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_correlation() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        let cov = sample_covariance(&m);
        assert_relative_eq!(cov[(0, 1)], 2.0 * cov[(0, 0)], epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 4.0 * cov[(0, 0)], epsilon = 1e-12);
    }

    #[test]
    fn test_single_draw_is_zero_not_nan() {
        let m = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let cov = sample_covariance(&m);
        assert_relative_eq!(cov[(0, 0)], 0.0);
        assert!(cov.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_constant_row_has_zero_variance() {
        let m = DMatrix::from_row_slice(2, 4, &[5.0, 5.0, 5.0, 5.0, 1.0, 2.0, 3.0, 4.0]);
        let cov = sample_covariance(&m);
        assert_relative_eq!(cov[(0, 0)], 0.0);
        assert!(cov[(1, 1)] > 0.0);
    }
}
