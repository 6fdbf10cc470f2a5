//! Ordinary least squares without intercept.

use super::RegressionFit;
use crate::error::{DeconvError, Result};
use nalgebra::{DMatrix, DVector};

/// Solve `min ||y - X b||` through the SVD of `X`.
pub fn fit_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<RegressionFit> {
    if x.nrows() != y.len() {
        return Err(DeconvError::data_mismatch(
            "LeastSquares",
            format!("{} predictor rows but {} responses", x.nrows(), y.len()),
        ));
    }
    if x.nrows() < x.ncols() {
        return Err(DeconvError::numerical(
            "LeastSquares",
            format!("{} regions cannot determine {} coefficients", x.nrows(), x.ncols()),
        ));
    }

    let svd = x.clone().svd(true, true);
    let eps = f64::EPSILON * x.nrows().max(x.ncols()) as f64 * svd.singular_values.max();
    let coefficients = svd
        .solve(y, eps)
        .map_err(|e| DeconvError::numerical("LeastSquares", e.to_string()))?;

    Ok(RegressionFit {
        coefficients,
        intercept: 0.0,
        n_components: x.ncols(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_solution() {
        let x = DMatrix::from_row_slice(4, 2, &[10.0, 1.0, 8.0, 2.0, 1.0, 9.0, 2.0, 7.0]);
        let b = DVector::from_vec(vec![0.7, 0.3]);
        let y = &x * &b;
        let fit = fit_least_squares(&x, &y).unwrap();
        assert_relative_eq!(fit.coefficients[0], 0.7, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[1], 0.3, epsilon = 1e-10);
        assert_eq!(fit.intercept, 0.0);
    }

    #[test]
    fn test_underdetermined_rejected() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let y = DVector::from_vec(vec![3.0]);
        assert!(matches!(fit_least_squares(&x, &y), Err(DeconvError::Numerical { .. })));
    }
}
