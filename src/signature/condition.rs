//! Condition number of a column-standardized signature.

use crate::stats::{mean, population_std};
use nalgebra::DMatrix;

/// Center each column and scale it by its population standard deviation.
///
/// Returns `None` when a column has zero (or non-finite) spread.
pub fn standardize_columns(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let mut out = m.clone();
    for mut col in out.column_iter_mut() {
        let values: Vec<f64> = col.iter().copied().collect();
        let mu = mean(&values);
        let sd = population_std(&values);
        if !(sd.is_finite() && sd > 0.0) {
            return None;
        }
        col.apply(|v| *v = (*v - mu) / sd);
    }
    Some(out)
}

/// Ratio of the largest to the smallest singular value of the standardized
/// matrix. Degenerate input (empty, constant column, zero singular value)
/// gives `f64::INFINITY`.
pub fn condition_number(m: &DMatrix<f64>) -> f64 {
    if m.nrows() < 2 || m.ncols() == 0 {
        return f64::INFINITY;
    }
    let Some(z) = standardize_columns(m) else {
        return f64::INFINITY;
    };

    let singular = z.svd(false, false).singular_values;
    let max = singular.iter().copied().fold(0.0_f64, f64::max);
    let min = singular.iter().copied().fold(f64::INFINITY, f64::min);

    if !(min > 0.0) || !max.is_finite() {
        return f64::INFINITY;
    }
    let cond = max / min;
    if cond.is_finite() {
        cond
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standardized_columns_have_unit_spread() {
        let m = DMatrix::from_row_slice(4, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 10.0, 4.0, 40.0]);
        let z = standardize_columns(&m).unwrap();
        for col in z.column_iter() {
            let v: Vec<f64> = col.iter().copied().collect();
            assert_relative_eq!(mean(&v), 0.0, epsilon = 1e-12);
            assert_relative_eq!(population_std(&v), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_orthogonal_columns_condition_one() {
        // centered columns (1,-1,1,-1) and (1,1,-1,-1) are orthogonal with equal norms
        let m = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, -1.0]);
        assert_relative_eq!(condition_number(&m), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_inputs_are_infinite() {
        let constant = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        assert!(condition_number(&constant).is_infinite());

        let collinear = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(condition_number(&collinear) > 1e12);

        let single_row = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(condition_number(&single_row).is_infinite());
    }
}
