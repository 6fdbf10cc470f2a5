//! Per-region ordinary least squares on a group design.
//!
//! The design is shared by every region, so `(X'X)^-1` and the
//! pseudo-inverse `(X'X)^-1 X'` are computed once in [`GroupModel::new`] and
//! reused read-only by all fits.

use crate::data::DesignMatrix;
use crate::error::{DeconvError, Result};
use nalgebra::{DMatrix, DVector};

/// Precomputed least-squares operator for one design.
#[derive(Debug, Clone)]
pub struct GroupModel {
    design: DMatrix<f64>,
    xtx_inv: DMatrix<f64>,
    pinv: DMatrix<f64>,
    group_sizes: DVector<f64>,
}

/// Fit of one region.
#[derive(Debug, Clone)]
pub struct GroupFit {
    /// One coefficient per group (the group mean for a one-hot design).
    pub coefficients: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Mean squared residual of each group's member samples.
    pub group_variance: DVector<f64>,
    /// `diag(sigma * (n - 1)) (X'X)^-1`.
    pub covariance: DMatrix<f64>,
}

impl GroupModel {
    pub fn new(design: &DesignMatrix) -> Result<Self> {
        let x = design.matrix().clone();
        let xtx = x.transpose() * &x;
        let xtx_inv = xtx.try_inverse().ok_or_else(|| {
            DeconvError::numerical("MarkerTestEngine", "design matrix X'X is singular")
        })?;
        if xtx_inv.iter().any(|v| !v.is_finite()) {
            return Err(DeconvError::numerical(
                "MarkerTestEngine",
                "design matrix X'X inverse is not finite",
            ));
        }
        let pinv = &xtx_inv * x.transpose();
        let group_sizes = DVector::from_vec(design.group_sizes());

        Ok(Self {
            design: x,
            xtx_inv,
            pinv,
            group_sizes,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.design.nrows()
    }

    pub fn n_groups(&self) -> usize {
        self.design.ncols()
    }

    pub fn xtx_inv(&self) -> &DMatrix<f64> {
        &self.xtx_inv
    }

    pub fn pseudo_inverse(&self) -> &DMatrix<f64> {
        &self.pinv
    }

    /// Fit one region's values (length = number of samples).
    pub fn fit(&self, y: &DVector<f64>) -> GroupFit {
        let coefficients = &self.pinv * y;
        let residuals = y - &self.design * &coefficients;

        let sq = residuals.map(|r| r * r);
        let mut group_variance = self.design.tr_mul(&sq);
        group_variance.component_div_assign(&self.group_sizes);

        let scale = group_variance.zip_map(&self.group_sizes, |s, n| s * (n - 1.0));
        let covariance = DMatrix::from_diagonal(&scale) * &self.xtx_inv;

        GroupFit {
            coefficients,
            residuals,
            group_variance,
            covariance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn design(rows: &[&[f64]]) -> DesignMatrix {
        let n = rows.len();
        let k = rows[0].len();
        let m = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
        DesignMatrix::from_matrix(
            m,
            (0..k).map(|g| format!("g{}", g)).collect(),
            (0..n).map(|i| format!("s{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_one_hot_coefficients_are_group_means() {
        let d = design(&[&[1.0, 0.0], &[1.0, 0.0], &[0.0, 1.0], &[0.0, 1.0], &[0.0, 1.0]]);
        let model = GroupModel::new(&d).unwrap();
        let fit = model.fit(&DVector::from_vec(vec![2.0, 4.0, 1.0, 2.0, 3.0]));

        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficients[1], 2.0, epsilon = 1e-12);
        // group 0 residuals -1, 1 -> 2 / 2
        assert_relative_eq!(fit.group_variance[0], 1.0, epsilon = 1e-12);
        // group 1 residuals -1, 0, 1 -> 2 / 3
        assert_relative_eq!(fit.group_variance[1], 2.0 / 3.0, epsilon = 1e-12);
        // V_00 = sigma_0 * (n_0 - 1) / n_0
        assert_relative_eq!(fit.covariance[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(fit.covariance[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_design_rejected() {
        let d = design(&[&[1.0, 1.0], &[1.0, 1.0]]);
        assert!(matches!(GroupModel::new(&d), Err(DeconvError::Numerical { .. })));
    }
}
