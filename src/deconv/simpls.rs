//! SIMPLS partial least squares for a single response.
//!
//! de Jong S. SIMPLS: an alternative approach to partial least squares
//! regression. Chemometrics and Intelligent Laboratory Systems 18, 251-263
//! (1993).
//!
//! Components are nested, so one basis with `A` components yields the
//! coefficients of every model with `a <= A` components.

use super::RegressionFit;
use crate::error::{DeconvError, Result};
use crate::parallel::chunk_ranges;
use nalgebra::{DMatrix, DVector};

const COMPONENT: &str = "SIMPLS";

/// Relative size of the remaining cross-covariance below which no further
/// component is extracted.
const DEFLATION_TOL: f64 = 1e-12;

/// Fitted SIMPLS weights and response loadings plus the centering used.
#[derive(Debug, Clone)]
pub struct SimplsBasis {
    /// X weights, one column per component (predictors x components).
    weights: DMatrix<f64>,
    /// Response loading of each component.
    y_loadings: DVector<f64>,
    x_mean: DVector<f64>,
    y_mean: f64,
}

impl SimplsBasis {
    /// Build the basis on `(x, y)`, optionally with observation weights.
    pub fn new(x: &DMatrix<f64>, y: &DVector<f64>, weights: Option<&DVector<f64>>, max_components: usize) -> Result<Self> {
        let (n, p) = x.shape();
        if n != y.len() {
            return Err(DeconvError::data_mismatch(
                COMPONENT,
                format!("{} predictor rows but {} responses", n, y.len()),
            ));
        }
        if n < 2 || p == 0 {
            return Err(DeconvError::EmptyData(format!(
                "{}: need at least 2 observations and 1 predictor, got {}x{}",
                COMPONENT, n, p
            )));
        }

        let w = match weights {
            Some(w) => w.clone(),
            None => DVector::from_element(n, 1.0),
        };
        let w_sum = w.sum();
        if !(w_sum > 0.0) {
            return Err(DeconvError::numerical(COMPONENT, "observation weights sum to zero"));
        }

        let x_mean = x.tr_mul(&w) / w_sum;
        let y_mean = y.dot(&w) / w_sum;
        let sqrt_w = w.map(f64::sqrt);
        let xc = DMatrix::from_fn(n, p, |i, j| (x[(i, j)] - x_mean[j]) * sqrt_w[i]);
        let yc = DVector::from_fn(n, |i, _| (y[i] - y_mean) * sqrt_w[i]);

        let (weights, y_loadings) = extract_components(&xc, &yc, max_components.min(p).min(n - 1));
        Ok(Self {
            weights,
            y_loadings,
            x_mean,
            y_mean,
        })
    }

    /// Components actually extracted.
    pub fn n_components(&self) -> usize {
        self.y_loadings.len()
    }

    /// Regression with the first `a` components (capped at the available count).
    pub fn fit(&self, a: usize) -> RegressionFit {
        let a = a.min(self.n_components());
        let coefficients = if a == 0 {
            DVector::zeros(self.x_mean.len())
        } else {
            self.weights.columns(0, a) * self.y_loadings.rows(0, a)
        };
        let intercept = self.y_mean - self.x_mean.dot(&coefficients);
        RegressionFit {
            coefficients,
            intercept,
            n_components: a,
        }
    }
}

/// Core SIMPLS loop on centered data; returns `(R, q)`.
fn extract_components(xc: &DMatrix<f64>, yc: &DVector<f64>, max_components: usize) -> (DMatrix<f64>, DVector<f64>) {
    let p = xc.ncols();
    let mut s = xc.tr_mul(yc);
    let s0 = s.norm();

    let mut r_cols: Vec<DVector<f64>> = Vec::with_capacity(max_components);
    let mut q_vals: Vec<f64> = Vec::with_capacity(max_components);
    let mut v_basis: Vec<DVector<f64>> = Vec::with_capacity(max_components);

    for _ in 0..max_components {
        if !(s0 > 0.0) || s.norm() <= DEFLATION_TOL * s0 {
            break;
        }
        let mut r = s.clone();
        let mut t = xc * &r;
        let t_norm = t.norm();
        if !(t_norm > 0.0) {
            break;
        }
        t /= t_norm;
        r /= t_norm;

        let loading = xc.tr_mul(&t);
        let q = yc.dot(&t);

        // orthonormal basis of the loadings (modified Gram-Schmidt)
        let mut v = loading;
        for vb in &v_basis {
            let proj = vb.dot(&v);
            v -= vb * proj;
        }
        let v_norm = v.norm();
        if !(v_norm > 0.0) {
            break;
        }
        v /= v_norm;

        let proj = v.dot(&s);
        s -= &v * proj;

        r_cols.push(r);
        q_vals.push(q);
        v_basis.push(v);
    }

    let weights = if r_cols.is_empty() {
        DMatrix::zeros(p, 0)
    } else {
        DMatrix::from_columns(&r_cols)
    };
    (weights, DVector::from_vec(q_vals))
}

/// SIMPLS fit with `n_components` components.
pub fn fit_simpls(x: &DMatrix<f64>, y: &DVector<f64>, n_components: usize) -> Result<RegressionFit> {
    Ok(SimplsBasis::new(x, y, None, n_components)?.fit(n_components))
}

/// Choose the component count in `1..=max_components` minimising the
/// K-fold cross-validated RMSEP. Folds are contiguous blocks of rows.
///
/// Returns `(components, rmsep)`; ties keep the smaller count.
pub fn select_components(x: &DMatrix<f64>, y: &DVector<f64>, max_components: usize, folds: usize) -> Result<(usize, f64)> {
    let n = x.nrows();
    if folds < 2 || n < 2 * folds {
        return Err(DeconvError::configuration(
            COMPONENT,
            format!("{} folds need at least {} regions, got {}", folds, 2 * folds, n),
        ));
    }
    let max_components = max_components.max(1);
    let mut sq_error = vec![0.0; max_components];

    for test in chunk_ranges(n, folds) {
        let train: Vec<usize> = (0..n).filter(|i| !test.contains(i)).collect();
        let x_train = x.select_rows(&train);
        let y_train = DVector::from_iterator(train.len(), train.iter().map(|&i| y[i]));
        let basis = SimplsBasis::new(&x_train, &y_train, None, max_components)?;

        let test_rows: Vec<usize> = test.collect();
        let x_test = x.select_rows(&test_rows);
        for (a, err) in sq_error.iter_mut().enumerate() {
            let pred = basis.fit(a + 1).predict(&x_test);
            *err += test_rows
                .iter()
                .zip(pred.iter())
                .map(|(&i, p)| (y[i] - p).powi(2))
                .sum::<f64>();
        }
    }

    let (best, err) = sq_error
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |acc, (a, &e)| if e < acc.1 { (a, e) } else { acc });
    Ok((best + 1, (err / n as f64).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn signature() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            8,
            3,
            &[
                90.0, 5.0, 3.0, //
                80.0, 4.0, 6.0, //
                70.0, 8.0, 2.0, //
                4.0, 85.0, 5.0, //
                6.0, 75.0, 4.0, //
                3.0, 6.0, 95.0, //
                5.0, 2.0, 65.0, //
                9.0, 7.0, 8.0, //
            ],
        )
    }

    #[test]
    fn test_full_components_recover_exact_mixture() {
        let x = signature();
        let w = DVector::from_vec(vec![0.5, 0.3, 0.2]);
        let y = &x * &w;
        let fit = fit_simpls(&x, &y, 3).unwrap();
        for j in 0..3 {
            assert_relative_eq!(fit.coefficients[j], w[j], epsilon = 1e-6);
        }
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-6);
        let (r2, rmse) = fit.diagnostics(&x, &y);
        assert_relative_eq!(r2, 1.0, epsilon = 1e-10);
        assert!(rmse < 1e-8);
    }

    #[test]
    fn test_full_components_match_least_squares_with_intercept() {
        let x = signature();
        let y = DVector::from_vec(vec![50.0, 44.0, 41.0, 30.0, 27.0, 25.0, 19.0, 9.0]);
        let fit = fit_simpls(&x, &y, 3).unwrap();

        // OLS with intercept through the normal equations
        let mut xi = DMatrix::from_element(8, 4, 1.0);
        xi.columns_mut(1, 3).copy_from(&x);
        let beta = (xi.transpose() * &xi).try_inverse().unwrap() * xi.transpose() * &y;
        assert_relative_eq!(fit.intercept, beta[0], epsilon = 1e-6);
        for j in 0..3 {
            assert_relative_eq!(fit.coefficients[j], beta[j + 1], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_components_are_nested() {
        let x = signature();
        let y = DVector::from_vec(vec![50.0, 44.0, 41.0, 30.0, 27.0, 25.0, 19.0, 9.0]);
        let basis = SimplsBasis::new(&x, &y, None, 3).unwrap();
        let (r1, _) = basis.fit(1).diagnostics(&x, &y);
        let (r3, _) = basis.fit(3).diagnostics(&x, &y);
        assert!(r3 >= r1 - 1e-12);
        assert_eq!(basis.fit(10).n_components, basis.n_components());
    }

    #[test]
    fn test_constant_response_gives_zero_components() {
        let x = signature();
        let y = DVector::from_element(8, 7.0);
        let fit = fit_simpls(&x, &y, 3).unwrap();
        assert_eq!(fit.n_components, 0);
        assert_relative_eq!(fit.intercept, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_validation_prefers_full_model_on_exact_mixture() {
        let x = signature();
        let y = &x * DVector::from_vec(vec![0.2, 0.2, 0.6]);
        let (a, rmsep) = select_components(&x, &y, 3, 4).unwrap();
        assert_eq!(a, 3);
        assert!(rmsep < 1e-6);
        assert!(select_components(&x, &y, 3, 5).is_err());
    }
}
