//! Robust SIMPLS via iteratively reweighted fits with Huber weights.

use super::simpls::SimplsBasis;
use super::RegressionFit;
use crate::error::{DeconvError, Result};
use crate::stats::mad;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Consistency constant turning the MAD into a normal-scale estimate.
const MAD_SCALE: f64 = 0.6745;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustConfig {
    /// Huber tuning constant on the standardized residual scale.
    pub huber_k: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest coefficient change.
    pub tolerance: f64,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            huber_k: 1.345,
            max_iter: 50,
            tolerance: 1e-8,
        }
    }
}

impl RobustConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.huber_k > 0.0) {
            return Err(DeconvError::configuration("RobustSimpls", "huber_k must be positive"));
        }
        if self.max_iter == 0 {
            return Err(DeconvError::configuration("RobustSimpls", "max_iter must be at least 1"));
        }
        if !(self.tolerance > 0.0) {
            return Err(DeconvError::configuration("RobustSimpls", "tolerance must be positive"));
        }
        Ok(())
    }
}

/// Huber weight of a standardized residual.
fn huber_weight(u: f64, k: f64) -> f64 {
    let a = u.abs();
    if a <= k {
        1.0
    } else {
        k / a
    }
}

/// Fit SIMPLS, then refit with Huber weights on MAD-scaled residuals until
/// the coefficients change by less than the tolerance.
pub fn fit_robust_simpls(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    n_components: usize,
    config: &RobustConfig,
) -> Result<RegressionFit> {
    let n = x.nrows();
    let mut weights = DVector::from_element(n, 1.0);
    let mut fit = SimplsBasis::new(x, y, None, n_components)?.fit(n_components);

    for _ in 0..config.max_iter {
        let residuals = y - fit.predict(x);
        let r: Vec<f64> = residuals.iter().copied().collect();
        let scale = mad(&r) / MAD_SCALE;
        if !(scale > 0.0) || !scale.is_finite() {
            break;
        }
        for (w, res) in weights.iter_mut().zip(residuals.iter()) {
            *w = huber_weight(res / scale, config.huber_k);
        }

        let next = SimplsBasis::new(x, y, Some(&weights), n_components)?.fit(n_components);
        let change = (&next.coefficients - &fit.coefficients).amax();
        fit = next;
        if change < config.tolerance {
            break;
        }
    }

    Ok(fit)
}
