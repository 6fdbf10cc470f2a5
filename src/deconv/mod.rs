//! Regression-based deconvolution of mixture samples against a signature.
//!
//! Three regressors are available:
//!
//! - **simpls**: SIMPLS partial least squares on centered data, with a fixed
//!   or cross-validated number of components
//! - **robust_simpls**: SIMPLS refitted with Huber weights until the
//!   coefficients stabilise
//! - **least_squares**: ordinary least squares without intercept
//!
//! Each sample is fitted independently; see [`engine::deconvolve`].

pub mod engine;
pub mod least_squares;
pub mod robust;
pub mod significance;
pub mod simpls;

pub use engine::{deconvolve, deconvolve_sample, intersect, Intersection};
pub use least_squares::fit_least_squares;
pub use robust::{fit_robust_simpls, RobustConfig};
pub use significance::permutation_p_value;
pub use simpls::{fit_simpls, select_components, SimplsBasis};

use crate::error::{DeconvError, Result};
use crate::normalize::NormMethod;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression method used per mixture sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeconvMethod {
    #[default]
    Simpls,
    RobustSimpls,
    LeastSquares,
}

impl DeconvMethod {
    pub fn name(self) -> &'static str {
        match self {
            DeconvMethod::Simpls => "simpls",
            DeconvMethod::RobustSimpls => "robust_simpls",
            DeconvMethod::LeastSquares => "least_squares",
        }
    }
}

impl fmt::Display for DeconvMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeconvMethod {
    type Err = DeconvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simpls" | "pls" => Ok(DeconvMethod::Simpls),
            "robust_simpls" | "rsimpls" => Ok(DeconvMethod::RobustSimpls),
            "least_squares" | "lr" | "ols" => Ok(DeconvMethod::LeastSquares),
            other => Err(DeconvError::configuration(
                "DeconvolutionEngine",
                format!(
                    "unknown deconvolution method '{}' (expected simpls, robust_simpls or least_squares)",
                    other
                ),
            )),
        }
    }
}

/// Post-processing applied to raw regression coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Report coefficients as fitted.
    #[default]
    None,
    /// Clamp negative coefficients to zero.
    NonNegative,
    /// Clamp to zero, then rescale to sum to one.
    Simplex,
}

impl Constraint {
    pub fn apply(self, coefficients: &[f64]) -> Vec<f64> {
        match self {
            Constraint::None => coefficients.to_vec(),
            Constraint::NonNegative => coefficients.iter().map(|c| c.max(0.0)).collect(),
            Constraint::Simplex => {
                let clamped: Vec<f64> = coefficients.iter().map(|c| c.max(0.0)).collect();
                let total: f64 = clamped.iter().sum();
                if total > 0.0 {
                    clamped.into_iter().map(|c| c / total).collect()
                } else {
                    clamped
                }
            }
        }
    }
}

impl FromStr for Constraint {
    type Err = DeconvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Constraint::None),
            "non_negative" | "nonnegative" | "nn" => Ok(Constraint::NonNegative),
            "simplex" => Ok(Constraint::Simplex),
            other => Err(DeconvError::configuration(
                "DeconvolutionEngine",
                format!("unknown constraint '{}' (expected none, non_negative or simplex)", other),
            )),
        }
    }
}

/// Deconvolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvConfig {
    pub method: DeconvMethod,
    pub constraint: Constraint,
    /// PLS components; `None` uses one per cell type.
    pub n_components: Option<usize>,
    /// Choose the component count by K-fold cross-validation RMSEP.
    pub cv_folds: Option<usize>,
    /// Estimate a permutation p-value per sample.
    pub p_value: bool,
    pub n_permutations: usize,
    pub seed: u64,
    /// Normalize the mixture before regression.
    pub normalization: Option<NormMethod>,
    pub robust: RobustConfig,
    /// Smallest accepted ratio of the extreme singular values of the signature.
    pub rank_tolerance: f64,
    pub threads: usize,
}

impl Default for DeconvConfig {
    fn default() -> Self {
        Self {
            method: DeconvMethod::Simpls,
            constraint: Constraint::None,
            n_components: None,
            cv_folds: None,
            p_value: false,
            n_permutations: 100,
            seed: 42,
            normalization: None,
            robust: RobustConfig::default(),
            rank_tolerance: 1e-10,
            threads: 1,
        }
    }
}

impl DeconvConfig {
    pub fn validate(&self) -> Result<()> {
        const C: &str = "DeconvolutionEngine";
        if self.threads == 0 {
            return Err(DeconvError::configuration(C, "threads must be at least 1"));
        }
        if self.n_components == Some(0) {
            return Err(DeconvError::configuration(C, "n_components must be at least 1"));
        }
        if let Some(folds) = self.cv_folds {
            if folds < 2 {
                return Err(DeconvError::configuration(
                    C,
                    format!("cv_folds must be at least 2, got {}", folds),
                ));
            }
            if self.method == DeconvMethod::LeastSquares {
                return Err(DeconvError::configuration(
                    C,
                    "cross-validated component selection applies to SIMPLS methods only",
                ));
            }
        }
        if self.p_value && self.n_permutations == 0 {
            return Err(DeconvError::configuration(C, "n_permutations must be at least 1"));
        }
        if !(self.rank_tolerance >= 0.0 && self.rank_tolerance < 1.0) {
            return Err(DeconvError::configuration(C, "rank_tolerance must be in [0, 1)"));
        }
        self.robust.validate()
    }
}

/// Linear fit `y ~ intercept + X b` of one sample.
#[derive(Debug, Clone)]
pub struct RegressionFit {
    pub coefficients: DVector<f64>,
    pub intercept: f64,
    pub n_components: usize,
}

impl RegressionFit {
    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        (x * &self.coefficients).add_scalar(self.intercept)
    }

    /// `(R², RMSE)` of the fit on `(x, y)`.
    pub fn diagnostics(&self, x: &DMatrix<f64>, y: &DVector<f64>) -> (f64, f64) {
        let residuals = y - self.predict(x);
        let rss = residuals.norm_squared();
        let n = y.len() as f64;
        let y_mean = y.mean();
        let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
        (r_squared, (rss / n).sqrt())
    }
}

/// Fit one sample with the configured method and component count.
pub fn fit_method(
    method: DeconvMethod,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    n_components: usize,
    robust: &RobustConfig,
) -> Result<RegressionFit> {
    match method {
        DeconvMethod::Simpls => fit_simpls(x, y, n_components),
        DeconvMethod::RobustSimpls => fit_robust_simpls(x, y, n_components, robust),
        DeconvMethod::LeastSquares => fit_least_squares(x, y),
    }
}
