//! Trimmed Mean of M-values (TMM) normalization.
//!
//! TMM estimates one scaling factor per sample relative to a reference
//! sample, robust to a minority of regions carrying most of the difference
//! between samples.
//!
//! # Algorithm
//!
//! 1. Select a reference sample: the one whose upper quartile of proportions
//!    is closest to the mean upper quartile
//! 2. For each sample, compute M-values (log2 ratio of proportions) and
//!    A-values (mean log2 proportion) for regions observed in both samples
//! 3. Trim extreme values (default: 30% for M, 5% for A)
//! 4. The factor is 2 to the precision-weighted mean of the remaining M-values
//!
//! Factors are rescaled to a geometric mean of one and every column is
//! divided by its factor.
//!
//! # Reference
//!
//! Robinson MD, Oshlack A. A scaling normalization method for differential
//! expression analysis of RNA-seq data. Genome Biology 11, R25 (2010).

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use crate::stats::{cmp_f64, quantile};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Configuration for TMM normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmmConfig {
    /// Fraction of M-values to trim from each tail.
    pub trim_m: f64,
    /// Fraction of A-values to trim from each tail.
    pub trim_a: f64,
    /// Regions below this value in either sample are ignored.
    pub min_value: f64,
    /// Reference sample index (None = auto-select).
    pub reference_sample: Option<usize>,
}

impl Default for TmmConfig {
    fn default() -> Self {
        Self {
            trim_m: 0.30,
            trim_a: 0.05,
            min_value: f64::MIN_POSITIVE,
            reference_sample: None,
        }
    }
}

impl TmmConfig {
    pub fn validate(&self, n_samples: usize) -> Result<()> {
        if !(0.0..0.5).contains(&self.trim_m) {
            return Err(DeconvError::configuration("tmm", "trim_m must be in [0, 0.5)"));
        }
        if !(0.0..0.5).contains(&self.trim_a) {
            return Err(DeconvError::configuration("tmm", "trim_a must be in [0, 0.5)"));
        }
        if let Some(r) = self.reference_sample {
            if r >= n_samples {
                return Err(DeconvError::configuration(
                    "tmm",
                    format!("reference sample index {} out of bounds (n_samples = {})", r, n_samples),
                ));
            }
        }
        Ok(())
    }
}

/// Apply TMM normalization with default parameters.
pub fn norm_tmm(profile: &Profile) -> Result<Profile> {
    norm_tmm_with_config(profile, &TmmConfig::default())
}

pub fn norm_tmm_with_config(profile: &Profile, config: &TmmConfig) -> Result<Profile> {
    let factors = tmm_factors_with_config(profile, config)?;
    let m = profile.matrix();
    let data = DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] / factors[j]);
    profile.with_matrix(data)
}

/// TMM factors with default parameters, rescaled to geometric mean one.
pub fn tmm_factors(profile: &Profile) -> Result<Vec<f64>> {
    tmm_factors_with_config(profile, &TmmConfig::default())
}

pub fn tmm_factors_with_config(profile: &Profile, config: &TmmConfig) -> Result<Vec<f64>> {
    super::check_counts(profile, "tmm")?;
    let n_samples = profile.n_samples();
    config.validate(n_samples)?;

    let library_sizes = profile.col_sums();
    for (j, &lib_size) in library_sizes.iter().enumerate() {
        if lib_size <= 0.0 {
            return Err(DeconvError::numerical(
                "tmm",
                format!("sample '{}' has zero total signal", profile.sample_ids()[j]),
            ));
        }
    }

    let ref_idx = config
        .reference_sample
        .unwrap_or_else(|| select_reference_sample(profile, &library_sizes));

    let raw: Vec<f64> = (0..n_samples)
        .map(|j| {
            if j == ref_idx {
                1.0
            } else {
                sample_factor(profile, j, ref_idx, &library_sizes, config)
            }
        })
        .collect();

    let log_mean = raw.iter().map(|f| f.ln()).sum::<f64>() / n_samples as f64;
    let scale = log_mean.exp();
    Ok(raw.into_iter().map(|f| f / scale).collect())
}

/// Sample whose upper quartile of proportions is closest to the mean.
fn select_reference_sample(profile: &Profile, library_sizes: &[f64]) -> usize {
    let upper_quartiles: Vec<f64> = (0..profile.n_samples())
        .map(|j| {
            let mut proportions: Vec<f64> = profile
                .matrix()
                .column(j)
                .iter()
                .map(|v| v / library_sizes[j])
                .collect();
            quantile(&mut proportions, 0.75)
        })
        .collect();

    let mean_uq = upper_quartiles.iter().sum::<f64>() / upper_quartiles.len() as f64;

    upper_quartiles
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| cmp_f64(&(*a - mean_uq).abs(), &(*b - mean_uq).abs()))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn sample_factor(
    profile: &Profile,
    sample_idx: usize,
    ref_idx: usize,
    library_sizes: &[f64],
    config: &TmmConfig,
) -> f64 {
    let sample_lib = library_sizes[sample_idx];
    let ref_lib = library_sizes[ref_idx];

    // (M, A, weight)
    let mut ma_values: Vec<(f64, f64, f64)> = Vec::new();
    for i in 0..profile.n_regions() {
        let y_s = profile.get(i, sample_idx);
        let y_r = profile.get(i, ref_idx);
        if y_s < config.min_value || y_r < config.min_value {
            continue;
        }

        let prop_s = y_s / sample_lib;
        let prop_r = y_r / ref_lib;
        let m = (prop_s / prop_r).log2();
        let a = 0.5 * (prop_s * prop_r).log2();

        // inverse of the delta-method variance of M
        let var_m = (sample_lib - y_s) / (sample_lib * y_s) + (ref_lib - y_r) / (ref_lib * y_r);
        let weight = if var_m > 0.0 { 1.0 / var_m } else { 0.0 };

        if m.is_finite() && a.is_finite() && weight > 0.0 {
            ma_values.push((m, a, weight));
        }
    }

    if ma_values.is_empty() {
        return 1.0;
    }

    ma_values.sort_by(|x, y| cmp_f64(&x.0, &y.0));
    let kept = trim(&ma_values, config.trim_m);

    let mut by_a = kept.to_vec();
    by_a.sort_by(|x, y| cmp_f64(&x.1, &y.1));
    let kept = trim(&by_a, config.trim_a);

    let sum_weights: f64 = kept.iter().map(|(_, _, w)| w).sum();
    if kept.is_empty() || sum_weights <= 0.0 {
        return 1.0;
    }
    let weighted_m: f64 = kept.iter().map(|(m, _, w)| m * w).sum::<f64>() / sum_weights;
    2.0_f64.powf(weighted_m)
}

fn trim<T>(sorted: &[T], fraction: f64) -> &[T] {
    let n = sorted.len();
    let cut = (n as f64 * fraction) as usize;
    if 2 * cut < n {
        &sorted[cut..n - cut]
    } else {
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RegionId;
    use approx::assert_relative_eq;

    fn profile(rows: Vec<Vec<f64>>) -> Profile {
        let n = rows[0].len();
        let regions = (0..rows.len()).map(|i| RegionId::named(&format!("r{}", i))).collect();
        let samples = (0..n).map(|j| format!("s{}", j)).collect();
        Profile::from_rows(&rows, regions, samples).unwrap()
    }

    #[test]
    fn test_factors_have_unit_geometric_mean() {
        let p = profile(vec![
            vec![10.0, 25.0, 12.0],
            vec![20.0, 35.0, 18.0],
            vec![30.0, 80.0, 40.0],
            vec![40.0, 70.0, 35.0],
            vec![50.0, 110.0, 60.0],
        ]);
        let factors = tmm_factors(&p).unwrap();
        let log_sum: f64 = factors.iter().map(|f| f.ln()).sum();
        assert_relative_eq!(log_sum, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_scaled_copy_gets_identical_factor() {
        // sample 1 is sample 0 times three: proportions match, so M = 0
        let p = profile(vec![
            vec![10.0, 30.0],
            vec![20.0, 60.0],
            vec![5.0, 15.0],
            vec![65.0, 195.0],
        ]);
        let factors = tmm_factors(&p).unwrap();
        assert_relative_eq!(factors[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(factors[1], 1.0, epsilon = 1e-10);

        let norm = norm_tmm(&p).unwrap();
        assert_relative_eq!(norm.get(0, 1), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_composition_shift_detected() {
        // region 0 dominates sample 1; the remaining regions are equal
        let mut rows: Vec<Vec<f64>> = (0..20).map(|i| vec![10.0 + i as f64, 10.0 + i as f64]).collect();
        rows[0][1] = 2000.0;
        let p = profile(rows);
        let factors = tmm_factors(&p).unwrap();
        assert!(factors[1] < factors[0]);
    }

    #[test]
    fn test_invalid_trim_rejected() {
        let p = profile(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let config = TmmConfig {
            trim_m: 0.6,
            ..Default::default()
        };
        assert!(matches!(
            norm_tmm_with_config(&p, &config),
            Err(DeconvError::Configuration { .. })
        ));
    }
}
