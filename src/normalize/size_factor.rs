//! Per-sample size factors: DESeq median-of-ratios and upper-quantile scaling.
//!
//! Both methods divide each column by a single factor, so the relative order
//! of regions inside a sample never changes.

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use crate::stats::{median, quantile};
use nalgebra::DMatrix;

/// Quantile used by upper-quantile normalization.
pub const UPPER_QUANTILE: f64 = 0.75;

/// DESeq size factors computed on `ln(x + 1)`.
///
/// The pseudo-reference for a region is the mean of its log values; the
/// factor for a sample is `exp` of the median log ratio to that reference.
pub fn deseq_factors(profile: &Profile) -> Result<Vec<f64>> {
    super::check_counts(profile, "deseq")?;

    let logged = profile.matrix().map(|v| (v + 1.0).ln());
    let n_samples = logged.ncols();
    let reference: Vec<f64> = logged
        .row_iter()
        .map(|row| row.sum() / n_samples as f64)
        .collect();

    let factors: Vec<f64> = (0..n_samples)
        .map(|j| {
            let mut ratios: Vec<f64> = logged
                .column(j)
                .iter()
                .zip(&reference)
                .map(|(v, r)| v - r)
                .collect();
            median(&mut ratios).exp()
        })
        .collect();

    Ok(factors)
}

/// Divide each column by its DESeq size factor.
pub fn norm_deseq(profile: &Profile) -> Result<Profile> {
    let factors = deseq_factors(profile)?;
    scale_columns(profile, &factors, "deseq")
}

/// Upper-quantile factors: the 75th percentile of each column's proportions,
/// divided by the geometric mean of those percentiles.
pub fn upper_quantile_factors(profile: &Profile) -> Result<Vec<f64>> {
    super::check_counts(profile, "upper_quantile")?;

    let library_sizes = profile.col_sums();
    let mut uq = Vec::with_capacity(profile.n_samples());
    for (j, &lib) in library_sizes.iter().enumerate() {
        if lib <= 0.0 {
            return Err(DeconvError::numerical(
                "upper_quantile",
                format!("sample '{}' has zero total signal", profile.sample_ids()[j]),
            ));
        }
        let mut proportions: Vec<f64> = profile.matrix().column(j).iter().map(|v| v / lib).collect();
        let q = quantile(&mut proportions, UPPER_QUANTILE);
        if q <= 0.0 {
            return Err(DeconvError::numerical(
                "upper_quantile",
                format!(
                    "sample '{}' has a zero upper quantile; too few non-zero regions",
                    profile.sample_ids()[j]
                ),
            ));
        }
        uq.push(q);
    }

    let geo_mean = (uq.iter().map(|q| q.ln()).sum::<f64>() / uq.len() as f64).exp();
    Ok(uq.into_iter().map(|q| q / geo_mean).collect())
}

/// Divide each column by its upper-quantile factor.
pub fn norm_upper_quantile(profile: &Profile) -> Result<Profile> {
    let factors = upper_quantile_factors(profile)?;
    scale_columns(profile, &factors, "upper_quantile")
}

fn scale_columns(profile: &Profile, factors: &[f64], component: &str) -> Result<Profile> {
    if let Some(j) = factors.iter().position(|f| !f.is_finite() || *f <= 0.0) {
        return Err(DeconvError::numerical(
            component,
            format!("invalid size factor for sample '{}'", profile.sample_ids()[j]),
        ));
    }
    let m = profile.matrix();
    let data = DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] / factors[j]);
    profile.with_matrix(data)
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
    fn test_deseq_identical_columns_unit_factors() {
        let p = profile(vec![vec![4.0, 4.0], vec![9.0, 9.0], vec![0.0, 0.0]]);
        let factors = deseq_factors(&p).unwrap();
        for f in factors {
            assert_relative_eq!(f, 1.0, epsilon = 1e-12);
        }
        let norm = norm_deseq(&p).unwrap();
        assert_relative_eq!(norm.get(1, 0), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_deseq_known_factors() {
        // ln(x+1) rows [ln 2, ln 8] and [ln 4, ln 16]; every log ratio is -ln 2 or +ln 2
        let p = profile(vec![vec![1.0, 7.0], vec![3.0, 15.0]]);
        let factors = deseq_factors(&p).unwrap();
        assert_relative_eq!(factors[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(factors[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_upper_quantile_factors_geometric_mean_one() {
        let p = profile(vec![
            vec![1.0, 2.0, 3.0],
            vec![2.0, 6.0, 3.0],
            vec![3.0, 5.0, 9.0],
            vec![4.0, 1.0, 2.0],
            vec![5.0, 3.0, 1.0],
        ]);
        let factors = upper_quantile_factors(&p).unwrap();
        let log_sum: f64 = factors.iter().map(|f| f.ln()).sum();
        assert_relative_eq!(log_sum, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_upper_quantile_scaled_column_matches() {
        // scaling a column does not change its proportions
        let p = profile(vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0], vec![4.0, 40.0]]);
        let factors = upper_quantile_factors(&p).unwrap();
        assert_relative_eq!(factors[0], factors[1], epsilon = 1e-12);
    }

    #[test]
    fn test_upper_quantile_sparse_column_rejected() {
        let p = profile(vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 5.0],
        ]);
        assert!(matches!(norm_upper_quantile(&p), Err(DeconvError::Numerical { .. })));
    }
}
