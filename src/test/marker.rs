//! Contrast-based marker test.
//!
//! Every region is fitted against the group design; each ordered contrast
//! `source - target` gets a one-sided upper-tail t-test, and the p-value of a
//! group is the largest p-value among the contrasts where it is the source.
//! A region is therefore a marker of group g only when g exceeds every other
//! group.

use crate::data::{ContrastSet, DesignMatrix, GroupMatrix, PValueMatrix, Profile};
use crate::error::{DeconvError, Result};
use crate::model::{GroupFit, GroupModel};
use crate::parallel::map_chunks;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Statistics of one contrast for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastStat {
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub df: f64,
    pub p_value: f64,
}

/// Test all regions of `profile` and collapse to one p-value per group.
///
/// Regions are split into `n_workers` contiguous chunks; the output does not
/// depend on the worker count.
pub fn test_markers(
    profile: &Profile,
    design: &DesignMatrix,
    contrasts: &ContrastSet,
    n_workers: usize,
) -> Result<PValueMatrix> {
    if profile.sample_ids() != design.sample_ids() {
        return Err(DeconvError::data_mismatch(
            "MarkerTestEngine",
            "profile samples and design samples differ in content or order",
        ));
    }
    if contrasts.n_groups() != design.n_groups() {
        return Err(DeconvError::data_mismatch(
            "MarkerTestEngine",
            format!(
                "contrast set covers {} groups but design has {}",
                contrasts.n_groups(),
                design.n_groups()
            ),
        ));
    }

    let model = GroupModel::new(design)?;
    let n_groups = design.n_groups();

    let rows: Vec<Vec<f64>> = map_chunks(profile.n_regions(), n_workers, |range| {
        Ok(range
            .map(|i| {
                let y = DVector::from_iterator(profile.n_samples(), profile.matrix().row(i).iter().copied());
                let fit = model.fit(&y);
                collapse(&contrast_stats(&fit, contrasts), contrasts, n_groups)
            })
            .collect())
    })?;

    let values = DMatrix::from_fn(rows.len(), n_groups, |i, g| rows[i][g]);
    GroupMatrix::new(values, profile.region_ids().to_vec(), design.group_names().to_vec())
}

/// One-sided statistics for every contrast of a fitted region.
pub fn contrast_stats(fit: &GroupFit, contrasts: &ContrastSet) -> Vec<ContrastStat> {
    let c = contrasts.matrix();
    let estimates = c * &fit.coefficients;
    let cv = c * &fit.covariance;

    contrasts
        .contrasts()
        .iter()
        .enumerate()
        .map(|(row, contrast)| {
            let variance = cv.row(row).dot(&c.row(row));
            let df = contrast.n_samples - 2.0;
            let std_error = (variance / df).sqrt();
            let estimate = estimates[row];
            let statistic = estimate / std_error;
            ContrastStat {
                estimate,
                std_error,
                statistic,
                df,
                p_value: upper_tail_p(statistic, std_error, df),
            }
        })
        .collect()
}

/// `P(T > t)` for Student's t with `df` degrees of freedom; degenerate input
/// gives 1.0.
pub fn upper_tail_p(statistic: f64, std_error: f64, df: f64) -> f64 {
    if !statistic.is_finite() || !(std_error > 0.0) || !(df > 0.0) {
        return 1.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => {
            let p = dist.cdf(-statistic);
            if p.is_finite() {
                p.clamp(0.0, 1.0)
            } else {
                1.0
            }
        }
        Err(_) => 1.0,
    }
}

fn collapse(stats: &[ContrastStat], contrasts: &ContrastSet, n_groups: usize) -> Vec<f64> {
    (0..n_groups)
        .map(|g| {
            contrasts
                .for_source(g)
                .map(|row| stats[row].p_value)
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .map(|p| if p.is_finite() { p } else { 1.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Phenotype, RegionId};
    use approx::assert_relative_eq;

    fn setup(rows: Vec<Vec<f64>>, labels: &[&str]) -> (Profile, DesignMatrix, ContrastSet) {
        let samples: Vec<String> = (0..labels.len()).map(|j| format!("s{}", j)).collect();
        let regions = (0..rows.len()).map(|i| RegionId::named(&format!("r{}", i))).collect();
        let profile = Profile::from_rows(&rows, regions, samples.clone()).unwrap();
        let pheno = Phenotype::from_labels(samples, labels).unwrap();
        let design = DesignMatrix::from_phenotype(&pheno).unwrap();
        let contrasts = ContrastSet::from_design(&design);
        (profile, design, contrasts)
    }

    #[test]
    fn test_marker_region_gets_small_p_for_its_group() {
        let (profile, design, contrasts) = setup(
            vec![vec![100.0, 104.0, 10.0, 12.0, 9.0, 11.0]],
            &["A", "A", "B", "B", "C", "C"],
        );
        let p = test_markers(&profile, &design, &contrasts, 1).unwrap();
        let a = design.group_names().iter().position(|g| g == "A").unwrap();
        assert!(p.get(0, a) < 0.01);
        for g in (0..3).filter(|&g| g != a) {
            assert!(p.get(0, g) > 0.5);
        }
    }

    #[test]
    fn test_known_contrast_statistic() {
        // A = [3, 5], B = [1, 3]: diff 2; sigma = 1 each; V_gg = 1 * 1 / 2
        // se = sqrt((0.5 + 0.5) / (4 - 2)), t = 2 / sqrt(0.5)
        let (profile, design, contrasts) = setup(vec![vec![3.0, 5.0, 1.0, 3.0]], &["A", "A", "B", "B"]);
        let model = GroupModel::new(&design).unwrap();
        let fit = model.fit(&DVector::from_vec(profile.row(0)));
        let stats = contrast_stats(&fit, &contrasts);
        let a_minus_b = &stats[0];
        assert_relative_eq!(a_minus_b.estimate, 2.0, epsilon = 1e-12);
        assert_relative_eq!(a_minus_b.std_error, 0.5f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(a_minus_b.df, 2.0);

        let expected = StudentsT::new(0.0, 1.0, 2.0).unwrap().cdf(-2.0 / 0.5f64.sqrt());
        assert_relative_eq!(a_minus_b.p_value, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_region_gets_p_one() {
        let (profile, design, contrasts) =
            setup(vec![vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0]], &["A", "A", "B", "B", "C", "C"]);
        let p = test_markers(&profile, &design, &contrasts, 1).unwrap();
        for g in 0..3 {
            assert_eq!(p.get(0, g), 1.0);
        }
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let rows: Vec<Vec<f64>> = (0..57)
            .map(|i| {
                let x = i as f64;
                vec![x, x * 1.1 + 1.0, (x * 0.7).sin() * 10.0 + 20.0, 15.0 - x * 0.1, x * x * 0.01, 3.0]
            })
            .collect();
        let (profile, design, contrasts) = setup(rows, &["A", "A", "B", "B", "C", "C"]);

        let base = test_markers(&profile, &design, &contrasts, 1).unwrap();
        for workers in [2, 4] {
            let other = test_markers(&profile, &design, &contrasts, workers).unwrap();
            for i in 0..base.n_regions() {
                for g in 0..base.n_groups() {
                    assert!((base.get(i, g) - other.get(i, g)).abs() <= 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_misaligned_samples_rejected() {
        let (profile, _, _) = setup(vec![vec![1.0, 2.0, 3.0, 4.0]], &["A", "A", "B", "B"]);
        let pheno = Phenotype::from_labels(
            vec!["x0".into(), "x1".into(), "x2".into(), "x3".into()],
            &["A", "A", "B", "B"],
        )
        .unwrap();
        let design = DesignMatrix::from_phenotype(&pheno).unwrap();
        let contrasts = ContrastSet::from_design(&design);
        assert!(matches!(
            test_markers(&profile, &design, &contrasts, 1),
            Err(DeconvError::DataMismatch { .. })
        ));
    }
}
