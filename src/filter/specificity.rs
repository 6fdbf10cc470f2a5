//! Cell-type specificity scoring of tested regions.
//!
//! Each region is attributed to the cell type with the smallest q-value (its
//! "top" group). The region survives when the top group's merged signal
//! dominates every other group by the configured ratio and its specificity
//! score `-log10(q_min) * log2(top / mean(others))` reaches the cutoff.

use crate::data::{Profile, QValueMatrix, RegionId};
use crate::error::{DeconvError, Result};
use crate::stats::cmp_f64;
use serde::{Deserialize, Serialize};

/// Thresholds for [`filter_specific_regions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreFilterConfig {
    /// Minimum specificity score.
    pub pi_score_cutoff: f64,
    /// The top group must satisfy `top * ratio_cutoff > max(others)`.
    pub ratio_cutoff: f64,
}

impl Default for ScoreFilterConfig {
    fn default() -> Self {
        Self {
            pi_score_cutoff: 1.0,
            ratio_cutoff: 0.33,
        }
    }
}

impl ScoreFilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.pi_score_cutoff.is_finite() {
            return Err(DeconvError::configuration("ScoreFilter", "pi_score_cutoff must be finite"));
        }
        if !(self.ratio_cutoff.is_finite() && self.ratio_cutoff > 0.0) {
            return Err(DeconvError::configuration(
                "ScoreFilter",
                format!("ratio_cutoff must be positive, got {}", self.ratio_cutoff),
            ));
        }
        Ok(())
    }
}

/// A region annotated with its specificity statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRegion {
    /// Row index in the scored profile.
    pub index: usize,
    pub region_id: RegionId,
    /// Merged signal per cell type.
    pub values: Vec<f64>,
    /// Cell type with the smallest q-value.
    pub top_index: usize,
    pub fold_change: f64,
    pub ambiguous: bool,
    pub neg_log10_q: f64,
    pub score: f64,
}

impl ScoredRegion {
    fn passes(&self, config: &ScoreFilterConfig) -> bool {
        !self.ambiguous && !self.score.is_nan() && self.score >= config.pi_score_cutoff
    }
}

/// Score every region of `merged` (regions x cell types) against `qvalues`.
///
/// Both inputs must share region order and cell-type order.
pub fn score_regions(merged: &Profile, qvalues: &QValueMatrix, config: &ScoreFilterConfig) -> Result<Vec<ScoredRegion>> {
    check_alignment(merged, qvalues)?;
    if merged.n_samples() < 2 {
        return Err(DeconvError::configuration(
            "ScoreFilter",
            "at least two cell types are required to score specificity",
        ));
    }

    let scored = (0..merged.n_regions())
        .map(|i| score_row(i, merged, qvalues, config.ratio_cutoff))
        .collect();
    Ok(scored)
}

/// Keep non-ambiguous regions whose score reaches the cutoff, in input order.
pub fn filter_specific_regions(
    merged: &Profile,
    qvalues: &QValueMatrix,
    config: &ScoreFilterConfig,
) -> Result<Vec<ScoredRegion>> {
    config.validate()?;
    Ok(score_regions(merged, qvalues, config)?
        .into_iter()
        .filter(|r| r.passes(config))
        .collect())
}

fn score_row(i: usize, merged: &Profile, qvalues: &QValueMatrix, ratio_cutoff: f64) -> ScoredRegion {
    let q_row = qvalues.row(i);
    let values = merged.row(i);

    // first minimum on ties
    let (top_index, q_min) = q_row
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (g, q)| if q < best.1 { (g, q) } else { best });

    let top = values[top_index];
    let others: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(g, _)| *g != top_index)
        .map(|(_, v)| *v)
        .collect();
    let mean_others = others.iter().sum::<f64>() / others.len() as f64;
    let max_others = others.iter().copied().max_by(cmp_f64).unwrap_or(f64::NEG_INFINITY);

    let fold_change = (top / mean_others).log2();
    let ambiguous = !(top * ratio_cutoff > max_others);
    // q can underflow to zero for very strong markers
    let neg_log10_q = -q_min.max(f64::MIN_POSITIVE).log10();

    ScoredRegion {
        index: i,
        region_id: merged.region_ids()[i].clone(),
        values,
        top_index,
        fold_change,
        ambiguous,
        neg_log10_q,
        score: neg_log10_q * fold_change,
    }
}

fn check_alignment(merged: &Profile, qvalues: &QValueMatrix) -> Result<()> {
    if merged.n_regions() != qvalues.n_regions() || merged.region_ids() != qvalues.region_ids() {
        return Err(DeconvError::data_mismatch(
            "ScoreFilter",
            format!(
                "merged profile has {} regions but q-value matrix has {} (or region order differs)",
                merged.n_regions(),
                qvalues.n_regions()
            ),
        ));
    }
    if merged.sample_ids() != qvalues.group_names() {
        return Err(DeconvError::data_mismatch(
            "ScoreFilter",
            format!(
                "cell types differ: profile {:?}, q-values {:?}",
                merged.sample_ids(),
                qvalues.group_names()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GroupMatrix;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn inputs(values: Vec<Vec<f64>>, q: Vec<Vec<f64>>) -> (Profile, QValueMatrix) {
        let n = values.len();
        let k = values[0].len();
        let regions: Vec<RegionId> = (0..n).map(|i| RegionId::named(&format!("r{}", i))).collect();
        let cells: Vec<String> = (0..k).map(|g| format!("c{}", g)).collect();
        let merged = Profile::from_rows(&values, regions.clone(), cells.clone()).unwrap();
        let qm = DMatrix::from_fn(n, k, |i, j| q[i][j]);
        (merged, GroupMatrix::new(qm, regions, cells).unwrap())
    }

    #[test]
    fn test_score_and_fold_change() {
        let (merged, q) = inputs(vec![vec![100.0, 10.0, 10.0]], vec![vec![0.001, 0.5, 0.9]]);
        let scored = score_regions(&merged, &q, &ScoreFilterConfig::default()).unwrap();
        let r = &scored[0];
        assert_eq!(r.top_index, 0);
        assert_relative_eq!(r.fold_change, 10.0f64.log2(), epsilon = 1e-12);
        assert_relative_eq!(r.neg_log10_q, 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.score, 3.0 * 10.0f64.log2(), epsilon = 1e-12);
        assert!(!r.ambiguous);
    }

    #[test]
    fn test_ratio_polarity_keeps_dominant_top() {
        let config = ScoreFilterConfig::default();
        let (merged, q) = inputs(
            vec![
                // 100 * 0.33 = 33 > 20: specific
                vec![100.0, 20.0, 5.0],
                // 100 * 0.33 = 33 < 50: runner-up too close
                vec![100.0, 50.0, 5.0],
            ],
            vec![vec![1e-4, 0.5, 0.5], vec![1e-4, 0.5, 0.5]],
        );
        let kept = filter_specific_regions(&merged, &q, &config).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn test_exact_tie_is_ambiguous() {
        let config = ScoreFilterConfig {
            pi_score_cutoff: 0.0,
            ratio_cutoff: 0.5,
        };
        // top * ratio == max(others)
        let (merged, q) = inputs(vec![vec![40.0, 20.0, 1.0]], vec![vec![1e-6, 0.5, 0.5]]);
        let scored = score_regions(&merged, &q, &config).unwrap();
        assert!(scored[0].ambiguous);
        assert!(filter_specific_regions(&merged, &q, &config).unwrap().is_empty());

        // equal top and runner-up
        let (merged, q) = inputs(vec![vec![40.0, 40.0, 1.0]], vec![vec![1e-6, 0.5, 0.5]]);
        assert!(score_regions(&merged, &q, &config).unwrap()[0].ambiguous);
    }

    #[test]
    fn test_low_score_dropped_and_order_kept() {
        let config = ScoreFilterConfig::default();
        let (merged, q) = inputs(
            vec![
                vec![10.0, 100.0],
                vec![100.0, 10.0],
                // -log10(0.6) * log2(10) is about 0.74
                vec![100.0, 10.0],
            ],
            vec![vec![0.5, 1e-3], vec![1e-3, 0.5], vec![0.6, 0.9]],
        );
        let kept = filter_specific_regions(&merged, &q, &config).unwrap();
        let idx: Vec<usize> = kept.iter().map(|r| r.index).collect();
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(kept[0].top_index, 1);
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let (merged, _) = inputs(vec![vec![1.0, 2.0]], vec![vec![0.1, 0.2]]);
        let (_, q) = inputs(vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![vec![0.1, 0.2], vec![0.1, 0.2]]);
        assert!(matches!(
            score_regions(&merged, &q, &ScoreFilterConfig::default()),
            Err(DeconvError::DataMismatch { .. })
        ));
    }
}
