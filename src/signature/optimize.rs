//! Descending search for the per-cell-type marker count.
//!
//! For every group size S from `max_group_size` down to `min_group_size`, the
//! top S candidates of each cell type (by specificity score) are stacked into
//! a trial signature. The trial with the lowest condition number wins; a
//! later (smaller) trial only replaces the best when strictly better.

use super::condition::condition_number;
use crate::data::{Profile, SignatureMatrix};
use crate::error::{DeconvError, Result};
use crate::filter::ScoredRegion;
use crate::report::Reporter;
use crate::stats::cmp_f64;
use serde::{Deserialize, Serialize};

const COMPONENT: &str = "SignatureOptimizer";

/// Bounds of the group-size search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub min_group_size: usize,
    pub max_group_size: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_group_size: 100,
            max_group_size: 200,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_group_size == 0 {
            return Err(DeconvError::configuration(COMPONENT, "min_group_size must be at least 1"));
        }
        if self.min_group_size > self.max_group_size {
            return Err(DeconvError::configuration(
                COMPONENT,
                format!(
                    "min_group_size ({}) exceeds max_group_size ({})",
                    self.min_group_size, self.max_group_size
                ),
            ));
        }
        Ok(())
    }
}

/// One evaluated group size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeTrial {
    pub group_size: usize,
    pub n_regions: usize,
    pub condition_number: f64,
    /// Whether this trial became the best so far.
    pub accepted: bool,
}

/// Winning signature and the full trial log.
#[derive(Debug, Clone)]
pub struct OptimizedSignature {
    pub signature: SignatureMatrix,
    pub trials: Vec<SizeTrial>,
}

/// Candidate positions per cell type, best score first (stable on ties).
pub fn rank_candidates(candidates: &[ScoredRegion], n_groups: usize) -> Vec<Vec<usize>> {
    let mut ranked: Vec<Vec<usize>> = vec![Vec::new(); n_groups];
    for (pos, c) in candidates.iter().enumerate() {
        if c.top_index < n_groups {
            ranked[c.top_index].push(pos);
        }
    }
    for group in ranked.iter_mut() {
        group.sort_by(|&a, &b| cmp_f64(&candidates[b].score, &candidates[a].score));
    }
    ranked
}

/// Candidate positions of a trial: the first `size` of each group, groups in
/// cell-type order.
pub fn trial_positions(ranked: &[Vec<usize>], size: usize) -> Vec<usize> {
    ranked
        .iter()
        .flat_map(|group| group.iter().take(size).copied())
        .collect()
}

/// Run the search over `merged` (regions x cell types), whose rows the
/// candidates index.
pub fn optimize_signature(
    merged: &Profile,
    candidates: &[ScoredRegion],
    config: &OptimizerConfig,
    reporter: &dyn Reporter,
) -> Result<OptimizedSignature> {
    config.validate()?;
    let n_groups = merged.n_samples();
    if let Some(c) = candidates.iter().find(|c| c.index >= merged.n_regions()) {
        return Err(DeconvError::data_mismatch(
            COMPONENT,
            format!("candidate row {} is outside the merged profile", c.index),
        ));
    }

    let ranked = rank_candidates(candidates, n_groups);
    let candidate_counts: Vec<usize> = ranked.iter().map(Vec::len).collect();
    for (g, &n) in candidate_counts.iter().enumerate() {
        if n == 0 {
            reporter.warn(
                COMPONENT,
                &format!("cell type '{}' has no specific candidate regions", merged.sample_ids()[g]),
            );
        } else if n < config.min_group_size {
            reporter.debug(
                COMPONENT,
                &format!(
                    "cell type '{}' has only {} candidates (min group size {})",
                    merged.sample_ids()[g],
                    n,
                    config.min_group_size
                ),
            );
        }
    }

    let mut trials = Vec::with_capacity(config.max_group_size - config.min_group_size + 1);
    let mut best: Option<(usize, f64)> = None;
    let mut previous: Option<(Vec<usize>, f64)> = None;

    for size in (config.min_group_size..=config.max_group_size).rev() {
        let positions = trial_positions(&ranked, size);

        let cond = match &previous {
            // sizes above every group's candidate count select the same rows
            Some((prev, cond)) if *prev == positions => *cond,
            _ => {
                let rows: Vec<usize> = positions.iter().map(|&p| candidates[p].index).collect();
                condition_number(merged.subset_regions(&rows)?.matrix())
            }
        };

        let accepted = cond.is_finite() && best.map_or(true, |(_, b)| cond < b);
        if accepted {
            best = Some((size, cond));
        }
        trials.push(SizeTrial {
            group_size: size,
            n_regions: positions.len(),
            condition_number: cond,
            accepted,
        });
        previous = Some((positions, cond));
    }

    let (group_size, cond) = best.ok_or_else(|| {
        DeconvError::numerical(
            COMPONENT,
            format!(
                "no group size in {}..={} produced a finite condition number ({} candidates)",
                config.min_group_size,
                config.max_group_size,
                candidates.len()
            ),
        )
    })?;

    let positions = trial_positions(&ranked, group_size);
    let rows: Vec<usize> = positions.iter().map(|&p| candidates[p].index).collect();
    let row_groups: Vec<usize> = positions.iter().map(|&p| candidates[p].top_index).collect();
    let signature = SignatureMatrix::new(
        merged.subset_regions(&rows)?,
        group_size,
        cond,
        row_groups,
        candidate_counts,
    )?;

    reporter.info(
        COMPONENT,
        &format!(
            "group size {} selected ({} rows in the largest block): {} regions, condition number {:.4}",
            group_size,
            signature.effective_group_size(),
            signature.n_regions(),
            cond
        ),
    );

    Ok(OptimizedSignature { signature, trials })
}
