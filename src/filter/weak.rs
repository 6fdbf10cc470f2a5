//! Weak-signal pre-filter applied before marker testing.

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use crate::parallel::map_chunks;
use crate::stats::median;

/// Drop regions whose value is strictly below the global median in every
/// sample. The median is taken over all cells of the profile.
///
/// Rows are scanned on at most `n_workers` threads. Returns the filtered
/// profile and the indices of the kept rows.
pub fn filter_weak_regions(profile: &Profile, n_workers: usize) -> Result<(Profile, Vec<usize>)> {
    if profile.n_regions() == 0 || profile.n_samples() == 0 {
        return Err(DeconvError::EmptyData("weak-signal filter: profile is empty".to_string()));
    }

    let mut all: Vec<f64> = profile.matrix().iter().copied().collect();
    let threshold = median(&mut all);

    let keep: Vec<usize> = map_chunks(profile.n_regions(), n_workers, |range| {
        Ok(range
            .filter(|&i| profile.matrix().row(i).iter().any(|&v| v >= threshold))
            .collect())
    })?;

    if keep.is_empty() {
        return Err(DeconvError::EmptyData(format!(
            "weak-signal filter removed all {} regions (median {:.4})",
            profile.n_regions(),
            threshold
        )));
    }

    Ok((profile.subset_regions(&keep)?, keep))
}
