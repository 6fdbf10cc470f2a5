//! Quantile normalization.
//!
//! The reference distribution is the mean of the sorted columns. Each value is
//! replaced by the reference value at its rank; tied values share the
//! averaged rank, truncated to an index.

use crate::data::Profile;
use crate::error::Result;
use crate::stats::{average_ranks, cmp_f64};
use nalgebra::DMatrix;

pub fn norm_quantile(profile: &Profile) -> Result<Profile> {
    super::check_counts(profile, "quantile")?;

    let m = profile.matrix();
    let (n_regions, n_samples) = m.shape();

    let mut reference = vec![0.0; n_regions];
    for j in 0..n_samples {
        let mut col: Vec<f64> = m.column(j).iter().copied().collect();
        col.sort_by(cmp_f64);
        for (r, v) in reference.iter_mut().zip(&col) {
            *r += v;
        }
    }
    for r in reference.iter_mut() {
        *r /= n_samples as f64;
    }

    let mut data = DMatrix::zeros(n_regions, n_samples);
    for j in 0..n_samples {
        let col: Vec<f64> = m.column(j).iter().copied().collect();
        let ranks = average_ranks(&col);
        for (i, rank) in ranks.iter().enumerate() {
            let idx = (rank.trunc() as usize).saturating_sub(1).min(n_regions - 1);
            data[(i, j)] = reference[idx];
        }
    }

    profile.with_matrix(data)
}
