//! Benjamini-Hochberg false discovery rate correction.

use crate::data::{GroupMatrix, PValueMatrix, QValueMatrix};
use crate::error::Result;
use crate::stats::cmp_f64;
use nalgebra::DMatrix;

/// Apply Benjamini-Hochberg FDR correction.
///
/// For p-values sorted ascending, the adjusted value at rank i is
/// `q[i] = min(p[i] * n / i, q[i+1])`, capped at 1. NaN p-values are treated
/// as 1 before correction. The output is in input order.
pub fn correct_bh(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }

    let p: Vec<f64> = p_values
        .iter()
        .map(|&v| if v.is_nan() { 1.0 } else { v.clamp(0.0, 1.0) })
        .collect();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| cmp_f64(&p[a], &p[b]));

    let mut q_sorted = vec![0.0; n];
    let n_f64 = n as f64;

    // Start from largest p-value
    q_sorted[n - 1] = p[indices[n - 1]].min(1.0);

    for i in (0..n - 1).rev() {
        let rank = (i + 1) as f64;
        let adjusted = p[indices[i]] * n_f64 / rank;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    let mut q_values = vec![0.0; n];
    for (i, &orig_idx) in indices.iter().enumerate() {
        q_values[orig_idx] = q_sorted[i];
    }
    q_values
}

/// Correct every entry of a regions x groups p-value matrix as one family.
pub fn correct_bh_matrix(p_values: &PValueMatrix) -> Result<QValueMatrix> {
    let values = p_values.values();
    let flat: Vec<f64> = values.iter().copied().collect();
    let q = correct_bh(&flat);
    GroupMatrix::new(
        DMatrix::from_vec(values.nrows(), values.ncols(), q),
        p_values.region_ids().to_vec(),
        p_values.group_names().to_vec(),
    )
}
