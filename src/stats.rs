//! Small descriptive statistics shared by the normalizers, filters and solvers.
//!
//! Functions taking `&mut [f64]` sort their input in place.

use std::cmp::Ordering;

#[inline]
pub(crate) fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor n).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(cmp_f64);
    quantile_sorted(values, q)
}

/// Same as [`quantile`] for an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &mut [f64]) -> f64 {
    quantile(values, 0.5)
}

/// Median absolute deviation, unscaled.
pub fn mad(values: &[f64]) -> f64 {
    let mut tmp = values.to_vec();
    let m = median(&mut tmp);
    let mut dev: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&mut dev)
}

/// Ranks with ties averaged, 1-based.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cmp_f64(&values[a], &values[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share the mean of ranks i+1..=j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}
