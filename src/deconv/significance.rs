//! Permutation significance of a deconvolution fit.

use super::{fit_method, DeconvMethod, RobustConfig};
use crate::error::Result;
use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Permutation p-value of the observed R².
///
/// The mixture vector is shuffled `n_perm` times and refitted with the same
/// method and component count; the p-value is
/// `(#{R²_perm >= R²_obs} + 1) / (n_perm + 1)`.
#[allow(clippy::too_many_arguments)]
pub fn permutation_p_value(
    method: DeconvMethod,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    n_components: usize,
    robust: &RobustConfig,
    observed_r_squared: f64,
    n_perm: usize,
    seed: u64,
) -> Result<f64> {
    let n = y.len();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    let mut n_exceed = 0usize;

    for _ in 0..n_perm {
        indices.shuffle(&mut rng);
        let permuted = DVector::from_iterator(n, indices.iter().map(|&i| y[i]));
        let fit = fit_method(method, x, &permuted, n_components, robust)?;
        let (r_squared, _) = fit.diagnostics(x, &permuted);
        if r_squared >= observed_r_squared {
            n_exceed += 1;
        }
    }

    Ok((n_exceed as f64 + 1.0) / (n_perm as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> DMatrix<f64> {
        DMatrix::from_fn(40, 2, |i, j| if i % 2 == j { 50.0 + (i % 7) as f64 } else { 2.0 + (i % 5) as f64 })
    }

    #[test]
    fn test_true_mixture_is_significant() {
        let x = signature();
        let y = &x * DVector::from_vec(vec![0.7, 0.3]);
        let p = permutation_p_value(DeconvMethod::LeastSquares, &x, &y, 2, &RobustConfig::default(), 1.0 - 1e-12, 99, 7)
            .unwrap();
        assert!((p - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_p_value() {
        let x = signature();
        let y = DVector::from_fn(40, |i, _| ((i * 13) % 17) as f64);
        let run = |seed| {
            permutation_p_value(DeconvMethod::Simpls, &x, &y, 2, &RobustConfig::default(), 0.05, 50, seed).unwrap()
        };
        assert_eq!(run(3), run(3));
        let p = run(3);
        assert!(p > 0.0 && p <= 1.0);
    }
}
