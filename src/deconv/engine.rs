//! Per-sample deconvolution driver.

use super::{fit_method, permutation_p_value, select_components, DeconvConfig, DeconvMethod};
use crate::data::{DeconvResult, DeconvResultSet, Profile, SignatureMatrix};
use crate::error::{DeconvError, Result};
use crate::normalize::normalize;
use crate::parallel::map_chunks;
use crate::report::Reporter;
use nalgebra::{DMatrix, DVector};

const COMPONENT: &str = "DeconvolutionEngine";

/// Signature and mixture restricted to their shared regions, rows in
/// signature order.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub signature: Profile,
    pub mixture: Profile,
}

impl Intersection {
    pub fn n_regions(&self) -> usize {
        self.signature.n_regions()
    }
}

/// Match mixture rows to signature rows by region id.
///
/// Signature order is preserved; a repeated mixture region uses its first
/// row. No shared region is a [`DeconvError::DataMismatch`].
pub fn intersect(signature: &SignatureMatrix, mixture: &Profile) -> Result<Intersection> {
    let index = mixture.region_index();
    let (sig_rows, mix_rows): (Vec<usize>, Vec<usize>) = signature
        .region_ids()
        .iter()
        .enumerate()
        .filter_map(|(i, id)| index.get(id).map(|&j| (i, j)))
        .unzip();

    if sig_rows.is_empty() {
        return Err(DeconvError::data_mismatch(
            COMPONENT,
            format!(
                "mixture shares no regions with the signature ({} signature regions, {} mixture regions)",
                signature.n_regions(),
                mixture.n_regions()
            ),
        ));
    }

    Ok(Intersection {
        signature: signature.profile().subset_regions(&sig_rows)?,
        mixture: mixture.subset_regions(&mix_rows)?,
    })
}

/// Fail when the signature columns are (numerically) linearly dependent.
///
/// Methods fitting an intercept see column-centered data, so a constant
/// column or one that is affine in the others is rejected for them too.
fn check_rank(x: &DMatrix<f64>, method: DeconvMethod, tolerance: f64) -> Result<()> {
    let (n, k) = x.shape();
    let centered = matches!(method, DeconvMethod::Simpls | DeconvMethod::RobustSimpls);
    // centering costs one degree of freedom
    let min_rows = if centered { k + 1 } else { k };
    if n < min_rows {
        return Err(DeconvError::numerical(
            COMPONENT,
            format!("{} shared regions cannot resolve {} cell types with {}", n, k, method),
        ));
    }

    let mut m = x.clone();
    if centered {
        for mut col in m.column_iter_mut() {
            let mean = col.mean();
            col.add_scalar_mut(-mean);
        }
    }
    let singular = m.svd(false, false).singular_values;
    let max = singular.max();
    let min = singular.min();
    if !(max > 0.0) || !(min / max > tolerance) {
        return Err(DeconvError::numerical(
            COMPONENT,
            format!(
                "signature is rank deficient on the shared regions for {} (singular values {:.3e} / {:.3e})",
                method, min, max
            ),
        ));
    }
    Ok(())
}

/// Estimate the composition of every mixture sample.
pub fn deconvolve(
    signature: &SignatureMatrix,
    mixture: &Profile,
    config: &DeconvConfig,
    reporter: &dyn Reporter,
) -> Result<DeconvResultSet> {
    config.validate()?;

    let mut shared = intersect(signature, mixture)?;
    reporter.info(
        COMPONENT,
        &format!(
            "{} of {} signature regions found in the mixture",
            shared.n_regions(),
            signature.n_regions()
        ),
    );

    if let Some(method) = config.normalization {
        shared.mixture = normalize(&shared.mixture, method)?;
        reporter.debug(COMPONENT, &format!("mixture normalized with {}", method));
    }

    let x = shared.signature.matrix();
    check_rank(x, config.method, config.rank_tolerance)?;

    let mixture = &shared.mixture;
    let results = map_chunks(mixture.n_samples(), config.threads, |range| {
        range
            .map(|j| {
                let y = DVector::from_iterator(mixture.n_regions(), mixture.matrix().column(j).iter().copied());
                deconvolve_sample(x, &y, &mixture.sample_ids()[j], j, config)
            })
            .collect()
    })?;

    reporter.info(
        COMPONENT,
        &format!("{} samples deconvolved with {}", results.len(), config.method),
    );

    Ok(DeconvResultSet {
        method: config.method.to_string(),
        cell_types: signature.cell_types().to_vec(),
        n_regions: shared.n_regions(),
        results,
    })
}

/// Fit a single mixture vector `y` against the signature rows `x`.
///
/// `sample_index` offsets the permutation seed so each sample has its own
/// reproducible stream.
pub fn deconvolve_sample(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    sample_id: &str,
    sample_index: usize,
    config: &DeconvConfig,
) -> Result<DeconvResult> {
    let n_cell_types = x.ncols();
    let max_components = config.n_components.unwrap_or(n_cell_types).min(n_cell_types);

    let n_components = match (config.method, config.cv_folds) {
        (DeconvMethod::LeastSquares, _) | (_, None) => max_components,
        (_, Some(folds)) => select_components(x, y, max_components, folds)?.0,
    };

    let fit = fit_method(config.method, x, y, n_components, &config.robust)?;
    let (r_squared, rmse) = fit.diagnostics(x, y);

    let p_value = if config.p_value {
        Some(permutation_p_value(
            config.method,
            x,
            y,
            n_components,
            &config.robust,
            r_squared,
            config.n_permutations,
            config.seed.wrapping_add(sample_index as u64),
        )?)
    } else {
        None
    };

    let raw: Vec<f64> = fit.coefficients.iter().copied().collect();
    Ok(DeconvResult {
        sample_id: sample_id.to_string(),
        proportions: config.constraint.apply(&raw),
        r_squared,
        rmse,
        p_value,
        n_components: fit.n_components,
    })
}
