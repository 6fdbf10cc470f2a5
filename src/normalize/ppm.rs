//! Per-million (PPM) scaling.
//!
//! Each sample is divided by its total signal and multiplied by 1e6, so every
//! column sums to one million afterwards.

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use nalgebra::DMatrix;

/// Target column total.
pub const PER_MILLION: f64 = 1e6;

/// Scale every column to sum to one million.
pub fn norm_ppm(profile: &Profile) -> Result<Profile> {
    super::check_counts(profile, "ppm")?;

    let library_sizes = profile.col_sums();
    for (j, &lib_size) in library_sizes.iter().enumerate() {
        if lib_size <= 0.0 {
            return Err(DeconvError::numerical(
                "ppm",
                format!("sample '{}' has zero total signal", profile.sample_ids()[j]),
            ));
        }
    }

    let m = profile.matrix();
    let data = DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] / library_sizes[j] * PER_MILLION);
    profile.with_matrix(data)
}
