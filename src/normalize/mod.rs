//! Normalization of raw signal across samples.
//!
//! Every method shares the signature `fn(&Profile) -> Result<Profile>` and is
//! selected through [`NormMethod`], which is parsed and validated when the
//! configuration is built:
//!
//! - **quantile**: force identical column distributions
//! - **deseq**: median-of-ratios size factors on log(x + 1)
//! - **upper_quantile**: 75th-percentile scaling factors
//! - **ppm**: per-million scaling to a common column total
//! - **tmm**: trimmed mean of M-values scaling factors

pub mod ppm;
pub mod quantile;
pub mod size_factor;
pub mod tmm;

pub use ppm::norm_ppm;
pub use quantile::norm_quantile;
pub use size_factor::{deseq_factors, norm_deseq, norm_upper_quantile, upper_quantile_factors};
pub use tmm::{norm_tmm, norm_tmm_with_config, tmm_factors, TmmConfig};

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A normalization strategy.
pub type Normalizer = fn(&Profile) -> Result<Profile>;

/// Supported normalization methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    Quantile,
    Deseq,
    UpperQuantile,
    Ppm,
    Tmm,
}

impl NormMethod {
    pub const ALL: [NormMethod; 5] = [
        NormMethod::Quantile,
        NormMethod::Deseq,
        NormMethod::UpperQuantile,
        NormMethod::Ppm,
        NormMethod::Tmm,
    ];

    /// The strategy implementing this method.
    pub fn normalizer(self) -> Normalizer {
        match self {
            NormMethod::Quantile => norm_quantile,
            NormMethod::Deseq => norm_deseq,
            NormMethod::UpperQuantile => norm_upper_quantile,
            NormMethod::Ppm => norm_ppm,
            NormMethod::Tmm => norm_tmm,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NormMethod::Quantile => "quantile",
            NormMethod::Deseq => "deseq",
            NormMethod::UpperQuantile => "upper_quantile",
            NormMethod::Ppm => "ppm",
            NormMethod::Tmm => "tmm",
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NormMethod {
    type Err = DeconvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quantile" | "qn" => Ok(NormMethod::Quantile),
            "deseq" | "deseq2" => Ok(NormMethod::Deseq),
            "upper_quantile" | "upper_quartile" | "uqn" | "uq" => Ok(NormMethod::UpperQuantile),
            "ppm" | "cpm" => Ok(NormMethod::Ppm),
            "tmm" => Ok(NormMethod::Tmm),
            other => Err(DeconvError::configuration(
                "NormalizationEngine",
                format!(
                    "unknown normalization method '{}' (expected one of quantile, deseq, upper_quantile, ppm, tmm)",
                    other
                ),
            )),
        }
    }
}

/// Normalize a profile with the given method.
pub fn normalize(profile: &Profile, method: NormMethod) -> Result<Profile> {
    (method.normalizer())(profile)
}

/// `log2(1 + x)` of every value.
pub fn log2_transform(profile: &Profile) -> Result<Profile> {
    profile.require_non_negative("log2_transform")?;
    profile.map_values(|v| (1.0 + v).log2())
}

/// Shared entry checks: non-empty and non-negative.
pub(crate) fn check_counts(profile: &Profile, component: &str) -> Result<()> {
    if profile.n_regions() == 0 || profile.n_samples() == 0 {
        return Err(DeconvError::EmptyData(format!("{}: profile is empty", component)));
    }
    profile.require_non_negative(component)
}
