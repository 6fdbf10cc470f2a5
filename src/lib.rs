//! Cell-type marker selection and signature-based deconvolution.
//!
//! From pure cell-type accessibility (or expression) profiles, this library
//! selects a small, well-conditioned set of cell-type-specific regions,
//! assembles them into a signature matrix, and estimates the composition of
//! mixed samples by regressing mixture signal against the signature.
//!
//! # Overview
//!
//! - **data**: Profiles, phenotypes, designs, contrasts, signatures, results
//! - **normalize**: Quantile, DESeq, upper-quantile, PPM and TMM normalization
//! - **filter**: Weak-signal pre-filter and specificity scoring
//! - **model**: Group-mean linear model shared across regions
//! - **test**: One-sided contrast tests per region
//! - **correct**: Pooled Benjamini-Hochberg correction
//! - **signature**: Condition-number driven marker group size search
//! - **deconv**: SIMPLS, robust SIMPLS and least-squares deconvolution
//! - **simulate**: Random in-silico mixtures
//! - **pipeline**: End-to-end runs and YAML configuration
//!
//! # Example
//!
//! ```no_run
//! use marker_deconv::prelude::*;
//!
//! let profile = Profile::from_tsv("pure.tsv").unwrap();
//! let phenotype = Phenotype::from_tsv("phenotype.tsv").unwrap();
//! let mixture = Profile::from_tsv("mixture.tsv").unwrap();
//!
//! let markers = find_markers(&profile, &phenotype, &MarkerConfig::default(), &TracingReporter).unwrap();
//! let results = deconvolve(&markers.signature, &mixture, &DeconvConfig::default(), &TracingReporter).unwrap();
//! ```

pub mod correct;
pub mod data;
pub mod deconv;
pub mod error;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod parallel;
pub mod pipeline;
pub mod report;
pub mod signature;
pub mod simulate;
pub mod stats;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::correct::{correct_bh, correct_bh_matrix};
    pub use crate::data::{
        ContrastSet, DeconvResult, DeconvResultSet, DesignMatrix, MergeMethod, PValueMatrix, Phenotype,
        Profile, QValueMatrix, RegionId, SignatureMatrix,
    };
    pub use crate::deconv::{deconvolve, intersect, Constraint, DeconvConfig, DeconvMethod, RobustConfig};
    pub use crate::error::{DeconvError, Result};
    pub use crate::filter::{filter_specific_regions, filter_weak_regions, ScoreFilterConfig, ScoredRegion};
    pub use crate::normalize::{normalize, NormMethod};
    pub use crate::pipeline::{find_markers, run, MarkerConfig, MarkerRun, RunConfig};
    pub use crate::report::{MemoryReporter, NullReporter, Reporter, TracingReporter};
    pub use crate::signature::{condition_number, optimize_signature, OptimizerConfig};
    pub use crate::simulate::{mix_profiles, random_proportions, ProportionTable, SimulationConfig};
    pub use crate::test::test_markers;
}
