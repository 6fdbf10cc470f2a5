//! Data structures for marker selection and deconvolution.

pub mod contrast;
mod design_matrix;
mod group_matrix;
pub mod phenotype;
mod profile;
mod result;
mod signature;

pub use contrast::{Contrast, ContrastSet};
pub use design_matrix::DesignMatrix;
pub use group_matrix::{GroupMatrix, PValueMatrix, QValueMatrix};
pub use phenotype::Phenotype;
pub use profile::{MergeMethod, Profile, RegionId, RegionLayout};
pub use result::{DeconvResult, DeconvResultSet};
pub use signature::{SignatureMatrix, SignatureSummary};
