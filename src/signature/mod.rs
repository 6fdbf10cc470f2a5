//! Signature matrix selection.

pub mod condition;
pub mod optimize;

pub use condition::{condition_number, standardize_columns};
pub use optimize::{
    optimize_signature, rank_candidates, trial_positions, OptimizedSignature, OptimizerConfig, SizeTrial,
};
