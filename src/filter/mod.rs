//! Region filters applied around marker testing.

pub mod specificity;
pub mod weak;

pub use specificity::{filter_specific_regions, score_regions, ScoreFilterConfig, ScoredRegion};
pub use weak::filter_weak_regions;
