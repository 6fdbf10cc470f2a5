//! Statistical tests for cell-type-specific regions.

pub mod marker;

pub use marker::{contrast_stats, test_markers, upper_tail_p, ContrastStat};
