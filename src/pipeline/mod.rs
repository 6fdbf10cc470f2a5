//! Marker selection and deconvolution composed into a single run.

mod runner;

pub use runner::{find_markers, run, MarkerConfig, MarkerRun, RunConfig, RunOutput, RunSummary};
