//! In-silico mixtures for benchmarking deconvolution.
//!
//! Each simulated sample draws a random subset of cell types and Dirichlet(1)
//! proportions over that subset; the mixture profile is the pure profile
//! weighted by those proportions.

use crate::data::Profile;
use crate::error::{DeconvError, Result};
use nalgebra::DMatrix;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of cell types mixed per sample; `None` uses every size from 1
    /// to the number of cell types.
    pub mixture_sizes: Option<Vec<usize>>,
    /// Samples generated per mixture size.
    pub replicates: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mixture_sizes: None,
            replicates: 5,
            seed: 100,
        }
    }
}

/// Samples x cell types proportions.
#[derive(Debug, Clone)]
pub struct ProportionTable {
    pub sample_ids: Vec<String>,
    pub cell_types: Vec<String>,
    pub proportions: DMatrix<f64>,
}

impl ProportionTable {
    pub fn n_samples(&self) -> usize {
        self.proportions.nrows()
    }

    pub fn row(&self, sample: usize) -> Vec<f64> {
        self.proportions.row(sample).iter().copied().collect()
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        let mut header = vec!["sample".to_string()];
        header.extend(self.cell_types.iter().cloned());
        writer.write_record(&header)?;
        for (i, id) in self.sample_ids.iter().enumerate() {
            let mut record = vec![id.clone()];
            record.extend(self.proportions.row(i).iter().map(|p| format!("{:.6}", p)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Draw from a flat Dirichlet of dimension `k` (normalized exponentials).
fn flat_dirichlet<R: Rng>(rng: &mut R, k: usize) -> Vec<f64> {
    // 1 - U lies in (0, 1], so the logarithm is finite
    let draws: Vec<f64> = (0..k).map(|_| -(1.0 - rng.gen::<f64>()).ln()).collect();
    let total: f64 = draws.iter().sum();
    if total > 0.0 {
        draws.into_iter().map(|d| d / total).collect()
    } else {
        vec![1.0 / k as f64; k]
    }
}

/// Random proportions over `cell_types`.
pub fn random_proportions(cell_types: &[String], config: &SimulationConfig) -> Result<ProportionTable> {
    let k = cell_types.len();
    if k == 0 {
        return Err(DeconvError::EmptyData("no cell types to mix".to_string()));
    }
    if config.replicates == 0 {
        return Err(DeconvError::configuration("Simulation", "replicates must be at least 1"));
    }
    let sizes: Vec<usize> = config.mixture_sizes.clone().unwrap_or_else(|| (1..=k).collect());
    if let Some(&bad) = sizes.iter().find(|&&s| s == 0 || s > k) {
        return Err(DeconvError::configuration(
            "Simulation",
            format!("mixture size {} is outside 1..={}", bad, k),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let n_samples = sizes.len() * config.replicates;
    let mut proportions = DMatrix::zeros(n_samples, k);

    let mut row = 0;
    for &size in &sizes {
        for _ in 0..config.replicates {
            let cells = sample(&mut rng, k, size);
            let props = flat_dirichlet(&mut rng, size);
            for (cell, p) in cells.iter().zip(props) {
                proportions[(row, cell)] = p;
            }
            row += 1;
        }
    }

    Ok(ProportionTable {
        sample_ids: (1..=n_samples).map(|i| format!("Sample_{}", i)).collect(),
        cell_types: cell_types.to_vec(),
        proportions,
    })
}

/// Mix a pure profile (regions x cell types) by the given proportions.
pub fn mix_profiles(pure: &Profile, proportions: &ProportionTable) -> Result<Profile> {
    if pure.sample_ids() != proportions.cell_types.as_slice() {
        return Err(DeconvError::data_mismatch(
            "Simulation",
            "pure profile columns differ from the proportion cell types",
        ));
    }
    let data = pure.matrix() * proportions.proportions.transpose();
    Profile::new(data, pure.region_ids().to_vec(), proportions.sample_ids.clone())
}
