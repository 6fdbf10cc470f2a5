//! Deconvolution result types.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Estimated composition of a single mixture sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconvResult {
    /// Mixture sample identifier.
    pub sample_id: String,
    /// One coefficient per signature cell type, in signature column order.
    pub proportions: Vec<f64>,
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
    /// Root mean squared error of the fit (or cross-validated RMSEP).
    pub rmse: f64,
    /// Permutation p-value, when requested.
    pub p_value: Option<f64>,
    /// Number of latent components used (SIMPLS variants).
    pub n_components: usize,
}

impl DeconvResult {
    /// Proportion for a cell type by index.
    pub fn proportion(&self, cell_type: usize) -> Option<f64> {
        self.proportions.get(cell_type).copied()
    }

    /// Index of the dominant cell type.
    pub fn dominant(&self) -> Option<usize> {
        (0..self.proportions.len()).max_by(|&a, &b| crate::stats::cmp_f64(&self.proportions[a], &self.proportions[b]))
    }
}

/// Results for all mixture samples of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconvResultSet {
    /// Regression method used.
    pub method: String,
    /// Cell types, matching the proportion vectors.
    pub cell_types: Vec<String>,
    /// Number of regions shared by mixture and signature.
    pub n_regions: usize,
    /// One result per mixture sample, in input column order.
    pub results: Vec<DeconvResult>,
}

impl DeconvResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get_sample(&self, sample_id: &str) -> Option<&DeconvResult> {
        self.results.iter().find(|r| r.sample_id == sample_id)
    }

    /// Write sample × cell-type proportions plus diagnostics as TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;

        let mut header = vec!["sample".to_string()];
        header.extend(self.cell_types.iter().cloned());
        header.extend(["r_squared", "rmse", "p_value"].iter().map(|s| s.to_string()));
        writer.write_record(&header)?;

        for r in &self.results {
            let mut record = vec![r.sample_id.clone()];
            record.extend(r.proportions.iter().map(|p| format!("{:.6}", p)));
            record.push(format!("{:.6}", r.r_squared));
            record.push(format!("{:.6}", r.rmse));
            record.push(r.p_value.map(|p| format!("{:.6}", p)).unwrap_or_else(|| "NA".to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    fn sample_set() -> DeconvResultSet {
        DeconvResultSet {
            method: "simpls".into(),
            cell_types: vec!["A".into(), "B".into()],
            n_regions: 10,
            results: vec![
                DeconvResult {
                    sample_id: "mix1".into(),
                    proportions: vec![0.7, 0.3],
                    r_squared: 0.98,
                    rmse: 0.1,
                    p_value: None,
                    n_components: 2,
                },
                DeconvResult {
                    sample_id: "mix2".into(),
                    proportions: vec![0.1, 0.9],
                    r_squared: 0.95,
                    rmse: 0.2,
                    p_value: Some(0.001),
                    n_components: 2,
                },
            ],
        }
    }

    #[test]
    fn test_dominant() {
        let set = sample_set();
        assert_eq!(set.get_sample("mix2").unwrap().dominant(), Some(1));
    }

    #[test]
    fn test_to_tsv() {
        let set = sample_set();
        let file = NamedTempFile::new().unwrap();
        set.to_tsv(file.path()).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample\tA\tB\tr_squared\trmse\tp_value");
        assert!(lines[1].ends_with("NA"));
        assert!(lines[2].starts_with("mix2\t0.100000\t0.900000"));
    }
}
