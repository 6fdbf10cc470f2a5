//! Region × group value matrices (p-values, q-values).

use crate::data::RegionId;
use crate::error::{DeconvError, Result};
use nalgebra::DMatrix;
use std::path::Path;

/// One value per region per group.
#[derive(Debug, Clone)]
pub struct GroupMatrix {
    values: DMatrix<f64>,
    region_ids: Vec<RegionId>,
    group_names: Vec<String>,
}

/// Per-region, per-group marker test p-values.
pub type PValueMatrix = GroupMatrix;
/// Benjamini-Hochberg adjusted p-values.
pub type QValueMatrix = GroupMatrix;

impl GroupMatrix {
    pub fn new(values: DMatrix<f64>, region_ids: Vec<RegionId>, group_names: Vec<String>) -> Result<Self> {
        if values.nrows() != region_ids.len() || values.ncols() != group_names.len() {
            return Err(DeconvError::data_mismatch(
                "GroupMatrix",
                format!(
                    "values are {}x{} but there are {} regions and {} groups",
                    values.nrows(),
                    values.ncols(),
                    region_ids.len(),
                    group_names.len()
                ),
            ));
        }
        Ok(Self {
            values,
            region_ids,
            group_names,
        })
    }

    #[inline]
    pub fn get(&self, region: usize, group: usize) -> f64 {
        self.values[(region, group)]
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn region_ids(&self) -> &[RegionId] {
        &self.region_ids
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    pub fn n_regions(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_groups(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, region: usize) -> Vec<f64> {
        self.values.row(region).iter().copied().collect()
    }

    /// Keep the given regions, in the given order.
    pub fn subset_regions(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_regions()) {
            return Err(DeconvError::data_mismatch(
                "GroupMatrix",
                format!("region index {} out of bounds ({} regions)", bad, self.n_regions()),
            ));
        }
        let values = DMatrix::from_fn(indices.len(), self.n_groups(), |i, g| self.values[(indices[i], g)]);
        let region_ids = indices.iter().map(|&i| self.region_ids[i].clone()).collect();
        Self::new(values, region_ids, self.group_names.clone())
    }

    /// Write with one column per group.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        let mut header = vec!["region".to_string()];
        header.extend(self.group_names.iter().cloned());
        writer.write_record(&header)?;
        for (i, region) in self.region_ids.iter().enumerate() {
            let mut record = vec![region.to_string()];
            record.extend(self.values.row(i).iter().map(|v| format!("{:e}", v)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
