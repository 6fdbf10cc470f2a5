//! Cell-type membership of reference samples.

use crate::error::{DeconvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Membership code for a sample that belongs to the cell type.
pub const MEMBER: u8 = 1;
/// Membership code for a sample the cell type is compared against.
pub const COMPARISON: u8 = 2;

/// Phenotype classes: rows are cell types, columns are samples.
///
/// Values are 1 (reference member), 2 (comparison member) or 0 (excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    cell_types: Vec<String>,
    sample_ids: Vec<String>,
    membership: Vec<Vec<u8>>,
}

impl Phenotype {
    pub fn new(cell_types: Vec<String>, sample_ids: Vec<String>, membership: Vec<Vec<u8>>) -> Result<Self> {
        if cell_types.is_empty() || sample_ids.is_empty() {
            return Err(DeconvError::EmptyData(
                "phenotype needs at least one cell type and one sample".to_string(),
            ));
        }
        if membership.len() != cell_types.len() {
            return Err(DeconvError::data_mismatch(
                "Phenotype",
                format!("{} membership rows for {} cell types", membership.len(), cell_types.len()),
            ));
        }
        for (g, row) in membership.iter().enumerate() {
            if row.len() != sample_ids.len() {
                return Err(DeconvError::data_mismatch(
                    "Phenotype",
                    format!(
                        "cell type '{}' has {} values for {} samples",
                        cell_types[g],
                        row.len(),
                        sample_ids.len()
                    ),
                ));
            }
            if let Some(&bad) = row.iter().find(|&&v| v > COMPARISON) {
                return Err(DeconvError::configuration(
                    "Phenotype",
                    format!("cell type '{}' has membership value {} (expected 0, 1 or 2)", cell_types[g], bad),
                ));
            }
        }
        check_unique("cell type", &cell_types)?;
        check_unique("sample", &sample_ids)?;

        Ok(Self {
            cell_types,
            sample_ids,
            membership,
        })
    }

    /// Load from a tab-delimited table: first column cell type, header row
    /// holds sample names.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(DeconvError::EmptyData(
                "phenotype table must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut cell_types = Vec::new();
        let mut membership = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            cell_types.push(record[0].trim().to_string());
            let row = record
                .iter()
                .skip(1)
                .enumerate()
                .map(|(col, field)| {
                    field.trim().parse::<u8>().map_err(|_| DeconvError::Parse {
                        value: field.to_string(),
                        row: row_idx,
                        col: col + 1,
                        reason: "expected membership code 0, 1 or 2".to_string(),
                    })
                })
                .collect::<Result<Vec<u8>>>()?;
            membership.push(row);
        }

        Self::new(cell_types, sample_ids, membership)
    }

    /// Build a phenotype from one label per sample: each sample is a member
    /// of its own cell type and a comparison sample for every other type.
    pub fn from_labels(sample_ids: Vec<String>, labels: &[&str]) -> Result<Self> {
        if sample_ids.len() != labels.len() {
            return Err(DeconvError::data_mismatch(
                "Phenotype",
                format!("{} labels for {} samples", labels.len(), sample_ids.len()),
            ));
        }
        let mut cell_types: Vec<String> = Vec::new();
        for label in labels {
            if !cell_types.iter().any(|c| c == label) {
                cell_types.push(label.to_string());
            }
        }
        let membership = cell_types
            .iter()
            .map(|ct| {
                labels
                    .iter()
                    .map(|l| if l == ct { MEMBER } else { COMPARISON })
                    .collect()
            })
            .collect();
        Self::new(cell_types, sample_ids, membership)
    }

    /// Reorder the sample columns to match `sample_ids`.
    ///
    /// Every profile sample must appear in the phenotype and vice versa.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut order = Vec::with_capacity(sample_ids.len());
        for sample in sample_ids {
            match index.get(sample.as_str()) {
                Some(&i) => order.push(i),
                None => {
                    return Err(DeconvError::data_mismatch(
                        "Phenotype",
                        format!("profile sample '{}' is missing from the phenotype table", sample),
                    ))
                }
            }
        }
        if sample_ids.len() != self.sample_ids.len() {
            let wanted: HashSet<&str> = sample_ids.iter().map(|s| s.as_str()).collect();
            let extra = self
                .sample_ids
                .iter()
                .find(|s| !wanted.contains(s.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(DeconvError::data_mismatch(
                "Phenotype",
                format!("phenotype sample '{}' is missing from the profile", extra),
            ));
        }

        let membership = self
            .membership
            .iter()
            .map(|row| order.iter().map(|&i| row[i]).collect())
            .collect();
        Self::new(self.cell_types.clone(), sample_ids.to_vec(), membership)
    }

    pub fn n_groups(&self) -> usize {
        self.cell_types.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn cell_types(&self) -> &[String] {
        &self.cell_types
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Membership code of `sample` for `group`.
    pub fn value(&self, group: usize, sample: usize) -> u8 {
        self.membership[group][sample]
    }

    /// Sample indices with membership 1 for `group`.
    pub fn members(&self, group: usize) -> Vec<usize> {
        self.membership[group]
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == MEMBER)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn group_index(&self, cell_type: &str) -> Option<usize> {
        self.cell_types.iter().position(|c| c == cell_type)
    }
}

fn check_unique(what: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(DeconvError::configuration(
                "Phenotype",
                format!("duplicate {} '{}'", what, name),
            ));
        }
    }
    Ok(())
}
