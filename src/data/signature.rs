//! The persisted signature matrix.

use crate::data::{Profile, RegionId};
use crate::error::{DeconvError, Result};
use crate::signature::condition_number;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Summary of how a signature was selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSummary {
    /// Cell types (signature columns).
    pub cell_types: Vec<String>,
    /// Number of marker regions retained.
    pub n_regions: usize,
    /// Winning per-cell-type group size, when known.
    pub group_size: Option<usize>,
    /// Rows actually held by the largest cell-type block. Smaller than
    /// `group_size` when no cell type had that many candidates.
    pub effective_group_size: usize,
    /// Condition number of the standardized signature.
    pub condition_number: f64,
    /// Marker regions selected per cell type.
    pub markers_per_cell_type: Vec<usize>,
    /// Candidate regions specific to each cell type before the size search.
    pub candidates_per_cell_type: Vec<usize>,
}

/// Marker regions × cell types regression basis.
#[derive(Debug, Clone)]
pub struct SignatureMatrix {
    profile: Profile,
    group_size: Option<usize>,
    condition_number: f64,
    /// Cell-type index of the group each row was selected for.
    row_groups: Vec<usize>,
    candidate_counts: Vec<usize>,
}

impl SignatureMatrix {
    /// Assemble a signature from selected rows (columns = cell types).
    pub fn new(
        profile: Profile,
        group_size: usize,
        condition_number: f64,
        row_groups: Vec<usize>,
        candidate_counts: Vec<usize>,
    ) -> Result<Self> {
        if row_groups.len() != profile.n_regions() {
            return Err(DeconvError::data_mismatch(
                "SignatureMatrix",
                format!("{} group labels for {} regions", row_groups.len(), profile.n_regions()),
            ));
        }
        Ok(Self {
            profile,
            group_size: Some(group_size),
            condition_number,
            row_groups,
            candidate_counts,
        })
    }

    /// Wrap an externally supplied signature; its condition number is recomputed.
    pub fn from_profile(profile: Profile) -> Result<Self> {
        if profile.n_regions() == 0 || profile.n_samples() == 0 {
            return Err(DeconvError::EmptyData("signature matrix is empty".to_string()));
        }
        let condition_number = condition_number(profile.matrix());
        let row_groups = (0..profile.n_regions())
            .map(|i| {
                let row = profile.row(i);
                (0..row.len())
                    .max_by(|&a, &b| crate::stats::cmp_f64(&row[a], &row[b]))
                    .unwrap_or(0)
            })
            .collect();
        Ok(Self {
            candidate_counts: Vec::new(),
            profile,
            group_size: None,
            condition_number,
            row_groups,
        })
    }

    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_profile(Profile::from_tsv(path)?)
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.profile.to_tsv(path)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn cell_types(&self) -> &[String] {
        self.profile.sample_ids()
    }

    pub fn region_ids(&self) -> &[RegionId] {
        self.profile.region_ids()
    }

    pub fn n_regions(&self) -> usize {
        self.profile.n_regions()
    }

    pub fn n_cell_types(&self) -> usize {
        self.profile.n_samples()
    }

    pub fn group_size(&self) -> Option<usize> {
        self.group_size
    }

    /// Largest number of rows selected for a single cell type.
    pub fn effective_group_size(&self) -> usize {
        self.markers_per_cell_type().into_iter().max().unwrap_or(0)
    }

    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    /// Number of candidate regions specific to each cell type.
    pub fn candidate_counts(&self) -> &[usize] {
        &self.candidate_counts
    }

    /// Number of selected regions per cell type.
    pub fn markers_per_cell_type(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_cell_types()];
        for &g in &self.row_groups {
            counts[g] += 1;
        }
        counts
    }

    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            cell_types: self.cell_types().to_vec(),
            n_regions: self.n_regions(),
            group_size: self.group_size,
            effective_group_size: self.effective_group_size(),
            condition_number: self.condition_number,
            markers_per_cell_type: self.markers_per_cell_type(),
            candidates_per_cell_type: self.candidate_counts.clone(),
        }
    }
}
