//! Dense region × sample signal profile.

use crate::data::Phenotype;
use crate::error::{DeconvError, Result};
use crate::stats;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Identity of a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionId {
    /// Genomic interval (accessibility profiles).
    Interval { chrom: String, start: u64, end: u64 },
    /// Gene or probe identifier (expression profiles).
    Named(String),
}

impl RegionId {
    pub fn interval(chrom: &str, start: u64, end: u64) -> Self {
        Self::Interval {
            chrom: chrom.to_string(),
            start,
            end,
        }
    }

    pub fn named(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionId::Interval { chrom, start, end } => write!(f, "{}:{}-{}", chrom, start, end),
            RegionId::Named(name) => write!(f, "{}", name),
        }
    }
}

/// How region identity is laid out in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionLayout {
    /// Three leading columns: chromosome, start, end.
    Interval,
    /// One leading identifier column.
    Identifier,
}

impl RegionLayout {
    /// Number of leading identity columns.
    pub fn n_id_columns(&self) -> usize {
        match self {
            RegionLayout::Interval => 3,
            RegionLayout::Identifier => 1,
        }
    }

    /// Infer the layout from a header row.
    pub fn detect(header: &[&str]) -> Self {
        if header.len() >= 4 {
            let first = header[0].trim().trim_start_matches('#').to_ascii_lowercase();
            let second = header[1].trim().to_ascii_lowercase();
            let third = header[2].trim().to_ascii_lowercase();
            let is_chrom = matches!(first.as_str(), "chr" | "chrom" | "chromosome");
            if is_chrom && second == "start" && third == "end" {
                return RegionLayout::Interval;
            }
        }
        RegionLayout::Identifier
    }
}

/// Replicate merge statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    #[default]
    Mean,
    Median,
}

/// A dense profile: rows are regions, columns are samples.
#[derive(Debug, Clone)]
pub struct Profile {
    data: DMatrix<f64>,
    region_ids: Vec<RegionId>,
    sample_ids: Vec<String>,
}

impl Profile {
    /// Create a profile, validating shape, unique sample ids and finite values.
    pub fn new(data: DMatrix<f64>, region_ids: Vec<RegionId>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != region_ids.len() {
            return Err(DeconvError::data_mismatch(
                "Profile",
                format!("{} rows but {} region ids", nrows, region_ids.len()),
            ));
        }
        if ncols != sample_ids.len() {
            return Err(DeconvError::data_mismatch(
                "Profile",
                format!("{} columns but {} sample ids", ncols, sample_ids.len()),
            ));
        }
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(DeconvError::data_mismatch(
                    "Profile",
                    format!("duplicate sample id '{}'", id),
                ));
            }
        }
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            let (row, col) = (pos % nrows, pos / nrows);
            return Err(DeconvError::numerical(
                "Profile",
                format!(
                    "non-finite value at region {} sample '{}'",
                    region_ids[row], sample_ids[col]
                ),
            ));
        }
        Ok(Self {
            data,
            region_ids,
            sample_ids,
        })
    }

    /// Build from row-major values.
    pub fn from_rows(rows: &[Vec<f64>], region_ids: Vec<RegionId>, sample_ids: Vec<String>) -> Result<Self> {
        let ncols = sample_ids.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(DeconvError::data_mismatch(
                "Profile",
                format!("row {} has {} values, expected {}", i, row.len(), ncols),
            ));
        }
        let data = DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]);
        Self::new(data, region_ids, sample_ids)
    }

    /// Load a tab-delimited profile. The layout is inferred from the header.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        let header_fields: Vec<&str> = header.iter().collect();
        let layout = RegionLayout::detect(&header_fields);
        let n_id = layout.n_id_columns();
        if header_fields.len() <= n_id {
            return Err(DeconvError::EmptyData(
                "profile table must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header_fields[n_id..].iter().map(|s| s.trim().to_string()).collect();

        let mut region_ids = Vec::new();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let region = match layout {
                RegionLayout::Interval => RegionId::Interval {
                    chrom: record[0].trim().to_string(),
                    start: parse_coordinate(&record[1], row_idx, 1)?,
                    end: parse_coordinate(&record[2], row_idx, 2)?,
                },
                RegionLayout::Identifier => RegionId::Named(record[0].trim().to_string()),
            };
            let values = record
                .iter()
                .skip(n_id)
                .enumerate()
                .map(|(col, field)| parse_value(field, row_idx, col + n_id))
                .collect::<Result<Vec<f64>>>()?;
            region_ids.push(region);
            rows.push(values);
        }

        if rows.is_empty() {
            return Err(DeconvError::EmptyData("no regions in profile table".to_string()));
        }
        Self::from_rows(&rows, region_ids, sample_ids)
    }

    /// Write as a tab-delimited table, using the layout of the first region.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;

        let mut header: Vec<String> = match self.layout() {
            RegionLayout::Interval => vec!["chrom".into(), "start".into(), "end".into()],
            RegionLayout::Identifier => vec!["region".into()],
        };
        header.extend(self.sample_ids.iter().cloned());
        writer.write_record(&header)?;

        for (i, region) in self.region_ids.iter().enumerate() {
            let mut record: Vec<String> = match region {
                RegionId::Interval { chrom, start, end } => {
                    vec![chrom.clone(), start.to_string(), end.to_string()]
                }
                RegionId::Named(name) => vec![name.clone()],
            };
            record.extend(self.data.row(i).iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Layout matching the region ids (interval if any row is an interval).
    pub fn layout(&self) -> RegionLayout {
        if self
            .region_ids
            .iter()
            .any(|r| matches!(r, RegionId::Interval { .. }))
        {
            RegionLayout::Interval
        } else {
            RegionLayout::Identifier
        }
    }

    #[inline]
    pub fn get(&self, region: usize, sample: usize) -> f64 {
        self.data[(region, sample)]
    }

    #[inline]
    pub fn n_regions(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn region_ids(&self) -> &[RegionId] {
        &self.region_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn into_matrix(self) -> DMatrix<f64> {
        self.data
    }

    /// Values of one region as a vector.
    pub fn row(&self, region: usize) -> Vec<f64> {
        self.data.row(region).iter().copied().collect()
    }

    /// Values of one sample as a vector.
    pub fn col(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().copied().collect()
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Column sums (library sizes).
    pub fn col_sums(&self) -> Vec<f64> {
        self.data.column_iter().map(|c| c.sum()).collect()
    }

    /// Replace the values, keeping region and sample identity.
    pub fn with_matrix(&self, data: DMatrix<f64>) -> Result<Self> {
        Self::new(data, self.region_ids.clone(), self.sample_ids.clone())
    }

    /// Apply `f` to every value.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Result<Self> {
        self.with_matrix(self.data.map(f))
    }

    /// Fail unless every value is non-negative.
    pub fn require_non_negative(&self, component: &str) -> Result<()> {
        for j in 0..self.n_samples() {
            for i in 0..self.n_regions() {
                if self.data[(i, j)] < 0.0 {
                    return Err(DeconvError::numerical(
                        component,
                        format!(
                            "negative value {} at region {} sample '{}'",
                            self.data[(i, j)],
                            self.region_ids[i],
                            self.sample_ids[j]
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Keep the given regions, in the given order.
    pub fn subset_regions(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_regions()) {
            return Err(DeconvError::data_mismatch(
                "Profile",
                format!("region index {} out of bounds ({} regions)", bad, self.n_regions()),
            ));
        }
        let data = DMatrix::from_fn(indices.len(), self.n_samples(), |i, j| self.data[(indices[i], j)]);
        let region_ids = indices.iter().map(|&i| self.region_ids[i].clone()).collect();
        Self::new(data, region_ids, self.sample_ids.clone())
    }

    /// Keep the given samples, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&j| j >= self.n_samples()) {
            return Err(DeconvError::data_mismatch(
                "Profile",
                format!("sample index {} out of bounds ({} samples)", bad, self.n_samples()),
            ));
        }
        let data = DMatrix::from_fn(self.n_regions(), indices.len(), |i, j| self.data[(i, indices[j])]);
        let sample_ids = indices.iter().map(|&j| self.sample_ids[j].clone()).collect();
        Self::new(data, self.region_ids.clone(), sample_ids)
    }

    /// Drop repeated region ids; the first occurrence wins.
    pub fn dedup_regions(&self) -> Result<Self> {
        let keep = first_occurrences(&self.region_ids);
        if keep.len() == self.n_regions() {
            return Ok(self.clone());
        }
        self.subset_regions(&keep)
    }

    /// Map from region id to the first row carrying it.
    pub fn region_index(&self) -> HashMap<&RegionId, usize> {
        let mut index = HashMap::with_capacity(self.n_regions());
        for (i, id) in self.region_ids.iter().enumerate() {
            index.entry(id).or_insert(i);
        }
        index
    }

    /// Collapse replicate samples to one column per cell type.
    ///
    /// Each output column summarises the samples with membership 1 for that
    /// cell type. The phenotype must already be aligned to this profile.
    pub fn merge_replicates(&self, phenotype: &Phenotype, method: MergeMethod) -> Result<Self> {
        if phenotype.sample_ids() != self.sample_ids.as_slice() {
            return Err(DeconvError::data_mismatch(
                "Profile::merge_replicates",
                "phenotype samples are not aligned to the profile columns",
            ));
        }
        let n_groups = phenotype.n_groups();
        let members: Vec<Vec<usize>> = (0..n_groups).map(|g| phenotype.members(g)).collect();
        if let Some(g) = members.iter().position(|m| m.is_empty()) {
            return Err(DeconvError::configuration(
                "Profile::merge_replicates",
                format!("cell type '{}' has no member samples", phenotype.cell_types()[g]),
            ));
        }

        let data = DMatrix::from_fn(self.n_regions(), n_groups, |i, g| {
            let mut values: Vec<f64> = members[g].iter().map(|&j| self.data[(i, j)]).collect();
            match method {
                MergeMethod::Mean => stats::mean(&values),
                MergeMethod::Median => stats::median(&mut values),
            }
        });
        Self::new(data, self.region_ids.clone(), phenotype.cell_types().to_vec())
    }
}

/// Indices of the first occurrence of each distinct id.
pub(crate) fn first_occurrences(ids: &[RegionId]) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .enumerate()
        .filter(|(_, id)| seen.insert(*id))
        .map(|(i, _)| i)
        .collect()
}

fn parse_coordinate(field: &str, row: usize, col: usize) -> Result<u64> {
    field.trim().parse().map_err(|_| DeconvError::Parse {
        value: field.to_string(),
        row,
        col,
        reason: "expected a non-negative integer coordinate".to_string(),
    })
}

fn parse_value(field: &str, row: usize, col: usize) -> Result<f64> {
    let value: f64 = field.trim().parse().map_err(|_| DeconvError::Parse {
        value: field.to_string(),
        row,
        col,
        reason: "expected a number".to_string(),
    })?;
    if !value.is_finite() {
        return Err(DeconvError::Parse {
            value: field.to_string(),
            row,
            col,
            reason: "missing or non-finite values are not allowed".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_profile() -> Profile {
        let rows = vec![
            vec![10.0, 12.0, 1.0, 2.0],
            vec![1.0, 1.0, 30.0, 34.0],
            vec![5.0, 5.0, 5.0, 5.0],
        ];
        let regions = vec![
            RegionId::interval("chr1", 100, 200),
            RegionId::interval("chr1", 300, 400),
            RegionId::interval("chr2", 50, 90),
        ];
        let samples = vec!["A1".into(), "A2".into(), "B1".into(), "B2".into()];
        Profile::from_rows(&rows, regions, samples).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let p = create_test_profile();
        assert_eq!(p.n_regions(), 3);
        assert_eq!(p.n_samples(), 4);
        assert_eq!(p.layout(), RegionLayout::Interval);
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let rows = vec![vec![1.0, 2.0]];
        let result = Profile::from_rows(&rows, vec![RegionId::named("g")], vec!["S".into(), "S".into()]);
        assert!(matches!(result, Err(DeconvError::DataMismatch { .. })));
    }

    #[test]
    fn test_non_finite_rejected() {
        let rows = vec![vec![1.0, f64::NAN]];
        let result = Profile::from_rows(&rows, vec![RegionId::named("g")], vec!["S1".into(), "S2".into()]);
        assert!(matches!(result, Err(DeconvError::Numerical { .. })));
    }

    #[test]
    fn test_layout_detection() {
        assert_eq!(
            RegionLayout::detect(&["chrom", "start", "end", "s1"]),
            RegionLayout::Interval
        );
        assert_eq!(
            RegionLayout::detect(&["#Chr", "Start", "End", "s1"]),
            RegionLayout::Interval
        );
        assert_eq!(RegionLayout::detect(&["gene", "s1", "s2"]), RegionLayout::Identifier);
    }

    #[test]
    fn test_tsv_roundtrip_interval() {
        let p = create_test_profile();
        let file = NamedTempFile::new().unwrap();
        p.to_tsv(file.path()).unwrap();

        let loaded = Profile::from_tsv(file.path()).unwrap();
        assert_eq!(loaded.region_ids(), p.region_ids());
        assert_eq!(loaded.sample_ids(), p.sample_ids());
        assert_eq!(loaded.matrix(), p.matrix());
    }

    #[test]
    fn test_from_tsv_identifier_layout() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene\tS1\tS2").unwrap();
        writeln!(file, "CD3E\t10.5\t0").unwrap();
        writeln!(file, "MS4A1\t0.25\t7").unwrap();
        file.flush().unwrap();

        let p = Profile::from_tsv(file.path()).unwrap();
        assert_eq!(p.layout(), RegionLayout::Identifier);
        assert_eq!(p.region_ids()[1], RegionId::named("MS4A1"));
        assert_relative_eq!(p.get(0, 0), 10.5);
    }

    #[test]
    fn test_from_tsv_rejects_missing_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene\tS1\tS2").unwrap();
        writeln!(file, "CD3E\tNA\t1").unwrap();
        file.flush().unwrap();

        assert!(matches!(Profile::from_tsv(file.path()), Err(DeconvError::Parse { .. })));
    }

    #[test]
    fn test_subset_regions_preserves_order() {
        let p = create_test_profile();
        let sub = p.subset_regions(&[2, 0]).unwrap();
        assert_eq!(sub.region_ids()[0], RegionId::interval("chr2", 50, 90));
        assert_relative_eq!(sub.get(1, 1), 12.0);
        assert!(p.subset_regions(&[3]).is_err());
    }

    #[test]
    fn test_dedup_first_wins() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let regions = vec![RegionId::named("a"), RegionId::named("b"), RegionId::named("a")];
        let p = Profile::from_rows(&rows, regions, vec!["S".into()]).unwrap();
        let d = p.dedup_regions().unwrap();
        assert_eq!(d.n_regions(), 2);
        assert_relative_eq!(d.get(0, 0), 1.0);
        assert_relative_eq!(d.get(1, 0), 2.0);
    }

    #[test]
    fn test_merge_replicates_mean() {
        let p = create_test_profile();
        let pheno = Phenotype::new(
            vec!["A".into(), "B".into()],
            p.sample_ids().to_vec(),
            vec![vec![1, 1, 2, 2], vec![2, 2, 1, 1]],
        )
        .unwrap();
        let merged = p.merge_replicates(&pheno, MergeMethod::Mean).unwrap();
        assert_eq!(merged.sample_ids(), &["A", "B"]);
        assert_relative_eq!(merged.get(0, 0), 11.0);
        assert_relative_eq!(merged.get(1, 1), 32.0);
    }

    #[test]
    fn test_col_sums() {
        let p = create_test_profile();
        assert_eq!(p.col_sums(), vec![16.0, 18.0, 36.0, 41.0]);
    }
}
