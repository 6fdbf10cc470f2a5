//! One-hot group design matrix built from phenotype classes.

use crate::data::phenotype::{Phenotype, MEMBER};
use crate::error::{DeconvError, Result};
use nalgebra::DMatrix;

/// Design matrix for the per-region group model.
///
/// Rows are samples, columns are cell types. Entry (i, g) is 1 when sample i
/// is a reference member of group g; comparison members (code 2) and
/// excluded samples are 0.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: DMatrix<f64>,
    group_names: Vec<String>,
    sample_ids: Vec<String>,
}

impl DesignMatrix {
    /// Build the design from a phenotype aligned to the profile samples.
    ///
    /// Fails if any group has no member samples.
    pub fn from_phenotype(phenotype: &Phenotype) -> Result<Self> {
        let n_samples = phenotype.n_samples();
        let n_groups = phenotype.n_groups();
        if n_groups < 2 {
            return Err(DeconvError::configuration(
                "ContrastDesigner",
                format!("at least 2 cell types are required, got {}", n_groups),
            ));
        }

        let matrix = DMatrix::from_fn(n_samples, n_groups, |i, g| {
            if phenotype.value(g, i) == MEMBER {
                1.0
            } else {
                0.0
            }
        });

        let design = Self {
            matrix,
            group_names: phenotype.cell_types().to_vec(),
            sample_ids: phenotype.sample_ids().to_vec(),
        };

        if let Some(g) = design.group_sizes().iter().position(|&n| n == 0.0) {
            return Err(DeconvError::configuration(
                "ContrastDesigner",
                format!("cell type '{}' has no member samples", design.group_names[g]),
            ));
        }
        Ok(design)
    }

    /// Create a design matrix directly from components.
    pub fn from_matrix(matrix: DMatrix<f64>, group_names: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        if matrix.nrows() != sample_ids.len() || matrix.ncols() != group_names.len() {
            return Err(DeconvError::data_mismatch(
                "DesignMatrix",
                format!(
                    "matrix is {}x{} but there are {} samples and {} groups",
                    matrix.nrows(),
                    matrix.ncols(),
                    sample_ids.len(),
                    group_names.len()
                ),
            ));
        }
        Ok(Self {
            matrix,
            group_names,
            sample_ids,
        })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_groups(&self) -> usize {
        self.matrix.ncols()
    }

    /// Column sums: number of member samples per group.
    pub fn group_sizes(&self) -> Vec<f64> {
        self.matrix.column_iter().map(|c| c.sum()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_comparison_members_recoded() {
        let pheno = Phenotype::new(
            names(&["A", "B"]),
            names(&["s1", "s2", "s3"]),
            vec![vec![1, 2, 0], vec![2, 1, 1]],
        )
        .unwrap();
        let dm = DesignMatrix::from_phenotype(&pheno).unwrap();

        assert_eq!(dm.n_samples(), 3);
        assert_eq!(dm.n_groups(), 2);
        let col_a: Vec<f64> = dm.matrix().column(0).iter().copied().collect();
        let col_b: Vec<f64> = dm.matrix().column(1).iter().copied().collect();
        assert_eq!(col_a, vec![1.0, 0.0, 0.0]);
        assert_eq!(col_b, vec![0.0, 1.0, 1.0]);
        assert_eq!(dm.group_sizes(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_empty_group_names_group() {
        let pheno = Phenotype::new(
            names(&["A", "B", "Empty"]),
            names(&["s1", "s2"]),
            vec![vec![1, 2], vec![2, 1], vec![2, 2]],
        )
        .unwrap();
        let err = DesignMatrix::from_phenotype(&pheno).unwrap_err();
        assert!(matches!(err, DeconvError::Configuration { .. }));
        assert!(err.to_string().contains("Empty"));
    }

    #[test]
    fn test_single_group_rejected() {
        let pheno = Phenotype::new(names(&["A"]), names(&["s1"]), vec![vec![1]]).unwrap();
        assert!(DesignMatrix::from_phenotype(&pheno).is_err());
    }
}
