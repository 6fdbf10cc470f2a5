//! Pairwise group contrasts for the group-versus-rest marker test.

use crate::data::DesignMatrix;
use nalgebra::DMatrix;

/// One ordered pair of groups: `source` minus `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contrast {
    /// Reference group (+1).
    pub source: usize,
    /// Compared group (-1).
    pub target: usize,
    /// Combined number of member samples of both groups.
    pub n_samples: f64,
}

/// All k(k-1) ordered contrasts of a k-group design.
#[derive(Debug, Clone)]
pub struct ContrastSet {
    contrasts: Vec<Contrast>,
    /// Contrast rows (+1 / -1), one row per contrast.
    matrix: DMatrix<f64>,
    n_groups: usize,
}

impl ContrastSet {
    /// Enumerate contrasts ordered by source group, then target group.
    pub fn from_design(design: &DesignMatrix) -> Self {
        let n_groups = design.n_groups();
        let sizes = design.group_sizes();

        let mut contrasts = Vec::with_capacity(n_groups * n_groups.saturating_sub(1));
        for source in 0..n_groups {
            for target in (0..n_groups).filter(|&t| t != source) {
                contrasts.push(Contrast {
                    source,
                    target,
                    n_samples: sizes[source] + sizes[target],
                });
            }
        }

        let mut matrix = DMatrix::zeros(contrasts.len(), n_groups);
        for (row, c) in contrasts.iter().enumerate() {
            matrix[(row, c.source)] = 1.0;
            matrix[(row, c.target)] = -1.0;
        }

        Self {
            contrasts,
            matrix,
            n_groups,
        }
    }

    pub fn contrasts(&self) -> &[Contrast] {
        &self.contrasts
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.contrasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contrasts.is_empty()
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Indices of the contrasts whose reference group is `group`.
    pub fn for_source(&self, group: usize) -> impl Iterator<Item = usize> + '_ {
        self.contrasts
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.source == group)
            .map(|(i, _)| i)
    }
}
