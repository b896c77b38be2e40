// ============================================================
// Layer 3: Dataset Domain Types
// ============================================================
// DatasetDescriptor names a dataset variant and carries its shape:
// input dimensionality, class count, sample count and the layer
// sizes of the autoencoder trained on it. It also decides which
// directory the run's artifacts go to.
//
// PointSet is the labelled sample matrix produced by the data
// provider, stored row-major so it can be handed to Burn as one
// flat buffer.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the built-in three-blob toy dataset
pub const EASY: &str = "easy";

/// Identifies a dataset variant and its directory under the data root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatasetDescriptor {
    /// Dataset name, also the directory name under the data root
    pub name: String,

    /// Dimensionality of one sample
    pub dim: usize,

    /// Number of ground-truth classes (used by the synthetic provider)
    pub n_classes: usize,

    /// Number of samples for this run
    pub n_samples: usize,

    /// Autoencoder layer sizes, input first, embedding last
    pub layer_dims: Vec<usize>,

    /// Optional CSV file to load instead of synthesising
    pub source: Option<PathBuf>,
}

impl Default for DatasetDescriptor {
    fn default() -> Self {
        Self::easy()
    }
}

impl DatasetDescriptor {
    /// The 2-D, 3-class visual toy dataset
    pub fn easy() -> Self {
        Self {
            name:       EASY.to_string(),
            dim:        2,
            n_classes:  3,
            n_samples:  600,
            layer_dims: vec![2, 50, 50, 2],
            source:     None,
        }
    }

    /// Same dataset, different sample count
    pub fn with_samples(&self, n_samples: usize) -> Self {
        Self { n_samples, ..self.clone() }
    }

    /// `<root>/<name>`
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// Number of autoencoder layers; also the index of the
    /// fine-tuned (last) pretraining checkpoint.
    pub fn final_checkpoint_index(&self) -> usize {
        self.layer_dims.len().saturating_sub(1)
    }
}

/// A labelled point matrix, row-major `len() x dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    pub dim:    usize,
    pub points: Vec<f32>,
    /// One label per row; empty when the data is unlabelled
    pub labels: Vec<usize>,
}

impl PointSet {
    pub fn new(dim: usize, points: Vec<f32>, labels: Vec<usize>) -> Result<Self> {
        ensure!(dim > 0, "point dimension must be positive");
        ensure!(
            points.len() % dim == 0,
            "{} values do not form rows of dimension {}",
            points.len(),
            dim
        );
        let n = points.len() / dim;
        ensure!(
            labels.is_empty() || labels.len() == n,
            "{} labels for {} points",
            labels.len(),
            n
        );
        Ok(Self { dim, points, labels })
    }

    pub fn len(&self) -> usize {
        self.points.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.points[i * self.dim..(i + 1) * self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.points.chunks_exact(self.dim)
    }

    pub fn is_labelled(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Rows whose label is `class`, as (x, y) of the first two
    /// coordinates. Used for the class scatter plot.
    pub fn class_xy(&self, class: usize) -> Vec<(f64, f64)> {
        self.rows()
            .zip(&self.labels)
            .filter(|(_, &l)| l == class)
            .map(|(r, _)| (r[0] as f64, r.get(1).copied().unwrap_or(0.0) as f64))
            .collect()
    }

    /// Distinct labels in ascending order
    pub fn classes(&self) -> Vec<usize> {
        let mut c = self.labels.clone();
        c.sort_unstable();
        c.dedup();
        c
    }
}
