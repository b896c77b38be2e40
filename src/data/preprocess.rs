// ============================================================
// Layer 4: Preprocessing before neighbour search
// ============================================================
// The graph constructor can rescale the samples before it looks
// for neighbours, and optionally project them onto their leading
// principal components:
//
//   none           → samples unchanged
//   scale          → per feature: zero mean, unit variance
//   minmax         → per feature: mapped to [0, 1]
//   normalization  → per row: unit L2 norm
//
// PCA is linfa's: the samples are centred and projected onto
// the leading right singular vectors.

use anyhow::{anyhow, ensure, Result};
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_reduction::Pca;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocess {
    #[default]
    None,
    Scale,
    Minmax,
    Normalization,
}

impl FromStr for Preprocess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none"          => Ok(Preprocess::None),
            "scale"         => Ok(Preprocess::Scale),
            "minmax"        => Ok(Preprocess::Minmax),
            "normalization" => Ok(Preprocess::Normalization),
            other => Err(format!(
                "unknown preprocessing '{other}' (expected none, scale, minmax or normalization)"
            )),
        }
    }
}

impl Preprocess {
    /// Apply the transform to a row-major `n x dim` buffer.
    pub fn apply(self, values: &[f32], dim: usize) -> Vec<f32> {
        let mut out = values.to_vec();
        if out.is_empty() {
            return out;
        }
        match self {
            Preprocess::None => {}
            Preprocess::Scale => {
                let (mean, var) = column_moments(values, dim);
                for row in out.chunks_exact_mut(dim) {
                    for c in 0..dim {
                        let sd = var[c].sqrt();
                        row[c] = if sd > 0.0 { (row[c] - mean[c]) / sd } else { 0.0 };
                    }
                }
            }
            Preprocess::Minmax => {
                let mut lo = vec![f32::INFINITY; dim];
                let mut hi = vec![f32::NEG_INFINITY; dim];
                for row in values.chunks_exact(dim) {
                    for c in 0..dim {
                        lo[c] = lo[c].min(row[c]);
                        hi[c] = hi[c].max(row[c]);
                    }
                }
                for row in out.chunks_exact_mut(dim) {
                    for c in 0..dim {
                        let span = hi[c] - lo[c];
                        row[c] = if span > 0.0 { (row[c] - lo[c]) / span } else { 0.0 };
                    }
                }
            }
            Preprocess::Normalization => {
                for row in out.chunks_exact_mut(dim) {
                    let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                    if norm > 0.0 {
                        row.iter_mut().for_each(|v| *v /= norm);
                    }
                }
            }
        }
        out
    }
}

/// Per-column mean and (population) variance
fn column_moments(values: &[f32], dim: usize) -> (Vec<f32>, Vec<f32>) {
    let n = (values.len() / dim) as f64;
    let mut mean = vec![0f64; dim];
    for row in values.chunks_exact(dim) {
        for c in 0..dim {
            mean[c] += row[c] as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);
    let mut var = vec![0f64; dim];
    for row in values.chunks_exact(dim) {
        for c in 0..dim {
            let d = row[c] as f64 - mean[c];
            var[c] += d * d;
        }
    }
    var.iter_mut().for_each(|v| *v /= n);
    (
        mean.into_iter().map(|m| m as f32).collect(),
        var.into_iter().map(|v| v as f32).collect(),
    )
}

/// Project `n x dim` samples onto their `components` leading
/// principal axes. Returns a row-major `n x components` buffer.
pub fn pca(values: &[f32], dim: usize, components: usize) -> Result<Vec<f32>> {
    ensure!(
        components >= 1 && components <= dim,
        "cannot keep {} components of {}-dimensional data",
        components,
        dim
    );
    let n = values.len() / dim;
    ensure!(n >= 2, "PCA needs at least 2 points, got {}", n);

    let records = Array2::from_shape_vec((n, dim), values.iter().map(|&v| v as f64).collect())?;
    let dataset = Dataset::from(records);
    let embedding: Pca<f64> = Pca::params(components)
        .fit(&dataset)
        .map_err(|e| anyhow!("PCA to {components} components failed: {e}"))?;
    let projected = embedding.predict(&dataset);
    tracing::debug!("PCA: {} x {} → {} x {}", n, dim, n, components);

    Ok(projected.iter().map(|&v| v as f32).collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let v = vec![1.0, -2.0, 3.0, 4.0];
        assert_eq!(Preprocess::None.apply(&v, 2), v);
    }

    #[test]
    fn test_minmax_maps_columns_to_unit_interval() {
        let v = vec![0.0, 10.0, 5.0, 20.0, 10.0, 30.0];
        let out = Preprocess::Minmax.apply(&v, 2);
        assert_eq!(out, vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_scale_gives_zero_mean_unit_variance() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        let out = Preprocess::Scale.apply(&v, 1);
        let mean: f32 = out.iter().sum::<f32>() / 4.0;
        let var: f32 = out.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_column_does_not_produce_nan() {
        let v = vec![3.0, 3.0, 3.0];
        assert!(Preprocess::Scale.apply(&v, 1).iter().all(|x| *x == 0.0));
        assert!(Preprocess::Minmax.apply(&v, 1).iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_normalization_gives_unit_rows() {
        let out = Preprocess::Normalization.apply(&[3.0, 4.0, 0.0, 0.0], 2);
        assert_eq!(out, vec![0.6, 0.8, 0.0, 0.0]);
    }

    #[test]
    fn test_pca_finds_dominant_axis() {
        // Points spread along y = x with tiny noise on the other axis
        let mut values = Vec::new();
        for i in 0..20 {
            let t = i as f32 - 10.0;
            let eps = if i % 2 == 0 { 0.01 } else { -0.01 };
            values.extend_from_slice(&[t + eps, t - eps]);
        }
        let proj = pca(&values, 2, 1).unwrap();
        assert_eq!(proj.len(), 20);
        // Projection onto the diagonal has spread close to the full spread
        let spread = proj.iter().cloned().fold(f32::MIN, f32::max)
            - proj.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread > 19.0 * 2f32.sqrt() * 0.99);
    }

    #[test]
    fn test_pca_rejects_too_many_components() {
        assert!(pca(&[0.0; 4], 2, 3).is_err());
    }

    #[test]
    fn test_pca_output_is_row_major_per_sample() {
        // Spread only along x: the single component is x up to sign and centring
        let values = vec![-2.0, 5.0, 0.0, 5.0, 2.0, 5.0];
        let proj = pca(&values, 2, 1).unwrap();
        assert_eq!(proj.len(), 3);
        assert!(proj[1].abs() < 1e-5);
        assert!((proj[0].abs() - 2.0).abs() < 1e-4);
        assert!((proj[0] + proj[2]).abs() < 1e-4);
    }
}
