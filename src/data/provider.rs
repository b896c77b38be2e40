// ============================================================
// Layer 4: Data Provider
// ============================================================
// Produces the labelled point set for a run and writes it to
// `<dataset dir>/traindata.json`.
//
// Two sources:
//   1. `easy` - synthesised: three Gaussian blobs in 2-D, one per
//      class, drawn from a seeded ChaCha RNG so that the same N
//      always gives the same data.
//   2. any dataset with `source = "<file>.csv"` - rows of
//      `f1,...,fd,label`; the first `n_samples` rows are used.

use anyhow::{bail, ensure, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::{fs, path::Path};

use crate::domain::{
    artifacts::ArtifactLayout,
    dataset::{DatasetDescriptor, PointSet, EASY},
    traits::DataProvider,
};
use crate::infra::artifact_store;

/// Blob centres of the easy dataset, one per class
const EASY_CENTRES: [(f32, f32); 3] = [(0.0, 0.0), (4.0, 4.0), (-4.0, 4.0)];
const EASY_SPREAD: f32 = 0.7;

/// Dispatches on the dataset descriptor and persists the result.
pub struct DatasetProvider {
    seed: u64,
}

impl DatasetProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl DataProvider for DatasetProvider {
    fn provide(&self, dataset: &DatasetDescriptor, layout: &ArtifactLayout) -> Result<PointSet> {
        let points = match (&dataset.source, dataset.name.as_str()) {
            (Some(path), _) => load_csv(path, dataset.dim, dataset.n_samples)?,
            (None, EASY)    => make_easy_visual_data(dataset.n_samples, self.seed)?,
            (None, other)   => bail!(
                "No generator for dataset '{other}'; set dataset.source to a CSV file"
            ),
        };
        ensure!(
            points.dim == dataset.dim,
            "dataset '{}' declares dimension {} but the data has {}",
            dataset.name,
            dataset.dim,
            points.dim
        );

        let path = layout.dataset();
        artifact_store::save_json(&path, &points)?;
        tracing::info!(
            "Dataset '{}': {} points of dimension {} → '{}'",
            dataset.name,
            points.len(),
            points.dim,
            path.display()
        );
        Ok(points)
    }
}

/// Three well-separated 2-D Gaussian blobs with labels 0, 1, 2.
/// Class sizes differ by at most one.
pub fn make_easy_visual_data(n: usize, seed: u64) -> Result<PointSet> {
    ensure!(n > 0, "cannot generate an empty dataset");
    let mut rng   = ChaCha8Rng::seed_from_u64(seed);
    let noise     = Normal::new(0.0f32, EASY_SPREAD)?;
    let n_classes = EASY_CENTRES.len();

    let mut points = Vec::with_capacity(n * 2);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class    = i % n_classes;
        let (cx, cy) = EASY_CENTRES[class];
        points.push(cx + noise.sample(&mut rng));
        points.push(cy + noise.sample(&mut rng));
        labels.push(class);
    }
    PointSet::new(2, points, labels)
}

/// Load `f1,...,fd,label` rows. Lines starting with `#` and a
/// non-numeric header line are skipped.
pub fn load_csv(path: &Path, dim: usize, n_samples: usize) -> Result<PointSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read dataset '{}'", path.display()))?;

    let mut points = Vec::with_capacity(n_samples * dim);
    let mut labels = Vec::with_capacity(n_samples);
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        ensure!(
            fields.len() == dim + 1,
            "'{}' line {}: expected {} features and a label, found {} fields",
            path.display(),
            lineno + 1,
            dim,
            fields.len()
        );
        let values: Result<Vec<f32>, _> = fields[..dim].iter().map(|f| f.parse::<f32>()).collect();
        let values = match values {
            Ok(v) => v,
            // A header row is allowed before any data
            Err(_) if labels.is_empty() && points.is_empty() => continue,
            Err(e) => bail!("'{}' line {}: {}", path.display(), lineno + 1, e),
        };
        let label = fields[dim]
            .parse::<usize>()
            .with_context(|| format!("'{}' line {}: bad label", path.display(), lineno + 1))?;
        points.extend(values);
        labels.push(label);
        if labels.len() == n_samples {
            break;
        }
    }
    ensure!(
        labels.len() == n_samples,
        "'{}' has only {} rows, {} requested",
        path.display(),
        labels.len(),
        n_samples
    );
    PointSet::new(dim, points, labels)
}
