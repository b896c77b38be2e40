// ============================================================
// Layer 3: Pipeline Artifacts
// ============================================================
// Every stage hands its output to the next one through a file in
// the dataset directory. This module defines the records that go
// into those files and the naming scheme for their paths:
//
//   data/<dataset>/
//     traindata.json                  ← data provider
//     graph_<algo>_n<N>_k<k>.<ext>    ← graph constructor (keyed copy)
//     pretrained_graph.<ext>          ← graph consumed by the merger
//     checkpoints/checkpoint_<i>...   ← pretrainer
//     <feat>.json                     ← feature extractor
//     <out>_merged.json               ← graph/feature merger
//     results/dcc_<out>.json          ← clustering optimizer
//     logs/<N>/                       ← loss CSVs

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

// ─── Graph options that show up in artifact names ────────────────────────────

/// Which neighbour relation the graph keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphAlgo {
    /// Edge when either endpoint is among the other's k nearest
    Knn,
    /// Edge only when both are among each other's k nearest,
    /// plus spanning-tree edges to keep components connected
    Mknn,
}

impl fmt::Display for GraphAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphAlgo::Knn  => write!(f, "knn"),
            GraphAlgo::Mknn => write!(f, "mknn"),
        }
    }
}

impl FromStr for GraphAlgo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "knn"  => Ok(GraphAlgo::Knn),
            "mknn" => Ok(GraphAlgo::Mknn),
            other  => Err(format!("unknown graph algorithm '{other}' (expected knn or mknn)")),
        }
    }
}

/// On-disk encoding of the graph artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    Json,
    /// One `i j distance` line per edge after a `# n k algo` header
    Edgelist,
}

impl GraphFormat {
    pub fn extension(self) -> &'static str {
        match self {
            GraphFormat::Json     => "json",
            GraphFormat::Edgelist => "txt",
        }
    }

    /// Guess the format of an existing file from its extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("txt") => GraphFormat::Edgelist,
            _           => GraphFormat::Json,
        }
    }
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json"     => Ok(GraphFormat::Json),
            "edgelist" => Ok(GraphFormat::Edgelist),
            other      => Err(format!("unknown graph format '{other}' (expected json or edgelist)")),
        }
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Undirected edge stored once with `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub i:        usize,
    pub j:        usize,
    /// Euclidean distance in the (preprocessed) input space
    pub distance: f32,
}

/// Similarity graph over the samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub n:     usize,
    pub k:     usize,
    pub algo:  GraphAlgo,
    pub edges: Vec<Edge>,
}

impl GraphArtifact {
    /// Number of edges touching each node
    pub fn degrees(&self) -> Vec<usize> {
        let mut deg = vec![0usize; self.n];
        for e in &self.edges {
            deg[e.i] += 1;
            deg[e.j] += 1;
        }
        deg
    }
}

/// Embedding of every sample, row-major `n x dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub dim:      usize,
    pub features: Vec<f32>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.features.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Edge carrying the DCC pair weight instead of a distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub i:      usize,
    pub j:      usize,
    pub weight: f32,
}

/// Data, embedding and weighted graph in one file; the only input
/// the clustering optimizer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedArtifact {
    pub n:           usize,
    pub data_dim:    usize,
    pub feature_dim: usize,
    pub data:        Vec<f32>,
    pub features:    Vec<f32>,
    pub labels:      Vec<usize>,
    pub edges:       Vec<WeightedEdge>,
}

/// Output of the clustering optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Cluster id per sample, ids dense from 0
    pub assignments:     Vec<usize>,
    pub n_clusters:      usize,
    /// Final representatives, row-major `n x feature_dim`
    pub representatives: Vec<f32>,
    pub epochs_run:      usize,
    /// Agreement with the ground truth when labels exist
    pub ari:             Option<f64>,
    pub nmi:             Option<f64>,
}

// ─── Layout ──────────────────────────────────────────────────────────────────

/// Names every artifact path inside one dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dataset(&self) -> PathBuf {
        self.dir.join("traindata.json")
    }

    /// Graph keyed by algorithm, dataset size and neighbour count
    pub fn graph(&self, algo: GraphAlgo, n: usize, k: usize, format: GraphFormat) -> PathBuf {
        self.dir.join(format!("graph_{algo}_n{n}_k{k}.{}", format.extension()))
    }

    /// The graph the merge step reads
    pub fn pretrained_graph(&self, format: GraphFormat) -> PathBuf {
        self.dir.join(format!("pretrained_graph.{}", format.extension()))
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.dir.join("checkpoints")
    }

    pub fn features(&self, feat: &str) -> PathBuf {
        self.dir.join(format!("{feat}.json"))
    }

    /// Merged graph and features for an `n`-sample run
    pub fn combined(&self, out: &str, n: usize) -> PathBuf {
        self.dir.join(format!("{out}_n{n}_merged.json"))
    }

    /// Clustering result for an `n`-sample run
    pub fn result(&self, out: &str, n: usize) -> PathBuf {
        self.dir.join("results").join(format!("dcc_{out}_n{n}.json"))
    }

    /// Per-run log directory, keyed by the run id (its sample count)
    pub fn log_dir(&self, id: usize) -> PathBuf {
        self.dir.join("logs").join(id.to_string())
    }
}
