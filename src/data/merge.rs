// ============================================================
// Layer 4: Graph / Feature Merge
// ============================================================
// Joins the neighbour graph with the extracted embedding into the
// single artifact DCC reads. Distances are dropped and replaced by
// the DCC pair weight, which balances nodes of very different
// degree:
//
//   w_ij = mean_degree / sqrt(deg_i * deg_j)
//
// A hub connected to many nodes therefore pulls on each of them
// less than a node with two neighbours does.

use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};

use crate::application::config::FeatureConfig;
use crate::domain::{
    artifacts::{ArtifactLayout, CombinedArtifact, FeatureSet, GraphArtifact, WeightedEdge},
    dataset::PointSet,
    traits::GraphMerger,
};
use crate::infra::artifact_store;

/// Degree-normalised weight for every edge.
pub fn pair_weights(graph: &GraphArtifact) -> Vec<WeightedEdge> {
    let degrees = graph.degrees();
    let active = degrees.iter().filter(|&&d| d > 0).count().max(1);
    let mean_degree = degrees.iter().sum::<usize>() as f64 / active as f64;
    graph
        .edges
        .iter()
        .map(|e| WeightedEdge {
            i: e.i,
            j: e.j,
            weight: (mean_degree / ((degrees[e.i] * degrees[e.j]) as f64).sqrt()) as f32,
        })
        .collect()
}

/// Validate sizes and build the combined artifact in memory.
pub fn combine(graph: &GraphArtifact, features: &FeatureSet, points: &PointSet) -> Result<CombinedArtifact> {
    let n = points.len();
    ensure!(graph.n == n, "graph has {} nodes but the dataset has {} points", graph.n, n);
    ensure!(
        features.len() == n,
        "feature file has {} rows but the dataset has {} points",
        features.len(),
        n
    );
    ensure!(!graph.edges.is_empty(), "graph has no edges");

    Ok(CombinedArtifact {
        n,
        data_dim:    points.dim,
        feature_dim: features.dim,
        data:        points.points.clone(),
        features:    features.features.clone(),
        labels:      points.labels.clone(),
        edges:       pair_weights(graph),
    })
}

#[derive(Debug, Default)]
pub struct GraphFeatureMerger;

impl GraphFeatureMerger {
    pub fn new() -> Self {
        Self
    }
}

impl GraphMerger for GraphFeatureMerger {
    fn merge(
        &self,
        graph:    &Path,
        features: &Path,
        points:   &PointSet,
        config:   &FeatureConfig,
        layout:   &ArtifactLayout,
    ) -> Result<PathBuf> {
        let graph: GraphArtifact  = artifact_store::load_graph(graph)?;
        let features: FeatureSet  = artifact_store::load_json(features)?;
        let combined = combine(&graph, &features, points)?;

        let out = layout.combined(&config.out, points.len());
        artifact_store::save_json(&out, &combined)?;
        tracing::info!(
            "Merged {} edges with {}-d features → '{}'",
            combined.edges.len(),
            combined.feature_dim,
            out.display()
        );
        Ok(out)
    }
}
