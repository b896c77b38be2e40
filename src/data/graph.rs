// ============================================================
// Layer 4: Neighbour Graph Construction
// ============================================================
// Builds the similarity graph DCC optimises over.
//
//   samples
//      │  preprocess (none / scale / minmax / normalization)
//      │  optional PCA
//      ▼
//   exact k nearest neighbours (squared Euclidean, rayon per row)
//      │
//      ├── knn  → keep (i, j) if either is in the other's list
//      └── mknn → keep (i, j) only if both are in each other's list,
//                 then add the minimum spanning tree of the knn
//                 graph so mutual pruning does not split components
//      ▼
//   edges stored once with i < j, sorted by (i, j)
//
// Brute force is O(n² d); for the sizes this pipeline sweeps that
// is fine and it keeps the result exact and deterministic.

use anyhow::{ensure, Context, Result};
use petgraph::{algo::min_spanning_tree, data::Element, graph::UnGraph};
use rayon::prelude::*;
use std::{cmp::Ordering, collections::{BTreeMap, HashSet}, fs, path::PathBuf};

use crate::application::config::GraphConfig;
use crate::data::preprocess;
use crate::domain::{
    artifacts::{ArtifactLayout, Edge, GraphAlgo, GraphArtifact},
    dataset::{DatasetDescriptor, PointSet},
    traits::GraphConstructor,
};
use crate::infra::artifact_store;

/// `k` nearest neighbours of every row as `(index, squared distance)`,
/// closest first, ties broken by index. A row is never its own neighbour.
pub fn k_nearest(values: &[f32], dim: usize, k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = values.len() / dim;
    let k = k.min(n.saturating_sub(1));
    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = &values[i * dim..(i + 1) * dim];
            let mut dists: Vec<(usize, f32)> = values
                .chunks_exact(dim)
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, other)| (j, squared_euclidean(row, other)))
                .collect();
            if k < dists.len() {
                dists.select_nth_unstable_by(k, by_distance_then_index);
                dists.truncate(k);
            }
            dists.sort_by(by_distance_then_index);
            dists
        })
        .collect()
}

fn by_distance_then_index(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then(a.0.cmp(&b.0))
}

#[inline]
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Edge list of the kNN or mkNN graph over `n = values.len() / dim` rows.
pub fn neighbor_edges(values: &[f32], dim: usize, k: usize, algo: GraphAlgo) -> Vec<Edge> {
    let n = values.len() / dim;
    let neighbours = k_nearest(values, dim, k);

    let directed: HashSet<(usize, usize)> = neighbours
        .iter()
        .enumerate()
        .flat_map(|(i, list)| list.iter().map(move |&(j, _)| (i, j)))
        .collect();

    // Symmetric kNN: union of both directions, distance kept once
    let mut knn: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (i, list) in neighbours.iter().enumerate() {
        for &(j, d2) in list {
            knn.insert(ordered(i, j), d2.sqrt());
        }
    }

    let edges: BTreeMap<(usize, usize), f32> = match algo {
        GraphAlgo::Knn => knn,
        GraphAlgo::Mknn => {
            let mut mutual: BTreeMap<(usize, usize), f32> = knn
                .iter()
                .filter(|(&(i, j), _)| directed.contains(&(i, j)) && directed.contains(&(j, i)))
                .map(|(&key, &d)| (key, d))
                .collect();
            let before = mutual.len();
            for (key, d) in spanning_tree(n, &knn) {
                mutual.entry(key).or_insert(d);
            }
            tracing::debug!(
                "mkNN: {} mutual edges, {} added from the spanning tree",
                before,
                mutual.len() - before
            );
            mutual
        }
    };

    edges
        .into_iter()
        .map(|((i, j), distance)| Edge { i, j, distance })
        .collect()
}

/// Minimum spanning forest of the given weighted edges.
fn spanning_tree(n: usize, edges: &BTreeMap<(usize, usize), f32>) -> Vec<((usize, usize), f32)> {
    let mut graph = UnGraph::<(), f32>::with_capacity(n, edges.len());
    let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
    for (&(i, j), &d) in edges {
        graph.add_edge(nodes[i], nodes[j], d);
    }
    min_spanning_tree(&graph)
        .filter_map(|element| match element {
            Element::Edge { source, target, weight } => Some((ordered(source, target), weight)),
            Element::Node { .. } => None,
        })
        .collect()
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

// ─── GraphConstructor implementation ─────────────────────────────────────────

/// Preprocesses, searches neighbours, writes the graph artifact.
#[derive(Debug, Default)]
pub struct NeighborGraphBuilder;

impl NeighborGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, points: &PointSet, config: &GraphConfig) -> Result<GraphArtifact> {
        let n = points.len();
        ensure!(n >= 2, "a neighbour graph needs at least 2 points, got {}", n);

        let k = if config.k >= n {
            tracing::warn!("k = {} is not below n = {}; using k = {}", config.k, n, n - 1);
            n - 1
        } else {
            config.k
        };

        let mut values = config.preprocess.apply(&points.points, points.dim);
        let mut dim = points.dim;
        if let Some(components) = config.pca {
            values = preprocess::pca(&values, dim, components)?;
            dim = components;
        }

        let edges = neighbor_edges(&values, dim, k, config.algo);
        Ok(GraphArtifact { n, k, algo: config.algo, edges })
    }
}

impl GraphConstructor for NeighborGraphBuilder {
    fn construct(
        &self,
        dataset: &DatasetDescriptor,
        points:  &PointSet,
        config:  &GraphConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PathBuf> {
        tracing::info!(
            "Building {} graph over {} points (k={}, preprocess={:?}, pca={:?})",
            config.algo,
            points.len(),
            config.k,
            config.preprocess,
            config.pca
        );
        let graph = self.build(points, config)?;

        let keyed = layout.graph(config.algo, dataset.n_samples, graph.k, config.format);
        artifact_store::save_graph(&keyed, &graph, config.format)?;

        let pretrained = layout.pretrained_graph(config.format);
        fs::copy(&keyed, &pretrained).with_context(|| {
            format!("Cannot copy '{}' to '{}'", keyed.display(), pretrained.display())
        })?;

        tracing::info!(
            "Graph: {} edges, mean degree {:.1} → '{}'",
            graph.edges.len(),
            2.0 * graph.edges.len() as f64 / graph.n as f64,
            keyed.display()
        );
        Ok(pretrained)
    }
}
