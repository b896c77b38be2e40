// ============================================================
// Layer 5: Deep Continuous Clustering
// ============================================================
// Every sample i gets a representative z_i, initialised to its
// feature vector. Representatives and (optionally) the embedding
// network f/g are optimised together on mini-batches of graph
// edges with the objective
//
//   ‖x − g(f(x))‖² / D                             reconstruction
// + Σ_i s_i ρ(‖f(x_i) − z_i‖²; μ1) / (n·d)          data term
// + λ Σ_ij w_ij ρ(‖z_i − z_j‖²; μ2) / (n·d)         pairwise term
//
// where ρ(s; μ) = μ·s / (μ + s) is the Geman-McClure penalty,
// n the number of samples touched by the batch, d the embedding
// size and D the input size. s_i is the share of sample i's edges
// that fall in the batch, so over one epoch every sample's data
// term is counted once. The identity network is f = g = id and
// its reconstruction term is zero.
//
// Schedule (graduated non-convexity):
//   δ   = mean of the shortest 1% of initial edge lengths
//   μ   = 3·r², r the longest initial edge, for both μ1 and μ2
//   λ   = ‖Z‖₂ / ‖L‖₂ with L the Laplacian of the graph weighted
//         by w_ij·(μ2 / (μ2 + ‖z_i − z_j‖²))²
//   every `m` epochs μ1, μ2 are halved (never below δ²), λ is
//   recomputed and so are the assignments; once μ sits at δ² and
//   fewer than 0.1% of the samples changed cluster, optimisation
//   stops. Both spectral norms come from power iteration.
//
// Clusters are the connected components of the graph restricted
// to edges whose representatives are closer than δ.
//
// References: Shah & Koltun (2017) Robust Continuous Clustering
//             Shah & Koltun (2018) Deep Continuous Clustering

use anyhow::{anyhow, ensure, Result};
use burn::{
    module::Param,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use ndarray::{Array1, Array2};
use petgraph::unionfind::UnionFind;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use crate::application::config::DccConfig;
use crate::data::batcher::PointBatcher;
use crate::domain::{
    artifacts::{ArtifactLayout, ClusterResult, CombinedArtifact, WeightedEdge},
    network::Network,
    traits::ClusterOptimizer,
};
use crate::infra::{
    artifact_store,
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluation::{ari, nmi},
    model::{Autoencoder, EmbeddingNet, IdentityNet},
};

/// Fraction of the edges whose mean length defines δ
const DELTA_FRACTION: f64 = 0.01;

/// Stop once fewer than this fraction of samples change cluster
const STOP_FRACTION: f64 = 0.001;

/// Lower bound on δ when many samples coincide
const MIN_DELTA: f64 = 1e-6;

const POWER_ITERATIONS: usize = 200;
const POWER_TOLERANCE: f64 = 1e-9;

// ─── Robust penalty and schedule ──────────────────────────────────────────────

/// Geman-McClure penalty of squared distances.
fn geman_mcclure_tensor<B: Backend>(s: Tensor<B, 2>, mu: f64) -> Tensor<B, 2> {
    s.clone().mul_scalar(mu).div(s.add_scalar(mu))
}

fn squared_distance<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
    (a - b).powf_scalar(2.0).sum_dim(1)
}

fn euclidean(values: &[f32], dim: usize, i: usize, j: usize) -> f64 {
    values[i * dim..(i + 1) * dim]
        .iter()
        .zip(&values[j * dim..(j + 1) * dim])
        .map(|(a, b)| {
            let d = (*a - *b) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DccSchedule {
    pub delta:  f64,
    pub mu1:    f64,
    pub mu2:    f64,
    pub lambda: f64,
}

impl DccSchedule {
    /// Derive δ, μ and λ from the initial representatives.
    pub fn from_initial(features: &[f32], dim: usize, edges: &[WeightedEdge]) -> Result<Self> {
        ensure!(!edges.is_empty(), "cannot schedule DCC without edges");
        let mut lengths: Vec<f64> = edges.iter().map(|e| euclidean(features, dim, e.i, e.j)).collect();
        lengths.sort_by(|a, b| a.total_cmp(b));

        let shortest = ((lengths.len() as f64 * DELTA_FRACTION).ceil() as usize).max(1);
        let delta = (lengths[..shortest].iter().sum::<f64>() / shortest as f64).max(MIN_DELTA);
        let r = lengths[lengths.len() - 1];
        let mu = (3.0 * r * r).max(delta * delta);

        let mut schedule = Self { delta, mu1: mu, mu2: mu, lambda: 0.0 };
        schedule.rebalance(features, dim, edges)?;
        Ok(schedule)
    }

    /// Set λ = ‖Z‖₂ / ‖L‖₂ for the current representatives and μ2.
    pub fn rebalance(&mut self, reps: &[f32], dim: usize, edges: &[WeightedEdge]) -> Result<()> {
        let n = reps.len() / dim;
        let weights: Vec<f64> = edges
            .iter()
            .map(|e| {
                let d = euclidean(reps, dim, e.i, e.j);
                let shrink = self.mu2 / (self.mu2 + d * d);
                e.weight as f64 * shrink * shrink
            })
            .collect();
        let graph_norm = laplacian_norm(n, edges, &weights);
        ensure!(graph_norm > 0.0, "graph Laplacian vanishes, edge weights are all zero");
        self.lambda = spectral_norm(reps, dim)? / graph_norm;
        Ok(())
    }

    pub fn floor(&self) -> f64 {
        self.delta * self.delta
    }

    /// Halve both scales, clamped at δ².
    pub fn anneal(&mut self) {
        let floor = self.floor();
        self.mu1 = (self.mu1 / 2.0).max(floor);
        self.mu2 = (self.mu2 / 2.0).max(floor);
    }

    pub fn at_floor(&self) -> bool {
        let floor = self.floor();
        self.mu1 <= floor && self.mu2 <= floor
    }
}

// ─── Spectral norms ───────────────────────────────────────────────────────────

/// Largest eigenvalue of a symmetric PSD operator on `n`-vectors.
fn power_iteration(n: usize, apply: impl Fn(&Array1<f64>) -> Array1<f64>) -> f64 {
    let mut v = Array1::from_iter((0..n).map(|i| ((i + 1) as f64).sin()));
    let norm = v.dot(&v).sqrt();
    if norm < 1e-15 {
        return 0.0;
    }
    v /= norm;

    let mut estimate = 0.0;
    for _ in 0..POWER_ITERATIONS {
        let u = apply(&v);
        let norm = u.dot(&u).sqrt();
        if norm < 1e-15 {
            return 0.0;
        }
        let settled = (norm - estimate).abs() <= POWER_TOLERANCE * norm;
        estimate = norm;
        v = u / norm;
        if settled {
            break;
        }
    }
    estimate
}

/// Largest singular value of the row-major `n x dim` matrix.
fn spectral_norm(values: &[f32], dim: usize) -> Result<f64> {
    let n = values.len() / dim;
    let x = Array2::from_shape_vec((n, dim), values.iter().map(|&v| v as f64).collect())?;
    let gram = x.t().dot(&x);
    Ok(power_iteration(dim, |v| gram.dot(v)).sqrt())
}

/// Largest eigenvalue of the weighted graph Laplacian.
fn laplacian_norm(n: usize, edges: &[WeightedEdge], weights: &[f64]) -> f64 {
    power_iteration(n, |v| {
        let mut u = Array1::<f64>::zeros(n);
        for (e, w) in edges.iter().zip(weights) {
            let d = w * (v[e.i] - v[e.j]);
            u[e.i] += d;
            u[e.j] -= d;
        }
        u
    })
}

fn edge_degrees(n: usize, edges: &[WeightedEdge]) -> Vec<usize> {
    let mut deg = vec![0usize; n];
    for e in edges {
        deg[e.i] += 1;
        deg[e.j] += 1;
    }
    deg
}

// ─── Assignments ──────────────────────────────────────────────────────────────

/// Connected components over edges shorter than `delta`, with
/// cluster ids numbered in order of first appearance.
pub fn connected_assignments(reps: &[f32], dim: usize, n: usize, edges: &[WeightedEdge], delta: f64) -> Vec<usize> {
    let mut uf = UnionFind::<usize>::new(n);
    for e in edges {
        if euclidean(reps, dim, e.i, e.j) < delta {
            uf.union(e.i, e.j);
        }
    }
    let mut dense: HashMap<usize, usize> = HashMap::new();
    uf.into_labeling()
        .into_iter()
        .map(|root| {
            let next = dense.len();
            *dense.entry(root).or_insert(next)
        })
        .collect()
}

fn changed_fraction(before: &[usize], after: &[usize]) -> f64 {
    if after.is_empty() {
        return 0.0;
    }
    let changed = before.iter().zip(after).filter(|(a, b)| a != b).count();
    changed as f64 / after.len() as f64
}

// ─── Model ────────────────────────────────────────────────────────────────────

/// Tensors for one batch of edges.
pub struct DccBatch<B: Backend> {
    /// Data rows of the samples touched by the batch
    pub inputs:       Tensor<B, 2>,
    /// Global ids of the samples in `inputs`, row by row
    pub nodes:        Tensor<B, 1, Int>,
    /// [nodes, 1]: batch edges at the node over its degree
    pub node_weights: Tensor<B, 2>,
    pub pair_i:       Tensor<B, 1, Int>,
    pub pair_j:       Tensor<B, 1, Int>,
    /// [pairs, 1]
    pub weights:      Tensor<B, 2>,
    pub n_nodes:      usize,
}

#[derive(Module, Debug)]
pub struct DccModel<B: Backend> {
    /// None stands for the identity network
    pub net:  Option<Autoencoder<B>>,
    /// One row per sample
    pub reps: Param<Tensor<B, 2>>,
}

impl<B: Backend> DccModel<B> {
    pub fn new(net: Option<Autoencoder<B>>, initial: Tensor<B, 2>) -> Self {
        Self { net, reps: Param::from_tensor(initial) }
    }

    /// (encoding, reconstruction) through the network, or the identity.
    pub fn network_forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        match &self.net {
            Some(net) => net.forward(x),
            None => IdentityNet.forward(x),
        }
    }

    pub fn loss(&self, batch: DccBatch<B>, schedule: &DccSchedule) -> Tensor<B, 1> {
        let reps = self.reps.val();
        let d = reps.dims()[1];

        let (encoded, recon) = self.network_forward(batch.inputs.clone());
        let recon_loss = MseLoss::new().forward(recon, batch.inputs, Reduction::Mean);

        let z_nodes = reps.clone().select(0, batch.nodes);
        let data_term = (geman_mcclure_tensor(squared_distance(encoded, z_nodes), schedule.mu1)
            * batch.node_weights)
            .sum();

        let z_i = reps.clone().select(0, batch.pair_i);
        let z_j = reps.select(0, batch.pair_j);
        let pair_term = (geman_mcclure_tensor(squared_distance(z_i, z_j), schedule.mu2) * batch.weights).sum();

        let clustering = (data_term + pair_term.mul_scalar(schedule.lambda))
            .div_scalar((batch.n_nodes * d) as f64);
        clustering + recon_loss
    }

    pub fn representatives(&self) -> Result<Vec<f32>> {
        self.reps
            .val()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read representatives: {e:?}"))
    }
}

// ─── Optimizer ────────────────────────────────────────────────────────────────

pub struct BurnDccOptimizer<B: AutodiffBackend> {
    device: B::Device,
}

impl<B: AutodiffBackend> BurnDccOptimizer<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn load_network(&self, network: Network, c: &CombinedArtifact, layout: &ArtifactLayout) -> Result<Option<Autoencoder<B>>> {
        let Network::Trained { checkpoint_index } = network else {
            ensure!(
                c.feature_dim == c.data_dim,
                "identity network needs features of the data dimension {}, got {}",
                c.data_dim,
                c.feature_dim
            );
            return Ok(None);
        };
        let ckpt = CheckpointManager::new(layout.checkpoint_dir())?;
        let cfg = ckpt.load_config()?;
        ensure!(
            cfg.layer_dims.first() == Some(&c.data_dim) && cfg.layer_dims.last() == Some(&c.feature_dim),
            "checkpoint network {:?} does not map {}-d data to {}-d features",
            cfg.layer_dims,
            c.data_dim,
            c.feature_dim
        );
        Ok(Some(ckpt.load_model(cfg.init(&self.device), checkpoint_index, &self.device)?))
    }

    fn batch(&self, c: &CombinedArtifact, edges: &[WeightedEdge], degrees: &[usize]) -> DccBatch<B> {
        let batcher = PointBatcher::<B>::new(self.device.clone());
        let mut touched: BTreeMap<usize, usize> = BTreeMap::new();
        for e in edges {
            *touched.entry(e.i).or_insert(0) += 1;
            *touched.entry(e.j).or_insert(0) += 1;
        }
        let nodes: Vec<usize> = touched.keys().copied().collect();
        let node_weights: Vec<f32> = touched
            .iter()
            .map(|(&node, &count)| count as f32 / degrees[node].max(1) as f32)
            .collect();
        let inputs = batcher.rows(&c.data, c.data_dim, &nodes);
        let pair_i: Vec<usize> = edges.iter().map(|e| e.i).collect();
        let pair_j: Vec<usize> = edges.iter().map(|e| e.j).collect();
        let weights: Vec<f32> = edges.iter().map(|e| e.weight).collect();

        DccBatch {
            inputs,
            nodes:        batcher.indices(&nodes),
            node_weights: batcher.column(&node_weights),
            pair_i:       batcher.indices(&pair_i),
            pair_j:       batcher.indices(&pair_j),
            weights:      batcher.column(&weights),
            n_nodes:      nodes.len(),
        }
    }

    /// Run DCC on an in-memory artifact.
    pub fn run(
        &self,
        c:       &CombinedArtifact,
        network: Network,
        config:  &DccConfig,
        layout:  &ArtifactLayout,
    ) -> Result<ClusterResult> {
        ensure!(c.n > 0, "combined artifact has no samples");
        ensure!(!c.edges.is_empty(), "combined artifact has no edges");
        ensure!(
            c.features.len() == c.n * c.feature_dim && c.data.len() == c.n * c.data_dim,
            "combined artifact buffers do not match n = {}",
            c.n
        );

        let net = self.load_network(network, c, layout)?;
        let degrees = edge_degrees(c.n, &c.edges);
        let batcher = PointBatcher::<B>::new(self.device.clone());
        let mut model = DccModel::new(net, batcher.matrix(&c.features, c.n, c.feature_dim));
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

        let mut schedule = DccSchedule::from_initial(&c.features, c.feature_dim, &c.edges)?;
        tracing::info!(
            "DCC on {} samples, {} edges, network {}: δ={:.4e}, μ={:.4e}, λ={:.4}",
            c.n,
            c.edges.len(),
            network,
            schedule.delta,
            schedule.mu1,
            schedule.lambda
        );

        let logger = MetricsLogger::new::<EpochMetrics>(&layout.log_dir(c.n), "dcc.csv")?;
        let mut assignments = connected_assignments(&c.features, c.feature_dim, c.n, &c.edges, schedule.delta);
        let mut n_clusters = assignments.iter().max().map_or(0, |m| m + 1);
        let mut order: Vec<usize> = (0..c.edges.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut epochs_run = 0;

        for epoch in 1..=config.nepoch {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f64;
            let mut batches = 0usize;

            for chunk in order.chunks(config.pairs_per_batch) {
                let edges: Vec<WeightedEdge> = chunk.iter().map(|&e| c.edges[e]).collect();
                let loss = model.loss(self.batch(c, &edges, &degrees), &schedule);
                loss_sum += loss.clone().into_scalar().elem::<f64>();
                batches += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(config.lr, model, grads);
            }
            epochs_run = epoch;
            let mean_loss = loss_sum / batches.max(1) as f64;

            let mut converged = false;
            if epoch % config.m == 0 {
                schedule.anneal();
                let reps = model.representatives()?;
                schedule.rebalance(&reps, c.feature_dim, &c.edges)?;
                let next = connected_assignments(&reps, c.feature_dim, c.n, &c.edges, schedule.delta);
                let changed = changed_fraction(&assignments, &next);
                assignments = next;
                n_clusters = assignments.iter().max().map_or(0, |m| m + 1);
                tracing::info!(
                    "epoch {:>4} | loss={:.6} | μ1={:.3e} μ2={:.3e} λ={:.4} | clusters={} | changed={:.3}%",
                    epoch,
                    mean_loss,
                    schedule.mu1,
                    schedule.mu2,
                    schedule.lambda,
                    n_clusters,
                    changed * 100.0
                );
                converged = schedule.at_floor() && changed < STOP_FRACTION;
            } else {
                tracing::debug!("epoch {:>4} | loss={:.6}", epoch, mean_loss);
            }

            logger.log(&EpochMetrics {
                epoch,
                loss: mean_loss,
                mu1: schedule.mu1,
                mu2: schedule.mu2,
                n_clusters,
            })?;

            if converged {
                tracing::info!("Assignments stable at the final scale, stopping after epoch {}", epoch);
                break;
            }
        }

        let representatives = model.representatives()?;
        // The last check may predate the final epochs
        let assignments = connected_assignments(&representatives, c.feature_dim, c.n, &c.edges, schedule.delta);
        let n_clusters = assignments.iter().max().map_or(0, |m| m + 1);

        let labelled = c.labels.len() == c.n;
        let (ari_score, nmi_score) = if labelled {
            (Some(ari(&assignments, &c.labels)), Some(nmi(&assignments, &c.labels)))
        } else {
            (None, None)
        };
        if let (Some(a), Some(m)) = (ari_score, nmi_score) {
            tracing::info!("DCC finished: {} clusters, ARI={:.4}, NMI={:.4}", n_clusters, a, m);
        } else {
            tracing::info!("DCC finished: {} clusters", n_clusters);
        }

        Ok(ClusterResult {
            assignments,
            n_clusters,
            representatives,
            epochs_run,
            ari: ari_score,
            nmi: nmi_score,
        })
    }
}

impl<B: AutodiffBackend> ClusterOptimizer for BurnDccOptimizer<B> {
    fn optimize(
        &self,
        combined: &Path,
        network:  Network,
        config:   &DccConfig,
        layout:   &ArtifactLayout,
    ) -> Result<ClusterResult> {
        let c: CombinedArtifact = artifact_store::load_json(combined)?;
        self.run(&c, network, config, layout)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::CheckpointManager;
    use crate::ml::model::AutoencoderConfig;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn edge(i: usize, j: usize) -> WeightedEdge {
        WeightedEdge { i, j, weight: 1.0 }
    }

    /// Three groups of four coincident points, each group a clique.
    fn three_groups() -> CombinedArtifact {
        let centres = [(0.0f32, 0.0f32), (10.0, 10.0), (-10.0, 10.0)];
        let mut data = Vec::new();
        let mut labels = Vec::new();
        let mut edges = Vec::new();
        for (g, (x, y)) in centres.iter().enumerate() {
            for _ in 0..4 {
                data.extend([*x, *y]);
                labels.push(g);
            }
            let base = g * 4;
            for a in 0..4 {
                for b in a + 1..4 {
                    edges.push(edge(base + a, base + b));
                }
            }
        }
        CombinedArtifact {
            n: 12,
            data_dim: 2,
            feature_dim: 2,
            features: data.clone(),
            data,
            labels,
            edges,
        }
    }

    #[test]
    fn test_geman_mcclure_shape() {
        let s = PointBatcher::<TestBackend>::new(Default::default()).column(&[0.0, 2.0, 1e9]);
        let rho = geman_mcclure_tensor(s, 2.0).into_data().to_vec::<f32>().unwrap();
        assert_eq!(rho[0], 0.0);
        assert!((rho[1] - 1.0).abs() < 1e-6);
        // Saturates at μ for large residuals
        assert!(rho[2] <= 2.0);
        assert!(rho[2] > 1.99);
    }

    #[test]
    fn test_schedule_from_initial_edges() {
        // Edge lengths 1, 2 and 3 along a line
        let features = vec![0.0, 1.0, 3.0, 6.0];
        let edges = vec![edge(0, 1), edge(1, 2), edge(2, 3)];
        let s = DccSchedule::from_initial(&features, 1, &edges).unwrap();
        assert!((s.delta - 1.0).abs() < 1e-9);
        assert!((s.mu1 - 27.0).abs() < 1e-9);
        assert_eq!(s.mu1, s.mu2);
        assert!(s.lambda > 0.0);
    }

    #[test]
    fn test_lambda_balances_data_and_graph_norms() {
        // ‖Z‖ = 1; one edge of length 1 with μ = 3 keeps (3/4)² of its
        // weight, and a single edge's Laplacian has norm 2w
        let s = DccSchedule::from_initial(&[0.0, 1.0], 1, &[edge(0, 1)]).unwrap();
        assert!((s.mu2 - 3.0).abs() < 1e-12);
        assert!((s.lambda - 1.0 / 1.125).abs() < 1e-6);
    }

    #[test]
    fn test_lambda_grows_as_long_edges_are_discounted() {
        // Two tight pairs joined by one long edge
        let reps = vec![0.0, 0.1, 10.0, 10.1];
        let edges = vec![edge(0, 1), edge(1, 2), edge(2, 3)];
        let mut s = DccSchedule::from_initial(&reps, 1, &edges).unwrap();
        let before = s.lambda;
        for _ in 0..3 {
            s.anneal();
        }
        s.rebalance(&reps, 1, &edges).unwrap();
        assert!(s.lambda > before);
    }

    #[test]
    fn test_power_iteration_norms() {
        // diag(3, 1) has spectral norm 3
        let x = vec![3.0, 0.0, 0.0, 1.0];
        assert!((spectral_norm(&x, 2).unwrap() - 3.0).abs() < 1e-6);
        // Unit path 0-1-2: Laplacian eigenvalues 0, 1, 3
        let edges = vec![edge(0, 1), edge(1, 2)];
        assert!((laplacian_norm(3, &edges, &[1.0, 1.0]) - 3.0).abs() < 1e-6);
        assert_eq!(laplacian_norm(3, &edges, &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_anneal_stops_at_delta_squared() {
        let mut s = DccSchedule { delta: 1.0, mu1: 5.0, mu2: 5.0, lambda: 1.0 };
        s.anneal();
        assert_eq!(s.mu1, 2.5);
        assert!(!s.at_floor());
        s.anneal();
        s.anneal();
        assert_eq!(s.mu1, 1.0);
        assert!(s.at_floor());
    }

    #[test]
    fn test_connected_assignments_dense_first_appearance() {
        // 0-1 close, 2-3 close, 1-2 far apart
        let reps = vec![0.0, 0.1, 5.0, 5.05, 9.0];
        let edges = vec![edge(0, 1), edge(1, 2), edge(2, 3)];
        let a = connected_assignments(&reps, 1, 5, &edges, 0.5);
        assert_eq!(a, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_batch_node_weights_share_each_degree() {
        let c = three_groups();
        let degrees = edge_degrees(c.n, &c.edges);
        let optimizer = BurnDccOptimizer::<TestBackend>::new(Default::default());
        // Node 1 sits on both edges, nodes 0 and 2 on one each; all have degree 3
        let batch = optimizer.batch(&c, &[edge(0, 1), edge(1, 2)], &degrees);
        assert_eq!(batch.n_nodes, 3);
        let w = batch.node_weights.into_data().to_vec::<f32>().unwrap();
        assert!((w[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((w[1] - 2.0 / 3.0).abs() < 1e-6);
        assert!((w[2] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_identity_loss_is_zero_at_the_data() {
        let c = CombinedArtifact {
            n: 2,
            data_dim: 2,
            feature_dim: 2,
            data: vec![1.0, 1.0, 1.0, 1.0],
            features: vec![1.0, 1.0, 1.0, 1.0],
            labels: vec![0, 0],
            edges: vec![edge(0, 1)],
        };
        let device = Default::default();
        let optimizer = BurnDccOptimizer::<TestBackend>::new(device);
        let schedule = DccSchedule { delta: 1.0, mu1: 1.0, mu2: 1.0, lambda: 1.0 };
        let model = DccModel::new(None, PointBatcher::<TestBackend>::new(device).matrix(&c.features, 2, 2));
        let degrees = edge_degrees(2, &c.edges);
        let loss = model.loss(optimizer.batch(&c, &c.edges, &degrees), &schedule);
        assert_eq!(loss.into_scalar().elem::<f64>(), 0.0);
    }

    #[test]
    fn test_identity_dcc_clusters_easy_blobs() {
        use crate::data::{graph::neighbor_edges, merge::combine, provider::make_easy_visual_data};
        use crate::domain::artifacts::{FeatureSet, GraphAlgo, GraphArtifact};

        let points = make_easy_visual_data(90, 7).unwrap();
        let graph = GraphArtifact {
            n:     90,
            k:     10,
            algo:  GraphAlgo::Knn,
            edges: neighbor_edges(&points.points, 2, 10, GraphAlgo::Knn),
        };
        let features = FeatureSet { dim: 2, features: points.points.clone() };
        let c = combine(&graph, &features, &points).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let cfg = DccConfig { lr: 0.01, ..Default::default() };
        let result = BurnDccOptimizer::<TestBackend>::new(Default::default())
            .run(&c, Network::Identity, &cfg, &layout)
            .unwrap();
        assert_eq!(result.assignments.len(), 90);
        assert!(result.ari.unwrap() >= 0.9, "ARI {:?}, {} clusters", result.ari, result.n_clusters);
    }

    #[test]
    fn test_identity_dcc_recovers_groups() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let cfg = DccConfig { nepoch: 30, m: 5, pairs_per_batch: 8, ..Default::default() };

        let result = BurnDccOptimizer::<TestBackend>::new(Default::default())
            .run(&three_groups(), Network::Identity, &cfg, &layout)
            .unwrap();
        assert_eq!(result.n_clusters, 3);
        assert_eq!(result.assignments, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
        assert!((result.ari.unwrap() - 1.0).abs() < 1e-9);
        // Coincident groups: μ starts at its floor and no gradient
        // moves a representative, so the first check stops the run
        assert_eq!(result.epochs_run, 5);
        let log = std::fs::read_to_string(layout.log_dir(12).join("dcc.csv")).unwrap();
        assert_eq!(log.lines().count(), 1 + 5);
    }

    #[test]
    fn test_trained_network_run_produces_one_assignment_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let device = Default::default();
        let ae_cfg = AutoencoderConfig::new(vec![2, 4, 2]);
        let ckpt = CheckpointManager::new(layout.checkpoint_dir()).unwrap();
        ckpt.save_config(&ae_cfg).unwrap();
        ckpt.save_model(&ae_cfg.init::<TestBackend>(&device), 2).unwrap();

        let cfg = DccConfig { nepoch: 4, m: 2, pairs_per_batch: 16, ..Default::default() };
        let result = BurnDccOptimizer::<TestBackend>::new(device)
            .run(&three_groups(), Network::Trained { checkpoint_index: 2 }, &cfg, &layout)
            .unwrap();
        assert_eq!(result.assignments.len(), 12);
        assert_eq!(result.representatives.len(), 24);
        assert!(result.epochs_run <= 4);
        assert!(result.nmi.is_some());
    }

    #[test]
    fn test_identity_rejects_reduced_features() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let mut c = three_groups();
        c.feature_dim = 1;
        c.features.truncate(12);
        let err = BurnDccOptimizer::<TestBackend>::new(Default::default())
            .run(&c, Network::Identity, &DccConfig::default(), &layout)
            .unwrap_err();
        assert!(err.to_string().contains("identity network"));
    }
}
