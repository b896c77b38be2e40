// ============================================================
// Layer 2: Pipeline (one run)
// ============================================================
// Runs the DCC pipeline once for a given sample count N:
//
//   Step 1: Provide the dataset            (Layer 4 - data)
//   Step 2: Build the neighbour graph      (Layer 4 - data)
//   Step 3: Pretrain the autoencoder       (Layer 5 - ml)
//   Step 4: Extract features               (Layer 5 - ml)
//   Step 5: Merge graph and features       (Layer 4 - data)
//   Step 6: Run DCC                        (Layer 5 - ml)
//   Step 7: Save the cluster result        (Layer 6 - infra)
//
// The stages are trait objects so this file only sequences them.
// After each stage the artifact it handed on is checked on disk,
// so a stage that "succeeds" without writing its output stops
// the run with the missing path in the error.
//
// Which network flows into steps 4 and 6 is decided by the
// configured NetworkMode:
//   pretrain           → step 3 runs, its network is used
//   identity           → step 3 is skipped, Network::Identity
//   latest_checkpoint  → step 3 is skipped, the final checkpoint
//                        already on disk is used

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::config::RunConfig;
use crate::data::{graph::NeighborGraphBuilder, merge::GraphFeatureMerger, provider::DatasetProvider};
use crate::domain::{
    artifacts::{ArtifactLayout, ClusterResult},
    dataset::PointSet,
    network::{Network, NetworkMode},
    traits::{ClusterOptimizer, DataProvider, FeatureExtractor, GraphConstructor, GraphMerger, Pretrainer},
};
use crate::infra::{
    artifact_store,
    plot::{FigureKind, PlotContext},
};
use crate::ml::{dcc::BurnDccOptimizer, extractor::BurnExtractor, pretrainer::BurnPretrainer};

// ─── Collaborators ────────────────────────────────────────────────────────────
/// The five stages (merge counted with extraction) a run calls.
pub struct Collaborators {
    pub data:       Box<dyn DataProvider>,
    pub graph:      Box<dyn GraphConstructor>,
    pub pretrainer: Box<dyn Pretrainer>,
    pub extractor:  Box<dyn FeatureExtractor>,
    pub merger:     Box<dyn GraphMerger>,
    pub optimizer:  Box<dyn ClusterOptimizer>,
}

impl Collaborators {
    /// The in-crate implementations on backend `B`.
    pub fn burn<B: AutodiffBackend>(device: B::Device, data_seed: u64) -> Self {
        Self {
            data:       Box::new(DatasetProvider::new(data_seed)),
            graph:      Box::new(NeighborGraphBuilder::new()),
            pretrainer: Box::new(BurnPretrainer::<B>::new(device.clone())),
            extractor:  Box::new(BurnExtractor::<B>::new(device.clone())),
            merger:     Box::new(GraphFeatureMerger::new()),
            optimizer:  Box::new(BurnDccOptimizer::<B>::new(device)),
        }
    }
}

// ─── RunReport ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RunReport {
    pub n:           usize,
    pub dir:         PathBuf,
    pub network:     Network,
    pub result_path: PathBuf,
    pub result:      ClusterResult,
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────
pub struct Pipeline {
    config: RunConfig,
    stages: Collaborators,
}

impl Pipeline {
    pub fn new(config: RunConfig, stages: Collaborators) -> Self {
        Self { config, stages }
    }

    /// Run every stage once for `n` samples.
    pub fn run_once(&self, n: usize, plots: &mut PlotContext) -> Result<RunReport> {
        let cfg = &self.config;
        let dataset = cfg.dataset.with_samples(n);
        let layout = ArtifactLayout::new(dataset.data_dir(&cfg.data_root));
        tracing::info!("── Run N={} in '{}' ──", n, layout.dir().display());

        // ── Step 1: Dataset ───────────────────────────────────────────────────
        let points = self.stages.data.provide(&dataset, &layout)?;
        artifact_store::require(&layout.dataset(), "data")?;
        plot_classes(plots, n, &points);

        // ── Step 2: Neighbour graph ───────────────────────────────────────────
        let graph_path = self.stages.graph.construct(&dataset, &points, &cfg.graph, &layout)?;
        artifact_store::require(&graph_path, "graph construction")?;

        // ── Step 3: Network ───────────────────────────────────────────────────
        let network = match cfg.network {
            NetworkMode::Pretrain => {
                let outcome = self.stages.pretrainer.pretrain(&dataset, &points, &cfg.pretrain, &layout)?;
                tracing::info!("Pretraining finished at checkpoint {}", outcome.checkpoint_index);
                outcome.network
            }
            NetworkMode::Identity => Network::Identity,
            NetworkMode::LatestCheckpoint => Network::Trained {
                checkpoint_index: dataset.final_checkpoint_index(),
            },
        };
        if network != Network::Identity {
            artifact_store::require(&layout.checkpoint_dir(), "pretraining")?;
        }

        // ── Step 4: Features ──────────────────────────────────────────────────
        let features_path = self.stages.extractor.extract(&points, network, &cfg.features, &layout)?;
        artifact_store::require(&features_path, "feature extraction")?;

        // ── Step 5: Merge ─────────────────────────────────────────────────────
        let combined_path =
            self.stages.merger.merge(&graph_path, &features_path, &points, &cfg.features, &layout)?;
        artifact_store::require(&combined_path, "merge")?;

        // ── Step 6: DCC ───────────────────────────────────────────────────────
        let result = self.stages.optimizer.optimize(&combined_path, network, &cfg.dcc, &layout)?;

        // ── Step 7: Result ────────────────────────────────────────────────────
        let result_path = layout.result(&cfg.features.out, n);
        artifact_store::save_json(&result_path, &result)?;
        tracing::info!(
            "Run N={} done: {} clusters in {} epochs → '{}'",
            n,
            result.n_clusters,
            result.epochs_run,
            result_path.display()
        );

        Ok(RunReport { n, dir: layout.dir().to_path_buf(), network, result_path, result })
    }
}

/// Scatter of the first two coordinates, one series per class.
fn plot_classes(plots: &mut PlotContext, n: usize, points: &PointSet) {
    let figure = plots.figure(&format!("data_n{n}"), &format!("Data (N={n})"), FigureKind::Scatter);
    if points.is_labelled() {
        for class in points.classes() {
            figure.extend(&format!("class_{class}"), points.class_xy(class));
        }
    } else {
        let xy = points.rows().map(|r| (r[0] as f64, r.get(1).copied().unwrap_or(0.0) as f64));
        figure.extend("samples", xy);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::config::{DccConfig, FeatureConfig, GraphConfig, PretrainConfig};
    use crate::domain::{
        artifacts::ClusterResult,
        dataset::DatasetDescriptor,
        traits::PretrainOutcome,
    };
    use std::{
        cell::RefCell,
        fs,
        path::Path,
        rc::Rc,
    };

    pub type Calls = Rc<RefCell<Vec<String>>>;

    /// Stage fakes that write placeholder artifacts and record each call.
    pub struct Recorder {
        pub calls:     Calls,
        /// Sample count at which the data stage fails
        pub fail_at:   Option<usize>,
    }

    fn touch(path: &Path) -> PathBuf {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
        path.to_path_buf()
    }

    struct FakeData(Calls, Option<usize>);
    impl DataProvider for FakeData {
        fn provide(&self, dataset: &DatasetDescriptor, layout: &ArtifactLayout) -> Result<PointSet> {
            self.0.borrow_mut().push(format!("data:{}", dataset.n_samples));
            anyhow::ensure!(Some(dataset.n_samples) != self.1, "data failed");
            touch(&layout.dataset());
            PointSet::new(2, vec![0.0; dataset.n_samples * 2], vec![0; dataset.n_samples])
        }
    }

    struct FakeGraph(Calls);
    impl GraphConstructor for FakeGraph {
        fn construct(&self, _: &DatasetDescriptor, _: &PointSet, cfg: &GraphConfig, layout: &ArtifactLayout) -> Result<PathBuf> {
            self.0.borrow_mut().push(format!("graph:k{}", cfg.k));
            Ok(touch(&layout.pretrained_graph(cfg.format)))
        }
    }

    struct FakePretrainer(Calls);
    impl Pretrainer for FakePretrainer {
        fn pretrain(&self, dataset: &DatasetDescriptor, _: &PointSet, cfg: &PretrainConfig, layout: &ArtifactLayout) -> Result<PretrainOutcome> {
            self.0
                .borrow_mut()
                .push(format!("pretrain:resume={}:level={:?}", cfg.resume, cfg.level));
            fs::create_dir_all(layout.checkpoint_dir()).unwrap();
            let index = dataset.final_checkpoint_index();
            Ok(PretrainOutcome { checkpoint_index: index, network: Network::Trained { checkpoint_index: index } })
        }
    }

    struct FakeExtractor(Calls);
    impl FeatureExtractor for FakeExtractor {
        fn extract(&self, _: &PointSet, network: Network, cfg: &FeatureConfig, layout: &ArtifactLayout) -> Result<PathBuf> {
            self.0.borrow_mut().push(format!("extract:{network}"));
            Ok(touch(&layout.features(&cfg.feat)))
        }
    }

    struct FakeMerger(Calls);
    impl GraphMerger for FakeMerger {
        fn merge(&self, _: &Path, _: &Path, points: &PointSet, cfg: &FeatureConfig, layout: &ArtifactLayout) -> Result<PathBuf> {
            self.0.borrow_mut().push("merge".to_string());
            Ok(touch(&layout.combined(&cfg.out, points.len())))
        }
    }

    struct FakeOptimizer(Calls);
    impl ClusterOptimizer for FakeOptimizer {
        fn optimize(&self, _: &Path, network: Network, cfg: &DccConfig, _: &ArtifactLayout) -> Result<ClusterResult> {
            self.0.borrow_mut().push(format!("cluster:{network}:nepoch={}", cfg.nepoch));
            Ok(ClusterResult {
                assignments:     vec![0],
                n_clusters:      1,
                representatives: vec![0.0, 0.0],
                epochs_run:      cfg.nepoch,
                ari:             None,
                nmi:             None,
            })
        }
    }

    impl Recorder {
        pub fn new() -> Self {
            Self { calls: Rc::new(RefCell::new(Vec::new())), fail_at: None }
        }

        pub fn collaborators(&self) -> Collaborators {
            let c = &self.calls;
            Collaborators {
                data:       Box::new(FakeData(c.clone(), self.fail_at)),
                graph:      Box::new(FakeGraph(c.clone())),
                pretrainer: Box::new(FakePretrainer(c.clone())),
                extractor:  Box::new(FakeExtractor(c.clone())),
                merger:     Box::new(FakeMerger(c.clone())),
                optimizer:  Box::new(FakeOptimizer(c.clone())),
            }
        }

        /// Stage names without arguments
        pub fn stages(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.split(':').next().unwrap_or_default().to_string())
                .collect()
        }
    }

    pub fn config_in(root: &Path) -> RunConfig {
        RunConfig { data_root: root.to_path_buf(), ..RunConfig::default() }
    }

    #[test]
    fn test_stages_run_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Recorder::new();
        let pipeline = Pipeline::new(config_in(dir.path()), rec.collaborators());
        let mut plots = PlotContext::new(dir.path().join("plots"));

        let report = pipeline.run_once(100, &mut plots).unwrap();
        assert_eq!(rec.stages(), vec!["data", "graph", "pretrain", "extract", "merge", "cluster"]);
        assert_eq!(report.network, Network::Trained { checkpoint_index: 3 });
        assert!(report.result_path.exists());
        assert!(plots.get("data_n100").is_some());
    }

    #[test]
    fn test_trained_network_reaches_downstream_stages() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Recorder::new();
        Pipeline::new(config_in(dir.path()), rec.collaborators())
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap();
        let calls = rec.calls.borrow();
        assert_eq!(calls[3], "extract:checkpoint_3");
        assert_eq!(calls[5], "cluster:checkpoint_3:nepoch=500");
    }

    #[test]
    fn test_resume_and_level_pass_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.pretrain.resume = true;
        cfg.pretrain.level  = Some(2);
        let rec = Recorder::new();
        Pipeline::new(cfg, rec.collaborators())
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap();
        assert!(rec.calls.borrow().contains(&"pretrain:resume=true:level=Some(2)".to_string()));

        let rec = Recorder::new();
        Pipeline::new(config_in(dir.path()), rec.collaborators())
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap();
        assert!(rec.calls.borrow().contains(&"pretrain:resume=false:level=None".to_string()));
    }

    #[test]
    fn test_identity_mode_skips_pretraining() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.network = NetworkMode::Identity;
        let rec = Recorder::new();
        let report = Pipeline::new(cfg, rec.collaborators())
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap();
        assert_eq!(rec.stages(), vec!["data", "graph", "extract", "merge", "cluster"]);
        assert_eq!(report.network, Network::Identity);
        assert_eq!(rec.calls.borrow()[2], "extract:identity");
    }

    #[test]
    fn test_latest_checkpoint_requires_checkpoints_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.network = NetworkMode::LatestCheckpoint;
        let rec = Recorder::new();
        let err = Pipeline::new(cfg, rec.collaborators())
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap_err();
        assert!(err.to_string().contains("checkpoints"));
        assert_eq!(rec.stages(), vec!["data", "graph"]);
    }

    #[test]
    fn test_missing_artifact_stops_the_run() {
        struct LazyGraph;
        impl GraphConstructor for LazyGraph {
            fn construct(&self, _: &DatasetDescriptor, _: &PointSet, _: &GraphConfig, layout: &ArtifactLayout) -> Result<PathBuf> {
                Ok(layout.dir().join("never_written.json"))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let rec = Recorder::new();
        let mut stages = rec.collaborators();
        stages.graph = Box::new(LazyGraph);
        let err = Pipeline::new(config_in(dir.path()), stages)
            .run_once(10, &mut PlotContext::new(dir.path()))
            .unwrap_err();
        assert!(err.to_string().contains("never_written.json"));
        assert_eq!(rec.stages(), vec!["data"]);
    }

    #[test]
    fn test_burn_stages_run_end_to_end_on_cpu() {
        use crate::application::config::DeviceConfig;
        use crate::ml::backend::{cpu_device, CpuBackend};

        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.network = NetworkMode::Pretrain;
        cfg.graph.k = 5;
        cfg.pretrain.niter = 2;
        cfg.pretrain.device = DeviceConfig { ngpu: 0, device_id: 0 };
        cfg.dcc.nepoch = 4;
        cfg.validate().unwrap();

        let seed = cfg.pretrain.seed;
        let pipeline = Pipeline::new(cfg, Collaborators::burn::<CpuBackend>(cpu_device(), seed));
        let mut plots = PlotContext::new(dir.path().join("plots"));
        let report = pipeline.run_once(30, &mut plots).unwrap();

        assert_eq!(report.network, Network::Trained { checkpoint_index: 3 });
        assert!(report.result_path.exists());
        assert!(report.result_path.ends_with("results/dcc_pretrained_n30.json"));
        assert_eq!(report.result.assignments.len(), 30);
        assert!(report.result.epochs_run >= 1 && report.result.epochs_run <= 4);
        let saved: ClusterResult = artifact_store::load_json(&report.result_path).unwrap();
        assert_eq!(saved.assignments, report.result.assignments);
    }
}
