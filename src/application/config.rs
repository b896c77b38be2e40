// ============================================================
// Layer 2: Run Configuration
// ============================================================
// Every option a run recognises, declared up front. The CLI
// builds one of these, or loads it from JSON; a misspelled or
// unknown key is rejected by serde (deny_unknown_fields) instead
// of silently becoming a new attribute.
//
// Defaults reproduce the easy dataset run:
//   k = 50 neighbours, knn graph, no preprocessing
//   pretraining: 500 iterations, lr 0.001 decayed every 300, batch 300
//   DCC: 500 epochs, 128 pairs per batch, continuation every 20 epochs

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocess::Preprocess;
use crate::domain::{
    artifacts::{GraphAlgo, GraphFormat},
    dataset::DatasetDescriptor,
    network::NetworkMode,
};

/// Seed shared by pretraining and DCC unless overridden
pub const RNG_SEED: u64 = 50;

/// Edges per DCC mini-batch
pub const PAIRS_PER_BATCH: usize = 128;

// ─── Graph construction ──────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GraphConfig {
    /// Neighbours per sample
    pub k:          usize,
    pub preprocess: Preprocess,
    pub algo:       GraphAlgo,
    /// Project to this many principal components before the search
    pub pca:        Option<usize>,
    pub format:     GraphFormat,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k:          50,
            preprocess: Preprocess::None,
            algo:       GraphAlgo::Knn,
            pca:        None,
            format:     GraphFormat::Json,
        }
    }
}

// ─── Device ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeviceConfig {
    /// Number of GPUs to use; 0 runs on the CPU
    pub ngpu:      usize,
    /// Which GPU when `ngpu > 0`; 0 is the default adapter
    pub device_id: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { ngpu: 1, device_id: 0 }
    }
}

impl DeviceConfig {
    pub fn use_gpu(&self) -> bool {
        self.ngpu > 0
    }
}

// ─── Pretraining ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PretrainConfig {
    /// Iterations per pretraining stage
    pub niter:      usize,
    /// Learning rate is multiplied by 0.1 every `step` iterations
    pub step:       usize,
    pub lr:         f64,
    pub batch_size: usize,
    /// Continue from a checkpoint instead of starting over
    pub resume:     bool,
    /// Checkpoint to resume from; `None` means the latest one
    pub level:      Option<usize>,
    pub device:     DeviceConfig,
    pub seed:       u64,
    /// Write per-iteration losses to a CSV log
    pub metrics:    bool,
    /// Remove the previous log directory of this run id first
    pub clean_log:  bool,
    /// Input dropout of the denoising stages
    pub dropout:    f64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            niter:      500,
            step:       300,
            lr:         0.001,
            batch_size: 300,
            resume:     false,
            level:      None,
            device:     DeviceConfig::default(),
            seed:       RNG_SEED,
            metrics:    true,
            clean_log:  true,
            dropout:    0.2,
        }
    }
}

impl PretrainConfig {
    /// Learning rate after `iteration` steps of the step schedule
    pub fn lr_at(&self, iteration: usize) -> f64 {
        if self.step == 0 {
            return self.lr;
        }
        self.lr * 0.1f64.powi((iteration / self.step) as i32)
    }
}

// ─── Feature extraction / merge ──────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FeatureConfig {
    /// Name of the feature file (`<feat>.json`)
    pub feat: String,
    /// Name of the combined artifact and result (`<out>_n<N>_merged.json`)
    pub out:  String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { feat: "pretrained".to_string(), out: "pretrained".to_string() }
    }
}

// ─── DCC ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DccConfig {
    /// Edges per mini-batch
    pub pairs_per_batch: usize,
    /// Epoch budget
    pub nepoch:          usize,
    /// Width of the pair-sampling schedule: every `m` epochs the
    /// robust-loss scales are halved and assignments are checked
    pub m:               usize,
    pub lr:              f64,
    pub seed:            u64,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            pairs_per_batch: PAIRS_PER_BATCH,
            nepoch:          500,
            m:               20,
            lr:              0.001,
            seed:            RNG_SEED,
        }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────────────
/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    pub data_root: PathBuf,
    pub dataset:   DatasetDescriptor,
    pub graph:     GraphConfig,
    pub network:   NetworkMode,
    pub pretrain:  PretrainConfig,
    pub features:  FeatureConfig,
    pub dcc:       DccConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            dataset:   DatasetDescriptor::easy(),
            graph:     GraphConfig::default(),
            network:   NetworkMode::default(),
            pretrain:  PretrainConfig::default(),
            features:  FeatureConfig::default(),
            dcc:       DccConfig::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let cfg: RunConfig = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))?;
        Ok(cfg)
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let ds = &self.dataset;
        ensure!(ds.dim > 0, "dataset.dim must be positive");
        ensure!(
            ds.layer_dims.len() >= 2,
            "dataset.layer_dims needs an input and at least one layer, got {:?}",
            ds.layer_dims
        );
        ensure!(
            ds.layer_dims[0] == ds.dim,
            "dataset.layer_dims starts at {} but samples have dimension {}",
            ds.layer_dims[0],
            ds.dim
        );
        ensure!(ds.layer_dims.iter().all(|&d| d > 0), "layer sizes must be positive");
        ensure!(self.graph.k >= 1, "graph.k must be at least 1");
        if let Some(p) = self.graph.pca {
            ensure!(p >= 1 && p <= ds.dim, "graph.pca must be in 1..={}, got {}", ds.dim, p);
        }
        ensure!(self.pretrain.batch_size >= 1, "pretrain.batch_size must be at least 1");
        ensure!(self.pretrain.lr > 0.0, "pretrain.lr must be positive");
        ensure!(
            (0.0..1.0).contains(&self.pretrain.dropout),
            "pretrain.dropout must be in [0, 1)"
        );
        if let Some(level) = self.pretrain.level {
            ensure!(
                level <= ds.final_checkpoint_index(),
                "pretrain.level {} is past the last checkpoint {}",
                level,
                ds.final_checkpoint_index()
            );
        }
        ensure!(!self.features.feat.is_empty(), "features.feat must not be empty");
        ensure!(!self.features.out.is_empty(), "features.out must not be empty");
        ensure!(self.dcc.pairs_per_batch >= 1, "dcc.pairs_per_batch must be at least 1");
        ensure!(self.dcc.nepoch >= 1, "dcc.nepoch must be at least 1");
        ensure!(self.dcc.m >= 1, "dcc.m must be at least 1");
        ensure!(self.dcc.lr > 0.0, "dcc.lr must be positive");
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let json = r#"{ "pretrain": { "niter": 10, "batchsize": 5 } }"#;
        let err = serde_json::from_str::<RunConfig>(json).unwrap_err();
        assert!(err.to_string().contains("batchsize"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "graph": { "k": 10, "algo": "mknn" }, "network": "identity" }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.graph.k, 10);
        assert_eq!(cfg.graph.algo, GraphAlgo::Mknn);
        assert_eq!(cfg.network, NetworkMode::Identity);
        assert_eq!(cfg.pretrain.niter, 500);
        assert_eq!(cfg.dcc.pairs_per_batch, PAIRS_PER_BATCH);
    }

    #[test]
    fn test_level_past_last_checkpoint_fails() {
        let mut cfg = RunConfig::default();
        cfg.pretrain.resume = true;
        cfg.pretrain.level  = Some(4);
        assert!(cfg.validate().is_err());
        cfg.pretrain.level  = Some(3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_layer_dims_must_match_input() {
        let mut cfg = RunConfig::default();
        cfg.dataset.layer_dims = vec![3, 10];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_dcc_epochs_fails() {
        let mut cfg = RunConfig::default();
        cfg.dcc.nepoch = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("dcc.nepoch"));
    }

    #[test]
    fn test_step_schedule() {
        let cfg = PretrainConfig { lr: 1.0, step: 10, ..Default::default() };
        assert_eq!(cfg.lr_at(0), 1.0);
        assert_eq!(cfg.lr_at(9), 1.0);
        assert!((cfg.lr_at(10) - 0.1).abs() < 1e-12);
        assert!((cfg.lr_at(25) - 0.01).abs() < 1e-12);
        let flat = PretrainConfig { lr: 1.0, step: 0, ..Default::default() };
        assert_eq!(flat.lr_at(1000), 1.0);
    }
}
