// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores autoencoder weights using Burn's
// CompactRecorder. Pretraining writes one checkpoint per stage,
// so the file name carries the stage index rather than an epoch.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) - all learned parameters
//   2. latest_checkpoint.json       - index of the last stage saved
//   3. pretrain_config.json         - the AutoencoderConfig
//
// The config is needed to rebuild an Autoencoder with the right
// layer sizes before its weights can be loaded into it; feature
// extraction and DCC both start from there.
//
// File naming convention:
//   checkpoints/
//     checkpoint_0.mpk.gz    ← after layer-wise stage 0
//     checkpoint_1.mpk.gz    ← after layer-wise stage 1
//     ...
//     checkpoint_L.mpk.gz    ← after end-to-end fine-tuning
//     latest_checkpoint.json
//     pretrain_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::PathBuf,
};

use crate::ml::model::{Autoencoder, AutoencoderConfig};

const LATEST_FILE: &str = "latest_checkpoint.json";
const CONFIG_FILE: &str = "pretrain_config.json";

/// Manages saving and loading of stage checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Path without extension; the recorder appends `.mpk.gz`.
    fn weights_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_{index}"))
    }

    pub fn exists(&self, index: usize) -> bool {
        self.dir.join(format!("checkpoint_{index}.mpk.gz")).exists()
    }

    /// Save weights for stage `index` and move the latest pointer to it.
    pub fn save_model<B: Backend>(&self, model: &Autoencoder<B>, index: usize) -> Result<()> {
        let path = self.weights_path(index);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&index)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint {}", index);
        Ok(())
    }

    /// Load stage `index` into `model`, which must have the saved architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  Autoencoder<B>,
        index:  usize,
        device: &B::Device,
    ) -> Result<Autoencoder<B>> {
        let path = self.weights_path(index);
        tracing::info!("Loading checkpoint {}", index);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Has pretraining reached stage {}?",
                    path.display(),
                    index
                )
            })?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &AutoencoderConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved network config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<AutoencoderConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Run pretraining before using a trained network.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Index of the last checkpoint written.
    pub fn latest_index(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Has pretraining been run?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
