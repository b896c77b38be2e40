// ============================================================
// Layer 5: Feature Extraction
// ============================================================
// Runs the chosen network's encoder over every sample and writes
// the embedding to `<feat>.json`. The identity network passes
// the data through unchanged.
//
// Samples go through the encoder in fixed-size chunks so that
// large datasets do not need one huge tensor.

use anyhow::{anyhow, ensure, Result};
use burn::prelude::*;
use std::path::PathBuf;

use crate::application::config::FeatureConfig;
use crate::data::batcher::PointBatcher;
use crate::domain::{
    artifacts::{ArtifactLayout, FeatureSet},
    dataset::PointSet,
    network::Network,
    traits::FeatureExtractor,
};
use crate::infra::{artifact_store, checkpoint::CheckpointManager};
use crate::ml::model::{Autoencoder, EmbeddingNet, IdentityNet};

/// Rows per forward pass
const EXTRACT_CHUNK: usize = 4096;

pub struct BurnExtractor<B: Backend> {
    device: B::Device,
}

impl<B: Backend> BurnExtractor<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Encode all rows of `points` with `net`.
    pub fn encode_all<N: EmbeddingNet<B>>(&self, net: &N, points: &PointSet) -> Result<Vec<f32>> {
        let batcher = PointBatcher::<B>::new(self.device.clone());
        let indices: Vec<usize> = (0..points.len()).collect();
        let mut features = Vec::new();
        for chunk in indices.chunks(EXTRACT_CHUNK) {
            let x = batcher.rows(&points.points, points.dim, chunk);
            let y = net.embed(x).detach();
            let values = y
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read encoder output: {e:?}"))?;
            features.extend(values);
        }
        Ok(features)
    }

    fn features_for(&self, points: &PointSet, network: Network, layout: &ArtifactLayout) -> Result<FeatureSet> {
        match network {
            Network::Identity => Ok(FeatureSet { dim: points.dim, features: self.encode_all(&IdentityNet, points)? }),
            Network::Trained { checkpoint_index } => {
                let ckpt = CheckpointManager::new(layout.checkpoint_dir())?;
                let cfg = ckpt.load_config()?;
                ensure!(
                    cfg.layer_dims.first() == Some(&points.dim),
                    "checkpoint network expects {:?}-d input, samples are {}-d",
                    cfg.layer_dims.first(),
                    points.dim
                );
                let dim = cfg.layer_dims.last().copied().unwrap_or(points.dim);
                let model: Autoencoder<B> = ckpt.load_model(cfg.init(&self.device), checkpoint_index, &self.device)?;
                Ok(FeatureSet { dim, features: self.encode_all(&model, points)? })
            }
        }
    }
}

impl<B: Backend> FeatureExtractor for BurnExtractor<B> {
    fn extract(
        &self,
        points:  &PointSet,
        network: Network,
        config:  &FeatureConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PathBuf> {
        let features = self.features_for(points, network, layout)?;
        let path = layout.features(&config.feat);
        artifact_store::save_json(&path, &features)?;
        tracing::info!(
            "Extracted {} × {} features with {} → '{}'",
            features.len(),
            features.dim,
            network,
            path.display()
        );
        Ok(path)
    }
}
