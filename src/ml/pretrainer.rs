// ============================================================
// Layer 5: Autoencoder Pretraining
// ============================================================
// Trains the stacked autoencoder in L + 1 stages, where L is the
// number of encoder layers:
//
//   stage 0 .. L-1  layer-wise denoising: encoder/decoder pair `l`
//                   learns to reconstruct the (detached) output of
//                   the encoder layers below it from a dropout-
//                   corrupted copy. Only pair `l` receives gradients.
//   stage L         end-to-end fine-tuning of the whole network
//                   on the raw data, again with input dropout.
//
// Every stage runs `niter` Adam steps on random mini-batches and
// ends with a checkpoint named after its index, so the final
// network is always checkpoint L.
//
// Resuming:
//   resume = false               start from a fresh network at stage 0
//   resume = true, level = l     load checkpoint l, continue at l + 1
//   resume = true, level = None  use the latest checkpoint pointer
//
// Learning rate follows a step schedule (×0.1 every `step`
// iterations), restarted at the beginning of each stage.
//
// Reference: Vincent et al. (2010) Stacked Denoising Autoencoders
//            Kingma & Ba (2015) Adam

use anyhow::{ensure, Context, Result};
use burn::{
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::fs;

use crate::application::config::PretrainConfig;
use crate::data::{batcher::PointBatcher, sampler::MinibatchSampler};
use crate::domain::{
    artifacts::ArtifactLayout,
    dataset::{DatasetDescriptor, PointSet},
    network::Network,
    traits::{PretrainOutcome, Pretrainer},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{IterationMetrics, MetricsLogger},
};
use crate::ml::model::{Autoencoder, AutoencoderConfig};

pub struct BurnPretrainer<B: AutodiffBackend> {
    device: B::Device,
}

impl<B: AutodiffBackend> BurnPretrainer<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Network to start from and the first stage still to run.
    fn starting_point(
        &self,
        ae_cfg: &AutoencoderConfig,
        config: &PretrainConfig,
        ckpt:   &CheckpointManager,
    ) -> Result<(Autoencoder<B>, usize)> {
        if !config.resume {
            ckpt.save_config(ae_cfg)?;
            return Ok((ae_cfg.init(&self.device), 0));
        }

        let saved = ckpt.load_config()?;
        ensure!(
            saved.layer_dims == ae_cfg.layer_dims,
            "checkpoint network has layers {:?} but the dataset expects {:?}",
            saved.layer_dims,
            ae_cfg.layer_dims
        );
        let level = match config.level {
            Some(level) => level,
            None => ckpt.latest_index()?,
        };
        let model = ckpt.load_model(ae_cfg.init(&self.device), level, &self.device)?;
        tracing::info!("Resuming pretraining after checkpoint {}", level);
        Ok((model, level + 1))
    }

    /// One stage of `niter` Adam steps.
    fn train_stage(
        &self,
        mut model: Autoencoder<B>,
        stage:     usize,
        points:    &PointSet,
        config:    &PretrainConfig,
        sampler:   &mut MinibatchSampler,
        logger:    Option<&MetricsLogger>,
    ) -> Result<(Autoencoder<B>, f64)> {
        let batcher = PointBatcher::<B>::new(self.device.clone());
        let mse = MseLoss::new();
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let fine_tune = stage == model.depth();
        let mut last_loss = f64::NAN;

        for iteration in 0..config.niter {
            let batch = sampler.next_batch();
            let x = batcher.rows(&points.points, points.dim, &batch);

            let loss = if fine_tune {
                let recon = model.denoise(x.clone());
                mse.forward(recon, x, Reduction::Mean)
            } else {
                // Lower layers are fixed for this stage
                let input = model.encode_prefix(x, stage).detach();
                let recon = model.layer_reconstruct(stage, input.clone());
                mse.forward(recon, input, Reduction::Mean)
            };

            last_loss = loss.clone().into_scalar().elem::<f64>();
            let lr = config.lr_at(iteration);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            if let Some(logger) = logger {
                logger.log(&IterationMetrics {
                    stage,
                    iteration: iteration + 1,
                    lr,
                    loss: last_loss,
                })?;
            }
            tracing::debug!("stage {} iter {:>5} | lr={:.2e} | loss={:.6}", stage, iteration + 1, lr, last_loss);
        }

        Ok((model, last_loss))
    }
}

impl<B: AutodiffBackend> Pretrainer for BurnPretrainer<B> {
    fn pretrain(
        &self,
        dataset: &DatasetDescriptor,
        points:  &PointSet,
        config:  &PretrainConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PretrainOutcome> {
        ensure!(!points.is_empty(), "cannot pretrain on an empty dataset");
        ensure!(
            dataset.layer_dims.first() == Some(&points.dim),
            "network input size {:?} does not match sample dimension {}",
            dataset.layer_dims.first(),
            points.dim
        );

        let final_index = dataset.final_checkpoint_index();
        let ae_cfg = AutoencoderConfig::new(dataset.layer_dims.clone()).with_dropout(config.dropout);
        let ckpt = CheckpointManager::new(layout.checkpoint_dir())?;

        let log_dir = layout.log_dir(points.len());
        if config.clean_log && log_dir.exists() {
            fs::remove_dir_all(&log_dir)
                .with_context(|| format!("Cannot remove old log directory '{}'", log_dir.display()))?;
        }
        let logger = if config.metrics {
            Some(MetricsLogger::new::<IterationMetrics>(&log_dir, "pretrain.csv")?)
        } else {
            None
        };

        let (mut model, start) = self.starting_point(&ae_cfg, config, &ckpt)?;
        if start > final_index {
            tracing::info!("Pretraining already complete at checkpoint {}", final_index);
        }

        let mut sampler = MinibatchSampler::new(points.len(), config.batch_size, config.seed);
        for stage in start..=final_index {
            let kind = if stage == final_index { "fine-tune" } else { "layer-wise" };
            tracing::info!(
                "Pretraining stage {}/{} ({}): {} iterations, batch {}",
                stage,
                final_index,
                kind,
                config.niter,
                config.batch_size
            );
            let (trained, loss) =
                self.train_stage(model, stage, points, config, &mut sampler, logger.as_ref())?;
            model = trained;
            ckpt.save_model(&model, stage)?;
            tracing::info!("Stage {} done, loss={:.6}, checkpoint saved", stage, loss);
        }

        Ok(PretrainOutcome {
            checkpoint_index: final_index,
            network:          Network::Trained { checkpoint_index: final_index },
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::DeviceConfig;
    use crate::data::provider::make_easy_visual_data;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn small_config() -> PretrainConfig {
        PretrainConfig {
            niter:      5,
            step:       3,
            batch_size: 16,
            device:     DeviceConfig { ngpu: 0, device_id: 0 },
            ..Default::default()
        }
    }

    fn small_dataset() -> DatasetDescriptor {
        DatasetDescriptor { layer_dims: vec![2, 8, 2], ..DatasetDescriptor::easy() }
    }

    #[test]
    fn test_writes_one_checkpoint_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let points = make_easy_visual_data(60, 1).unwrap();
        let pretrainer = BurnPretrainer::<TestBackend>::new(Default::default());

        let outcome = pretrainer
            .pretrain(&small_dataset(), &points, &small_config(), &layout)
            .unwrap();
        assert_eq!(outcome.checkpoint_index, 2);
        assert_eq!(outcome.network, Network::Trained { checkpoint_index: 2 });

        let ckpt = CheckpointManager::new(layout.checkpoint_dir()).unwrap();
        assert!(ckpt.exists(0) && ckpt.exists(1) && ckpt.exists(2));
        assert_eq!(ckpt.latest_index().unwrap(), 2);

        let log = fs::read_to_string(layout.log_dir(60).join("pretrain.csv")).unwrap();
        // Header plus five iterations for each of three stages
        assert_eq!(log.lines().count(), 1 + 15);
    }

    #[test]
    fn test_resume_from_level_runs_only_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let points = make_easy_visual_data(30, 2).unwrap();
        let pretrainer = BurnPretrainer::<TestBackend>::new(Default::default());
        pretrainer.pretrain(&small_dataset(), &points, &small_config(), &layout).unwrap();

        let resumed = PretrainConfig {
            resume:    true,
            level:     Some(1),
            clean_log: true,
            ..small_config()
        };
        pretrainer.pretrain(&small_dataset(), &points, &resumed, &layout).unwrap();
        let log = fs::read_to_string(layout.log_dir(30).join("pretrain.csv")).unwrap();
        // Only the fine-tuning stage ran the second time
        assert_eq!(log.lines().count(), 1 + 5);
        assert!(log.lines().skip(1).all(|l| l.starts_with("2,")));
    }

    #[test]
    fn test_resume_without_checkpoints_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let points = make_easy_visual_data(30, 2).unwrap();
        let cfg = PretrainConfig { resume: true, ..small_config() };
        let err = BurnPretrainer::<TestBackend>::new(Default::default())
            .pretrain(&small_dataset(), &points, &cfg, &layout)
            .unwrap_err();
        assert!(err.to_string().contains("pretrain_config.json"));
    }
}
