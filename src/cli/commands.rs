// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Two subcommands:
//   run    - one pipeline run for a single sample count
//   sweep  - one run per sample count, timed
//
// Both share the same options. Every shared option is optional:
// a value given on the command line overrides the config file
// (or the built-in defaults when no --config is given).
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{Error, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::RunConfig;
use crate::data::preprocess::Preprocess;
use crate::domain::{artifacts::GraphAlgo, network::NetworkMode};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once
    Run(RunArgs),

    /// Run the pipeline for several dataset sizes and time each run
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of samples
    #[arg(long, default_value_t = 600)]
    pub n: usize,

    #[command(flatten)]
    pub shared: SharedArgs,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Comma-separated dataset sizes, run in this order
    #[arg(long, value_delimiter = ',', default_values_t = vec![100, 1000, 10000, 100000])]
    pub sizes: Vec<usize>,

    #[command(flatten)]
    pub shared: SharedArgs,
}

/// Options common to `run` and `sweep`.
#[derive(Args, Debug, Default, Clone)]
pub struct SharedArgs {
    /// JSON run configuration; command-line options override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding one sub-directory per dataset
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Neighbours per sample in the graph
    #[arg(long)]
    pub k: Option<usize>,

    /// knn or mknn
    #[arg(long)]
    pub algo: Option<GraphAlgo>,

    /// none, scale, minmax or normalization
    #[arg(long)]
    pub preprocess: Option<Preprocess>,

    /// pretrain, identity or latest-checkpoint
    #[arg(long)]
    pub network: Option<NetworkMode>,

    /// Continue pretraining from a checkpoint; `--resume false`
    /// turns off a `resume` set in the config file
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub resume: Option<bool>,

    /// Checkpoint to resume from (default: the latest)
    #[arg(long)]
    pub level: Option<usize>,

    /// Iterations per pretraining stage
    #[arg(long)]
    pub niter: Option<usize>,

    /// DCC epoch budget
    #[arg(long)]
    pub nepoch: Option<usize>,

    /// Number of GPUs; 0 runs on the CPU
    #[arg(long)]
    pub ngpu: Option<usize>,

    /// Which GPU to use
    #[arg(long)]
    pub device_id: Option<usize>,

    /// Open the inspection shell when the runs are done
    #[arg(long)]
    pub inspect: bool,
}

/// Build the application-layer RunConfig from the CLI options.
/// This is the boundary between Layer 1 and Layer 2; the
/// application layer never sees clap types.
impl TryFrom<&SharedArgs> for RunConfig {
    type Error = Error;

    fn try_from(a: &SharedArgs) -> Result<Self> {
        let mut cfg = match &a.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        if let Some(root) = &a.data_root {
            cfg.data_root = root.clone();
        }
        if let Some(k) = a.k {
            cfg.graph.k = k;
        }
        if let Some(algo) = a.algo {
            cfg.graph.algo = algo;
        }
        if let Some(preprocess) = a.preprocess {
            cfg.graph.preprocess = preprocess;
        }
        if let Some(network) = a.network {
            cfg.network = network;
        }
        if let Some(resume) = a.resume {
            cfg.pretrain.resume = resume;
        }
        if a.level.is_some() {
            cfg.pretrain.level = a.level;
        }
        if let Some(niter) = a.niter {
            cfg.pretrain.niter = niter;
        }
        if let Some(nepoch) = a.nepoch {
            cfg.dcc.nepoch = nepoch;
        }
        if let Some(ngpu) = a.ngpu {
            cfg.pretrain.device.ngpu = ngpu;
        }
        if let Some(id) = a.device_id {
            cfg.pretrain.device.device_id = id;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
