// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All pipeline work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `run`    - the DCC pipeline for one dataset size
//   2. `sweep`  - the pipeline for several sizes, timed
//
// This layer also picks the Burn backend (CPU or GPU) from the
// device settings, prints the run summary table and, with
// --inspect, opens the inspection shell.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;
pub mod inspect;

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use clap::Parser;
use commands::{Commands, SharedArgs};
use std::io::{self, BufRead, Write};

use crate::application::{
    config::RunConfig,
    pipeline::{Collaborators, Pipeline},
    sweep::{Sweep, SweepReport},
};
use crate::infra::plot::PlotContext;
use crate::ml::backend::{cpu_device, gpu_device, CpuBackend, GpuBackend};

#[derive(Parser, Debug)]
#[command(
    name = "dcc",
    version = "0.1.0",
    about = "Run the Deep Continuous Clustering pipeline and time it across dataset sizes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve the configuration, then dispatch on the backend.
    pub fn run(self) -> Result<()> {
        let (sizes, shared): (Vec<usize>, SharedArgs) = match self.command {
            Commands::Run(args)   => (vec![args.n], args.shared),
            Commands::Sweep(args) => (args.sizes, args.shared),
        };
        let config = RunConfig::try_from(&shared)?;

        let device_cfg = config.pretrain.device;
        if device_cfg.use_gpu() {
            let device = gpu_device(&device_cfg);
            tracing::info!("Using WGPU device: {:?}", device);
            run_with::<GpuBackend>(config, device, &sizes, shared.inspect)
        } else {
            tracing::info!("Using CPU (NdArray) backend");
            run_with::<CpuBackend>(config, cpu_device(), &sizes, shared.inspect)
        }
    }
}

fn run_with<B: AutodiffBackend>(config: RunConfig, device: B::Device, sizes: &[usize], inspect: bool) -> Result<()> {
    let mut plots = PlotContext::new(config.dataset.data_dir(&config.data_root).join("plots"));
    let stages = Collaborators::burn::<B>(device, config.pretrain.seed);
    let pipeline = Pipeline::new(config, stages);

    println!("N elapsed_seconds");
    let report = Sweep::new(&pipeline).run(sizes, &mut plots, &mut io::stdout().lock())?;
    print_summary(&report);

    finish_session(report, plots, inspect, io::stdin().lock(), io::stdout().lock())
}

/// Write the plot data and open the shell. A failed plot write is
/// reported only after the shell closes, and after any run failure.
fn finish_session<R: BufRead, W: Write>(
    report:  SweepReport,
    plots:   PlotContext,
    inspect: bool,
    input:   R,
    out:     W,
) -> Result<()> {
    let written = plots.finish();
    match &written {
        Ok(paths) => {
            for path in paths {
                tracing::debug!("plot data: '{}'", path.display());
            }
        }
        Err(e) => tracing::error!("Cannot write plot data: {e:#}"),
    }

    if inspect {
        inspect::run_shell(&report, input, out)?;
    }
    report.into_result()?;
    written.map(|_| ())
}

fn print_summary(report: &SweepReport) {
    if report.runs.is_empty() {
        return;
    }
    println!();
    println!("{:>8} | {:>10} | {:>8} | {:>6} | {:>7} | {:>7}", "N", "seconds", "clusters", "epochs", "ARI", "NMI");
    println!("{}", "-".repeat(62));
    for (run, timing) in report.runs.iter().zip(&report.timings) {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        println!(
            "{:>8} | {:>10.3} | {:>8} | {:>6} | {:>7} | {:>7}",
            run.n,
            timing.seconds,
            run.result.n_clusters,
            run.result.epochs_run,
            fmt(run.result.ari),
            fmt(run.result.nmi),
        );
    }
}
