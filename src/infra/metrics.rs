// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Appends training losses to a CSV file so learning curves can be
// plotted after a run. Pretraining logs one row per iteration;
// DCC logs one row per epoch.
//
// Output files live in the run's log directory:
//   logs/<N>/pretrain.csv
//     stage,iteration,lr,loss
//     0,1,0.001000,0.853120
//   logs/<N>/dcc.csv
//     epoch,loss,mu1,mu2,n_clusters
//     1,0.512300,27.000000,27.000000,600
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One pretraining iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub stage:     usize,
    pub iteration: usize,
    pub lr:        f64,
    pub loss:      f64,
}

/// One DCC epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean batch loss over the epoch
    pub loss:       f64,
    pub mu1:        f64,
    pub mu2:        f64,
    /// Clusters at the last assignment check
    pub n_clusters: usize,
}

/// Anything that can be written as one CSV row.
pub trait CsvRow {
    const HEADER: &'static str;
    fn row(&self) -> String;
}

impl CsvRow for IterationMetrics {
    const HEADER: &'static str = "stage,iteration,lr,loss";
    fn row(&self) -> String {
        format!("{},{},{:.6},{:.6}", self.stage, self.iteration, self.lr, self.loss)
    }
}

impl CsvRow for EpochMetrics {
    const HEADER: &'static str = "epoch,loss,mu1,mu2,n_clusters";
    fn row(&self) -> String {
        format!(
            "{},{:.6},{:.6},{:.6},{}",
            self.epoch, self.loss, self.mu1, self.mu2, self.n_clusters
        )
    }
}

/// Logs rows of one metric type to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `<dir>/<file>`, writing the header only if the file is new
    /// so that resumed runs append to the same log.
    pub fn new<R: CsvRow>(dir: &Path, file: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;
        let csv_path = dir.join(file);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{}", R::HEADER)?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log<R: CsvRow>(&self, m: &R) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
