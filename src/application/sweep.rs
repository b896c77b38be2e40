// ============================================================
// Layer 2: Timing Sweep
// ============================================================
// Runs the pipeline once per dataset size, in the order given,
// and measures the wall-clock time of each full run.
//
// After every run a line `<N> <seconds>` is written to the output
// so progress is visible while long runs are still going. The
// timings also go to the "timing" figure of the PlotContext.
//
// A failed run stops the sweep. The error is kept in the report
// instead of being returned so the caller can still show what
// finished (and open the inspection shell) before exiting.

use anyhow::Result;
use std::{io::Write, time::Instant};

use crate::application::pipeline::{Pipeline, RunReport};
use crate::infra::plot::{FigureKind, PlotContext};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub n:       usize,
    pub seconds: f64,
}

#[derive(Debug)]
pub struct SweepFailure {
    pub n:     usize,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    /// One entry per completed run, in run order
    pub timings: Vec<Timing>,
    pub runs:    Vec<RunReport>,
    pub failure: Option<SweepFailure>,
}

impl SweepReport {
    /// Ok when every run completed, otherwise the first failure.
    pub fn into_result(self) -> Result<Self> {
        match self.failure {
            Some(SweepFailure { n, error }) => Err(error.context(format!("run N={n} failed"))),
            None => Ok(self),
        }
    }
}

pub struct Sweep<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> Sweep<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn run<W: Write>(&self, sizes: &[usize], plots: &mut PlotContext, out: &mut W) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for &n in sizes {
            let start = Instant::now();
            match self.pipeline.run_once(n, plots) {
                Ok(run) => {
                    let seconds = start.elapsed().as_secs_f64();
                    writeln!(out, "{n} {seconds:.3}")?;
                    out.flush()?;
                    plots
                        .figure("timing", "Run time per dataset size", FigureKind::Line)
                        .extend("dcc", [(n as f64, seconds)]);
                    report.timings.push(Timing { n, seconds });
                    report.runs.push(run);
                }
                Err(error) => {
                    tracing::error!("Run N={} failed: {:#}", n, error);
                    report.failure = Some(SweepFailure { n, error });
                    break;
                }
            }
        }

        Ok(report)
    }
}
