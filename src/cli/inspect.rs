// ============================================================
// Layer 1: Inspection Shell
// ============================================================
// A small line-oriented shell opened after the runs (with
// --inspect), also when a run failed, to look at what was
// produced before the process exits.
//
//   help             list commands
//   summary          one line per run, plus the failure if any
//   times            N and elapsed seconds per completed run
//   clusters [N]     largest clusters of every run, or of run N
//   quit | exit      leave (end of input also leaves)
//
// Input and output are generic so the shell can be driven from
// tests with in-memory buffers.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::application::sweep::SweepReport;
use crate::ml::evaluation::cluster_sizes;

const PROMPT: &str = "dcc> ";

/// Clusters listed per run by `clusters`
const TOP_CLUSTERS: usize = 10;

const HELP: &str = "\
commands:
  help          this list
  summary       one line per run
  times         elapsed seconds per dataset size
  clusters [N]  largest clusters per run (or for size N)
  quit          leave the shell";

pub fn run_shell<R: BufRead, W: Write>(report: &SweepReport, input: R, mut out: W) -> Result<()> {
    writeln!(out, "Inspection shell, type 'help' for commands.")?;
    write!(out, "{PROMPT}")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("help") => writeln!(out, "{HELP}")?,
            Some("summary") => summary(report, &mut out)?,
            Some("times") => times(report, &mut out)?,
            Some("clusters") => match words.next().map(str::parse::<usize>) {
                None => clusters(report, None, &mut out)?,
                Some(Ok(n)) => clusters(report, Some(n), &mut out)?,
                Some(Err(_)) => writeln!(out, "usage: clusters [N]")?,
            },
            Some("quit") | Some("exit") => return Ok(()),
            Some(other) => writeln!(out, "unknown command '{other}', type 'help'")?,
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn summary<W: Write>(report: &SweepReport, out: &mut W) -> Result<()> {
    if report.runs.is_empty() {
        writeln!(out, "no completed runs")?;
    }
    for run in &report.runs {
        writeln!(
            out,
            "N={:<8} network={:<14} clusters={:<6} epochs={:<5} ARI={} NMI={}",
            run.n,
            run.network.to_string(),
            run.result.n_clusters,
            run.result.epochs_run,
            score(run.result.ari),
            score(run.result.nmi),
        )?;
    }
    if let Some(failure) = &report.failure {
        writeln!(out, "N={} failed: {:#}", failure.n, failure.error)?;
    }
    Ok(())
}

fn times<W: Write>(report: &SweepReport, out: &mut W) -> Result<()> {
    for t in &report.timings {
        writeln!(out, "{} {:.3}", t.n, t.seconds)?;
    }
    Ok(())
}

fn clusters<W: Write>(report: &SweepReport, n: Option<usize>, out: &mut W) -> Result<()> {
    let runs: Vec<_> = report.runs.iter().filter(|r| n.map_or(true, |n| r.n == n)).collect();
    if runs.is_empty() {
        writeln!(out, "no run matches")?;
    }
    for run in runs {
        let sizes = cluster_sizes(&run.result.assignments);
        let shown: Vec<String> = sizes
            .iter()
            .take(TOP_CLUSTERS)
            .map(|(id, size)| format!("{id}:{size}"))
            .collect();
        writeln!(out, "N={} ({} clusters) {}", run.n, sizes.len(), shown.join(" "))?;
    }
    Ok(())
}
