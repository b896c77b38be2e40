// ============================================================
// Layer 6: Plot Context
// ============================================================
// Collects the figures a sweep produces and writes them out when
// the sweep is done. A PlotContext is created by the caller,
// passed by &mut to whoever adds data, and consumed by `finish`,
// so there is no plotting state outside of it.
//
// Each figure becomes one CSV file, long format, one row per point:
//
//   plots/
//     data_n600.csv     series,x,y      (scatter, one series per class)
//     timing.csv        series,x,y      (N vs seconds)
//
// Any plotting tool can pivot on the `series` column.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    Scatter,
    Line,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub name:   String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub title:  String,
    pub kind:   FigureKind,
    pub series: Vec<Series>,
}

impl Figure {
    /// Append points to `name`, creating the series on first use.
    pub fn extend(&mut self, name: &str, points: impl IntoIterator<Item = (f64, f64)>) {
        match self.series.iter_mut().find(|s| s.name == name) {
            Some(s) => s.points.extend(points),
            None => self.series.push(Series { name: name.to_string(), points: points.into_iter().collect() }),
        }
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

pub struct PlotContext {
    out_dir: PathBuf,
    figures: BTreeMap<String, Figure>,
}

impl PlotContext {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), figures: BTreeMap::new() }
    }

    /// Figure `key`, created with `title` and `kind` if new.
    pub fn figure(&mut self, key: &str, title: &str, kind: FigureKind) -> &mut Figure {
        self.figures.entry(key.to_string()).or_insert_with(|| Figure {
            title:  title.to_string(),
            kind,
            series: Vec::new(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Figure> {
        self.figures.get(key)
    }

    /// Write every figure and release the context.
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        if self.figures.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Cannot create plot directory '{}'", self.out_dir.display()))?;

        let mut written = Vec::with_capacity(self.figures.len());
        for (key, figure) in &self.figures {
            let path = self.out_dir.join(format!("{key}.csv"));
            write_figure(&path, figure)?;
            tracing::info!(
                "Wrote {:?} figure '{}' ({} points) → '{}'",
                figure.kind,
                figure.title,
                figure.point_count(),
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }
}

fn write_figure(path: &Path, figure: &Figure) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "series,x,y")?;
    for s in &figure.series {
        for (x, y) in &s.points {
            writeln!(w, "{},{},{}", s.name, x, y)?;
        }
    }
    w.flush()?;
    Ok(())
}
