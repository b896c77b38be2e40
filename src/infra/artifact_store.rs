// ============================================================
// Layer 6: Artifact Store
// ============================================================
// Reads and writes the files stages hand to each other.
// Everything is JSON except the graph, which can also be written
// as a plain edge list for external tools:
//
//   # n=100 k=50 algo=knn
//   0 3 0.125
//   0 17 0.201
//   ...
//
// Parent directories are created on write. Every read and write
// error names the file involved.

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::domain::artifacts::{Edge, GraphArtifact, GraphFormat};

/// Serialise `value` as pretty JSON at `path`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Cannot write JSON to '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

/// Deserialise a JSON file written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Cannot parse JSON in '{}'", path.display()))
}

/// Write the graph in the requested format.
pub fn save_graph(path: &Path, graph: &GraphArtifact, format: GraphFormat) -> Result<()> {
    match format {
        GraphFormat::Json => save_json(path, graph),
        GraphFormat::Edgelist => {
            ensure_parent(path)?;
            let file = fs::File::create(path)
                .with_context(|| format!("Cannot create '{}'", path.display()))?;
            let mut w = BufWriter::new(file);
            writeln!(w, "# n={} k={} algo={}", graph.n, graph.k, graph.algo)?;
            for e in &graph.edges {
                writeln!(w, "{} {} {}", e.i, e.j, e.distance)?;
            }
            w.flush()
                .with_context(|| format!("Cannot write edge list '{}'", path.display()))?;
            Ok(())
        }
    }
}

/// Read a graph, picking the format from the file extension.
pub fn load_graph(path: &Path) -> Result<GraphArtifact> {
    match GraphFormat::from_path(path) {
        GraphFormat::Json     => load_json(path),
        GraphFormat::Edgelist => load_edgelist(path),
    }
}

fn load_edgelist(path: &Path) -> Result<GraphArtifact> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => bail!("Edge list '{}' is empty", path.display()),
    };
    let (mut n, mut k, mut algo) = (None, None, None);
    for field in header.trim_start_matches('#').split_whitespace() {
        match field.split_once('=') {
            Some(("n", v))    => n = v.parse::<usize>().ok(),
            Some(("k", v))    => k = v.parse::<usize>().ok(),
            Some(("algo", v)) => algo = v.parse().ok(),
            _ => {}
        }
    }
    let (Some(n), Some(k), Some(algo)) = (n, k, algo) else {
        bail!("Edge list '{}' has a malformed header: '{}'", path.display(), header);
    };

    let mut edges = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_edge(&line) {
            Some(e) if e.i < n && e.j < n => edges.push(e),
            _ => bail!(
                "Edge list '{}' line {}: expected 'i j distance' with i, j < {}",
                path.display(),
                lineno + 2,
                n
            ),
        }
    }
    Ok(GraphArtifact { n, k, algo, edges })
}

fn parse_edge(line: &str) -> Option<Edge> {
    let mut it = line.split_whitespace();
    let i = it.next()?.parse::<usize>().ok()?;
    let j = it.next()?.parse::<usize>().ok()?;
    let distance = it.next()?.parse::<f32>().ok()?;
    Some(Edge { i, j, distance })
}

/// Fail with a message naming the stage when an artifact is missing.
pub fn require(path: &Path, produced_by: &str) -> Result<()> {
    if !path.exists() {
        bail!(
            "Expected '{}' from the {} stage, but it does not exist",
            path.display(),
            produced_by
        );
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}
