// ============================================================
// Layer 3: Collaborator Traits
// ============================================================
// The pipeline is five stages run in a fixed order. Each stage is
// a trait so the orchestrator only sequences calls and never
// knows how a stage does its work:
//
//   DataProvider      → PointSet (also written to traindata.json)
//   GraphConstructor  → path of the graph artifact
//   Pretrainer        → trained Network + checkpoint index
//   FeatureExtractor  → path of the feature file
//   GraphMerger       → path of the combined artifact
//   ClusterOptimizer  → ClusterResult
//
// Implementations:
//   - data::provider::DatasetProvider
//   - data::graph::NeighborGraphBuilder
//   - ml::pretrainer::BurnPretrainer
//   - ml::extractor::BurnExtractor
//   - data::merge::GraphFeatureMerger
//   - ml::dcc::BurnDccOptimizer
// Tests swap in recording fakes to check the call order.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::application::config::{DccConfig, FeatureConfig, GraphConfig, PretrainConfig};
use crate::domain::{
    artifacts::{ArtifactLayout, ClusterResult},
    dataset::{DatasetDescriptor, PointSet},
    network::Network,
};

// ─── DataProvider ─────────────────────────────────────────────────────────────
/// Produces the labelled point set for a dataset variant.
pub trait DataProvider {
    fn provide(&self, dataset: &DatasetDescriptor, layout: &ArtifactLayout) -> Result<PointSet>;
}

// ─── GraphConstructor ─────────────────────────────────────────────────────────
/// Builds the kNN / mkNN similarity graph and persists it.
pub trait GraphConstructor {
    /// Returns the path of the graph artifact the merger should read.
    fn construct(
        &self,
        dataset: &DatasetDescriptor,
        points:  &PointSet,
        config:  &GraphConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PathBuf>;
}

// ─── Pretrainer ───────────────────────────────────────────────────────────────
/// What pretraining hands to the downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PretrainOutcome {
    pub checkpoint_index: usize,
    pub network:          Network,
}

/// Trains (or resumes) the embedding network and checkpoints it.
pub trait Pretrainer {
    fn pretrain(
        &self,
        dataset: &DatasetDescriptor,
        points:  &PointSet,
        config:  &PretrainConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PretrainOutcome>;
}

// ─── FeatureExtractor ─────────────────────────────────────────────────────────
/// Runs the chosen network over all samples and writes the embedding.
pub trait FeatureExtractor {
    fn extract(
        &self,
        points:  &PointSet,
        network: Network,
        config:  &FeatureConfig,
        layout:  &ArtifactLayout,
    ) -> Result<PathBuf>;
}

// ─── GraphMerger ──────────────────────────────────────────────────────────────
/// Fuses the graph artifact and the embedding into one file.
pub trait GraphMerger {
    fn merge(
        &self,
        graph:    &Path,
        features: &Path,
        points:   &PointSet,
        config:   &FeatureConfig,
        layout:   &ArtifactLayout,
    ) -> Result<PathBuf>;
}

// ─── ClusterOptimizer ─────────────────────────────────────────────────────────
/// Runs DCC on the combined artifact.
pub trait ClusterOptimizer {
    fn optimize(
        &self,
        combined: &Path,
        network:  Network,
        config:   &DccConfig,
        layout:   &ArtifactLayout,
    ) -> Result<ClusterResult>;
}
