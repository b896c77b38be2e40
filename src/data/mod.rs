// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between "a dataset name" and "tensors on a device":
//
//   DatasetProvider       → synthesises or loads the samples
//       │
//       ▼
//   Preprocess / PCA      → per-feature scaling, optional projection
//       │
//       ▼
//   NeighborGraphBuilder  → exact kNN / mkNN graph
//       │
//       ▼
//   GraphFeatureMerger    → graph + features → combined artifact
//
// and, for training:
//
//   MinibatchSampler      → seeded index batches
//   PointBatcher          → rows → Burn tensors
//
// Each module is responsible for exactly one step.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Synthetic easy dataset and CSV loading
pub mod provider;

/// Feature scaling modes and PCA
pub mod preprocess;

/// kNN / mkNN graph construction
pub mod graph;

/// Pair weights and the combined artifact
pub mod merge;

/// Row gathering into Burn tensors
pub mod batcher;

/// Seeded mini-batch index sampler
pub mod sampler;
