// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing the pipeline:
// what a dataset is, which artifacts each stage produces, which
// network the downstream stages use, and the seams (traits) the
// orchestrator calls into.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O (paths are named here, written elsewhere)
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Dataset descriptor and in-memory point set
pub mod dataset;

// Artifact records and where they live on disk
pub mod artifacts;

// Identity vs trained network choice
pub mod network;

// The five collaborator seams of the pipeline
pub mod traits;
