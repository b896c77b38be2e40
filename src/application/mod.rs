// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Sequences the other layers into a DCC run and a timing sweep.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing or interactive I/O (that's Layer 1)
//   - Stages are reached only through the Layer 3 traits
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Declared run configuration (serde, validated)
pub mod config;

/// One pipeline run: data → graph → pretrain → extract → merge → DCC
pub mod pipeline;

/// Runs the pipeline once per dataset size and times each run
pub mod sweep;
