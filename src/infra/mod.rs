// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   artifact_store.rs  - JSON / edge-list persistence of the
//                        artifacts the stages hand each other,
//                        and the existence check between stages
//
//   checkpoint.rs      - saving and loading autoencoder weights
//                        with Burn's CompactRecorder, plus the
//                        architecture config needed to rebuild it
//
//   metrics.rs         - CSV loss logs for pretraining and DCC
//
//   plot.rs            - the PlotContext that collects figures
//                        during a sweep and writes them at the end
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Artifact reading and writing
pub mod artifact_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Figure collection with an explicit lifetime
pub mod plot;
