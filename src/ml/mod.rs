// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Everything that builds or trains a network lives here:
//
//   model.rs       - stacked autoencoder and the identity network
//                    behind one EmbeddingNet trait
//
//   pretrainer.rs  - layer-wise denoising pretraining followed by
//                    end-to-end fine-tuning, one checkpoint per stage
//
//   extractor.rs   - runs the chosen network's encoder over all
//                    samples and writes the features
//
//   dcc.rs         - the DCC objective, its continuation schedule,
//                    and cluster read-out from representatives
//
//   evaluation.rs  - ARI / NMI against ground-truth labels
//
//   backend.rs     - CPU / GPU backend aliases and device choice
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Shah & Koltun (2018) Deep Continuous Clustering

/// CPU / GPU backends
pub mod backend;

/// Autoencoder and identity network
pub mod model;

/// Autoencoder pretraining with checkpoints and resume
pub mod pretrainer;

/// Feature extraction with a trained or identity network
pub mod extractor;

/// Deep Continuous Clustering optimizer
pub mod dcc;

/// Clustering scores
pub mod evaluation;
