// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer turns a parallel corpus into padded tensor batches.
//
// The pipeline flows in this order:
//
//   train.src / train.tgt (one sentence per line)
//       │
//       ▼
//   vocab_builder     → counts words/features, prunes, or loads .dict files
//       │
//       ▼
//   corpus            → filters, truncates and indexes each line pair,
//                       then shuffles and sorts by size
//       │
//       ▼
//   dataset           → joins source + target records under a field
//                       registry, filters by target length
//       │
//       ▼
//   NmtBatcher        → pads examples into tensor batches
//
// `image` and `permutation` are helpers for the corpus step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Symbol ↔ index dictionaries with frequency pruning
pub mod vocab;

/// Per-side word and feature vocabularies from corpora or files
pub mod vocab_builder;

/// Line-pair indexing, length filtering, shuffle and size sort
pub mod corpus;

/// Image path resolution and decoding for img mode
pub mod image;

/// Seeded shuffles and stable sort orders
pub mod permutation;

/// Field registry and Burn Dataset over joined examples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
