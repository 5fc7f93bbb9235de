// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything written to disk at the end of a run:
//
//   store.rs            — Dataset persistence
//                         Saves the indexed splits and their
//                         vocabularies as JSON, the word and
//                         feature .dict files, and the config
//                         the run used so it can be repeated.
//
//   report.rs           — Run report
//                         Per-split corpus counters (accepted,
//                         ignored, empty lines, misalignment)
//                         written to a CSV file.
//
//   tokenizer_export.rs — Tokenizer export
//                         Writes each word vocabulary as a
//                         HuggingFace WordLevel tokenizer.json.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Saved dataset, vocabulary files and run config
pub mod store;

/// Per-split statistics CSV
pub mod report;

/// HuggingFace tokenizer.json export
pub mod tokenizer_export;
