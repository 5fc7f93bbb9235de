// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the pipeline
// works on: reserved symbols, feature-augmented tokens, the
// tagged example payload, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums, traits and pure functions

/// Reserved control symbols and the feature delimiter
pub mod constants;

/// Fatal preprocessing and attention errors
pub mod error;

/// Source payload types (text indices / images)
pub mod example;

/// Word / feature splitting of raw tokens
pub mod features;

/// Abstractions the application injects (image decoding)
pub mod traits;
