// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (preprocessing a corpus or inspecting the
// result).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file format handling (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The corpus → dataset workflow
pub mod preprocess_use_case;

// Summary of a saved dataset
pub mod inspect_use_case;
