// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Model-side code that consumes the batches the data layer
// produces.
//
//   attention.rs — Multi-headed scaled dot-product attention
//                  • bias-free K/V/Q projections
//                  • per-head split into the batch dimension
//                  • boolean masking (true = suppress)
//                  • softmax + dropout on the weights
//                  • residual connection + layer normalisation
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need

/// Multi-headed attention with residual + LayerNorm
pub mod attention;
