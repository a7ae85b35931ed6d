// ============================================================
// ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// Only the data layer's batcher imports burn besides this one —
// the domain layer stays framework-free.
//
// What's in this layer:
//
//   embedder.rs — Embedder seam + default token embedder
//                 Maps fixed-length token-id sequences [N, T]
//                 to dense vectors [N, E]
//
//   block.rs    — One pre-norm encoder block
//                 Masked multi-head self-attention and a
//                 two-layer feed-forward, both with residuals
//
//   cache.rs    — Per-session embedding cache
//                 Write-once storage for the padded context
//                 prefix and the study metadata embedding
//
//   model.rs    — The ICL regression transformer
//                 Feature projectors, bipartite attention
//                 masking, output head, and the three entry
//                 points: call / fit / infer
//
//   loss.rs     — Masked Gaussian negative log-likelihood
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need

use burn::nn::Initializer;

/// Initialization used by every learned projection in the model.
/// The small-variance scale is shared model-wide; a mismatched
/// scale at any sublayer skews the effective learning rate.
pub(crate) fn weight_init() -> Initializer {
    Initializer::Normal { mean: 0.0, std: 0.02 }
}

/// Token-sequence embedder trait and the default table embedder
pub mod embedder;

/// Pre-norm masked transformer encoder block
pub mod block;

/// Write-once per-session embedding cache
pub mod cache;

/// The ICL regression transformer (call / fit / infer)
pub mod model;

/// Masked Gaussian negative log-likelihood loss
pub mod loss;
