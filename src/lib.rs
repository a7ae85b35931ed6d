// ============================================================
// ICL Regression Transformer
// ============================================================
// In-context-learning regression: given the (x, y) history of
// an optimization study plus optional study metadata, predict a
// Gaussian (mean, std) belief over y for new x points in one
// masked forward pass — no gradient updates at inference time.
//
// Layers, outermost to innermost:
//
//   domain — pure Rust types and traits, no framework code
//   data   — float serialization, vocabulary, tensor batching
//   ml     — the Burn model: embedder, encoder blocks, the
//            embedding cache, the transformer itself, and the
//            Gaussian NLL loss
//
// Training scripts, checkpoint handling and any CLI live
// outside this crate; it exposes the model and its direct
// collaborators only.

#![recursion_limit = "256"]

pub mod domain;
pub mod data;
pub mod ml;
