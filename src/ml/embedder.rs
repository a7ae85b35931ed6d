// ============================================================
// Token Embedder
// ============================================================
// Maps fixed-length token-id sequences to dense vectors.
//
// The `Embedder` trait is the seam between the model and
// whatever produces its per-value representation: the model
// only needs "[N, T] ids in, [N, E] vectors out", deterministic
// given fixed weights. The default `TokenEmbedder` is a learned
// embedding table mean-pooled over the T token positions; a
// heavier sequence encoder can replace it by implementing the
// trait and swapping the config field on the model.
//
// Embedders never touch the embedding cache. Deciding what to
// cache (and for how long) is the caller's job.

use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

use crate::ml::weight_init;

// ─── Embedder ─────────────────────────────────────────────────────────────────
/// Token-sequence to vector mapping: [N, T] ids → [N, E].
pub trait Embedder<B: Backend> {
    /// Embedding width E.
    fn embed_dim(&self) -> usize;

    /// Embed a batch of fixed-length token sequences.
    /// Ids must lie within the vocabulary the embedder was
    /// built for.
    fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2>;
}

// ─── TokenEmbedder ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct TokenEmbedderConfig {
    /// Number of token ids the table covers
    pub vocab_size: usize,

    /// Embedding width E
    pub embed_dim: usize,
}

impl TokenEmbedderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenEmbedder<B> {
        let table = EmbeddingConfig::new(self.vocab_size, self.embed_dim)
            .with_initializer(weight_init())
            .init(device);
        TokenEmbedder { table }
    }
}

/// Default embedder: one table lookup per token, mean-pooled
/// over the T positions of each sequence.
#[derive(Module, Debug)]
pub struct TokenEmbedder<B: Backend> {
    table: Embedding<B>,
}

impl<B: Backend> Embedder<B> for TokenEmbedder<B> {
    fn embed_dim(&self) -> usize {
        self.table.weight.val().dims()[1]
    }

    fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [n, _] = tokens.dims();
        let embed_dim = self.embed_dim();
        self.table.forward(tokens).mean_dim(1).reshape([n, embed_dim])
    }
}
