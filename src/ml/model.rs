// ============================================================
// ICL Regression Transformer
// ============================================================
// Predicts a Gaussian (mean, std) belief over the outcome y at
// every slot of an observation history, in a single forward
// pass. The history mixes context points (x and y known) with
// target points (x known, y wanted); a boolean mask marks which
// is which.
//
// The attention scheme is NOT causal. Visibility depends only
// on the KEY position's role:
//
//   context slot → visible to every query row
//   target slot  → visible to no query row (its own query
//                  still reads the whole context)
//
// so any number of target points can be scored against the same
// context at once, and one target's outcome can never influence
// another slot's prediction.
//
// Three entry points share the same kernel:
//
//   call  — masked forward pass over already-embedded x
//   fit   — batched training: embeds tokens, adds metadata
//   infer — single sequence, fixed shapes, embedding cache
//
// Target outcomes are zeroed against the mask before y enters
// any computation; this is the information-hiding step the
// whole design rests on.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Garg et al. (2022) What Can Transformers Learn
//            In-Context?

use anyhow::{bail, Result};
use burn::{module::Ignored, nn::{Linear, LinearConfig}, prelude::*, tensor::activation};
use tracing::debug;

use crate::ml::{
    block::{EncoderBlock, EncoderBlockConfig},
    cache::EmbeddingCache,
    embedder::{Embedder, TokenEmbedder, TokenEmbedderConfig},
    weight_init,
};

// ─── Std transform ────────────────────────────────────────────────────────────
/// Monotonic positive mapping for the raw log-std head output.
/// Selected per model; the choice sets the tail behaviour the
/// loss sees for extreme raw values.
#[derive(Config, Debug)]
pub enum StdTransform {
    /// softplus(x) — near-linear tail for large raw values
    Softplus,

    /// exp(x) — heavier tail, matches a raw output in log-space
    Exp,
}

impl StdTransform {
    /// Map raw head outputs to strictly positive scales.
    /// An additive floor is applied by the caller on top.
    pub fn apply<B: Backend, const D: usize>(&self, raw: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            StdTransform::Softplus => activation::softplus(raw, 1.0),
            StdTransform::Exp => raw.exp(),
        }
    }
}

// ─── FeedForward ──────────────────────────────────────────────────────────────
/// Two-layer projection: linear → ReLU → linear. Used for the
/// three feature projectors and the output head.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    linear_inner: Linear<B>,
    linear_outer: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    fn init(d_input: usize, d_hidden: usize, d_output: usize, device: &B::Device) -> Self {
        Self {
            linear_inner: LinearConfig::new(d_input, d_hidden)
                .with_initializer(weight_init())
                .init(device),
            linear_outer: LinearConfig::new(d_hidden, d_output)
                .with_initializer(weight_init())
                .init(device),
        }
    }

    fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        self.linear_outer.forward(activation::relu(self.linear_inner.forward(input)))
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct IclTransformerConfig {
    /// Model width D shared by every encoder sublayer
    pub d_model: usize,

    /// Embedder producing the raw x / metadata embeddings
    pub embedder: TokenEmbedderConfig,

    /// Feed-forward hidden width, as a multiple of d_model
    #[config(default = 4)]
    pub ffw_dim_ratio: usize,

    /// Attention heads; must divide d_model
    #[config(default = 4)]
    pub nhead: usize,

    /// Dropout probability in [0, 1); active on training
    /// backends only
    #[config(default = 0.0)]
    pub dropout: f64,

    /// Encoder depth
    #[config(default = 2)]
    pub num_layers: usize,

    /// Concatenate the study metadata embedding onto every x
    /// embedding (doubles the raw embedding width)
    #[config(default = true)]
    pub use_metadata: bool,

    /// Positive mapping for the raw std head output
    #[config(default = "StdTransform::Softplus")]
    pub std_transform: StdTransform,

    /// Additive floor keeping predicted std away from zero
    #[config(default = 1e-7)]
    pub std_eps: f64,
}

impl IclTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> IclTransformer<B> {
        let embed_dim = self.embedder.embed_dim;
        let x_input = if self.use_metadata { 2 * embed_dim } else { embed_dim };
        let d = self.d_model;

        let blocks = (0..self.num_layers)
            .map(|_| {
                EncoderBlockConfig::new(d, d * self.ffw_dim_ratio)
                    .with_nhead(self.nhead)
                    .with_dropout(self.dropout)
                    .init(device)
            })
            .collect();

        IclTransformer {
            embedder: self.embedder.init(device),
            x_proj: FeedForward::init(x_input, d, d, device),
            y_proj: FeedForward::init(1, d, d, device),
            xy_proj: FeedForward::init(2 * d, d, d, device),
            blocks,
            head: FeedForward::init(d, d, 2, device),
            std_transform: Ignored(self.std_transform.clone()),
            std_eps: self.std_eps,
            use_metadata: self.use_metadata,
        }
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct IclTransformer<B: Backend> {
    embedder: TokenEmbedder<B>,
    x_proj: FeedForward<B>,
    y_proj: FeedForward<B>,
    xy_proj: FeedForward<B>,
    blocks: Vec<EncoderBlock<B>>,
    head: FeedForward<B>,
    std_transform: Ignored<StdTransform>,
    std_eps: f64,
    use_metadata: bool,
}

/// Attention mask derived from the 1-D context mask: row i may
/// attend to column j iff slot j is context, independent of i —
/// the pattern is constant across rows. Inverted on the way in
/// because MultiHeadAttention reads true as "blocked".
fn bipartite_mask<B: Backend>(context: Tensor<B, 2, Bool>) -> Tensor<B, 3, Bool> {
    let [batch, len] = context.dims();
    context.bool_not().unsqueeze_dim::<3>(1).expand([batch, len, len])
}

/// Fixed-shape substitute for variable-length concatenation:
/// write the fresh target block into the free slots starting at
/// `target_index`, then take the cached context wherever the
/// mask is true. The two sources are disjoint — context occupies
/// [0, target_index), the overlay [target_index, target_index + Q).
fn overlay_targets<B: Backend>(
    context_emb: Tensor<B, 2>,
    target_emb: Tensor<B, 2>,
    mask: Tensor<B, 1, Bool>,
    target_index: usize,
) -> Tensor<B, 2> {
    let [capacity, embed_dim] = context_emb.dims();
    let [num_targets, _] = target_emb.dims();

    let overlay = Tensor::zeros([capacity, embed_dim], &context_emb.device())
        .slice_assign([target_index..target_index + num_targets, 0..embed_dim], target_emb);
    let select_context = mask.unsqueeze_dim::<2>(1).expand([capacity, embed_dim]);
    overlay.mask_where(select_context, context_emb)
}

impl<B: Backend> IclTransformer<B> {
    /// The shared kernel: masked forward pass over x that is
    /// already embedded upstream.
    ///
    /// * `x_emb` — [batch, len, E] raw x embeddings
    ///   ([batch, len, 2E] when metadata is in use)
    /// * `y`     — [batch, len] outcomes; values at non-context
    ///   slots are zeroed here and cannot reach the model
    /// * `mask`  — [batch, len], true marks context slots
    ///
    /// Returns (mean [batch, len], std [batch, len]); std is
    /// strictly positive. Mismatched shapes are caller errors
    /// and panic at the tensor boundary.
    pub fn call(
        &self,
        x_emb: Tensor<B, 3>,
        y: Tensor<B, 2>,
        mask: Tensor<B, 2, Bool>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, len, _] = x_emb.dims();

        let x_proj = self.x_proj.forward(x_emb);

        // Hide target outcomes before y enters any computation.
        let y = y.mask_fill(mask.clone().bool_not(), 0.0);
        let y_proj = self.y_proj.forward(y.reshape([batch, len, 1]));

        let fused = self.xy_proj.forward(Tensor::cat(vec![x_proj, y_proj], 2));

        let attn_mask = bipartite_mask(mask);
        let mut hidden = fused;
        for block in &self.blocks {
            hidden = block.forward(hidden, Some(attn_mask.clone()));
        }

        // Two logits per slot: raw mean and raw log-std.
        let out = self.head.forward(hidden);
        let mean = out.clone().slice([0..batch, 0..len, 0..1]).reshape([batch, len]);
        let raw_std = out.slice([0..batch, 0..len, 1..2]).reshape([batch, len]);
        let std = self.std_transform.apply(raw_std).add_scalar(self.std_eps);
        (mean, std)
    }

    /// Batched training entry: embeds the x token sequences (and
    /// the study metadata when enabled) and delegates to
    /// [`Self::call`]. The only entry point meant for autodiff
    /// backends.
    ///
    /// * `x_tokens` — [batch, len, T]
    /// * `y`        — [batch, len]
    /// * `metadata` — [batch, T]; ignored unless metadata is
    ///   enabled
    /// * `mask`     — [batch, len], true marks context slots
    ///
    /// The embedder runs once over the flattened [batch·len, T]
    /// view and the result is reshaped back, so the embedder
    /// itself stays batch-size agnostic.
    pub fn fit(
        &self,
        x_tokens: Tensor<B, 3, Int>,
        y: Tensor<B, 2>,
        metadata: Tensor<B, 2, Int>,
        mask: Tensor<B, 2, Bool>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, len, token_len] = x_tokens.dims();
        let embed_dim = self.embedder.embed_dim();

        let flat = x_tokens.reshape([batch * len, token_len]);
        let mut x_emb = self.embedder.embed(flat).reshape([batch, len, embed_dim]);

        if self.use_metadata {
            // One metadata embedding per study, broadcast across
            // all slots of that study.
            let md = self.embedder.embed(metadata);
            let md = md.unsqueeze_dim::<3>(1).expand([batch, len, embed_dim]);
            x_emb = Tensor::cat(vec![x_emb, md], 2);
        }

        self.call(x_emb, y, mask)
    }

    /// Single-sequence inference with an embedding cache, shaped
    /// for repeated invocation inside an optimization loop: all
    /// dimensions (capacity L, token length T, target batch Q)
    /// stay fixed call to call, so a shape-specializing backend
    /// compiles the pass once.
    ///
    /// * `x_padded` — [L, T] context tokens, padded to capacity
    /// * `y_padded` — [L] outcomes, zero past the context
    /// * `x_targ`   — [Q, T] target tokens, embedded fresh every
    ///   call
    /// * `metadata` — [T] study metadata tokens
    /// * `mask`     — [L], true for the leading context slots;
    ///   the context count is its number of true entries
    /// * `cache`    — the session's embedding cache
    ///
    /// Returns (mean [L], std [L], cache). The returned cache is
    /// a new value; subsequent calls must use it, not the one
    /// passed in. Fails when the mask length does not match the
    /// capacity or the target batch overflows the free slots.
    pub fn infer(
        &self,
        x_padded: Tensor<B, 2, Int>,
        y_padded: Tensor<B, 1>,
        x_targ: Tensor<B, 2, Int>,
        metadata: Tensor<B, 1, Int>,
        mask: &[bool],
        cache: EmbeddingCache<B>,
    ) -> Result<(Tensor<B, 1>, Tensor<B, 1>, EmbeddingCache<B>)> {
        let [capacity, _] = x_padded.dims();
        let [num_targets, _] = x_targ.dims();
        let device = x_padded.device();

        if mask.len() != capacity {
            bail!("mask has {} slots but the padded context has {capacity}", mask.len());
        }

        // First free slot past the current context.
        let target_index = mask.iter().filter(|&&context| context).count();
        if target_index + num_targets > capacity {
            bail!(
                "{num_targets} target points do not fit: {} of {capacity} slots free",
                capacity - target_index
            );
        }

        // The padded context prefix embeds at most once per session.
        let (context_emb, cache) = cache.x_embedding_or_insert(|| {
            debug!(capacity, "embedding padded context prefix");
            self.embedder.embed(x_padded)
        });

        let target_emb = self.embedder.embed(x_targ);
        let embed_dim = self.embedder.embed_dim();

        let mask_ints: Vec<i32> = mask.iter().map(|&context| i32::from(context)).collect();
        let mask_1d = Tensor::<B, 1, Int>::from_ints(mask_ints.as_slice(), &device).equal_elem(1);

        let mut x_emb = overlay_targets(context_emb, target_emb, mask_1d.clone(), target_index);

        let cache = if self.use_metadata {
            let (metadata_emb, cache) = cache.metadata_embedding_or_insert(|| {
                debug!("embedding study metadata");
                self.embedder.embed(metadata.unsqueeze::<2>()).reshape([embed_dim])
            });
            let md = metadata_emb.unsqueeze::<2>().expand([capacity, embed_dim]);
            x_emb = Tensor::cat(vec![x_emb, md], 1);
            cache
        } else {
            cache
        };

        // One-element batch through the shared kernel. Inference
        // runs on a non-autodiff backend, where dropout is
        // inactive.
        let (mean, std) = self.call(
            x_emb.unsqueeze::<3>(),
            y_padded.unsqueeze::<2>(),
            mask_1d.unsqueeze::<2>(),
        );
        Ok((mean.reshape([capacity]), std.reshape([capacity]), cache))
    }
}
