// ============================================================
// Encoder Block
// ============================================================
// One pre-norm transformer encoder layer:
//
//   x ─► LayerNorm ─► masked self-attention ─► (+) residual
//   x ─► LayerNorm ─► Linear ► ReLU ► Linear ─► (+) residual
//   x ─► Dropout (training backends only)
//
// The attention step takes an arbitrary boolean mask of shape
// [batch, seq, seq] (true = blocked), broadcast across heads
// inside Burn's MultiHeadAttention. No mask means full
// self-attention.
//
// Dropout randomness comes from the backend's seeded generator
// (`B::seed`), never ambient state; on non-autodiff backends
// Burn's Dropout is a no-op, which is this crate's
// deterministic/eval mode.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Xiong et al. (2020) On Layer Normalization in the
//            Transformer Architecture

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};

use crate::ml::weight_init;

#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    /// Model width D
    pub d_model: usize,

    /// Hidden width F of the feed-forward sublayer
    pub ffw_dim: usize,

    /// Attention heads; must divide d_model
    #[config(default = 4)]
    pub nhead: usize,

    /// Dropout probability in [0, 1)
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.nhead)
            .with_dropout(self.dropout)
            .with_initializer(weight_init())
            .init(device);
        let ffw_linear1 = LinearConfig::new(self.d_model, self.ffw_dim)
            .with_initializer(weight_init())
            .init(device);
        let ffw_linear2 = LinearConfig::new(self.ffw_dim, self.d_model)
            .with_initializer(weight_init())
            .init(device);
        let norm_attn = LayerNormConfig::new(self.d_model).init(device);
        let norm_ffw  = LayerNormConfig::new(self.d_model).init(device);
        let dropout   = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffw_linear1, ffw_linear2, norm_attn, norm_ffw, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    self_attn:   MultiHeadAttention<B>,
    ffw_linear1: Linear<B>,
    ffw_linear2: Linear<B>,
    norm_attn:   LayerNorm<B>,
    norm_ffw:    LayerNorm<B>,
    dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// input [batch, seq, d_model] → output [batch, seq, d_model].
    /// `mask` [batch, seq, seq]: true forbids the query row from
    /// attending to the key column; attention weights renormalize
    /// over the columns that remain.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        let mut attn_input = MhaInput::self_attn(self.norm_attn.forward(x.clone()));
        if let Some(mask) = mask {
            attn_input = attn_input.mask_attn(mask);
        }
        let x = x + self.self_attn.forward(attn_input).context;

        let ffw = self.ffw_linear2.forward(activation::relu(
            self.ffw_linear1.forward(self.norm_ffw.forward(x.clone())),
        ));
        self.dropout.forward(x + ffw)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    const D: usize = 8;
    const LEN: usize = 4;

    fn block() -> EncoderBlock<TestBackend> {
        EncoderBlockConfig::new(D, 2 * D).with_nhead(2).init(&Default::default())
    }

    fn input(vals: &[f32]) -> Tensor<TestBackend, 3> {
        Tensor::<TestBackend, 1>::from_floats(vals, &Default::default()).reshape([1, LEN, D])
    }

    fn patterned() -> Vec<f32> {
        (0..LEN * D).map(|i| (i as f32) * 0.05 - 0.8).collect()
    }

    /// Mask forbidding every row from attending to one column.
    fn blocked_column(col: usize) -> Tensor<TestBackend, 3, Bool> {
        let flags: Vec<i32> = (0..LEN * LEN).map(|i| i32::from(i % LEN == col)).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flags.as_slice(), &Default::default())
            .reshape([1, LEN, LEN])
            .equal_elem(1)
    }

    #[test]
    fn test_forward_preserves_shape() {
        let b = block();
        let x = input(&patterned());
        assert_eq!(b.forward(x.clone(), None).dims(), [1, LEN, D]);
        assert_eq!(b.forward(x, Some(blocked_column(2))).dims(), [1, LEN, D]);
    }

    #[test]
    fn test_forward_is_deterministic() {
        let b = block();
        let x = input(&patterned());
        let out1 = b.forward(x.clone(), Some(blocked_column(1)));
        let out2 = b.forward(x, Some(blocked_column(1)));
        out1.into_data().assert_approx_eq(&out2.into_data(), 6);
    }

    #[test]
    fn test_blocked_column_is_invisible_to_other_rows() {
        let b = block();
        let clean = patterned();
        let mut perturbed = clean.clone();
        for v in &mut perturbed[2 * D..3 * D] {
            *v += 5.0;
        }

        let out1: Vec<f32> = b
            .forward(input(&clean), Some(blocked_column(2)))
            .into_data()
            .to_vec()
            .unwrap();
        let out2: Vec<f32> = b
            .forward(input(&perturbed), Some(blocked_column(2)))
            .into_data()
            .to_vec()
            .unwrap();

        // Position 2 changed through its own residual path only
        for row in [0, 1, 3] {
            assert_eq!(&out1[row * D..(row + 1) * D], &out2[row * D..(row + 1) * D]);
        }
        assert_ne!(&out1[2 * D..3 * D], &out2[2 * D..3 * D]);
    }
}
