// ============================================================
// Gaussian Negative Log-Likelihood
// ============================================================
// Training loss for the (mean, std) head: the negative log
// density of the observed outcome under N(mean, std²),
//
//   nll = ln std + ½ ln 2π + ½ ((y − mean) / std)²
//
// averaged over the positions a weight mask selects, so the
// caller decides which slots count — typically the target
// slots, never padding.

use burn::prelude::*;

const HALF_LN_TWO_PI: f64 = 0.918_938_533_204_672_7;

/// Masked Gaussian NLL, averaged over the selected positions.
#[derive(Debug, Clone, Default)]
pub struct GaussianNllLoss;

impl GaussianNllLoss {
    pub fn new() -> Self {
        Self
    }

    /// All inputs are [batch, len]. `std` must be strictly
    /// positive; `weights` is typically 1.0 at scored slots and
    /// 0.0 elsewhere, and must select at least one position.
    pub fn forward<B: Backend>(
        &self,
        mean: Tensor<B, 2>,
        std: Tensor<B, 2>,
        targets: Tensor<B, 2>,
        weights: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let z = (targets - mean) / std.clone();
        let nll = std.log() + z.powf_scalar(2.0) / 2.0 + HALF_LN_TWO_PI;
        (nll * weights.clone()).sum() / weights.sum()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::embedder::TokenEmbedderConfig;
    use crate::ml::model::IclTransformerConfig;

    type TestBackend = burn::backend::NdArray;
    type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn grid(vals: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::<TestBackend, 1>::from_floats(vals, &Default::default())
            .reshape([1, vals.len()])
    }

    #[test]
    fn test_standard_normal_reference_value() {
        // N(0, 1) density at 0: nll = ½ ln 2π
        let loss = GaussianNllLoss::new().forward(
            grid(&[0.0]),
            grid(&[1.0]),
            grid(&[0.0]),
            grid(&[1.0]),
        );
        let val: f32 = loss.into_scalar();
        assert!((val - 0.918_938_5).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weight_positions_do_not_count() {
        // Second slot has a huge error but zero weight
        let loss = GaussianNllLoss::new().forward(
            grid(&[0.0, 0.0]),
            grid(&[1.0, 1.0]),
            grid(&[0.0, 1e6]),
            grid(&[1.0, 0.0]),
        );
        let val: f32 = loss.into_scalar();
        assert!((val - 0.918_938_5).abs() < 1e-5);
    }

    #[test]
    fn test_larger_error_means_larger_loss() {
        let close = GaussianNllLoss::new()
            .forward(grid(&[0.0]), grid(&[1.0]), grid(&[0.5]), grid(&[1.0]))
            .into_scalar();
        let far = GaussianNllLoss::new()
            .forward(grid(&[0.0]), grid(&[1.0]), grid(&[3.0]), grid(&[1.0]))
            .into_scalar();
        assert!(far > close);
    }

    #[test]
    fn test_backprop_through_fit() {
        let device = Default::default();
        let model = IclTransformerConfig::new(16, TokenEmbedderConfig::new(32, 8))
            .with_nhead(2)
            .with_num_layers(1)
            .init::<TrainBackend>(&device);

        let x_tokens = Tensor::<TrainBackend, 1, Int>::from_ints(
            [3, 1, 4, 1, 5, 9, 2, 6, 5], &device,
        )
        .reshape([1, 3, 3]);
        let y = Tensor::<TrainBackend, 1>::from_floats([0.5, -1.5, 2.0], &device)
            .reshape([1, 3]);
        let metadata = Tensor::<TrainBackend, 1, Int>::from_ints([8, 0, 7], &device)
            .reshape([1, 3]);
        let mask = Tensor::<TrainBackend, 1, Int>::from_ints([1, 1, 0], &device)
            .reshape([1, 3])
            .equal_elem(1);

        let (mean, std) = model.fit(x_tokens, y.clone(), metadata, mask.clone());

        // Score the target slot only
        let weights = mask.bool_not().float();
        let loss = GaussianNllLoss::new().forward(mean, std, y, weights);

        let val: f32 = loss.clone().into_scalar();
        assert!(val.is_finite());

        // Gradients must flow back through the whole stack
        let _grads = loss.backward();
    }
}
