// ============================================================
// Fit Batcher
// ============================================================
// Converts a slice of ObservationSets plus their study metadata
// strings into the fixed-shape tensors the model's training
// entry point consumes.
//
// How batching works here:
//   Input:  N observation sets, each with up to L slots
//   Output: FitBatch with tensors
//             x_tokens [N, L, T]  token ids per slot
//             y        [N, L]     outcomes (true values kept)
//             metadata [N, T]     study metadata token ids
//             mask     [N, L]     True = context position
//
//   Everything is flattened into one long Vec and reshaped,
//   which keeps tensor creation to a single host-to-device
//   transfer per field.
//
// The y tensor keeps the TRUE outcome at every slot, including
// targets: the model hides target outcomes itself by zeroing
// them against the mask, and the loss needs the real values.
//
// Shapes are fixed: sets longer than the capacity L are an
// error, shorter ones are padded (padding slots read as target
// positions and are simply ignored by the caller's loss mask).
//
// Reference: Burn Book §4 (Batcher)

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::vocab::FloatVocabulary;
use crate::domain::observation::ObservationSet;

// ─── FitBatch ─────────────────────────────────────────────────────────────────
/// A batch of observation histories ready for the model.
/// All tensors have batch size as their first dimension.
#[derive(Debug, Clone)]
pub struct FitBatch<B: Backend> {
    /// Token id sequences per slot - shape: [batch, capacity, token_len]
    pub x_tokens: Tensor<B, 3, Int>,

    /// Outcomes per slot - shape: [batch, capacity]
    pub y: Tensor<B, 2>,

    /// Study metadata token ids - shape: [batch, token_len]
    pub metadata: Tensor<B, 2, Int>,

    /// Context mask - shape: [batch, capacity], True = context
    pub mask: Tensor<B, 2, Bool>,
}

// ─── FitBatcher ───────────────────────────────────────────────────────────────
/// Holds the target device and the fixed sequence shapes.
#[derive(Clone, Debug)]
pub struct FitBatcher<B: Backend> {
    /// The device to create tensors on
    device: B::Device,

    /// L: fixed number of observation slots per set
    seq_capacity: usize,

    /// T: fixed number of token ids per serialized string
    token_len: usize,
}

impl<B: Backend> FitBatcher<B> {
    /// Create a new batcher for the given device and fixed shapes
    pub fn new(device: B::Device, seq_capacity: usize, token_len: usize) -> Self {
        Self { device, seq_capacity, token_len }
    }

    /// Convert observation sets and their metadata strings into a FitBatch.
    ///
    /// # Arguments
    /// * `sets`     - One observation history per batch element
    /// * `metadata` - One study metadata string per batch element
    /// * `vocab`    - Vocabulary used to tokenize strings
    pub fn batch(
        &self,
        sets:     &[ObservationSet],
        metadata: &[String],
        vocab:    &FloatVocabulary,
    ) -> Result<FitBatch<B>> {
        if sets.is_empty() {
            bail!("cannot batch zero observation sets");
        }
        if sets.len() != metadata.len() {
            bail!(
                "got {} observation sets but {} metadata strings",
                sets.len(),
                metadata.len()
            );
        }

        let batch = sets.len();
        let cap   = self.seq_capacity;
        let t_len = self.token_len;
        let pad   = vocab.pad_id() as i32;

        let mut x_flat    = Vec::with_capacity(batch * cap * t_len);
        let mut y_flat    = Vec::with_capacity(batch * cap);
        let mut mask_flat = Vec::with_capacity(batch * cap);
        let mut md_flat   = Vec::with_capacity(batch * t_len);

        for (set, md) in sets.iter().zip(metadata) {
            if set.xs.len() != set.ys.len() {
                bail!(
                    "observation set has {} xs but {} ys",
                    set.xs.len(),
                    set.ys.len()
                );
            }
            if set.len() > cap {
                bail!(
                    "observation set has {} slots but capacity is {cap}",
                    set.len()
                );
            }

            for slot in 0..cap {
                match set.xs.get(slot) {
                    Some(x) => {
                        let ids = vocab.encode_text(x, t_len)?;
                        x_flat.extend(ids.iter().map(|&id| id as i32));
                        y_flat.push(set.ys[slot] as f32);
                    }
                    None => {
                        // Padding slot: pad tokens, zero outcome
                        x_flat.extend(std::iter::repeat(pad).take(t_len));
                        y_flat.push(0.0);
                    }
                }
            }
            mask_flat.extend(
                set.context_mask(cap)
                    .into_iter()
                    .map(|c| if c { 1i32 } else { 0i32 }),
            );

            let md_ids = vocab.encode_text(md, t_len)?;
            md_flat.extend(md_ids.iter().map(|&id| id as i32));
        }

        // ── Create tensors ────────────────────────────────────────────────────
        let x_tokens = Tensor::<B, 1, Int>::from_ints(x_flat.as_slice(), &self.device)
            .reshape([batch, cap, t_len]);

        let y = Tensor::<B, 1>::from_floats(y_flat.as_slice(), &self.device)
            .reshape([batch, cap]);

        let metadata = Tensor::<B, 1, Int>::from_ints(md_flat.as_slice(), &self.device)
            .reshape([batch, t_len]);

        let mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch, cap])
            .equal_elem(1);

        Ok(FitBatch { x_tokens, y, metadata, mask })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::serializer::DigitFloatSerializer;

    type TestBackend = burn::backend::NdArray;

    fn vocab() -> FloatVocabulary {
        let texts = vec!["lr low".to_string(), "lr high".to_string()];
        FloatVocabulary::build(DigitFloatSerializer::default(), &texts, 128).unwrap()
    }

    fn batcher() -> FitBatcher<TestBackend> {
        FitBatcher::new(Default::default(), 4, 3)
    }

    #[test]
    fn test_batch_shapes() {
        let sets = vec![
            ObservationSet::new(
                vec!["lr low".into(), "lr high".into(), "lr low".into()],
                vec![0.5, -1.5, 0.25],
                2,
            ),
            ObservationSet::new(vec!["lr high".into()], vec![2.0], 1),
        ];
        let metadata = vec!["maximize accuracy".to_string(); 2];

        let batch = batcher().batch(&sets, &metadata, &vocab()).unwrap();
        assert_eq!(batch.x_tokens.dims(), [2, 4, 3]);
        assert_eq!(batch.y.dims(),        [2, 4]);
        assert_eq!(batch.metadata.dims(), [2, 3]);
        assert_eq!(batch.mask.dims(),     [2, 4]);
    }

    #[test]
    fn test_mask_and_padding_values() {
        let sets = vec![ObservationSet::new(
            vec!["lr low".into(), "lr high".into(), "lr low".into()],
            vec![0.5, -1.5, 0.25],
            2,
        )];
        let metadata = vec!["maximize accuracy".to_string()];

        let batch = batcher().batch(&sets, &metadata, &vocab()).unwrap();

        let mask: Vec<bool> = batch.mask.into_data().to_vec().unwrap();
        assert_eq!(mask, vec![true, true, false, false]);

        // True outcomes survive at target slots; padding slots are zero
        let y: Vec<f32> = batch.y.into_data().to_vec().unwrap();
        assert_eq!(y, vec![0.5, -1.5, 0.25, 0.0]);
    }

    #[test]
    fn test_over_capacity_rejected() {
        let sets = vec![ObservationSet::new(
            vec!["a".into(); 5],
            vec![0.0; 5],
            3,
        )];
        let metadata = vec!["m".to_string()];
        assert!(batcher().batch(&sets, &metadata, &vocab()).is_err());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let sets     = vec![ObservationSet::new(vec!["a".into()], vec![0.1, 0.2], 1)];
        let metadata = vec!["m".to_string()];
        assert!(batcher().batch(&sets, &metadata, &vocab()).is_err());

        let sets = vec![ObservationSet::new(vec!["a".into()], vec![0.1], 1)];
        assert!(batcher().batch(&sets, &[], &vocab()).is_err());
    }
}
