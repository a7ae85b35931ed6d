// ============================================================
// ObservationSet Domain Type
// ============================================================
// Represents one optimization/experiment history in domain
// terms: an ordered sequence of slots where each slot holds a
// serialized parameter configuration x and an outcome y.
//
// The sequence has two kinds of positions:
//   - Context points: both x and y are known. These are the
//     in-context examples the model conditions on.
//   - Target points: x is known, y is to be predicted. Their
//     stored y values carry ground truth for loss computation
//     but must never reach the model unmasked.
//
// The split is a prefix: the first `num_context` slots are
// context, everything after is target. The derived boolean
// mask (True = context) is what the model consumes.
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// One observation history: serialized parameter strings paired
/// with outcomes, with a context/target prefix split.
///
/// `ys[i]` for `i >= num_context` is the ground-truth outcome of
/// a target point. It is kept here for loss computation only;
/// the model zeroes target outcomes before any forward pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSet {
    /// Serialized parameter configuration per slot,
    /// e.g. "learning_rate:0.01 batch_size:64"
    pub xs: Vec<String>,

    /// Observed (or to-be-predicted) outcome per slot
    pub ys: Vec<f64>,

    /// Number of leading slots that are context points.
    /// Slots [0, num_context) are context, the rest are targets.
    pub num_context: usize,
}

impl ObservationSet {
    /// Create a new ObservationSet
    pub fn new(xs: Vec<String>, ys: Vec<f64>, num_context: usize) -> Self {
        Self { xs, ys, num_context }
    }

    /// Total number of slots (context + target)
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// True when the set holds no observations at all
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Number of target slots
    pub fn num_targets(&self) -> usize {
        self.len().saturating_sub(self.num_context)
    }

    /// Boolean context mask padded/truncated to `capacity` slots.
    /// True marks context positions; padding slots are False.
    pub fn context_mask(&self, capacity: usize) -> Vec<bool> {
        (0..capacity)
            .map(|i| i < self.num_context.min(self.len()))
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_mask_prefix() {
        let set = ObservationSet::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![1.0, 2.0, 0.0, 0.0],
            2,
        );
        assert_eq!(set.context_mask(4), vec![true, true, false, false]);
        assert_eq!(set.num_targets(), 2);
    }

    #[test]
    fn test_context_mask_pads_with_false() {
        let set = ObservationSet::new(vec!["a".into()], vec![0.5], 1);
        assert_eq!(set.context_mask(3), vec![true, false, false]);
    }

    #[test]
    fn test_context_mask_clamped_to_length() {
        // num_context larger than the set never marks padding as context
        let set = ObservationSet::new(vec!["a".into(), "b".into()], vec![0.1, 0.2], 5);
        assert_eq!(set.context_mask(4), vec![true, true, false, false]);
    }
}
