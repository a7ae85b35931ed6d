// ============================================================
// Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code that
// uses them. For example:
//   - DigitFloatSerializer implements FloatSerializer
//   - A future fixed-point or scientific-notation serializer
//     could also implement FloatSerializer
//   - The vocabulary adapter only sees FloatSerializer
//     and works with both without any changes
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

// ─── FloatSerializer ──────────────────────────────────────────────────────────
/// Any component that can turn a float into a fixed-length
/// sequence of token strings and back.
///
/// The token strings produced here become entries of the
/// vocabulary; the model itself only ever sees their ids.
pub trait FloatSerializer {
    /// Number of tokens every serialized value occupies.
    /// Fixed so that sequence shapes stay static.
    fn num_tokens_per_value(&self) -> usize;

    /// Every token string this serializer can emit.
    /// Used to seed the vocabulary.
    fn all_tokens(&self) -> Vec<String>;

    /// Serialize a finite float into exactly
    /// `num_tokens_per_value()` token strings.
    fn serialize(&self, value: f64) -> Result<Vec<String>>;

    /// Reverse of `serialize`. Fails on malformed or
    /// wrong-length token sequences.
    fn deserialize(&self, tokens: &[String]) -> Result<f64>;
}
