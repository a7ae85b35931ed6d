// ============================================================
// Float Vocabulary Adapter
// ============================================================
// Thin adapter around a `tokenizers` word-level tokenizer that
// knows about the float serializer's token set.
//
// Responsibilities:
//   - Build (or load) a vocabulary that contains the special
//     tokens, every serializer token, and the most frequent
//     words of the study corpus
//   - Encode parameter/metadata strings to fixed-length id
//     arrays (pad/truncate to T, so tensor shapes stay static)
//   - Encode floats to ids via the serializer, and decode ids
//     back to floats
//   - Expose the decode contract: `decode_length` (number of
//     ids a decoded value occupies, counting the initial seed
//     token) and `initial_token_id` (the id that seeds every
//     decode sequence)
//
// The tokenizer JSON is assembled by hand and loaded through
// `Tokenizer::from_bytes`, which sidesteps the trainer type
// mismatches in the tokenizers crate entirely.
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use tokenizers::Tokenizer;

use crate::data::serializer::DigitFloatSerializer;
use crate::domain::traits::FloatSerializer;

/// Fixed ids for the special tokens, assigned before anything else
const PAD_ID: u32 = 0;
const UNK_ID: u32 = 1;
const DEC_ID: u32 = 2;

/// Vocabulary for serialized floats plus free-form study text.
pub struct FloatVocabulary {
    tokenizer:  Tokenizer,
    serializer: DigitFloatSerializer,
}

impl FloatVocabulary {
    /// Build an in-memory vocabulary from the serializer's token
    /// set plus the most frequent words of `texts`, capped at
    /// `vocab_size` entries.
    pub fn build(
        serializer: DigitFloatSerializer,
        texts:      &[String],
        vocab_size: usize,
    ) -> Result<Self> {
        // ── Step 1: Count word frequencies in the corpus ──────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        // ── Step 2: Assemble the vocab map ────────────────────────────────────
        // Specials first, then the serializer's closed token set,
        // then corpus words until the cap is reached.
        let mut vocab = serde_json::Map::new();
        vocab.insert("[PAD]".to_string(), serde_json::json!(PAD_ID));
        vocab.insert("[UNK]".to_string(), serde_json::json!(UNK_ID));
        vocab.insert("[DEC]".to_string(), serde_json::json!(DEC_ID));

        let mut next_id = 3u32;
        for token in serializer.all_tokens() {
            vocab.insert(token, serde_json::json!(next_id));
            next_id += 1;
        }

        for (word, _) in &words {
            if next_id as usize >= vocab_size {
                break;
            }
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        // ── Step 3: Write tokenizer JSON in HuggingFace format ────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": PAD_ID, "content": "[PAD]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": UNK_ID, "content": "[UNK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": DEC_ID, "content": "[DEC]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": serde_json::Value::Object(vocab),
                "unk_token": "[UNK]"
            }
        });

        let bytes = serde_json::to_string(&tokenizer_json)?;
        let tokenizer = Tokenizer::from_bytes(bytes.as_bytes())
            .map_err(|e| anyhow::anyhow!("cannot construct tokenizer: {e}"))?;

        tracing::info!(
            "Vocabulary built: {} entries ({} serializer tokens)",
            next_id,
            serializer.all_tokens().len()
        );

        Ok(Self { tokenizer, serializer })
    }

    /// Load a previously saved tokenizer JSON. The file must
    /// already contain the special tokens and the full token set
    /// of `serializer`.
    pub fn from_file(path: &str, serializer: DigitFloatSerializer) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("cannot load tokenizer from '{path}': {e}"))?;

        for special in ["[PAD]", "[UNK]", "[DEC]"] {
            if tokenizer.token_to_id(special).is_none() {
                bail!("tokenizer at '{path}' is missing special token {special}");
            }
        }
        for token in serializer.all_tokens() {
            if tokenizer.token_to_id(&token).is_none() {
                bail!("tokenizer at '{path}' is missing serializer token {token}");
            }
        }

        Ok(Self { tokenizer, serializer })
    }

    /// Number of ids a decoded value occupies, counting the
    /// initial [DEC] seed token.
    pub fn decode_length(&self) -> usize {
        self.serializer.num_tokens_per_value() + 1
    }

    /// The id that must seed any decode sequence.
    pub fn initial_token_id(&self) -> u32 {
        DEC_ID
    }

    /// The id used to pad fixed-length sequences.
    pub fn pad_id(&self) -> u32 {
        PAD_ID
    }

    /// Total vocabulary size, including specials.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Encode a parameter/metadata string to exactly `token_len`
    /// ids: out-of-vocabulary words map to [UNK], short sequences
    /// are padded, long ones truncated.
    pub fn encode_text(&self, text: &str, token_len: usize) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("cannot tokenize '{text}': {e}"))?;

        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(token_len);
        while ids.len() < token_len {
            ids.push(PAD_ID);
        }
        Ok(ids)
    }

    /// Encode a float to its serializer token ids (no seed token).
    pub fn encode_value(&self, value: f64) -> Result<Vec<u32>> {
        let tokens = self.serializer.serialize(value)?;
        tokens
            .iter()
            .map(|t| {
                self.tokenizer
                    .token_to_id(t)
                    .with_context(|| format!("serializer token '{t}' missing from vocabulary"))
            })
            .collect()
    }

    /// Decode serializer ids back to a float. A leading [DEC]
    /// seed token is accepted and skipped.
    pub fn decode_value(&self, ids: &[u32]) -> Result<f64> {
        let ids = match ids.first() {
            Some(&id) if id == DEC_ID => &ids[1..],
            _ => ids,
        };

        let tokens: Result<Vec<String>> = ids
            .iter()
            .map(|&id| {
                self.tokenizer
                    .id_to_token(id)
                    .with_context(|| format!("id {id} is not in the vocabulary"))
            })
            .collect();

        self.serializer.deserialize(&tokens?)
    }
}
