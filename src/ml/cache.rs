// ============================================================
// Embedding Cache
// ============================================================
// Per-session store for embeddings that do not change across
// repeated inference calls: the padded context prefix [L, E]
// and the study metadata vector [E].
//
// None means "not yet computed". Population is write-once with
// immutable-replace semantics: the populating call consumes the
// cache and returns a new value holding the embedding. An entry
// that is already set is never recomputed within the session.
//
// Invalidation is the owner's responsibility: when the context
// outgrows the padded capacity, drop the cache and start a
// fresh session. One cache belongs to one session; sharing it
// between concurrent callers is not supported.

use burn::prelude::*;

/// Write-once embedding store for one inference session.
#[derive(Debug, Clone)]
pub struct EmbeddingCache<B: Backend> {
    x_embedding: Option<Tensor<B, 2>>,
    metadata_embedding: Option<Tensor<B, 1>>,
}

impl<B: Backend> EmbeddingCache<B> {
    /// An empty cache for a new inference session.
    pub fn new() -> Self {
        Self { x_embedding: None, metadata_embedding: None }
    }

    pub fn has_x_embedding(&self) -> bool {
        self.x_embedding.is_some()
    }

    pub fn has_metadata_embedding(&self) -> bool {
        self.metadata_embedding.is_some()
    }

    /// The stored context embedding [L, E], computing and storing
    /// it on first use. Callers must keep using the returned
    /// cache — population never happens in place.
    pub fn x_embedding_or_insert(
        mut self,
        compute: impl FnOnce() -> Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Self) {
        let embedding = match self.x_embedding.take() {
            Some(embedding) => embedding,
            None => compute(),
        };
        self.x_embedding = Some(embedding.clone());
        (embedding, self)
    }

    /// The stored metadata embedding [E], same contract as
    /// [`Self::x_embedding_or_insert`].
    pub fn metadata_embedding_or_insert(
        mut self,
        compute: impl FnOnce() -> Tensor<B, 1>,
    ) -> (Tensor<B, 1>, Self) {
        let embedding = match self.metadata_embedding.take() {
            Some(embedding) => embedding,
            None => compute(),
        };
        self.metadata_embedding = Some(embedding.clone());
        (embedding, self)
    }
}

impl<B: Backend> Default for EmbeddingCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn filled(value: f32) -> Tensor<TestBackend, 2> {
        Tensor::ones([3, 2], &Default::default()) * value
    }

    #[test]
    fn test_populates_on_first_use() {
        let cache = EmbeddingCache::<TestBackend>::new();
        assert!(!cache.has_x_embedding());

        let (emb, cache) = cache.x_embedding_or_insert(|| filled(1.0));
        assert!(cache.has_x_embedding());
        assert!(!cache.has_metadata_embedding());
        assert_eq!(emb.dims(), [3, 2]);
    }

    #[test]
    fn test_never_recomputes_once_set() {
        let cache = EmbeddingCache::<TestBackend>::new();
        let (_, cache) = cache.x_embedding_or_insert(|| filled(1.0));

        // A second population attempt must return the stored value
        let (emb, _) = cache.x_embedding_or_insert(|| filled(9.0));
        let vals: Vec<f32> = emb.into_data().to_vec().unwrap();
        assert!(vals.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_entries_are_independent() {
        let cache = EmbeddingCache::<TestBackend>::new();
        let (_, cache) = cache.metadata_embedding_or_insert(|| {
            Tensor::ones([2], &Default::default())
        });
        assert!(cache.has_metadata_embedding());
        assert!(!cache.has_x_embedding());
    }
}
