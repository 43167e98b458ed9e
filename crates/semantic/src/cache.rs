use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;

use crate::{Embedder, SemanticError};

/// Wraps an [`Embedder`] with an LRU keyed by the input text.
///
/// Only misses are forwarded to the inner provider, in a single batch, so a
/// query that is both classified and retrieved is embedded once.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for text in texts {
                let hit = cache.get(text).cloned();
                if hit.is_none() && !missing.contains(text) {
                    missing.push(text.clone());
                }
                out.push(hit);
            }
        }

        if !missing.is_empty() {
            let fresh = self.inner.encode(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(SemanticError::Inference(format!(
                    "provider returned {} embeddings for {} inputs",
                    fresh.len(),
                    missing.len()
                )));
            }
            tracing::trace!(misses = missing.len(), "embedding cache miss");

            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for (text, vector) in missing.iter().zip(fresh.iter()) {
                cache.put(text.clone(), vector.clone());
            }
            for (slot, text) in out.iter_mut().zip(texts) {
                if slot.is_none() {
                    let pos = missing.iter().position(|m| m == text);
                    *slot = pos.map(|p| fresh[p].clone());
                }
            }
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| SemanticError::Inference("missing cached embedding".into())))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StubEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        inner: StubEmbedder,
        calls: AtomicUsize,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.encode(texts).await
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            inner: StubEmbedder::new(32, "stub").unwrap(),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn repeated_query_hits_cache() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(8).unwrap());

        let q = vec!["where is my order".to_string()];
        let a = cached.encode(&q).await.unwrap();
        let b = cached.encode(&q).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn only_misses_are_forwarded() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(8).unwrap());

        cached.encode(&["a".to_string()]).await.unwrap();
        let out = cached
            .encode(&["a".to_string(), "b".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[1], out[2]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.texts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), NonZeroUsize::new(1).unwrap());

        cached.encode(&["a".to_string()]).await.unwrap();
        cached.encode(&["b".to_string()]).await.unwrap();
        cached.encode(&["a".to_string()]).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.len(), 1);
    }
}
