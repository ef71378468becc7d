//! Embedding cache so unchanged content is not re-embedded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    embedding: Embedding,
    /// Insertion sequence number, used for eviction.
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// Cache of embeddings keyed by model and text, optionally backed by a
/// JSON file.
pub struct EmbeddingCache {
    state: RwLock<CacheState>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Maximum cache size. Zero disables caching.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            cache_path: None,
            max_entries,
        }
    }

    /// Create a cache with persistent storage, loading any existing file.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let cache = Self {
            state: RwLock::new(CacheState::default()),
            cache_path: Some(path.as_ref().to_path_buf()),
            max_entries,
        };
        cache.load().await?;
        Ok(cache)
    }

    fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let state = self.state.read().await;
        state.entries.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let key = Self::hash_key(text, model);
        let mut state = self.state.write().await;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| k.clone())
            {
                state.entries.remove(&oldest_key);
            }
        }

        let inserted = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                embedding,
                inserted,
            },
        );
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Save cache to disk. No-op for in-memory caches.
    pub async fn save(&self) -> Result<()> {
        let Some(ref path) = self.cache_path else {
            return Ok(());
        };

        let content = {
            let state = self.state.read().await;
            let mut entries: Vec<&CacheEntry> = state.entries.values().collect();
            entries.sort_by_key(|e| e.inserted);
            serde_json::to_string(&entries)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        let Some(ref path) = self.cache_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path).await?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content)?;

        // Entries are saved oldest first; keep the newest that fit.
        let skip = entries.len().saturating_sub(self.max_entries);
        if skip > 0 {
            debug!("Dropping {skip} cached embeddings over capacity");
        }

        let mut state = self.state.write().await;
        for mut entry in entries.into_iter().skip(skip) {
            entry.inserted = state.next_seq;
            state.next_seq += 1;
            state.entries.insert(entry.key.clone(), entry);
        }

        info!("Loaded {} cached embeddings from disk", state.entries.len());
        Ok(())
    }
}

/// A provider wrapper that serves repeated texts from an [`EmbeddingCache`].
///
/// Availability and model are those of the wrapped provider. Only the
/// texts missing from the cache are forwarded, in one batch.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        self.provider.model()
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Query embeddings are served from the cache when present but never
    /// added to it, so one-off queries do not evict document vectors.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        match self.cache.get(text, self.provider.model()).await {
            Some(embedding) => Ok(embedding),
            None => self.provider.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let model = self.provider.model().to_string();

        let mut slots: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        for text in texts {
            let hit = self.cache.get(text, &model).await;
            if hit.is_none() {
                missing.push(text.clone());
            }
            slots.push(hit);
        }

        debug!(
            "Embedding cache: {} hits, {} misses",
            texts.len() - missing.len(),
            missing.len()
        );

        if missing.is_empty() {
            return Ok(slots.into_iter().flatten().collect());
        }

        let mut fresh = self.provider.embed_batch(&missing).await?.into_iter();

        let mut results = Vec::with_capacity(texts.len());
        for (text, slot) in texts.iter().zip(slots) {
            let embedding = match slot {
                Some(embedding) => embedding,
                None => match fresh.next() {
                    Some(embedding) => {
                        self.cache.put(text, &model, embedding.clone()).await;
                        embedding
                    }
                    None => {
                        return Err(EmbeddingError::InvalidResponse(
                            "provider returned fewer embeddings than requested".to_string(),
                        ));
                    }
                },
            };
            results.push(embedding);
        }

        if let Err(e) = self.cache.save().await {
            warn!("Failed to save embedding cache: {e}");
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Returns `[len(text)]` for each text and records every batch it sees.
    struct LengthProvider {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn name(&self) -> &str {
            "length"
        }

        fn model(&self) -> &str {
            "length-1"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache.put("hello", "model-1", embedding.clone()).await;

        assert_eq!(cache.get("hello", "model-1").await, Some(embedding));
        assert_eq!(cache.get("hello", "model-2").await, None);
    }

    #[tokio::test]
    async fn test_cache_eviction_drops_oldest() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        cache.put("c", "model", vec![3.0]).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a", "model").await, None);
        assert_eq!(cache.get("c", "model").await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_persistent_cache_survives_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache").join("embeddings.json");

        let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        cache.put("rigpa", "model", vec![0.5, 0.5]).await;
        cache.save().await.unwrap();

        let reloaded = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        assert_eq!(reloaded.get("rigpa", "model").await, Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn test_reload_trims_to_capacity() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("embeddings.json");

        let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        cache.put("c", "model", vec![3.0]).await;
        cache.save().await.unwrap();

        let smaller = EmbeddingCache::with_persistence(&path, 2).await.unwrap();
        assert_eq!(smaller.len().await, 2);
        assert_eq!(smaller.get("a", "model").await, None);
        assert_eq!(smaller.get("c", "model").await, Some(vec![3.0]));

        let disabled = EmbeddingCache::with_persistence(&path, 0).await.unwrap();
        assert!(disabled.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_embeddings_are_not_cached_or_saved() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("embeddings.json");
        let provider = CachedProvider::new(
            LengthProvider {
                calls: Mutex::new(Vec::new()),
            },
            EmbeddingCache::with_persistence(&path, 10).await.unwrap(),
        );

        assert_eq!(provider.embed("query").await.unwrap(), vec![5.0]);
        assert!(provider.cache().is_empty().await);
        assert!(!path.exists());

        // A document vector already cached is reused for an identical query.
        provider.embed_batch(&["rigpa".to_string()]).await.unwrap();
        assert!(path.exists());
        assert_eq!(provider.embed("rigpa").await.unwrap(), vec![5.0]);
        assert_eq!(provider.provider.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let cache = EmbeddingCache::new(0);
        cache.put("a", "model", vec![1.0]).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cached_provider_only_forwards_misses() {
        let provider = CachedProvider::new(
            LengthProvider {
                calls: Mutex::new(Vec::new()),
            },
            EmbeddingCache::new(100),
        );

        let first = vec!["ab".to_string(), "abcd".to_string()];
        assert_eq!(
            provider.embed_batch(&first).await.unwrap(),
            vec![vec![2.0], vec![4.0]]
        );

        let second = vec!["abcd".to_string(), "x".to_string(), "ab".to_string()];
        assert_eq!(
            provider.embed_batch(&second).await.unwrap(),
            vec![vec![4.0], vec![1.0], vec![2.0]]
        );

        let calls = provider.provider.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                vec!["ab".to_string(), "abcd".to_string()],
                vec!["x".to_string()],
            ]
        );
    }
}
