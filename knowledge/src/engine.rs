//! The knowledge base service.

use std::sync::Arc;

use rigpa_embeddings::{CachedProvider, EmbeddingCache, EmbeddingProvider, OpenAIProvider};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{KnowledgeConfig, PromptConfig};
use crate::context::ContextAssembler;
use crate::corpus::CorpusTerm;
use crate::document::{
    ADDITIONAL_RESOURCES_SOURCE, DocumentMetadata, DocumentType, KnowledgeDocument,
};
use crate::error::{KnowledgeError, Result};
use crate::retrieval::{SearchMode, SearchResult, keyword_search, vector_search};
use crate::storage::{DocumentStorage, FileStorage, MemoryStorage};

/// A live document plus the slot key embeddings are attached by.
///
/// Slots are never reused, so an embedding computed for a document that was
/// removed (or cleared) in the meantime finds no slot and is dropped.
#[derive(Debug, Clone)]
struct Entry {
    slot: u64,
    document: KnowledgeDocument,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<Entry>,
    ready: bool,
    next_slot: u64,
}

impl StoreState {
    fn push(&mut self, document: KnowledgeDocument) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.push(Entry { slot, document });
        slot
    }

    fn documents(&self) -> impl Iterator<Item = &KnowledgeDocument> {
        self.entries.iter().map(|e| &e.document)
    }

    fn user_added(&self) -> Vec<KnowledgeDocument> {
        self.documents()
            .filter(|d| d.is_user_added())
            .cloned()
            .collect()
    }

    fn has_embeddings(&self) -> bool {
        self.documents().any(KnowledgeDocument::has_embedding)
    }

    fn attach(&mut self, slot: u64, embedding: Vec<f32>) -> bool {
        match self.entries.iter_mut().find(|e| e.slot == slot) {
            Some(entry) => {
                entry.document.embedding = Some(embedding);
                true
            }
            None => false,
        }
    }
}

/// A document waiting for an embedding.
type Pending = (u64, String);

/// Knowledge base statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_documents: usize,
    pub with_embeddings: usize,
    pub ready: bool,
}

/// Results of one search together with the mode that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub mode: SearchMode,
    pub results: Vec<SearchResult>,
}

/// The Rigpa knowledge base.
///
/// This is the main entry point of the crate. It coordinates:
/// - the in-memory document collection
/// - embedding generation through an optional [`EmbeddingProvider`]
/// - persistence of user-added documents through a [`DocumentStorage`]
/// - vector or keyword retrieval and prompt context assembly
///
/// Mutating operations are serialized against each other; reads can run
/// while an embedding request is in flight and see the documents already
/// appended.
pub struct KnowledgeBase {
    /// Documents and readiness.
    state: RwLock<StoreState>,

    /// Serializes mutating operations end to end.
    mutation: Mutex<()>,

    /// Embedding gateway. `None` means keyword search only.
    provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Durable storage for user-added documents.
    storage: Arc<dyn DocumentStorage>,

    /// Prompt context renderer.
    assembler: ContextAssembler,

    /// Maximum documents per embeddings request.
    batch_size: usize,

    /// Result count used by [`KnowledgeBase::enhanced_prompt`].
    top_k: usize,
}

impl KnowledgeBase {
    /// Create a new knowledge base builder.
    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::new()
    }

    /// Build a knowledge base wired to the OpenAI-compatible provider and
    /// file storage described by `config`.
    pub async fn from_config(config: &KnowledgeConfig) -> Self {
        let provider = OpenAIProvider::from_env(&config.embedding.api_key_env)
            .with_base_url(&config.embedding.base_url)
            .with_model(&config.embedding.model);

        let max_entries = config.embedding.cache_max_entries;
        let cache = match &config.embedding.cache_path {
            Some(path) if max_entries > 0 => {
                match EmbeddingCache::with_persistence(path, max_entries).await {
                    Ok(cache) => cache,
                    Err(e) => {
                        warn!("Ignoring unreadable embedding cache {}: {e}", path.display());
                        EmbeddingCache::new(max_entries)
                    }
                }
            }
            _ => EmbeddingCache::new(max_entries),
        };

        Self::builder()
            .with_config(config)
            .with_provider(Arc::new(CachedProvider::new(provider, cache)))
            .with_storage(Arc::new(FileStorage::new(&config.storage_path)))
            .build()
    }

    /// Reset the store and seed it from a terminology corpus.
    ///
    /// Builds one `term` document per corpus entry, one ephemeral `text`
    /// document per additional text, appends the persisted user-added
    /// documents, then embeds every document lacking an embedding. The store
    /// is ready afterwards even if no embedding could be produced.
    pub async fn initialize(&self, terms: &[CorpusTerm], additional_texts: &[String]) {
        let _guard = self.mutation.lock().await;
        info!("Initializing knowledge base...");

        let mut documents: Vec<KnowledgeDocument> =
            terms.iter().map(CorpusTerm::to_document).collect();

        documents.extend(additional_texts.iter().enumerate().map(|(idx, text)| {
            KnowledgeDocument::new(
                format!("text-{idx}"),
                text.clone(),
                DocumentMetadata::Text {
                    source: Some(ADDITIONAL_RESOURCES_SOURCE.to_string()),
                },
            )
        }));

        let saved = self.load_persisted().await;
        let saved_count = saved.len();
        documents.extend(saved);

        let pending = {
            let mut state = self.state.write().await;
            state.entries.clear();
            state.ready = false;
            Self::append(&mut state, documents)
        };

        self.embed_pending(pending).await;

        let mut state = self.state.write().await;
        state.ready = true;
        info!(
            "Knowledge base initialized with {} documents (including {saved_count} saved custom texts)",
            state.entries.len()
        );
    }

    /// Append documents, embed the new ones, and persist the user-added
    /// subset.
    ///
    /// Duplicate ids are not rejected. Documents that already carry an
    /// embedding are not re-embedded.
    pub async fn add_documents(&self, documents: Vec<KnowledgeDocument>) {
        let _guard = self.mutation.lock().await;
        let count = documents.len();

        let pending = {
            let mut state = self.state.write().await;
            Self::append(&mut state, documents)
        };

        self.embed_pending(pending).await;
        self.persist().await;
        info!("Added {count} documents to knowledge base");
    }

    /// Remove the first document with `id`. Returns whether one was removed.
    pub async fn remove_document(&self, id: &str) -> bool {
        let _guard = self.mutation.lock().await;

        let removed = {
            let mut state = self.state.write().await;
            match state.entries.iter().position(|e| e.document.id == id) {
                Some(pos) => {
                    state.entries.remove(pos);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.persist().await;
            debug!("Removed document: {id}");
        }
        removed
    }

    /// Empty the store, reset readiness, and erase persisted documents.
    pub async fn clear(&self) {
        let _guard = self.mutation.lock().await;

        {
            let mut state = self.state.write().await;
            state.entries.clear();
            state.ready = false;
        }

        if let Err(e) = self.storage.remove().await {
            warn!("Error clearing custom texts: {e}");
        }
        info!("Cleared knowledge base");
    }

    /// A copy of every document, in collection order.
    pub async fn all_documents(&self) -> Vec<KnowledgeDocument> {
        self.state.read().await.documents().cloned().collect()
    }

    /// A copy of every document of the given type.
    pub async fn documents_by_type(&self, doc_type: DocumentType) -> Vec<KnowledgeDocument> {
        self.state
            .read()
            .await
            .documents()
            .filter(|d| d.doc_type() == doc_type)
            .cloned()
            .collect()
    }

    /// Serialize the user-added documents as pretty JSON.
    pub async fn export_custom_texts(&self) -> Result<String> {
        let custom = self.state.read().await.user_added();
        Ok(serde_json::to_string_pretty(&custom)?)
    }

    /// Parse a JSON array of documents and add them. Returns how many were
    /// imported.
    pub async fn import_custom_texts(&self, json: &str) -> Result<usize> {
        let documents: Vec<KnowledgeDocument> =
            serde_json::from_str(json).map_err(|e| KnowledgeError::InvalidFormat(e.to_string()))?;

        let count = documents.len();
        self.add_documents(documents).await;
        Ok(count)
    }

    /// Search for the `top_k` most relevant documents.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        self.search_detailed(query, top_k).await.results
    }

    /// Search and report which mode produced the results.
    ///
    /// Vector mode is used when the provider is available and at least one
    /// document holds an embedding; unembedded documents are then not
    /// scored. If the query cannot be embedded the call falls back to
    /// keyword mode.
    pub async fn search_detailed(&self, query: &str, top_k: usize) -> SearchOutcome {
        let provider = {
            let state = self.state.read().await;
            if !state.ready {
                warn!("Knowledge base not initialized");
                return SearchOutcome {
                    mode: SearchMode::Keyword,
                    results: Vec::new(),
                };
            }
            self.vector_provider(&state)
        };

        if let Some(provider) = provider {
            match provider.embed(query).await {
                Ok(query_embedding) => {
                    let state = self.state.read().await;
                    return SearchOutcome {
                        mode: SearchMode::Vector,
                        results: vector_search(state.documents(), &query_embedding, top_k),
                    };
                }
                Err(e) => warn!("Error during semantic search, falling back to keywords: {e}"),
            }
        }

        let state = self.state.read().await;
        SearchOutcome {
            mode: SearchMode::Keyword,
            results: keyword_search(state.documents(), query, top_k),
        }
    }

    /// The mode the next search would try first.
    pub async fn search_mode(&self) -> SearchMode {
        let state = self.state.read().await;
        match self.vector_provider(&state) {
            Some(_) => SearchMode::Vector,
            None => SearchMode::Keyword,
        }
    }

    /// Render results into a prompt context block.
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        self.assembler.build_context(results)
    }

    /// Search for `user_query` and append the retrieved context to
    /// `base_prompt`. Without results the base prompt is returned as is.
    pub async fn enhanced_prompt(&self, user_query: &str, base_prompt: &str) -> String {
        let results = self.search(user_query, self.top_k).await;
        self.assembler.augment_prompt(base_prompt, &results)
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.ready
    }

    pub async fn stats(&self) -> KnowledgeStats {
        let state = self.state.read().await;
        KnowledgeStats {
            total_documents: state.entries.len(),
            with_embeddings: state.documents().filter(|d| d.has_embedding()).count(),
            ready: state.ready,
        }
    }

    fn append(state: &mut StoreState, documents: Vec<KnowledgeDocument>) -> Vec<Pending> {
        let mut pending = Vec::new();
        for document in documents {
            let content = document.embedding.is_none().then(|| document.content.clone());
            let slot = state.push(document);
            if let Some(content) = content {
                pending.push((slot, content));
            }
        }
        pending
    }

    fn available_provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.provider.as_ref().filter(|p| p.is_available())
    }

    fn vector_provider(&self, state: &StoreState) -> Option<Arc<dyn EmbeddingProvider>> {
        if state.has_embeddings() {
            self.available_provider().cloned()
        } else {
            None
        }
    }

    /// Embed pending documents batch by batch. A failed batch leaves its
    /// documents unembedded and does not stop later batches.
    async fn embed_pending(&self, pending: Vec<Pending>) {
        if pending.is_empty() {
            return;
        }

        let Some(provider) = self.available_provider() else {
            warn!("No embedding API key available, using fallback keyword search");
            return;
        };

        let total = pending.len().div_ceil(self.batch_size);
        for (idx, batch) in pending.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|(_, content)| content.clone()).collect();

            match provider.embed_batch(&texts).await {
                Ok(embeddings) if embeddings.len() == batch.len() => {
                    let mut state = self.state.write().await;
                    let mut attached = 0;
                    for ((slot, _), embedding) in batch.iter().zip(embeddings) {
                        if state.attach(*slot, embedding) {
                            attached += 1;
                        }
                    }
                    debug!(
                        "Generated embeddings for batch {}/{total} ({attached} attached)",
                        idx + 1
                    );
                }
                Ok(embeddings) => warn!(
                    "Embedding batch {}/{total} returned {} vectors for {} documents",
                    idx + 1,
                    embeddings.len(),
                    batch.len()
                ),
                Err(e) => warn!("Error generating embeddings for batch {}/{total}: {e}", idx + 1),
            }
        }
    }

    async fn load_persisted(&self) -> Vec<KnowledgeDocument> {
        match self.storage.load_documents().await {
            Ok(documents) => {
                debug!("Loaded {} custom texts from storage", documents.len());
                documents
            }
            Err(e) => {
                warn!("Error loading custom texts: {e}");
                Vec::new()
            }
        }
    }

    async fn persist(&self) {
        let custom = self.state.read().await.user_added();
        match self.storage.save_documents(&custom).await {
            Ok(()) => debug!("Saved {} custom texts", custom.len()),
            Err(e) => warn!("Error saving custom texts: {e}"),
        }
    }
}

/// Builder for [`KnowledgeBase`].
pub struct KnowledgeBaseBuilder {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    storage: Arc<dyn DocumentStorage>,
    prompt: PromptConfig,
    batch_size: usize,
    top_k: usize,
}

impl KnowledgeBaseBuilder {
    /// Create a new builder: no provider, in-memory storage.
    pub fn new() -> Self {
        let defaults = KnowledgeConfig::default();
        Self {
            provider: None,
            storage: Arc::new(MemoryStorage::new()),
            prompt: defaults.prompt,
            batch_size: defaults.embedding.batch_size,
            top_k: defaults.search.top_k,
        }
    }

    /// Take batch size, top-k and prompt text from a config.
    pub fn with_config(mut self, config: &KnowledgeConfig) -> Self {
        self.prompt = config.prompt.clone();
        self.batch_size = config.embedding.batch_size;
        self.top_k = config.search.top_k;
        self
    }

    /// Set the embedding provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the persistence backend.
    pub fn with_storage(mut self, storage: Arc<dyn DocumentStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Set the maximum number of documents per embeddings request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the result count used for enhanced prompts.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Build the knowledge base. It is not ready until initialized.
    pub fn build(self) -> KnowledgeBase {
        KnowledgeBase {
            state: RwLock::new(StoreState::default()),
            mutation: Mutex::new(()),
            provider: self.provider,
            storage: self.storage,
            assembler: ContextAssembler::new(&self.prompt),
            batch_size: self.batch_size.max(1),
            top_k: self.top_k,
        }
    }
}

impl Default for KnowledgeBaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attach_ignores_missing_slots() {
        let mut state = StoreState::default();
        let slot = state.push(KnowledgeDocument::user_text("Yeshe"));
        state.entries.clear();
        let other = state.push(KnowledgeDocument::user_text("Sem-nyid"));

        assert_ne!(slot, other);
        assert!(!state.attach(slot, vec![1.0]));
        assert!(state.attach(other, vec![1.0]));
        assert!(state.has_embeddings());
    }

    #[test]
    fn test_append_skips_already_embedded() {
        let mut state = StoreState::default();
        let mut embedded = KnowledgeDocument::user_text("embedded");
        embedded.embedding = Some(vec![0.1]);

        let pending = KnowledgeBase::append(
            &mut state,
            vec![embedded, KnowledgeDocument::user_text("plain")],
        );

        assert_eq!(pending, vec![(1, "plain".to_string())]);
        assert_eq!(state.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let kb = KnowledgeBase::builder().build();
        assert!(!kb.is_ready().await);
        assert_eq!(kb.search_mode().await, SearchMode::Keyword);
        assert_eq!(
            kb.stats().await,
            KnowledgeStats {
                total_documents: 0,
                with_embeddings: 0,
                ready: false,
            }
        );
    }
}
