//! Imported dictionary definitions kept between invocations.
//!
//! The knowledge base only persists user-added texts. Definitions live in a
//! second file that is replayed into the store after initialization and
//! rewritten whenever a command changes the set of definitions.

use std::sync::Arc;

use anyhow::{Context, Result};
use rigpa_knowledge::{DocumentStorage, DocumentType, FileStorage, KnowledgeBase, KnowledgeConfig};
use tracing::{debug, warn};

pub struct DefinitionStore {
    storage: Arc<dyn DocumentStorage>,
}

impl DefinitionStore {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self { storage }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(Arc::new(FileStorage::new(&config.definitions_path)))
    }

    /// Add the saved definitions to `kb`. Returns how many were added.
    ///
    /// An unreadable file is logged and treated as empty.
    pub async fn load_into(&self, kb: &KnowledgeBase) -> usize {
        let documents = match self.storage.load_documents().await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Error loading saved definitions: {e}");
                return 0;
            }
        };

        let definitions: Vec<_> = documents
            .into_iter()
            .filter(|d| d.doc_type() == DocumentType::Definition)
            .collect();
        let count = definitions.len();
        if count > 0 {
            kb.add_documents(definitions).await;
        }
        debug!("Loaded {count} saved definitions");
        count
    }

    /// Overwrite the saved set with the definitions currently in `kb`,
    /// embeddings included.
    pub async fn save_from(&self, kb: &KnowledgeBase) -> Result<usize> {
        let definitions = kb.documents_by_type(DocumentType::Definition).await;
        self.storage
            .save_documents(&definitions)
            .await
            .context("saving definitions")?;
        debug!("Saved {} definitions", definitions.len());
        Ok(definitions.len())
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove().await.context("erasing definitions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rigpa_knowledge::{DocumentMetadata, KnowledgeDocument, MemoryStorage};

    fn definition(page_id: u32, content: &str) -> KnowledgeDocument {
        KnowledgeDocument::new(
            format!("rywiki-{page_id}"),
            content,
            DocumentMetadata::Definition {
                source: Some("Rangjung Yeshe Wiki".to_string()),
                url: None,
                title: None,
                tibetan_term: None,
                category: None,
            },
        )
    }

    async fn fresh_kb() -> KnowledgeBase {
        let kb = KnowledgeBase::builder().build();
        kb.initialize(&[], &["ground, path and fruition".to_string()])
            .await;
        kb
    }

    #[tokio::test]
    async fn test_imported_definition_is_searchable_in_next_run() {
        let saved = Arc::new(MemoryStorage::new());

        let first = fresh_kb().await;
        first
            .add_documents(vec![definition(
                7,
                "thig le\n\nThe essence drop, the seminal point",
            )])
            .await;
        assert_eq!(DefinitionStore::new(saved.clone()).save_from(&first).await.unwrap(), 1);

        let second = fresh_kb().await;
        assert!(second.search("seminal point", 5).await.is_empty());

        assert_eq!(DefinitionStore::new(saved).load_into(&second).await, 1);
        let results = second.search("seminal point", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "rywiki-7");
        assert_eq!(second.stats().await.total_documents, 2);
    }

    #[tokio::test]
    async fn test_save_keeps_only_definitions() {
        let saved = Arc::new(MemoryStorage::new());
        let store = DefinitionStore::new(saved.clone());

        let kb = fresh_kb().await;
        kb.add_documents(vec![
            KnowledgeDocument::user_text("a note"),
            definition(1, "rig pa\n\nAwareness"),
            definition(2, "ma rig pa\n\nIgnorance"),
        ])
        .await;
        kb.remove_document("rywiki-1").await;
        store.save_from(&kb).await.unwrap();

        let ids: Vec<_> = saved
            .load_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["rywiki-2"]);
    }

    #[tokio::test]
    async fn test_load_skips_other_types_and_bad_files() {
        let mixed = serde_json::to_string(&vec![
            KnowledgeDocument::user_text("not a definition"),
            definition(3, "sems\n\nOrdinary mind"),
        ])
        .unwrap();
        let kb = fresh_kb().await;
        let store = DefinitionStore::new(Arc::new(MemoryStorage::with_value(mixed)));
        assert_eq!(store.load_into(&kb).await, 1);
        assert_eq!(kb.documents_by_type(DocumentType::Text).await.len(), 1);

        let corrupt = DefinitionStore::new(Arc::new(MemoryStorage::with_value("{oops")));
        assert_eq!(corrupt.load_into(&kb).await, 0);
    }

    #[tokio::test]
    async fn test_clear_erases_saved_definitions() {
        let saved = Arc::new(MemoryStorage::with_value("[]"));
        DefinitionStore::new(saved.clone()).clear().await.unwrap();
        assert_eq!(saved.read().await.unwrap(), None);
    }
}
