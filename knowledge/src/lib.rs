//! # Rigpa Knowledge Base
//!
//! Retrieval-augmented knowledge for a Dzogchen terminology assistant:
//!
//! - **Corpus**: the Tibetan terminology used to seed the store
//! - **Documents**: terms, texts and imported definitions
//! - **Retrieval**: vector search with a keyword fallback
//! - **Context**: retrieved documents rendered for prompt injection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         KnowledgeBase                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Corpus    │  │  Embedding   │  │   Document   │           │
//! │  │    Terms     │  │   Provider   │  │   Storage    │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │  Documents   │                               │
//! │                  └──────────────┘                               │
//! │                          │                                      │
//! │                          ▼                                      │
//! │          ┌──────────────┐    ┌──────────────┐                   │
//! │          │  Retrieval   │ ─▶ │   Context    │                   │
//! │          └──────────────┘    └──────────────┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rigpa_knowledge::{KnowledgeBase, KnowledgeConfig, builtin_terms};
//!
//! let config = KnowledgeConfig::load(KnowledgeConfig::default_path())?;
//! let kb = KnowledgeBase::from_config(&config).await;
//! kb.initialize(&builtin_terms()?, &[]).await;
//!
//! let prompt = kb.enhanced_prompt("What is rigpa?", "You are a guide.").await;
//! ```

pub mod config;
pub mod context;
pub mod corpus;
pub mod document;
pub mod engine;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::{DictionaryConfig, EmbeddingConfig, KnowledgeConfig, PromptConfig, SearchConfig};
pub use context::ContextAssembler;
pub use corpus::{CorpusTerm, builtin_terms, load_terms, parse_terms};
pub use document::{
    ADDITIONAL_RESOURCES_SOURCE, DocumentMetadata, DocumentType, KnowledgeDocument,
    USER_ADDED_SOURCE,
};
pub use engine::{KnowledgeBase, KnowledgeBaseBuilder, KnowledgeStats, SearchOutcome};
pub use error::{KnowledgeError, Result};
pub use retrieval::{SearchMode, SearchResult, keyword_score, keyword_search, vector_search};
pub use storage::{DocumentStorage, FileStorage, MemoryStorage};

// Re-export from dependencies for convenience
pub use rigpa_embeddings::{Embedding, EmbeddingProvider};
