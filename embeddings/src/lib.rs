//! # Embeddings
//!
//! This crate is the embedding gateway of the Rigpa knowledge base: it turns
//! text into dense vectors through a remote embeddings API and provides the
//! similarity math used to rank documents against a query.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert batches of text to vectors, one per input, in order
//! - **Similarity Search**: Cosine similarity and top-k ranking
//! - **OpenAI-compatible Provider**: Bearer-token `POST /embeddings`
//! - **Caching**: Memoize vectors so unchanged content is not re-embedded
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embedding Gateway                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Vec<Embedding> ──► cosine_similarity     │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  OpenAIProvider / CachedProvider           rank_top_k          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, OpenAIProvider};
pub use similarity::{cosine_similarity, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Largest number of inputs sent to the embeddings endpoint in one request.
pub const DEFAULT_BATCH_SIZE: usize = 100;
