//! Knowledge documents: the atomic unit stored and retrieved.
//!
//! The serialized shape is the JSON used for persistence and for the
//! export/import format:
//!
//! ```json
//! {
//!   "id": "custom-…",
//!   "content": "…",
//!   "metadata": { "type": "text", "source": "user-added" },
//!   "embedding": [0.1, 0.2]
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use rigpa_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag of texts added by the user. Only these are persisted.
pub const USER_ADDED_SOURCE: &str = "user-added";

/// Source tag of texts supplied to `initialize` alongside the corpus.
pub const ADDITIONAL_RESOURCES_SOURCE: &str = "additional-resources";

/// A single document in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Identifier, unique within a store.
    pub id: String,

    /// Plain-text content used for scoring and prompt context.
    pub content: String,

    /// Typed provenance.
    pub metadata: DocumentMetadata,

    /// Vector for similarity search, once the gateway has produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl KnowledgeDocument {
    /// Create a document without an embedding.
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            embedding: None,
        }
    }

    /// A user-added text document with a fresh `custom-<uuid>` id.
    pub fn user_text(content: impl Into<String>) -> Self {
        Self::new(
            format!("custom-{}", Uuid::new_v4()),
            content,
            DocumentMetadata::Text {
                source: Some(USER_ADDED_SOURCE.to_string()),
            },
        )
    }

    /// The document's type tag.
    pub fn doc_type(&self) -> DocumentType {
        self.metadata.doc_type()
    }

    /// Whether this document belongs to the persisted user-added subset.
    pub fn is_user_added(&self) -> bool {
        matches!(
            &self.metadata,
            DocumentMetadata::Text { source: Some(source) } if source == USER_ADDED_SOURCE
        )
    }

    /// Term documents are immutable seed data; everything else may be
    /// deleted by the user.
    pub fn is_deletable(&self) -> bool {
        self.doc_type() != DocumentType::Term
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Provenance of a document, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DocumentMetadata {
    /// An entry of the fixed terminology corpus.
    Term {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tibetan_script: Option<String>,
        #[serde(default, rename = "wileyScript", skip_serializing_if = "Option::is_none")]
        wylie: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transliteration: Option<String>,
    },

    /// Free text, either user-added or supplied at initialization.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },

    /// An entry imported from an external dictionary.
    Definition {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tibetan_term: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
}

impl DocumentMetadata {
    pub fn doc_type(&self) -> DocumentType {
        match self {
            Self::Term { .. } => DocumentType::Term,
            Self::Text { .. } => DocumentType::Text,
            Self::Definition { .. } => DocumentType::Definition,
        }
    }
}

/// The `metadata.type` tag on its own, for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Term,
    Text,
    Definition,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Term => "term",
            Self::Text => "text",
            Self::Definition => "definition",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "term" => Ok(Self::Term),
            "text" => Ok(Self::Text),
            "definition" => Ok(Self::Definition),
            other => Err(format!(
                "unknown document type `{other}` (expected term, text or definition)"
            )),
        }
    }
}
