//! The terminology corpus used to seed the knowledge base.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::document::{DocumentMetadata, KnowledgeDocument};
use crate::error::{KnowledgeError, Result};

const BUILTIN_TERMS: &str = include_str!("../data/terms.json");

/// One entry of the terminology corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusTerm {
    pub id: u32,
    pub tibetan_script: String,
    #[serde(rename = "wileyScript")]
    pub wylie: String,
    #[serde(rename = "englishTransliteration")]
    pub transliteration: String,
    #[serde(rename = "englishTranslation")]
    pub translation: String,
}

impl CorpusTerm {
    /// Id of the document derived from this term.
    pub fn document_id(&self) -> String {
        format!("term-{}", self.id)
    }

    /// Flatten the term into a single `term` document.
    pub fn to_document(&self) -> KnowledgeDocument {
        KnowledgeDocument::new(
            self.document_id(),
            format!(
                "{} ({}, {}): {}",
                self.transliteration, self.tibetan_script, self.wylie, self.translation
            ),
            DocumentMetadata::Term {
                tibetan_script: Some(self.tibetan_script.clone()),
                wylie: Some(self.wylie.clone()),
                transliteration: Some(self.transliteration.clone()),
            },
        )
    }
}

/// The corpus bundled with the crate.
pub fn builtin_terms() -> Result<Vec<CorpusTerm>> {
    parse_terms(BUILTIN_TERMS)
}

/// Parse a corpus from its JSON array form.
pub fn parse_terms(json: &str) -> Result<Vec<CorpusTerm>> {
    serde_json::from_str(json)
        .map_err(|e| KnowledgeError::InvalidFormat(format!("terminology corpus: {e}")))
}

/// Load a corpus file.
pub async fn load_terms(path: impl AsRef<Path>) -> Result<Vec<CorpusTerm>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    let terms = parse_terms(&content)?;
    debug!("Loaded {} corpus terms from {}", terms.len(), path.display());
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_term_document_content() {
        let term = CorpusTerm {
            id: 9,
            tibetan_script: "སེམས་ཉིད".to_string(),
            wylie: "sems nyid".to_string(),
            transliteration: "Sem-nyid".to_string(),
            translation: "The nature of mind".to_string(),
        };

        let doc = term.to_document();
        assert_eq!(doc.id, "term-9");
        assert_eq!(doc.content, "Sem-nyid (སེམས་ཉིད, sems nyid): The nature of mind");
        assert_eq!(doc.doc_type(), DocumentType::Term);
    }

    #[test]
    fn test_builtin_terms_parse() {
        let terms = builtin_terms().unwrap();
        assert!(!terms.is_empty());
        assert_eq!(terms[0].wylie, "rig pa");
    }

    #[test]
    fn test_malformed_corpus_is_invalid_format() {
        let err = parse_terms("[{\"id\": \"one\"}]").unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidFormat(_)));
    }
}
