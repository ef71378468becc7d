//! Scoring of documents against a query.
//!
//! Two strategies:
//! 1. **Vector**: cosine similarity between the query embedding and each
//!    embedded document. Documents without an embedding are not scored.
//! 2. **Keyword**: +1 per query token found in the content, +2 once when
//!    the whole query appears verbatim. Zero scores are dropped.
//!
//! Both keep ties in the order documents were given.

use std::fmt;

use rigpa_embeddings::rank_top_k;
use serde::{Deserialize, Serialize};

use crate::document::KnowledgeDocument;

/// Bonus for a document containing the entire query string.
const PHRASE_BONUS: u32 = 2;

/// A document and its relevance to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: KnowledgeDocument,

    /// Cosine similarity in vector mode, match count in keyword mode.
    pub score: f32,
}

/// How a search was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Keyword,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Keyword => f.write_str("keyword"),
        }
    }
}

/// Lexical score of `content` for a query.
pub fn keyword_score(content: &str, query: &str) -> u32 {
    let query = query.to_lowercase();
    let content = content.to_lowercase();
    score_lowercased(&content, &query, &tokenize(&query))
}

fn tokenize(query_lower: &str) -> Vec<&str> {
    query_lower.split_whitespace().collect()
}

fn score_lowercased(content_lower: &str, query_lower: &str, keywords: &[&str]) -> u32 {
    let mut score = keywords
        .iter()
        .filter(|keyword| content_lower.contains(*keyword))
        .count() as u32;

    // Only a query that produced a token match can earn the phrase bonus,
    // so a blank query scores nothing.
    if score > 0 && content_lower.contains(query_lower) {
        score += PHRASE_BONUS;
    }

    score
}

/// Keyword-mode search over `documents`, returning at most `top_k` results.
pub fn keyword_search<'a>(
    documents: impl IntoIterator<Item = &'a KnowledgeDocument>,
    query: &str,
    top_k: usize,
) -> Vec<SearchResult> {
    let query_lower = query.to_lowercase();
    let keywords = tokenize(&query_lower);
    if keywords.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(u32, &KnowledgeDocument)> = documents
        .into_iter()
        .filter_map(|doc| {
            let score = score_lowercased(&doc.content.to_lowercase(), &query_lower, &keywords);
            (score > 0).then_some((score, doc))
        })
        .collect();

    // Stable: ties stay in encounter order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(top_k)
        .map(|(score, doc)| SearchResult {
            document: doc.clone(),
            score: score as f32,
        })
        .collect()
}

/// Vector-mode search: rank every embedded document by cosine similarity.
///
/// There is no similarity floor; documents whose embedding dimension does
/// not match the query are skipped.
pub fn vector_search<'a>(
    documents: impl IntoIterator<Item = &'a KnowledgeDocument>,
    query_embedding: &[f32],
    top_k: usize,
) -> Vec<SearchResult> {
    let candidates = documents
        .into_iter()
        .filter_map(|doc| doc.embedding.as_deref().map(|embedding| (doc, embedding)));

    rank_top_k(query_embedding, candidates, top_k)
        .into_iter()
        .map(|(doc, score)| SearchResult {
            document: doc.clone(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::KnowledgeDocument;
    use pretty_assertions::assert_eq;

    fn text(id: &str, content: &str) -> KnowledgeDocument {
        let mut doc = KnowledgeDocument::user_text(content);
        doc.id = id.to_string();
        doc
    }

    fn embedded(id: &str, embedding: Vec<f32>) -> KnowledgeDocument {
        let mut doc = text(id, id);
        doc.embedding = Some(embedding);
        doc
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[test]
    fn test_phrase_bonus_outranks_token_overlap() {
        let docs = vec![
            text("wanders", "mind wanders in samsara"),
            text("nature", "the nature of mind is rigpa"),
        ];

        let results = keyword_search(&docs, "nature of mind", 5);

        assert_eq!(ids(&results), vec!["nature", "wanders"]);
        assert_eq!(results[0].score, 5.0);
        assert_eq!(results[1].score, 1.0);
    }

    #[test]
    fn test_keyword_matching_is_case_insensitive_substring() {
        assert_eq!(keyword_score("Rigpa is Pure Awareness", "AWARE"), 3);
        assert_eq!(keyword_score("Rigpa", "dzogchen"), 0);
    }

    #[test]
    fn test_ties_keep_encounter_order_across_calls() {
        let docs = vec![
            text("a", "ground path fruition"),
            text("b", "the ground"),
            text("c", "ground of being"),
        ];

        let first = keyword_search(&docs, "ground", 5);
        let second = keyword_search(&docs, "ground", 5);

        assert_eq!(ids(&first), vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_scores_are_dropped() {
        let docs = vec![text("a", "lhundrub"), text("b", "kadag")];
        assert_eq!(ids(&keyword_search(&docs, "kadag", 5)), vec!["b"]);
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        let docs = vec![text("a", "anything at all")];
        assert!(keyword_search(&docs, "", 5).is_empty());
        assert!(keyword_search(&docs, "   \t", 5).is_empty());
    }

    #[test]
    fn test_keyword_top_k_bound() {
        let docs: Vec<_> = (0..10).map(|i| text(&format!("d{i}"), "rigpa")).collect();
        assert_eq!(keyword_search(&docs, "rigpa", 3).len(), 3);
        assert!(keyword_search(&docs, "rigpa", 0).is_empty());
    }

    #[test]
    fn test_vector_search_orders_by_similarity_and_skips_unembedded() {
        let docs = vec![
            embedded("orthogonal", vec![0.0, 1.0]),
            text("plain", "no vector here"),
            embedded("same", vec![2.0, 0.0]),
            embedded("close", vec![0.9, 0.1]),
        ];

        let results = vector_search(&docs, &[1.0, 0.0], 10);

        assert_eq!(ids(&results), vec!["same", "close", "orthogonal"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_search_has_no_floor_but_respects_top_k() {
        let docs = vec![
            embedded("opposite", vec![-1.0, 0.0]),
            embedded("weak", vec![0.1, 1.0]),
        ];

        assert_eq!(vector_search(&docs, &[1.0, 0.0], 5).len(), 2);
        assert_eq!(ids(&vector_search(&docs, &[1.0, 0.0], 1)), vec!["weak"]);
    }
}
