//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or a zero vector on either side)
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}

/// Rank candidates by cosine similarity to `query`, highest first, and keep
/// the top `k`.
///
/// There is no similarity floor. Candidates whose dimension differs from the
/// query are skipped. Equal scores keep their input order.
pub fn rank_top_k<'a, T>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, &'a [f32])>,
    k: usize,
) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = Vec::new();

    for (item, embedding) in candidates {
        match cosine_similarity(query, embedding) {
            Ok(score) => scored.push((item, score)),
            Err(e) => debug!("Skipping candidate: {e}"),
        }
    }

    // Stable: ties stay in encounter order.
    scored.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.5];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let vectors = [
            vec![1e-3, 2e-3, 3e-3],
            vec![1e6, -1e6, 5e5],
            vec![-0.1, 0.2, -0.3],
            vec![7.0, 7.0, 7.0],
        ];
        for a in &vectors {
            for b in &vectors {
                let sim = cosine_similarity(a, b).unwrap();
                assert!((-1.0..=1.0).contains(&sim), "{sim} out of range");
            }
        }
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_rank_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let c = vec![0.7, 0.7, 0.0];
        let candidates = vec![("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())];

        let results = rank_top_k(&query, candidates, 2);
        let ids: Vec<&str> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_rank_top_k_skips_mismatched_and_keeps_tie_order() {
        let query = vec![1.0, 0.0];
        let same = vec![2.0, 0.0];
        let short = vec![1.0];
        let candidates = vec![
            ("first", same.as_slice()),
            ("bad", short.as_slice()),
            ("second", same.as_slice()),
        ];

        let results = rank_top_k(&query, candidates, 10);
        let ids: Vec<&str> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
