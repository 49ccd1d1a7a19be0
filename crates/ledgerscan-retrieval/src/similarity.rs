//! Cosine ranking of stored documents against a new document's chunk vectors.

use std::collections::HashMap;

use ndarray::Array1;
use tracing::{debug, warn};

use ledgerscan_store::StoredEmbedding;

/// A corpus entry: one chunk vector and the document that owns it.
pub trait CorpusVector {
    fn document_id(&self) -> &str;
    fn vector(&self) -> &Array1<f32>;
}

impl CorpusVector for StoredEmbedding {
    fn document_id(&self) -> &str {
        &self.document_id
    }

    fn vector(&self) -> &Array1<f32> {
        &self.embedding
    }
}

impl CorpusVector for (String, Array1<f32>) {
    fn document_id(&self) -> &str {
        &self.0
    }

    fn vector(&self) -> &Array1<f32> {
        &self.1
    }
}

/// Cosine similarity of two equal-length vectors, 0.0 when either norm is zero.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Rank corpus documents by their best chunk-to-chunk similarity with any
/// query vector and return up to `top_k` document ids, best first.
///
/// Documents with equal scores keep the order in which the corpus first
/// mentions them. Pairs whose dimensions differ are skipped.
pub fn rank_similar_documents<C: CorpusVector>(
    queries: &[Array1<f32>],
    corpus: &[C],
    exclude: Option<&str>,
    top_k: usize,
) -> Vec<String> {
    let mut scores: Vec<(&str, f32)> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut mismatched = 0usize;

    for entry in corpus {
        let doc_id = entry.document_id();
        let vector = entry.vector();
        if exclude == Some(doc_id) || vector.is_empty() {
            continue;
        }
        for query in queries {
            if query.len() != vector.len() {
                mismatched += 1;
                continue;
            }
            let score = cosine_similarity(query, vector);
            match slots.get(doc_id) {
                Some(&slot) => {
                    if score > scores[slot].1 {
                        scores[slot].1 = score;
                    }
                }
                None => {
                    slots.insert(doc_id, scores.len());
                    scores.push((doc_id, score));
                }
            }
        }
    }

    if mismatched > 0 {
        warn!("Skipped {} vector pairs with mismatched dimensions", mismatched);
    }

    // Stable: ties stay in corpus order.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    scores.truncate(top_k);
    debug!(
        "Ranked {} similar documents: {:?}",
        scores.len(),
        scores.iter().map(|(id, s)| format!("{}={:.3}", id, s)).collect::<Vec<_>>()
    );

    scores.into_iter().map(|(id, _)| id.to_string()).collect()
}
