//! Two-stage retrieval: a keyword AND filter picks candidates, then the
//! candidates are reranked by cosine similarity to the query centroid.
//!
//! Only Stage-1 candidates are ever scored in Stage 2. When the query has no
//! recognized token, or no candidate has a stored embedding, the keyword
//! ranking is returned as is.

use crate::embedding::{centroid, cosine_similarity};
use crate::engine::Engine;
use crate::DocId;

impl Engine {
    pub fn search_semantic(&self, query: &str, top_k: usize) -> Vec<(DocId, f32)> {
        let mut candidates = self.search_multi(query);
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }
        candidates.truncate(self.config.candidate_limit.max(1));

        let keyword_fallback = |candidates: Vec<(DocId, u32)>| -> Vec<(DocId, f32)> {
            candidates.into_iter().take(top_k).map(|(d, s)| (d, s as f32)).collect()
        };

        let Some(oracle) = self.oracle.as_deref() else {
            tracing::debug!("no embedding oracle, keeping keyword ranking");
            return keyword_fallback(candidates);
        };
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let Some(query_vec) = centroid(words.as_slice(), oracle) else {
            tracing::debug!(%query, "no query token has a vector, keeping keyword ranking");
            return keyword_fallback(candidates);
        };

        let mut reranked: Vec<(DocId, f32)> = Vec::with_capacity(candidates.len());
        for (doc_id, _) in &candidates {
            match self.embeddings.get(doc_id) {
                Ok(Some(vector)) if vector.len() == query_vec.len() => {
                    reranked.push((doc_id.clone(), cosine_similarity(&query_vec, &vector)));
                }
                Ok(Some(vector)) => {
                    tracing::warn!(%doc_id, expected = query_vec.len(), found = vector.len(), "embedding dimension mismatch");
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(%doc_id, error = %e, "failed to load embedding"),
            }
        }
        if reranked.is_empty() {
            tracing::debug!("no candidate has an embedding, keeping keyword ranking");
            return keyword_fallback(candidates);
        }

        reranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        reranked.truncate(top_k);
        reranked
    }
}
