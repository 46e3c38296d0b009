//! Single-document ingestion into a live index.
//!
//! The document is tokenized, its new words allocated and persisted in the
//! lexicon, the raw document stored, one positional posting written per
//! distinct word, and an embedding computed when an oracle is configured.
//! Posting writes are best-effort: a failed barrel update is logged and
//! counted, and the remaining words are still indexed.

use crate::documents::NewDocument;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::{DocId, WordId};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub success: bool,
    pub doc_id: Option<DocId>,
    pub tokens_count: usize,
    pub unique_words: usize,
    pub new_words_added: usize,
    pub failed_postings: usize,
    pub embedding_created: bool,
    pub indexing_time_s: f64,
    pub message: String,
}

impl Engine {
    /// Index one new document. Never fails outright: hard errors are
    /// reported through `success = false`.
    pub fn index_document(&self, doc: NewDocument) -> IndexResult {
        let start = Instant::now();
        match self.try_index_document(&doc, start) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "document indexing failed");
                IndexResult {
                    success: false,
                    doc_id: doc.doc_id,
                    tokens_count: 0,
                    unique_words: 0,
                    new_words_added: 0,
                    failed_postings: 0,
                    embedding_created: false,
                    indexing_time_s: start.elapsed().as_secs_f64(),
                    message: format!("Failed to index document: {e}"),
                }
            }
        }
    }

    fn try_index_document(&self, doc: &NewDocument, start: Instant) -> Result<IndexResult> {
        let text = doc.text();
        if text.trim().is_empty() {
            return Err(EngineError::InvalidDocument("document has no text".into()));
        }

        let tokens = self.tokenizer.tokenize(&text);
        let (order, mut positions) = positions_by_token(&tokens);

        // new words get IDs in order of first appearance; nothing is stored
        // until they are on disk
        let (word_ids, new_words) = self.allocate_words(order.iter().map(String::as_str))?;

        let doc_id = self.documents.store(doc)?;
        tracing::info!(%doc_id, "stored document");

        let mut failed = 0usize;
        let mut attempted = 0usize;
        for token in &order {
            let Some(&word_id) = word_ids.get(token.as_str()) else { continue };
            let token_positions = positions.remove(token).unwrap_or_default();
            attempted += 1;
            if let Err(e) = self.barrels.add_occurrence(word_id, &doc_id, token_positions) {
                tracing::warn!(%doc_id, word = %token, word_id, error = %e, "failed to update barrel");
                failed += 1;
            }
        }
        if failed > 0 {
            let partial = EngineError::PartialWrite { failed, total: attempted };
            tracing::warn!(%doc_id, "{partial}, document kept");
        }

        let embedding_created = match self.oracle.as_deref() {
            Some(oracle) => match self.embeddings.embed_document(&doc_id, tokens.as_slice(), oracle) {
                Ok(created) => created,
                Err(e) => {
                    tracing::warn!(%doc_id, error = %e, "failed to store embedding");
                    false
                }
            },
            None => false,
        };

        let elapsed = start.elapsed().as_secs_f64();
        Ok(IndexResult {
            success: true,
            message: format!("Document indexed successfully in {elapsed:.2} seconds"),
            doc_id: Some(doc_id),
            tokens_count: tokens.len(),
            unique_words: word_ids.len(),
            new_words_added: new_words,
            failed_postings: failed,
            embedding_created,
            indexing_time_s: elapsed,
        })
    }

    /// Resolve or allocate every word, saving the lexicon once if any word was
    /// new. A failed save rolls the allocations back, so no posting is ever
    /// written under an ID the lexicon file does not hold.
    fn allocate_words<'a>(&self, words: impl Iterator<Item = &'a str>) -> Result<(HashMap<String, WordId>, usize)> {
        let mut lexicon = self.lexicon.write();
        let before = lexicon.next_id();
        let mut ids = HashMap::new();
        for word in words {
            let id = lexicon.add_if_absent(word);
            if id != 0 {
                ids.insert(word.to_string(), id);
            }
        }
        let added = (lexicon.next_id() - before) as usize;
        if added > 0 {
            if let Err(e) = lexicon.save(&self.paths.lexicon()) {
                lexicon.rollback_to(before);
                return Err(e);
            }
            tracing::info!(added, "added new words to lexicon");
        }
        Ok((ids, added))
    }
}

/// Distinct tokens in first-appearance order, and each one's ordered positions.
fn positions_by_token(tokens: &[String]) -> (Vec<String>, HashMap<String, Vec<u32>>) {
    let mut order = Vec::new();
    let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        positions
            .entry(token.clone())
            .or_insert_with(|| {
                order.push(token.clone());
                Vec::new()
            })
            .push(pos as u32);
    }
    (order, positions)
}
